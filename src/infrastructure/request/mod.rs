//! Concrete request implementations

mod task_request;

pub use task_request::TaskRequest;
