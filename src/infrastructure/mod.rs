//! Infrastructure layer - concrete requests and logging setup

pub mod logging;
pub mod request;

pub use request::TaskRequest;
