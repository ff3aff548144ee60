//! Request domain - the unit of work and its completion subscribers

mod notifier;
mod traits;

pub use notifier::{CompletionNotifier, CompletionSubscriber};
pub use traits::Request;

#[cfg(test)]
pub use traits::mock;
