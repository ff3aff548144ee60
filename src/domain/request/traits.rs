//! Request trait - the unit of work a chain drives

use std::sync::Arc;

use super::notifier::{CompletionNotifier, CompletionSubscriber};

/// A unit of asynchronous work that reports success or failure exactly once.
///
/// Implementations must not block inside [`start`](Request::start) and must
/// call [`signal_completion`](Request::signal_completion) exactly once per
/// start, after `start` has returned, whatever the outcome. Internal errors
/// are reported as `signal_completion(false)`, never propagated.
pub trait Request: Send + Sync {
    /// Begin the work. Returns immediately; the result arrives via the
    /// completion subscribers.
    fn start(self: Arc<Self>);

    /// Subscriber registry backing this request
    fn notifier(&self) -> &CompletionNotifier;

    /// Label used in log output
    fn name(&self) -> &str {
        "request"
    }

    fn add_completion_subscriber(&self, subscriber: CompletionSubscriber) {
        self.notifier().add_subscriber(subscriber);
    }

    fn reset_completion_subscribers(&self) {
        self.notifier().reset_subscribers();
    }

    /// Notify local subscribers, then the owning chain run
    fn signal_completion(&self, success: bool) {
        self.notifier().signal(success);
    }
}
