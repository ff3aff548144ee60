//! Completion subscriber registry embedded by every request

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// Callback invoked with a request's success flag when it completes
pub type CompletionSubscriber = Arc<dyn Fn(bool) + Send + Sync>;

/// Holds the local completion subscribers of a request plus the single slot
/// owned by the chain run that currently drives it.
///
/// Local subscribers persist across runs until [`reset_subscribers`] is
/// called. The chain slot is overwritten by every new run.
///
/// [`reset_subscribers`]: CompletionNotifier::reset_subscribers
#[derive(Default)]
pub struct CompletionNotifier {
    local: Mutex<Vec<CompletionSubscriber>>,
    chain: Mutex<Option<CompletionSubscriber>>,
}

impl CompletionNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a local subscriber. Subscribers run in registration order.
    pub fn add_subscriber(&self, subscriber: CompletionSubscriber) {
        self.local.lock().push(subscriber);
    }

    /// Remove every local subscriber. The chain slot is left untouched.
    pub fn reset_subscribers(&self) {
        self.local.lock().clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.local.lock().len()
    }

    pub(crate) fn set_chain_subscriber(&self, subscriber: CompletionSubscriber) {
        *self.chain.lock() = Some(subscriber);
    }

    pub fn has_chain_subscriber(&self) -> bool {
        self.chain.lock().is_some()
    }

    /// Invoke all local subscribers, then the chain subscriber.
    ///
    /// Callbacks run without any lock held, so a subscriber may register
    /// further subscribers or start other requests.
    pub fn signal(&self, success: bool) {
        let local: Vec<CompletionSubscriber> = self.local.lock().clone();
        let chain = self.chain.lock().clone();

        for subscriber in &local {
            subscriber(success);
        }

        if let Some(chain) = chain {
            chain(success);
        }
    }
}

impl fmt::Debug for CompletionNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionNotifier")
            .field("local_subscribers", &self.subscriber_count())
            .field("chain_subscriber", &self.has_chain_subscriber())
            .finish()
    }
}
