//! Task-backed request - runs an async job on the tokio runtime
//!
//! Wraps any future producing `anyhow::Result<T>`. The typed value or the
//! failure message goes to the request's own callbacks first, then the
//! success flag is signalled to the completion subscribers. Panics inside
//! the job or a callback are reported as failures so the chain always hears
//! back.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

use crate::domain::{CompletionNotifier, Request};

type TaskFactory<T> = Box<dyn Fn() -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;
type SuccessCallback<T> = Arc<dyn Fn(T) + Send + Sync>;
type FailureCallback = Arc<dyn Fn(String) + Send + Sync>;

pub struct TaskRequest<T> {
    name: String,
    factory: TaskFactory<T>,
    on_success: Option<SuccessCallback<T>>,
    on_failure: Option<FailureCallback>,
    notifier: CompletionNotifier,
}

impl<T: Send + 'static> TaskRequest<T> {
    /// Create a request whose job is produced by `factory` on every start
    pub fn new<F, Fut>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            name: name.into(),
            factory: Box::new(move || factory().boxed()),
            on_success: None,
            on_failure: None,
            notifier: CompletionNotifier::new(),
        }
    }

    pub fn on_success(mut self, callback: impl Fn(T) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_failure(mut self, callback: impl Fn(String) + Send + Sync + 'static) -> Self {
        self.on_failure = Some(Arc::new(callback));
        self
    }

    fn finish(&self, result: anyhow::Result<T>) {
        let success = match result {
            Ok(value) => {
                debug!(request = %self.name, "Request succeeded");
                match &self.on_success {
                    Some(callback) => self.guard_callback("on_success", || callback(value)),
                    None => true,
                }
            }
            Err(e) => {
                let message = format!("{:#}", e);
                warn!(request = %self.name, error = %message, "Request failed");
                if let Some(callback) = &self.on_failure {
                    self.guard_callback("on_failure", || callback(message));
                }
                false
            }
        };

        self.signal_completion(success);
    }

    /// Run a user callback; a panic is logged and turns into `false`
    fn guard_callback(&self, callback: &str, f: impl FnOnce()) -> bool {
        match std::panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(()) => true,
            Err(_) => {
                warn!(request = %self.name, callback, "Request callback panicked");
                false
            }
        }
    }
}

impl<T: Send + 'static> Request for TaskRequest<T> {
    fn start(self: Arc<Self>) {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!(request = %self.name, error = %e, "No tokio runtime to run request on");
                let message = format!("no tokio runtime available: {}", e);
                // Completion must still arrive after start returns
                std::thread::spawn(move || self.finish(Err(anyhow::anyhow!(message))));
                return;
            }
        };

        let job = (self.factory)();

        handle.spawn(async move {
            let result = match AssertUnwindSafe(job).catch_unwind().await {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("request task panicked")),
            };
            self.finish(result);
        });
    }

    fn notifier(&self) -> &CompletionNotifier {
        &self.notifier
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<T> fmt::Debug for TaskRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRequest")
            .field("name", &self.name)
            .field("notifier", &self.notifier)
            .finish()
    }
}
