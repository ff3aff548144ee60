//! Request chain orchestration
//!
//! Runs a list of independent asynchronous requests as one chain and reports
//! a single aggregate outcome, with a choice of how strictly completions are
//! ordered:
//! - `SequentialStop`: one at a time, stop at the first failure
//! - `SequentialContinue`: one at a time, run everything regardless
//! - `Parallel`: start everything at once (default)
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use request_chain::{ChainManager, ExecutionMode, TaskRequest};
//!
//! let mut manager = ChainManager::new().with_mode(ExecutionMode::SequentialStop);
//! manager.add_request(Arc::new(TaskRequest::new("login", || async { Ok(()) })));
//! manager.add_request(Arc::new(TaskRequest::new("sync", || async { Ok(()) })));
//! manager.add_chain_completion_subscriber(Arc::new(|ok| println!("chain done: {ok}")));
//!
//! let success = manager.run_until_complete().await?;
//! ```

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{
    ChainCompletionSubscriber, ChainError, ChainManager, ChainRun, CompletionNotifier,
    CompletionSubscriber, ExecutionMode, Request, RunId, RunState, RunSummary,
};
pub use infrastructure::TaskRequest;
