//! Domain layer - requests, execution strategies and chain orchestration

pub mod chain;
pub mod error;
pub mod request;

pub use chain::{
    ChainCompletionSubscriber, ChainManager, ChainRun, CompletionAggregator, Continuation,
    ExecutionMode, ExecutionStrategy, RunId, RunState, RunSummary,
};
pub use error::ChainError;
pub use request::{CompletionNotifier, CompletionSubscriber, Request};
