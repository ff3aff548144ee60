//! Request chain domain - execution modes, completion aggregation and the manager

mod aggregator;
mod manager;
mod mode;

pub use aggregator::{ChainCompletionSubscriber, CompletionAggregator, RunId, RunState};
pub use manager::{ChainManager, ChainRun, RunSummary};
pub use mode::{
    Continuation, ExecutionMode, ExecutionStrategy, ParallelStrategy, SequentialContinueStrategy,
    SequentialStopStrategy,
};

#[cfg(test)]
pub use mode::MockExecutionStrategy;
