//! Execution modes and the strategies behind them

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[cfg(test)]
use mockall::automock;

use crate::domain::request::Request;
use crate::domain::ChainError;

/// How a chain starts its requests and reacts to each completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One at a time; stop at the first failure
    #[serde(alias = "sequential-stop")]
    SequentialStop,
    /// One at a time; keep going after failures
    #[serde(alias = "sequential-continue")]
    SequentialContinue,
    /// Start everything at once
    #[default]
    Parallel,
}

impl ExecutionMode {
    pub const ALL: [ExecutionMode; 3] = [
        ExecutionMode::SequentialStop,
        ExecutionMode::SequentialContinue,
        ExecutionMode::Parallel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SequentialStop => "sequential_stop",
            Self::SequentialContinue => "sequential_continue",
            Self::Parallel => "parallel",
        }
    }

    /// Strategy object implementing this mode
    pub fn strategy(self) -> Arc<dyn ExecutionStrategy> {
        match self {
            Self::SequentialStop => Arc::new(SequentialStopStrategy),
            Self::SequentialContinue => Arc::new(SequentialContinueStrategy),
            Self::Parallel => Arc::new(ParallelStrategy),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionMode {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "sequential_stop" | "sequence" => Ok(Self::SequentialStop),
            "sequential_continue" | "sequence_continue" => Ok(Self::SequentialContinue),
            "parallel" | "overall" => Ok(Self::Parallel),
            other => Err(ChainError::configuration(format!(
                "unknown execution mode '{}'",
                other
            ))),
        }
    }
}

/// What the chain should do after a non-terminal completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Start the request at this index
    Start(usize),
    /// Nothing to start; wait for outstanding requests
    Wait,
    /// Finish the chain now as failed
    Halt,
}

/// Policy deciding how a chain run begins and how it proceeds.
///
/// `on_single_completion` is only consulted for completions that did not
/// already finish the chain.
#[cfg_attr(test, automock)]
pub trait ExecutionStrategy: Send + Sync {
    fn mode(&self) -> ExecutionMode;

    /// Called once when the run starts
    fn begin(&self, requests: &[Arc<dyn Request>]);

    /// `next_index` equals the number of completions observed so far
    fn on_single_completion(
        &self,
        next_index: usize,
        last_success: bool,
        total: usize,
    ) -> Continuation;
}

fn start_first(requests: &[Arc<dyn Request>]) {
    if let Some(first) = requests.first() {
        first.clone().start();
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialStopStrategy;

impl ExecutionStrategy for SequentialStopStrategy {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::SequentialStop
    }

    fn begin(&self, requests: &[Arc<dyn Request>]) {
        start_first(requests);
    }

    fn on_single_completion(
        &self,
        next_index: usize,
        last_success: bool,
        total: usize,
    ) -> Continuation {
        if !last_success {
            return Continuation::Halt;
        }

        if next_index < total {
            Continuation::Start(next_index)
        } else {
            Continuation::Wait
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialContinueStrategy;

impl ExecutionStrategy for SequentialContinueStrategy {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::SequentialContinue
    }

    fn begin(&self, requests: &[Arc<dyn Request>]) {
        start_first(requests);
    }

    fn on_single_completion(
        &self,
        next_index: usize,
        _last_success: bool,
        total: usize,
    ) -> Continuation {
        if next_index < total {
            Continuation::Start(next_index)
        } else {
            Continuation::Wait
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelStrategy;

impl ExecutionStrategy for ParallelStrategy {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Parallel
    }

    fn begin(&self, requests: &[Arc<dyn Request>]) {
        for request in requests {
            request.clone().start();
        }
    }

    fn on_single_completion(
        &self,
        _next_index: usize,
        _last_success: bool,
        _total: usize,
    ) -> Continuation {
        Continuation::Wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::request::mock::MockRequest;

    fn manual_requests(count: usize) -> (Vec<Arc<MockRequest>>, Vec<Arc<dyn Request>>) {
        let mocks: Vec<Arc<MockRequest>> = (0..count)
            .map(|i| Arc::new(MockRequest::new(format!("req-{}", i))))
            .collect();
        let requests = mocks
            .iter()
            .map(|m| m.clone() as Arc<dyn Request>)
            .collect();
        (mocks, requests)
    }

    #[test]
    fn test_default_mode_is_parallel() {
        assert_eq!(ExecutionMode::default(), ExecutionMode::Parallel);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(
            "sequential-stop".parse::<ExecutionMode>().unwrap(),
            ExecutionMode::SequentialStop
        );
        assert_eq!(
            "Sequential_Continue".parse::<ExecutionMode>().unwrap(),
            ExecutionMode::SequentialContinue
        );
        assert_eq!(
            "overall".parse::<ExecutionMode>().unwrap(),
            ExecutionMode::Parallel
        );
        assert!("burst".parse::<ExecutionMode>().is_err());
    }

    #[test]
    fn test_mode_display_round_trips_through_from_str() {
        for mode in ExecutionMode::ALL {
            assert_eq!(mode.to_string().parse::<ExecutionMode>().unwrap(), mode);
            assert_eq!(mode.strategy().mode(), mode);
        }
    }

    #[test]
    fn test_mode_serde_names() {
        let json = serde_json::to_string(&ExecutionMode::SequentialContinue).unwrap();
        assert_eq!(json, "\"sequential_continue\"");

        let mode: ExecutionMode = serde_json::from_str("\"sequential-stop\"").unwrap();
        assert_eq!(mode, ExecutionMode::SequentialStop);
    }

    #[test]
    fn test_sequential_begin_starts_only_first() {
        for strategy in [
            ExecutionMode::SequentialStop.strategy(),
            ExecutionMode::SequentialContinue.strategy(),
        ] {
            let (mocks, requests) = manual_requests(3);
            strategy.begin(&requests);

            let starts: Vec<usize> = mocks.iter().map(|m| m.start_count()).collect();
            assert_eq!(starts, vec![1, 0, 0]);
        }
    }

    #[test]
    fn test_sequential_begin_with_no_requests_does_nothing() {
        let requests: Vec<Arc<dyn Request>> = Vec::new();
        SequentialStopStrategy.begin(&requests);
        SequentialContinueStrategy.begin(&requests);
    }

    #[test]
    fn test_parallel_begin_starts_everything() {
        let (mocks, requests) = manual_requests(4);
        ParallelStrategy.begin(&requests);

        assert!(mocks.iter().all(|m| m.start_count() == 1));
    }

    #[test]
    fn test_sequential_stop_halts_on_failure() {
        let strategy = SequentialStopStrategy;
        assert_eq!(strategy.on_single_completion(1, true, 3), Continuation::Start(1));
        assert_eq!(strategy.on_single_completion(2, false, 3), Continuation::Halt);
        assert_eq!(strategy.on_single_completion(3, true, 3), Continuation::Wait);
    }

    #[test]
    fn test_sequential_continue_ignores_failure() {
        let strategy = SequentialContinueStrategy;
        assert_eq!(strategy.on_single_completion(1, false, 3), Continuation::Start(1));
        assert_eq!(strategy.on_single_completion(2, true, 3), Continuation::Start(2));
        assert_eq!(strategy.on_single_completion(3, false, 3), Continuation::Wait);
    }

    #[test]
    fn test_parallel_never_continues() {
        let strategy = ParallelStrategy;
        assert_eq!(strategy.on_single_completion(1, false, 3), Continuation::Wait);
        assert_eq!(strategy.on_single_completion(2, true, 3), Continuation::Wait);
    }
}
