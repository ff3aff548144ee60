//! Chain manager - owns the request list and drives chain runs

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::aggregator::{ChainCompletionSubscriber, CompletionAggregator, RunId, RunState};
use super::mode::ExecutionMode;
use crate::config::ChainConfig;
use crate::domain::request::Request;
use crate::domain::ChainError;

/// Read-only view of one chain run
#[derive(Debug, Clone)]
pub struct ChainRun {
    aggregator: Arc<CompletionAggregator>,
}

impl ChainRun {
    pub fn run_id(&self) -> RunId {
        self.aggregator.run_id()
    }

    pub fn mode(&self) -> ExecutionMode {
        self.aggregator.mode()
    }

    pub fn state(&self) -> RunState {
        self.aggregator.state()
    }

    pub fn is_complete(&self) -> bool {
        self.state() == RunState::Completed
    }

    pub fn completed_count(&self) -> usize {
        self.aggregator.completed_count()
    }

    pub fn total(&self) -> usize {
        self.aggregator.total()
    }

    /// Aggregate success flag; `None` while the run is in flight
    pub fn outcome(&self) -> Option<bool> {
        self.aggregator.outcome()
    }

    /// Wait for the aggregate result. Chain-completion subscribers have
    /// already been invoked when this returns.
    pub async fn wait(&self) -> Result<bool, ChainError> {
        let mut rx = self.aggregator.watch_outcome();
        let outcome = rx.wait_for(Option::is_some).await.map_err(|_| {
            ChainError::interrupted(format!("run {} stopped reporting", self.run_id()))
        })?;

        (*outcome).ok_or_else(|| {
            ChainError::interrupted(format!("run {} finished without a result", self.run_id()))
        })
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id(),
            mode: self.mode(),
            state: self.state(),
            completed: self.completed_count(),
            total: self.total(),
            success: self.outcome(),
            started_at: self.aggregator.started_at(),
            finished_at: self.aggregator.finished_at(),
        }
    }
}

/// Serializable snapshot of a chain run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub mode: ExecutionMode,
    pub state: RunState,
    pub completed: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Holds an ordered list of requests and runs them as one chain.
///
/// Configuration methods take `&mut self` and running takes `&self`. Each
/// run snapshots the requests, the mode and the chain-completion
/// subscribers, so registrations made after a run has started only affect
/// later runs.
#[derive(Default)]
pub struct ChainManager {
    requests: Vec<Arc<dyn Request>>,
    mode: ExecutionMode,
    subscribers: Vec<ChainCompletionSubscriber>,
}

impl ChainManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ChainConfig) -> Self {
        Self::new().with_mode(config.mode)
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_request(mut self, request: Arc<dyn Request>) -> Self {
        self.add_request(request);
        self
    }

    /// Append a request; insertion order is execution order
    pub fn add_request(&mut self, request: Arc<dyn Request>) {
        self.requests.push(request);
    }

    /// Replace the execution mode used by the next run
    pub fn set_mode(&mut self, mode: ExecutionMode) {
        self.mode = mode;
    }

    pub fn add_chain_completion_subscriber(&mut self, subscriber: ChainCompletionSubscriber) {
        self.subscribers.push(subscriber);
    }

    // Getters

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Start a new run and return immediately.
    ///
    /// The aggregate result is delivered to the chain-completion subscribers.
    /// An empty chain is rejected before anything is started.
    pub fn run_request_chain(&self) -> Result<ChainRun, ChainError> {
        if self.requests.is_empty() {
            warn!(mode = %self.mode, "Refusing to run an empty request chain");
            return Err(ChainError::empty_chain());
        }

        let aggregator = CompletionAggregator::new(
            self.requests.clone(),
            self.mode.strategy(),
            self.subscribers.clone(),
        );
        aggregator.begin();

        Ok(ChainRun { aggregator })
    }

    /// Start a new run and wait for its aggregate result
    pub async fn run_until_complete(&self) -> Result<bool, ChainError> {
        self.run_request_chain()?.wait().await
    }
}

impl fmt::Debug for ChainManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainManager")
            .field("mode", &self.mode)
            .field("requests", &self.requests.len())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
