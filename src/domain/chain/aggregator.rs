//! Completion aggregator - one per chain run
//!
//! Every request in a run reports to the same aggregator. It folds the
//! success flags, counts completions and decides when the run is over.
//! Completions may arrive concurrently under the parallel mode, so the
//! fold/count/compare step runs under a single lock; callbacks and request
//! starts happen after the lock is released.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::mode::{Continuation, ExecutionMode, ExecutionStrategy};
use crate::domain::request::Request;

/// Callback invoked once per run with the aggregate success flag
pub type ChainCompletionSubscriber = Arc<dyn Fn(bool) + Send + Sync>;

/// Identifier of a single chain run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a chain run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Completed,
}

struct AggregateState {
    state: RunState,
    completed: usize,
    all_success: bool,
    outcome: Option<bool>,
    finished_at: Option<DateTime<Utc>>,
    /// Released on completion so requests no longer keep the run alive
    requests: Vec<Arc<dyn Request>>,
}

enum Action {
    Start(usize, Arc<dyn Request>),
    Notify(bool),
    Nothing,
}

pub struct CompletionAggregator {
    run_id: RunId,
    total: usize,
    strategy: Arc<dyn ExecutionStrategy>,
    subscribers: Vec<ChainCompletionSubscriber>,
    started_at: DateTime<Utc>,
    inner: Mutex<AggregateState>,
    done: watch::Sender<Option<bool>>,
}

impl CompletionAggregator {
    pub(crate) fn new(
        requests: Vec<Arc<dyn Request>>,
        strategy: Arc<dyn ExecutionStrategy>,
        subscribers: Vec<ChainCompletionSubscriber>,
    ) -> Arc<Self> {
        Arc::new(Self {
            run_id: RunId::new(),
            total: requests.len(),
            strategy,
            subscribers,
            started_at: Utc::now(),
            inner: Mutex::new(AggregateState {
                state: RunState::Idle,
                completed: 0,
                all_success: true,
                outcome: None,
                finished_at: None,
                requests,
            }),
            done: watch::channel(None).0,
        })
    }

    /// Attach this aggregator to every request and hand control to the
    /// strategy. Any chain subscriber left by an earlier run is replaced.
    pub(crate) fn begin(self: &Arc<Self>) {
        let requests = {
            let mut inner = self.inner.lock();
            inner.state = RunState::Running;
            inner.requests.clone()
        };

        for request in &requests {
            let aggregator = Arc::clone(self);
            request
                .notifier()
                .set_chain_subscriber(Arc::new(move |success| {
                    aggregator.on_request_complete(success)
                }));
        }

        info!(
            run_id = %self.run_id,
            mode = %self.strategy.mode(),
            requests = self.total,
            "Starting request chain"
        );

        self.strategy.begin(&requests);
    }

    /// Record one request completion
    pub fn on_request_complete(&self, success: bool) {
        let action = {
            let mut inner = self.inner.lock();

            if inner.state == RunState::Completed {
                warn!(
                    run_id = %self.run_id,
                    success,
                    "Ignoring completion received after the chain finished"
                );
                return;
            }

            inner.all_success &= success;
            inner.completed += 1;
            let completed = inner.completed;

            debug!(
                run_id = %self.run_id,
                completed,
                total = self.total,
                success,
                "Request completed"
            );

            if completed >= self.total {
                let outcome = inner.all_success;
                Self::finish(&mut inner, outcome);
                Action::Notify(outcome)
            } else {
                match self
                    .strategy
                    .on_single_completion(completed, success, self.total)
                {
                    Continuation::Start(index) => match inner.requests.get(index) {
                        Some(request) => Action::Start(index, request.clone()),
                        None => {
                            warn!(
                                run_id = %self.run_id,
                                index,
                                "Strategy asked for a request outside the chain"
                            );
                            Action::Nothing
                        }
                    },
                    Continuation::Wait => Action::Nothing,
                    Continuation::Halt => {
                        Self::finish(&mut inner, false);
                        Action::Notify(false)
                    }
                }
            }
        };

        match action {
            Action::Start(index, request) => {
                debug!(
                    run_id = %self.run_id,
                    index,
                    request = request.name(),
                    "Starting next request"
                );
                request.start();
            }
            Action::Notify(outcome) => self.notify(outcome),
            Action::Nothing => {}
        }
    }

    fn finish(inner: &mut AggregateState, outcome: bool) {
        inner.state = RunState::Completed;
        inner.outcome = Some(outcome);
        inner.finished_at = Some(Utc::now());
        inner.requests.clear();
    }

    fn notify(&self, outcome: bool) {
        let (completed, finished_at) = {
            let inner = self.inner.lock();
            (inner.completed, inner.finished_at)
        };
        let elapsed_ms = finished_at
            .map(|t| (t - self.started_at).num_milliseconds())
            .unwrap_or_default();

        info!(
            run_id = %self.run_id,
            success = outcome,
            completed,
            total = self.total,
            elapsed_ms,
            "Request chain completed"
        );

        for subscriber in &self.subscribers {
            subscriber(outcome);
        }

        self.done.send_replace(Some(outcome));
    }

    /// Receiver that observes the aggregate result once subscribers have run
    pub fn watch_outcome(&self) -> watch::Receiver<Option<bool>> {
        self.done.subscribe()
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn mode(&self) -> ExecutionMode {
        self.strategy.mode()
    }

    pub fn state(&self) -> RunState {
        self.inner.lock().state
    }

    pub fn completed_count(&self) -> usize {
        self.inner.lock().completed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Aggregate success flag, once the run has completed
    pub fn outcome(&self) -> Option<bool> {
        self.inner.lock().outcome
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().finished_at
    }
}

impl fmt::Debug for CompletionAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CompletionAggregator")
            .field("run_id", &self.run_id)
            .field("mode", &self.strategy.mode())
            .field("state", &inner.state)
            .field("completed", &inner.completed)
            .field("total", &self.total)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chain::mode::MockExecutionStrategy;
    use crate::domain::request::mock::MockRequest;
    use mockall::predicate::eq;

    struct Fixture {
        mocks: Vec<Arc<MockRequest>>,
        fired: Arc<Mutex<Vec<bool>>>,
        aggregator: Arc<CompletionAggregator>,
    }

    fn fixture(count: usize, strategy: MockExecutionStrategy) -> Fixture {
        let mocks: Vec<Arc<MockRequest>> = (0..count)
            .map(|i| Arc::new(MockRequest::new(format!("req-{}", i))))
            .collect();
        let requests = mocks
            .iter()
            .map(|m| m.clone() as Arc<dyn Request>)
            .collect();

        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = fired.clone();
        let subscriber: ChainCompletionSubscriber = Arc::new(move |ok| sink.lock().push(ok));

        let aggregator = CompletionAggregator::new(requests, Arc::new(strategy), vec![subscriber]);

        Fixture {
            mocks,
            fired,
            aggregator,
        }
    }

    fn strategy() -> MockExecutionStrategy {
        let mut strategy = MockExecutionStrategy::new();
        strategy.expect_mode().return_const(ExecutionMode::Parallel);
        strategy.expect_begin().times(1).return_const(());
        strategy
    }

    #[test]
    fn test_state_transitions() {
        let mut strategy = strategy();
        strategy
            .expect_on_single_completion()
            .return_const(Continuation::Wait);

        let f = fixture(2, strategy);
        assert_eq!(f.aggregator.state(), RunState::Idle);

        f.aggregator.begin();
        assert_eq!(f.aggregator.state(), RunState::Running);
        assert!(f.mocks.iter().all(|m| m.notifier().has_chain_subscriber()));

        f.mocks[0].complete(true);
        assert_eq!(f.aggregator.state(), RunState::Running);
        assert_eq!(f.aggregator.outcome(), None);

        f.mocks[1].complete(true);
        assert_eq!(f.aggregator.state(), RunState::Completed);
        assert_eq!(f.aggregator.outcome(), Some(true));
        assert!(f.aggregator.finished_at().is_some());
        assert_eq!(*f.fired.lock(), vec![true]);
    }

    #[test]
    fn test_success_flags_are_anded() {
        let mut strategy = strategy();
        strategy
            .expect_on_single_completion()
            .return_const(Continuation::Wait);

        let f = fixture(3, strategy);
        f.aggregator.begin();

        f.mocks[0].complete(true);
        f.mocks[1].complete(false);
        f.mocks[2].complete(true);

        assert_eq!(*f.fired.lock(), vec![false]);
    }

    #[test]
    fn test_strategy_sees_completed_count_and_last_flag() {
        let mut strategy = strategy();
        strategy
            .expect_on_single_completion()
            .with(eq(1), eq(false), eq(3))
            .times(1)
            .return_const(Continuation::Wait);
        strategy
            .expect_on_single_completion()
            .with(eq(2), eq(true), eq(3))
            .times(1)
            .return_const(Continuation::Wait);

        let f = fixture(3, strategy);
        f.aggregator.begin();

        f.mocks[0].complete(false);
        f.mocks[1].complete(true);
        // The last completion finishes the run without consulting the strategy
        f.mocks[2].complete(true);

        assert_eq!(f.aggregator.completed_count(), 3);
        assert_eq!(*f.fired.lock(), vec![false]);
    }

    #[test]
    fn test_start_continuation_starts_requested_index() {
        let mut strategy = strategy();
        strategy
            .expect_on_single_completion()
            .with(eq(1), eq(true), eq(3))
            .return_const(Continuation::Start(1));

        let f = fixture(3, strategy);
        f.aggregator.begin();
        f.mocks[0].complete(true);

        assert_eq!(f.mocks[1].start_count(), 1);
        assert_eq!(f.mocks[2].start_count(), 0);
    }

    #[test]
    fn test_out_of_range_start_is_ignored() {
        let mut strategy = strategy();
        strategy
            .expect_on_single_completion()
            .return_const(Continuation::Start(7));

        let f = fixture(2, strategy);
        f.aggregator.begin();
        f.mocks[0].complete(true);

        assert!(f.mocks.iter().all(|m| m.start_count() == 0));
        assert_eq!(f.aggregator.state(), RunState::Running);
    }

    #[test]
    fn test_halt_fires_failure_immediately() {
        let mut strategy = strategy();
        strategy
            .expect_on_single_completion()
            .times(1)
            .return_const(Continuation::Halt);

        let f = fixture(3, strategy);
        f.aggregator.begin();
        f.mocks[0].complete(false);

        assert_eq!(f.aggregator.state(), RunState::Completed);
        assert_eq!(f.aggregator.completed_count(), 1);
        assert_eq!(*f.fired.lock(), vec![false]);
    }

    #[test]
    fn test_completions_after_finish_are_ignored() {
        let mut strategy = strategy();
        strategy
            .expect_on_single_completion()
            .return_const(Continuation::Halt);

        let f = fixture(2, strategy);
        f.aggregator.begin();

        f.mocks[0].complete(false);
        f.mocks[0].complete(true);
        f.mocks[1].complete(true);

        assert_eq!(f.aggregator.completed_count(), 1);
        assert_eq!(*f.fired.lock(), vec![false]);
    }

    #[test]
    fn test_request_list_released_after_completion() {
        let mut strategy = strategy();
        strategy
            .expect_on_single_completion()
            .return_const(Continuation::Wait);

        let f = fixture(1, strategy);
        f.aggregator.begin();
        assert_eq!(Arc::strong_count(&f.mocks[0]), 2);

        f.mocks[0].complete(true);
        assert_eq!(Arc::strong_count(&f.mocks[0]), 1);
    }

    #[test]
    fn test_concurrent_completions_fire_once() {
        const COUNT: usize = 64;

        let mut strategy = strategy();
        strategy
            .expect_on_single_completion()
            .return_const(Continuation::Wait);

        let f = fixture(COUNT, strategy);
        f.aggregator.begin();

        let handles: Vec<_> = f
            .mocks
            .iter()
            .enumerate()
            .map(|(i, mock)| {
                let mock = mock.clone();
                std::thread::spawn(move || mock.complete(i % 9 != 0))
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(f.aggregator.completed_count(), COUNT);
        assert_eq!(*f.fired.lock(), vec![false]);
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }
}
