//! In-flight deduplication and the concurrency-capped work queue
//!
//! Every network-bound request passes through [`RequestCoordinator::enqueue`].
//! Callers asking for a key that is already in flight join the existing
//! [`PendingResult`]; everything else waits in a priority heap until one of
//! `max_concurrent` slots frees up. Admitted items run on spawned tasks, so a
//! caller that stops awaiting never cancels the attempt.

use crate::pipeline::Stage;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use storegate_core::{Error, Priority, Result};
use storegate_utils::tracing::request_span;
use storegate_utils::{retry_async, RateLimiter, RetryPolicy};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn, Instrument};

/// Settlement shared by every caller of one key
pub type PendingResult = Shared<BoxFuture<'static, Result<Value>>>;

/// One network attempt; called again for each retry
pub type RunFn = Arc<dyn Fn() -> BoxFuture<'static, Result<Value>> + Send + Sync>;

struct QueueItem {
    key: String,
    rate_key: String,
    priority: Priority,
    seq: u64,
    enqueued_at: Instant,
    run: RunFn,
    settle: oneshot::Sender<Result<Value>>,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    // Max-heap: higher priority first, then earlier arrival
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .weight()
            .total_cmp(&other.priority.weight())
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Default)]
struct State {
    in_flight: HashMap<String, PendingResult>,
    queue: BinaryHeap<QueueItem>,
    running: usize,
    seq: u64,
}

pub struct RequestCoordinator {
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    max_concurrent: usize,
    state: Mutex<State>,
}

impl RequestCoordinator {
    pub fn new(limiter: Arc<RateLimiter>, policy: RetryPolicy, max_concurrent: usize) -> Arc<Self> {
        Arc::new(Self {
            limiter,
            policy,
            max_concurrent: max_concurrent.max(1),
            state: Mutex::new(State::default()),
        })
    }

    /// Execute `run` for `key`, or join the attempt already in flight
    pub fn enqueue(
        self: &Arc<Self>,
        key: &str,
        rate_key: &str,
        priority: Priority,
        run: RunFn,
    ) -> PendingResult {
        let (pending, ready) = {
            let mut state = self.state.lock();
            if let Some(pending) = state.in_flight.get(key) {
                debug!(key = %key, "request_joined");
                return pending.clone();
            }

            let (settle, receiver) = oneshot::channel();
            let abandoned_key = key.to_string();
            let pending = receiver
                .map(move |received| {
                    received.unwrap_or_else(|_| {
                        Err(Error::network(abandoned_key, "request was abandoned"))
                    })
                })
                .boxed()
                .shared();

            state.seq += 1;
            let item = QueueItem {
                key: key.to_string(),
                rate_key: rate_key.to_string(),
                priority,
                seq: state.seq,
                enqueued_at: Instant::now(),
                run,
                settle,
            };
            state.in_flight.insert(key.to_string(), pending.clone());
            state.queue.push(item);
            debug!(
                key = %key,
                priority = priority.weight(),
                queued = state.queue.len(),
                running = state.running,
                "request_enqueued"
            );

            (pending, self.take_ready(&mut state))
        };

        for item in ready {
            self.spawn(item);
        }
        pending
    }

    /// Number of keys with a pending settlement
    pub fn in_flight_len(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    pub fn queued_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn running(&self) -> usize {
        self.state.lock().running
    }

    fn take_ready(&self, state: &mut State) -> Vec<QueueItem> {
        let mut ready = Vec::new();
        while state.running < self.max_concurrent {
            let Some(item) = state.queue.pop() else {
                break;
            };
            state.running += 1;
            ready.push(item);
        }
        ready
    }

    fn spawn(self: &Arc<Self>, item: QueueItem) {
        let span = request_span(&item.key, item.priority.weight());
        let this = Arc::clone(self);
        tokio::spawn(async move { this.process(item).await }.instrument(span));
    }

    async fn process(self: Arc<Self>, item: QueueItem) {
        let QueueItem {
            key,
            rate_key,
            priority,
            enqueued_at,
            run,
            settle,
            ..
        } = item;
        debug!(
            stage = %Stage::RateLimit,
            key = %key,
            priority = priority.weight(),
            queued_ms = enqueued_at.elapsed().as_millis() as u64,
            "request_started"
        );

        let limiter = &self.limiter;
        let rate_key = rate_key.as_str();
        let result = retry_async(&self.policy, &key, move |attempt| {
            let run = Arc::clone(&run);
            async move {
                limiter.check_limit(rate_key, priority).await?;
                let outcome = run().await;
                match &outcome {
                    Ok(_) => limiter.reset_backoff(),
                    Err(error) if error.is_rate_limited() => {
                        let backoff = limiter.increase_backoff();
                        warn!(
                            key = %rate_key,
                            attempt,
                            backoff_ms = backoff.as_millis() as u64,
                            "rate_limited_by_server"
                        );
                    }
                    Err(_) => {}
                }
                outcome
            }
        })
        .await;

        let next = {
            let mut state = self.state.lock();
            state.in_flight.remove(&key);
            state.running = state.running.saturating_sub(1);
            self.take_ready(&mut state)
        };

        match &result {
            Ok(_) => debug!(stage = %Stage::RetryOrSettle, key = %key, "request_settled"),
            Err(error) => {
                warn!(stage = %Stage::RetryOrSettle, key = %key, error = %error, "request_failed")
            }
        }
        // Nobody awaiting is fine; the run already had its side effects
        let _ = settle.send(result);

        for item in next {
            self.spawn(item);
        }
    }
}
