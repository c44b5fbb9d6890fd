//! Debounced profile edits
//!
//! Field edits accumulate in one pending batch. The first edit of a batch
//! starts a timer; when it fires, every edit made so far goes out as a single
//! update. [`ProfileBatcher::flush_now`] sends the batch without waiting.

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use storegate_core::{Error, ProfileSaved, ProfileUpdate, Result};
use tokio::sync::oneshot;
use tracing::debug;

/// Outcome of the batch an edit ended up in
pub type PendingUpdate = Shared<BoxFuture<'static, Result<ProfileSaved>>>;

/// Sends one batch; receives the batch number and the merged fields
pub type FlushFn =
    Arc<dyn Fn(u64, ProfileUpdate) -> BoxFuture<'static, Result<ProfileSaved>> + Send + Sync>;

struct Batch {
    id: u64,
    fields: ProfileUpdate,
    settle: oneshot::Sender<Result<ProfileSaved>>,
    pending: PendingUpdate,
}

#[derive(Default)]
struct State {
    current: Option<Batch>,
    last_id: u64,
}

pub struct ProfileBatcher {
    delay: Duration,
    flush: FlushFn,
    state: Mutex<State>,
}

impl ProfileBatcher {
    pub fn new(delay: Duration, flush: FlushFn) -> Arc<Self> {
        Arc::new(Self {
            delay,
            flush,
            state: Mutex::new(State::default()),
        })
    }

    /// Merge one edit into the open batch, opening one if needed
    ///
    /// A later edit of the same field within the batch replaces the earlier
    /// value.
    pub fn update_field(self: &Arc<Self>, field: &str, value: Value) -> PendingUpdate {
        let mut state = self.state.lock();
        if let Some(batch) = state.current.as_mut() {
            batch.fields.insert(field.to_string(), value);
            debug!(
                batch = batch.id,
                field = %field,
                fields = batch.fields.len(),
                "profile_edit_merged"
            );
            return batch.pending.clone();
        }

        state.last_id += 1;
        let id = state.last_id;
        let (settle, receiver) = oneshot::channel();
        let pending = receiver
            .map(|received| {
                received.unwrap_or_else(|_| {
                    Err(Error::network("/auth/profile", "profile batch was dropped"))
                })
            })
            .boxed()
            .shared();

        let mut fields = ProfileUpdate::new();
        fields.insert(field.to_string(), value);
        state.current = Some(Batch {
            id,
            fields,
            settle,
            pending: pending.clone(),
        });
        drop(state);
        debug!(
            batch = id,
            field = %field,
            delay_ms = self.delay.as_millis() as u64,
            "profile_batch_opened"
        );

        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(this.delay).await;
            this.flush_batch(Some(id)).await;
        });

        pending
    }

    /// Send the open batch immediately
    ///
    /// Returns `None` when there is nothing to send.
    pub async fn flush_now(&self) -> Option<Result<ProfileSaved>> {
        self.flush_batch(None).await
    }

    /// Whether edits are waiting to be sent
    pub fn has_pending(&self) -> bool {
        self.state.lock().current.is_some()
    }

    /// Drop the open batch; its waiters receive an error
    pub fn discard(&self) {
        if let Some(batch) = self.state.lock().current.take() {
            debug!(batch = batch.id, "profile_batch_discarded");
            let _ = batch
                .settle
                .send(Err(Error::not_authenticated("profile update")));
        }
    }

    async fn flush_batch(&self, only: Option<u64>) -> Option<Result<ProfileSaved>> {
        let batch = {
            let mut state = self.state.lock();
            let due = match (&state.current, only) {
                (None, _) => false,
                (Some(batch), Some(id)) => batch.id == id,
                (Some(_), None) => true,
            };
            if !due {
                return None;
            }
            state.current.take()?
        };

        debug!(batch = batch.id, fields = batch.fields.len(), "profile_batch_flushing");
        let result = (self.flush)(batch.id, batch.fields).await;
        let _ = batch.settle.send(result.clone());
        Some(result)
    }
}
