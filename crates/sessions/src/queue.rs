use {
    mergebot_common::{MergeMode, UserId},
    tracing::debug,
    uuid::Uuid,
};

use crate::{MediaItem, MergeJob};

/// Lifecycle of a user's queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum QueueState {
    #[default]
    Idle,
    Collecting,
    MergeRequested,
    Merging,
    Completed,
    Cancelled,
}

impl QueueState {
    /// A job snapshot has been taken and not yet settled.
    pub fn is_merging(&self) -> bool {
        matches!(self, Self::MergeRequested | Self::Merging)
    }
}

/// Point-in-time view of a queue, safe to hand out after the lock is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub user_id: UserId,
    pub state: QueueState,
    pub mode: MergeMode,
    pub len: usize,
    pub epoch: u64,
    /// An engine call started from this queue has not reported back yet.
    pub merge_in_flight: bool,
}

/// The pending queue of one user. Only [`crate::QueueManager`] touches it,
/// always under the user's lock.
#[derive(Debug, Default)]
pub(crate) struct UserQueue {
    pub(crate) items: Vec<MediaItem>,
    pub(crate) mode: MergeMode,
    pub(crate) state: QueueState,
    /// Bumped on every reset.
    pub(crate) epoch: u64,
    /// Job whose engine call is outstanding. Survives `reset` so a cancelled
    /// job still blocks a second concurrent merge until it reports back.
    pub(crate) in_flight: Option<Uuid>,
}

impl UserQueue {
    pub(crate) fn snapshot(&self, user_id: UserId) -> QueueSnapshot {
        QueueSnapshot {
            user_id,
            state: self.state,
            mode: self.mode,
            len: self.items.len(),
            epoch: self.epoch,
            merge_in_flight: self.in_flight.is_some(),
        }
    }

    pub(crate) fn transition(&mut self, user_id: UserId, next: QueueState) {
        if self.state != next {
            debug!(
                user_id = %user_id,
                from = ?self.state,
                to = ?next,
                epoch = self.epoch,
                queue_len = self.items.len(),
                "queue transition"
            );
        }
        self.state = next;
    }

    /// Append an item. The mode is fixed by the first item of a collection.
    pub(crate) fn push(&mut self, user_id: UserId, item: MediaItem, mode: MergeMode) {
        if self.state == QueueState::Idle {
            self.mode = mode;
        }
        self.items.push(item);
        self.transition(user_id, QueueState::Collecting);
    }

    /// Snapshot the items into a job and mark the merge as requested.
    pub(crate) fn take_job(&mut self, user_id: UserId) -> MergeJob {
        let job = MergeJob::new(user_id, self.items.clone(), self.mode, self.epoch);
        self.in_flight = Some(job.id);
        self.transition(user_id, QueueState::MergeRequested);
        job
    }

    /// Pass through `via` (e.g. `Completed`, `Cancelled`) and land in an
    /// empty `Idle` queue under a new epoch.
    pub(crate) fn reset(&mut self, user_id: UserId, via: QueueState) {
        self.transition(user_id, via);
        self.items.clear();
        self.epoch += 1;
        self.transition(user_id, QueueState::Idle);
    }
}
