use std::sync::Arc;

use {
    dashmap::DashMap,
    tokio::sync::Mutex,
    tracing::{debug, info, warn},
};

use {mergebot_auth::AuthGate, mergebot_common::UserId};

use crate::{
    MediaItem, MergeJob, MergeOutcome, RejectReason,
    queue::{QueueSnapshot, QueueState, UserQueue},
};

/// Smallest number of queued items a merge can be requested for.
pub const MIN_MERGE_INPUTS: usize = 2;

/// What happened when a finished job was reported back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// The queue was cleared and is `Idle` again.
    Applied(QueueSnapshot),
    /// The user reset the queue while the job ran. The result is stale and
    /// the current queue was left alone.
    Superseded(QueueSnapshot),
}

impl Settlement {
    pub fn is_superseded(&self) -> bool {
        matches!(self, Self::Superseded(_))
    }
}

/// Owns every user's queue.
///
/// Each user gets an independent lock; operations for one user are
/// serialized, operations for different users never wait on each other.
/// Nothing in here performs I/O apart from the authorization lookup, which
/// happens before the user's lock is taken.
pub struct QueueManager {
    gate: Arc<AuthGate>,
    queues: DashMap<UserId, Arc<Mutex<UserQueue>>>,
}

impl QueueManager {
    pub fn new(gate: Arc<AuthGate>) -> Self {
        Self {
            gate,
            queues: DashMap::new(),
        }
    }

    pub fn gate(&self) -> &AuthGate {
        &self.gate
    }

    /// Queue slot for `user`, created on first use. The map shard lock is
    /// released before the caller awaits the per-user lock.
    fn slot(&self, user: UserId) -> Arc<Mutex<UserQueue>> {
        Arc::clone(self.queues.entry(user).or_default().value())
    }

    fn existing_slot(&self, user: UserId) -> Option<Arc<Mutex<UserQueue>>> {
        self.queues.get(&user).map(|entry| Arc::clone(entry.value()))
    }

    /// Append an attachment to the user's queue.
    pub async fn submit(
        &self,
        user: UserId,
        item: MediaItem,
    ) -> Result<QueueSnapshot, RejectReason> {
        if item.owner != user {
            warn!(
                user_id = %user,
                item_owner = %item.owner,
                "submit rejected: item belongs to another user"
            );
            return Err(RejectReason::Unauthorized);
        }

        let principal = self.gate.resolve(user).await;
        if !principal.may_submit() {
            debug!(user_id = %user, "submit rejected: unauthorized");
            return Err(RejectReason::Unauthorized);
        }
        if item.declared_extension.is_empty() {
            return Err(RejectReason::MissingFileName);
        }

        let slot = self.slot(user);
        let mut queue = slot.lock().await;

        if queue.state.is_merging() {
            debug!(user_id = %user, state = ?queue.state, "submit rejected: merge in progress");
            return Err(RejectReason::AlreadyMerging);
        }

        let mode = if queue.state == QueueState::Idle {
            principal.merge_mode
        } else {
            queue.mode
        };
        if !mode.accepts(&item.declared_extension) {
            debug!(
                user_id = %user,
                extension = %item.declared_extension,
                %mode,
                "submit rejected: unsupported format"
            );
            return Err(RejectReason::UnsupportedFormat {
                extension: item.declared_extension,
                mode,
            });
        }

        queue.push(user, item, mode);
        Ok(queue.snapshot(user))
    }

    /// Snapshot the queue into a job. The queue moves to `MergeRequested`.
    pub async fn request_merge(&self, user: UserId) -> Result<MergeJob, RejectReason> {
        let Some(slot) = self.existing_slot(user) else {
            return Err(RejectReason::InsufficientItems { queued: 0 });
        };
        let mut queue = slot.lock().await;

        if queue.in_flight.is_some() || queue.state.is_merging() {
            return Err(RejectReason::AlreadyMerging);
        }
        if queue.state != QueueState::Collecting || queue.items.len() < MIN_MERGE_INPUTS {
            return Err(RejectReason::InsufficientItems {
                queued: queue.items.len(),
            });
        }

        let job = queue.take_job(user);
        info!(
            user_id = %user,
            job_id = %job.id,
            inputs = job.inputs.len(),
            mode = %job.mode,
            "merge requested"
        );
        Ok(job)
    }

    /// Drop everything queued and return to `Idle`. Always succeeds.
    ///
    /// A job already handed to the engine keeps running; its result will be
    /// reported as [`Settlement::Superseded`].
    pub async fn cancel(&self, user: UserId) {
        let Some(slot) = self.existing_slot(user) else {
            return;
        };
        let mut queue = slot.lock().await;
        if queue.state == QueueState::Idle && queue.items.is_empty() {
            return;
        }
        queue.reset(user, QueueState::Cancelled);
        info!(
            user_id = %user,
            merge_in_flight = queue.in_flight.is_some(),
            "queue cancelled"
        );
    }

    /// Move a requested job to `Merging`. Returns `false` when the job was
    /// cancelled in the meantime and must not be started.
    pub async fn begin_merge(&self, job: &MergeJob) -> bool {
        let Some(slot) = self.existing_slot(job.owner) else {
            return false;
        };
        let mut queue = slot.lock().await;
        let current = queue.epoch == job.epoch
            && queue.in_flight == Some(job.id)
            && queue.state == QueueState::MergeRequested;
        if current {
            queue.transition(job.owner, QueueState::Merging);
        }
        current
    }

    /// Record a job's terminal outcome and release the queue.
    pub async fn finish(&self, job: &MergeJob) -> Settlement {
        debug_assert!(job.outcome.is_terminal(), "finishing a pending job");

        let slot = self.slot(job.owner);
        let mut queue = slot.lock().await;
        if queue.in_flight == Some(job.id) {
            queue.in_flight = None;
        }

        if queue.epoch != job.epoch {
            info!(
                user_id = %job.owner,
                job_id = %job.id,
                "merge result discarded, queue was reset while merging"
            );
            return Settlement::Superseded(queue.snapshot(job.owner));
        }

        let via = match job.outcome {
            MergeOutcome::Succeeded(_) => QueueState::Completed,
            MergeOutcome::Pending | MergeOutcome::Failed(_) => QueueState::Idle,
        };
        queue.reset(job.owner, via);
        Settlement::Applied(queue.snapshot(job.owner))
    }

    /// Current view of a user's queue; an empty `Idle` queue for unknown users.
    pub async fn snapshot(&self, user: UserId) -> QueueSnapshot {
        match self.existing_slot(user) {
            Some(slot) => slot.lock().await.snapshot(user),
            None => UserQueue::default().snapshot(user),
        }
    }

    /// Whether a queue has ever been created for `user`.
    pub fn has_queue(&self, user: UserId) -> bool {
        self.queues.contains_key(&user)
    }
}
