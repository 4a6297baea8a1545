use std::{path::PathBuf, sync::Arc};

use {
    tokio::sync::Semaphore,
    tracing::{debug, info, warn},
};

use {
    mergebot_common::FileHandle,
    mergebot_sessions::{MergeFailure, MergeJob, MergeOutcome, QueueManager, Settlement},
};

use crate::{
    engine::{MergeEngine, TargetSpec},
    resolve::ReferenceResolver,
};

const OUTPUT_STEM: &str = "merged";

/// A dispatched job together with what the queue manager made of its result.
#[derive(Debug)]
pub struct DispatchReport {
    pub job: MergeJob,
    pub settlement: Settlement,
}

impl DispatchReport {
    pub fn outcome(&self) -> &MergeOutcome {
        &self.job.outcome
    }

    /// The user reset their queue while the job ran; nobody is waiting for
    /// this result any more.
    pub fn is_superseded(&self) -> bool {
        self.settlement.is_superseded()
    }
}

/// Runs merge jobs against the engine.
///
/// Per-user state changes happen through [`QueueManager`] in short critical
/// sections; fetching inputs and running the engine happen with no lock held.
pub struct Dispatcher {
    queues: Arc<QueueManager>,
    resolver: Arc<dyn ReferenceResolver>,
    engine: Arc<dyn MergeEngine>,
    work_dir: PathBuf,
    /// Optional cap on simultaneously running jobs across all users.
    limit: Option<Arc<Semaphore>>,
}

impl Dispatcher {
    pub fn new(
        queues: Arc<QueueManager>,
        resolver: Arc<dyn ReferenceResolver>,
        engine: Arc<dyn MergeEngine>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            queues,
            resolver,
            engine,
            work_dir: work_dir.into(),
            limit: None,
        }
    }

    /// Allow at most `max` jobs to fetch and merge at the same time.
    #[must_use]
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.limit = Some(Arc::new(Semaphore::new(max.max(1))));
        self
    }

    pub fn queues(&self) -> &QueueManager {
        &self.queues
    }

    /// Scratch directory holding a job's inputs and output.
    pub fn job_dir(&self, job: &MergeJob) -> PathBuf {
        self.work_dir
            .join(job.owner.to_string())
            .join(job.id.to_string())
    }

    /// Run `job` to a terminal outcome and release the user's queue.
    ///
    /// Never retries: a failed job has to be resubmitted by the user, since
    /// queued references may have expired in the meantime.
    pub async fn dispatch(&self, mut job: MergeJob) -> DispatchReport {
        job.outcome = if self.queues.begin_merge(&job).await {
            info!(
                user_id = %job.owner,
                job_id = %job.id,
                inputs = job.inputs.len(),
                "merge started"
            );
            self.run(&job).await
        } else {
            debug!(user_id = %job.owner, job_id = %job.id, "job cancelled before start");
            MergeOutcome::Failed(MergeFailure::Cancelled)
        };

        match &job.outcome {
            MergeOutcome::Succeeded(output) => {
                info!(user_id = %job.owner, job_id = %job.id, output = %output.path().display(), "merge succeeded");
            },
            MergeOutcome::Failed(failure) => {
                warn!(user_id = %job.owner, job_id = %job.id, %failure, "merge failed");
            },
            MergeOutcome::Pending => {},
        }

        let settlement = self.queues.finish(&job).await;
        DispatchReport { job, settlement }
    }

    async fn run(&self, job: &MergeJob) -> MergeOutcome {
        let _permit = match &self.limit {
            Some(limit) => match Arc::clone(limit).acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => {
                    return MergeOutcome::Failed(MergeFailure::EngineError(
                        "dispatcher is shutting down".into(),
                    ));
                },
            },
            None => None,
        };

        let dir = self.job_dir(job);
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            return MergeOutcome::Failed(MergeFailure::EngineError(format!(
                "create job directory {}: {e}",
                dir.display()
            )));
        }

        // All inputs or nothing: one bad reference fails the whole job.
        let mut inputs: Vec<FileHandle> = Vec::with_capacity(job.inputs.len());
        for item in &job.inputs {
            match self.resolver.resolve(item, &dir).await {
                Ok(handle) => inputs.push(handle),
                Err(e) => {
                    return MergeOutcome::Failed(MergeFailure::ReferenceUnresolved {
                        source_ref: item.source_ref.clone(),
                        reason: e.to_string(),
                    });
                },
            }
        }
        debug!(job_id = %job.id, inputs = inputs.len(), "inputs resolved");

        let target = TargetSpec::for_mode(job.mode, &dir, OUTPUT_STEM);
        match self.engine.merge(&inputs, &target).await {
            Ok(output) => MergeOutcome::Succeeded(output),
            Err(e) => MergeOutcome::Failed(MergeFailure::EngineError(e.to_string())),
        }
    }

    /// Remove a job's scratch directory once its result has been delivered.
    pub async fn release(&self, job: &MergeJob) {
        let dir = self.job_dir(job);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(job_id = %job.id, "job directory removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => warn!(job_id = %job.id, dir = %dir.display(), error = %e, "failed to remove job directory"),
        }
    }
}
