use std::sync::Arc;

use tracing::{debug, info, warn};

use {
    mergebot_auth::AuthGate,
    mergebot_common::{FileHandle, UserId},
    mergebot_merge::{DispatchReport, Dispatcher},
    mergebot_sessions::{MediaItem, MergeJob, MergeOutcome, QueueManager, RejectReason},
};

use crate::{
    event::{Button, InboundEvent},
    messages,
    outbox::Outbox,
};

const STATUS_BUTTONS: &[Button] = &[Button::MergeNow, Button::Cancel];

/// Turns inbound events into queue operations and outgoing actions.
///
/// Safe to call concurrently for any mix of users; per-user ordering is
/// enforced by the queue manager.
pub struct ConversationRouter {
    queues: Arc<QueueManager>,
    dispatcher: Arc<Dispatcher>,
    outbox: Arc<dyn Outbox>,
    owner_username: String,
}

impl ConversationRouter {
    pub fn new(
        queues: Arc<QueueManager>,
        dispatcher: Arc<Dispatcher>,
        outbox: Arc<dyn Outbox>,
        owner_username: impl Into<String>,
    ) -> Self {
        Self {
            queues,
            dispatcher,
            outbox,
            owner_username: owner_username.into(),
        }
    }

    fn gate(&self) -> &AuthGate {
        self.queues.gate()
    }

    /// Apply an event and, for an accepted Merge Now, run the merge to the
    /// end before returning.
    pub async fn handle(&self, event: InboundEvent) {
        if let Some(merge) = self.accept(event).await {
            merge.run().await;
        }
    }

    /// Apply an event to the queue and answer it. An accepted Merge Now
    /// comes back as a [`PendingMerge`]; the caller decides where it runs so
    /// the user's next events need not wait for the engine.
    pub async fn accept(&self, event: InboundEvent) -> Option<PendingMerge> {
        debug!(user_id = %event.user(), event = event.kind(), "routing event");
        match event {
            InboundEvent::SubmitMedia {
                user,
                display_name,
                file_name,
                source_ref,
                kind,
            } => {
                let submitted = match MediaItem::new(user, source_ref, file_name.as_deref(), kind) {
                    Ok(item) => self.queues.submit(user, item).await,
                    // Strangers get the denial, not a remark about their upload.
                    Err(reason) => {
                        if self.gate().is_allowed(user).await {
                            Err(reason)
                        } else {
                            Err(RejectReason::Unauthorized)
                        }
                    },
                };
                match submitted {
                    Ok(snapshot) => {
                        debug!(user_id = %user, queue_len = snapshot.len, "media queued");
                        let text = messages::saved(snapshot.mode, snapshot.len);
                        self.send_text(user, &text, STATUS_BUTTONS).await;
                    },
                    Err(reason) => self.reject(user, &display_name, &reason).await,
                }
            },
            InboundEvent::RequestMerge { user, display_name } => {
                if !self.gate().is_allowed(user).await {
                    self.reject(user, &display_name, &RejectReason::Unauthorized)
                        .await;
                    return None;
                }
                match self.queues.request_merge(user).await {
                    Ok(job) => {
                        self.send_text(user, messages::MERGE_STARTING, &[]).await;
                        return Some(PendingMerge {
                            job,
                            dispatcher: Arc::clone(&self.dispatcher),
                            outbox: Arc::clone(&self.outbox),
                        });
                    },
                    Err(reason) => self.reject(user, &display_name, &reason).await,
                }
            },
            InboundEvent::Cancel { user, display_name } => {
                if !self.gate().is_allowed(user).await {
                    self.reject(user, &display_name, &RejectReason::Unauthorized)
                        .await;
                    return None;
                }
                self.queues.cancel(user).await;
                self.send_text(user, messages::MERGE_CANCELED, &[]).await;
            },
            InboundEvent::Start { user, display_name } => {
                if !self.gate().is_allowed(user).await {
                    let text = messages::start_denied(&display_name, &self.owner_username);
                    self.send_text(user, &text, &[]).await;
                    return None;
                }
                if let Err(e) = self.gate().authorize(user).await {
                    warn!(user_id = %user, error = %e, "failed to persist authorization");
                }
                self.send_text(user, &messages::greeting(&display_name), &[])
                    .await;
            },
            InboundEvent::Help { user } => {
                let text = messages::help(&self.owner_username);
                self.send_text(user, &text, &[]).await;
            },
        }
        None
    }

    async fn reject(&self, user: UserId, display_name: &str, reason: &RejectReason) {
        debug!(user_id = %user, %reason, "request rejected");
        let text = match reason {
            RejectReason::Unauthorized => {
                messages::unauthorized(display_name, &self.owner_username)
            },
            other => {
                let mode = self.queues.snapshot(user).await.mode;
                messages::rejection(other, mode)
            },
        };
        self.send_text(user, &text, &[]).await;
    }

    async fn send_text(&self, user: UserId, text: &str, buttons: &[Button]) {
        send_text(self.outbox.as_ref(), user, text, buttons).await;
    }
}

/// A merge the queue has accepted; dispatch and delivery are still to run.
#[must_use = "a pending merge does nothing until it is run"]
pub struct PendingMerge {
    job: MergeJob,
    dispatcher: Arc<Dispatcher>,
    outbox: Arc<dyn Outbox>,
}

impl PendingMerge {
    pub fn job(&self) -> &MergeJob {
        &self.job
    }

    /// Fetch, merge, report the outcome and clean up the job directory.
    pub async fn run(self) {
        let report = self.dispatcher.dispatch(self.job).await;
        deliver(self.outbox.as_ref(), &report).await;
        self.dispatcher.release(&report.job).await;
    }
}

/// Report a finished job. Superseded results are dropped silently.
async fn deliver(outbox: &dyn Outbox, report: &DispatchReport) {
    let job = &report.job;
    if report.is_superseded() {
        info!(user_id = %job.owner, job_id = %job.id, "not delivering superseded result");
        return;
    }
    match report.outcome() {
        MergeOutcome::Succeeded(output) => {
            send_result(outbox, job.owner, output, &messages::merged_caption(job)).await;
        },
        MergeOutcome::Failed(failure) => {
            let text = messages::merge_failed(job, failure);
            send_text(outbox, job.owner, &text, &[]).await;
        },
        MergeOutcome::Pending => {},
    }
}

async fn send_result(outbox: &dyn Outbox, user: UserId, output: &FileHandle, caption: &str) {
    if let Err(e) = outbox.send_file(user, output, caption).await {
        warn!(user_id = %user, error = %e, "failed to send merged file");
        send_text(outbox, user, messages::delivery_failed(), &[]).await;
    }
}

async fn send_text(outbox: &dyn Outbox, user: UserId, text: &str, buttons: &[Button]) {
    if let Err(e) = outbox.send_text(user, text, buttons).await {
        warn!(user_id = %user, error = %e, "failed to send message");
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::Result,
        async_trait::async_trait,
        mergebot_auth::{MemoryPreferenceStore, PreferenceStore, UserPrefs},
        mergebot_common::{MediaKind, MergeMode, SourceRef},
        mergebot_merge::{EngineError, MergeEngine, ReferenceResolver, TargetSpec},
        mergebot_sessions::QueueState,
        std::{path::Path, sync::Mutex},
    };

    const OWNER: UserId = UserId(1);
    const FRIEND: UserId = UserId(2);
    const STRANGER: UserId = UserId(3);

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Sent {
        Text(UserId, String, Vec<Button>),
        File(UserId, String),
    }

    #[derive(Default)]
    struct RecordingOutbox {
        sent: Mutex<Vec<Sent>>,
        fail_files: bool,
    }

    impl RecordingOutbox {
        fn texts(&self, user: UserId) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter_map(|s| match s {
                    Sent::Text(u, text, _) if *u == user => Some(text.clone()),
                    _ => None,
                })
                .collect()
        }

        fn last(&self) -> Sent {
            self.sent.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Outbox for RecordingOutbox {
        async fn send_text(&self, user: UserId, text: &str, buttons: &[Button]) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push(Sent::Text(user, text.into(), buttons.to_vec()));
            Ok(())
        }

        async fn send_file(&self, user: UserId, file: &FileHandle, _caption: &str) -> Result<()> {
            if self.fail_files {
                return Err(crate::Error::message("upload rejected"));
            }
            let name = file.file_name().unwrap_or_default().to_string();
            self.sent.lock().unwrap().push(Sent::File(user, name));
            Ok(())
        }
    }

    struct PassThroughResolver;

    #[async_trait]
    impl ReferenceResolver for PassThroughResolver {
        async fn resolve(
            &self,
            item: &MediaItem,
            dest_dir: &Path,
        ) -> mergebot_merge::Result<FileHandle> {
            if item.source_ref.as_str().starts_with("expired") {
                return Err(mergebot_merge::Error::message("file reference expired"));
            }
            Ok(FileHandle::new(dest_dir.join(&item.file_name)))
        }
    }

    #[derive(Default)]
    struct FakeEngine {
        inputs: Mutex<Vec<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl MergeEngine for FakeEngine {
        async fn merge(
            &self,
            inputs: &[FileHandle],
            target: &TargetSpec,
        ) -> std::result::Result<FileHandle, EngineError> {
            self.inputs.lock().unwrap().push(
                inputs
                    .iter()
                    .map(|h| h.file_name().unwrap_or_default().to_string())
                    .collect(),
            );
            if self.fail {
                return Err(EngineError::Timeout(std::time::Duration::from_secs(3600)));
            }
            Ok(FileHandle::new(&target.output))
        }
    }

    struct Harness {
        router: ConversationRouter,
        outbox: Arc<RecordingOutbox>,
        engine: Arc<FakeEngine>,
        queues: Arc<QueueManager>,
        _tmp: tempfile::TempDir,
    }

    async fn harness_with(outbox: RecordingOutbox, engine: FakeEngine) -> Harness {
        let store = Arc::new(MemoryPreferenceStore::new());
        store
            .set_user_prefs(FRIEND, UserPrefs {
                allowed: true,
                merge_mode: MergeMode::VideoMerge,
            })
            .await
            .unwrap();
        let gate = Arc::new(AuthGate::new(store, OWNER));
        let queues = Arc::new(QueueManager::new(gate));
        let tmp = tempfile::tempdir().unwrap();
        let engine = Arc::new(engine);
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&queues),
            Arc::new(PassThroughResolver),
            engine.clone(),
            tmp.path(),
        ));
        let outbox = Arc::new(outbox);
        let router = ConversationRouter::new(
            Arc::clone(&queues),
            dispatcher,
            outbox.clone(),
            "boss",
        );
        Harness {
            router,
            outbox,
            engine,
            queues,
            _tmp: tmp,
        }
    }

    async fn harness() -> Harness {
        harness_with(RecordingOutbox::default(), FakeEngine::default()).await
    }

    fn media(user: UserId, name: Option<&str>) -> InboundEvent {
        InboundEvent::SubmitMedia {
            user,
            display_name: "Ann".into(),
            file_name: name.map(Into::into),
            source_ref: SourceRef::new(name.unwrap_or("anon")),
            kind: MediaKind::Video,
        }
    }

    fn merge_now(user: UserId) -> InboundEvent {
        Button::MergeNow.pressed_by(user, "Ann")
    }

    #[tokio::test]
    async fn submit_replies_with_count_and_buttons() {
        let h = harness().await;
        h.router.handle(media(FRIEND, Some("a.mp4"))).await;
        h.router.handle(media(FRIEND, Some("b.mkv"))).await;

        assert_eq!(
            h.outbox.last(),
            Sent::Text(
                FRIEND,
                "Video 2 saved. Send me more, or press 'Merge Now' when done.".into(),
                vec![Button::MergeNow, Button::Cancel],
            )
        );
        assert_eq!(h.queues.snapshot(FRIEND).await.len, 2);
    }

    #[tokio::test]
    async fn stranger_is_denied_on_every_event() {
        let h = harness().await;
        for event in [
            media(STRANGER, Some("a.mp4")),
            media(STRANGER, None),
            merge_now(STRANGER),
            Button::Cancel.pressed_by(STRANGER, "Ann"),
        ] {
            h.router.handle(event).await;
        }

        let texts = h.outbox.texts(STRANGER);
        assert_eq!(texts.len(), 4);
        assert!(texts.iter().all(|t| t.contains("Contact: @boss")), "{texts:?}");
        assert!(!h.queues.has_queue(STRANGER));
    }

    #[tokio::test]
    async fn missing_name_and_bad_format_leave_queue_alone() {
        let h = harness().await;
        h.router.handle(media(FRIEND, None)).await;
        h.router.handle(media(FRIEND, Some("c.txt"))).await;

        assert_eq!(h.outbox.texts(FRIEND), [
            messages::FILE_NAME_NOT_FOUND.to_string(),
            "This format is not allowed. Only MP4, MKV, or WEBM are supported.".into(),
        ]);
        assert_eq!(h.queues.snapshot(FRIEND).await.len, 0);
    }

    #[tokio::test]
    async fn merge_with_one_item_explains_minimum() {
        let h = harness().await;
        h.router.handle(media(FRIEND, Some("a.mp4"))).await;
        h.router.handle(merge_now(FRIEND)).await;

        assert_eq!(
            h.outbox.texts(FRIEND).last().unwrap(),
            "You need at least 2 videos to merge."
        );
        let snap = h.queues.snapshot(FRIEND).await;
        assert_eq!((snap.state, snap.len), (QueueState::Collecting, 1));
        assert!(h.engine.inputs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn merge_now_delivers_file_in_order() {
        let h = harness().await;
        for name in ["a.mp4", "b.mkv", "c.webm"] {
            h.router.handle(media(FRIEND, Some(name))).await;
        }
        h.router.handle(merge_now(FRIEND)).await;

        assert_eq!(*h.engine.inputs.lock().unwrap(), vec![vec![
            "a.mp4".to_string(),
            "b.mkv".into(),
            "c.webm".into()
        ]]);
        assert!(h.outbox.texts(FRIEND).contains(&messages::MERGE_STARTING.to_string()));
        assert_eq!(h.outbox.last(), Sent::File(FRIEND, "merged.mkv".into()));
        let snap = h.queues.snapshot(FRIEND).await;
        assert_eq!((snap.state, snap.len), (QueueState::Idle, 0));
    }

    #[tokio::test]
    async fn engine_failure_is_reported_to_user() {
        let h = harness_with(RecordingOutbox::default(), FakeEngine {
            fail: true,
            ..Default::default()
        })
        .await;
        h.router.handle(media(OWNER, Some("a.mp4"))).await;
        h.router.handle(media(OWNER, Some("b.mp4"))).await;
        h.router.handle(merge_now(OWNER)).await;

        let last = h.outbox.texts(OWNER).pop().unwrap();
        assert!(last.starts_with("Merge failed: merge timed out after 3600s"), "{last}");
        assert_eq!(h.queues.snapshot(OWNER).await.state, QueueState::Idle);
    }

    #[tokio::test]
    async fn unresolved_reference_names_the_file() {
        let h = harness().await;
        h.router.handle(media(FRIEND, Some("a.mp4"))).await;
        h.router
            .handle(InboundEvent::SubmitMedia {
                user: FRIEND,
                display_name: "Ann".into(),
                file_name: Some("old.mp4".into()),
                source_ref: SourceRef::new("expired-1"),
                kind: MediaKind::Video,
            })
            .await;
        h.router.handle(merge_now(FRIEND)).await;

        let last = h.outbox.texts(FRIEND).pop().unwrap();
        assert!(last.starts_with("Could not fetch old.mp4"), "{last}");
        assert!(h.engine.inputs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_upload_falls_back_to_text() {
        let h = harness_with(
            RecordingOutbox {
                fail_files: true,
                ..Default::default()
            },
            FakeEngine::default(),
        )
        .await;
        h.router.handle(media(FRIEND, Some("a.mp4"))).await;
        h.router.handle(media(FRIEND, Some("b.mp4"))).await;
        h.router.handle(merge_now(FRIEND)).await;

        assert_eq!(
            h.outbox.texts(FRIEND).last().unwrap(),
            messages::delivery_failed()
        );
    }

    #[tokio::test]
    async fn cancel_clears_queue_and_confirms() {
        let h = harness().await;
        h.router.handle(media(FRIEND, Some("a.mp4"))).await;
        h.router.handle(Button::Cancel.pressed_by(FRIEND, "Ann")).await;
        h.router.handle(Button::Cancel.pressed_by(FRIEND, "Ann")).await;

        let snap = h.queues.snapshot(FRIEND).await;
        assert_eq!((snap.state, snap.len), (QueueState::Idle, 0));
        assert_eq!(
            h.outbox.texts(FRIEND).last().unwrap(),
            messages::MERGE_CANCELED
        );
    }

    #[tokio::test]
    async fn start_authorizes_owner_and_denies_strangers() {
        let h = harness().await;
        h.router
            .handle(InboundEvent::Start {
                user: OWNER,
                display_name: "Olga".into(),
            })
            .await;
        h.router
            .handle(InboundEvent::Start {
                user: STRANGER,
                display_name: "Sam".into(),
            })
            .await;

        assert!(h.outbox.texts(OWNER)[0].starts_with("Hi Olga!"));
        assert!(h.outbox.texts(STRANGER)[0].contains("Contact my Owner: @boss"));
        assert!(h.queues.gate().resolve(OWNER).await.allowed);
        assert!(!h.queues.gate().is_allowed(STRANGER).await);
    }

    #[tokio::test]
    async fn help_is_open_to_everyone() {
        let h = harness().await;
        h.router.handle(InboundEvent::Help { user: STRANGER }).await;
        assert!(h.outbox.texts(STRANGER)[0].starts_with("How to use this bot"));
    }
}
