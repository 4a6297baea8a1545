use std::sync::Arc;

use {
    dashmap::DashMap,
    tokio::sync::mpsc,
    tracing::{debug, warn},
};

use mergebot_common::UserId;

use crate::{event::InboundEvent, router::ConversationRouter};

/// Feeds each user's events to the router one at a time, in arrival order.
///
/// Users are independent of each other. An accepted merge is spawned off the
/// lane, so Cancel and new uploads are still answered while the engine runs.
pub struct EventLanes {
    router: Arc<ConversationRouter>,
    lanes: DashMap<UserId, mpsc::UnboundedSender<InboundEvent>>,
}

impl EventLanes {
    pub fn new(router: Arc<ConversationRouter>) -> Self {
        Self {
            router,
            lanes: DashMap::new(),
        }
    }

    /// Queue `event` behind the same user's earlier events. Must be called
    /// from inside a tokio runtime.
    pub fn push(&self, event: InboundEvent) {
        let user = event.user();
        let lane = self
            .lanes
            .entry(user)
            .or_insert_with(|| self.open(user))
            .clone();
        if let Err(mpsc::error::SendError(event)) = lane.send(event) {
            // Only happens when the lane task died mid-event.
            warn!(user_id = %user, "event lane closed, reopening");
            let lane = self.open(user);
            if lane.send(event).is_err() {
                warn!(user_id = %user, "dropping event, lane closed");
            }
            self.lanes.insert(user, lane);
        }
    }

    fn open(&self, user: UserId) -> mpsc::UnboundedSender<InboundEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel::<InboundEvent>();
        let router = Arc::clone(&self.router);
        tokio::spawn(async move {
            debug!(user_id = %user, "event lane opened");
            while let Some(event) = rx.recv().await {
                if let Some(merge) = router.accept(event).await {
                    debug!(user_id = %user, job_id = %merge.job().id, "merge handed off");
                    tokio::spawn(merge.run());
                }
            }
            debug!(user_id = %user, "event lane closed");
        });
        tx
    }
}
