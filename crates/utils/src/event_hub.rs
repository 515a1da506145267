use std::convert::Infallible;

use axum::response::sse::Event;
use futures::{StreamExt, future, stream::BoxStream};
use protocol::{RealtimeEvent, Subscriber};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};

const DEFAULT_CAPACITY: usize = 10_000;

/// In-process fan-out of confirmed changes to every connected session.
///
/// Subscribers that fall more than `capacity` events behind lose the
/// backlog and receive a single `resync` event instead.
pub struct EventHub {
    sender: broadcast::Sender<RealtimeEvent>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn push(&self, event: RealtimeEvent) {
        // No receivers is the common idle case.
        let _ = self.sender.send(event);
    }

    pub fn get_receiver(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Live events, with lag collapsed into `resync`.
    pub fn live_stream(&self) -> BoxStream<'static, RealtimeEvent> {
        BroadcastStream::new(self.get_receiver())
            .map(|res| match res {
                Ok(event) => event,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "realtime subscriber lagged, sending resync");
                    RealtimeEvent::resync()
                }
            })
            .boxed()
    }

    /// Events one session may see. Entities its role cannot read arrive
    /// as id-only invalidations.
    pub fn session_stream(&self, subscriber: Subscriber) -> BoxStream<'static, RealtimeEvent> {
        self.live_stream()
            .filter_map(move |event| future::ready(event.view_for(&subscriber)))
            .boxed()
    }

    /// [`Self::session_stream`] rendered for an SSE response.
    pub fn sse_stream_for(&self, subscriber: Subscriber) -> BoxStream<'static, Result<Event, Infallible>> {
        self.session_stream(subscriber)
            .map(|event| Ok(to_sse_event(&event)))
            .boxed()
    }
}

pub fn to_sse_event(event: &RealtimeEvent) -> Event {
    let base = Event::default().event(event.event.clone());
    match serde_json::to_string(event) {
        Ok(json) => base.data(json),
        Err(err) => {
            tracing::warn!("Failed to serialize realtime event {}: {}", event.event, err);
            base.data("{}")
        }
    }
}

#[cfg(test)]
mod tests {
    use protocol::{
        Role, TaskAudience, WorkspaceType,
        realtime::{NOTIFICATIONS_READ, RESYNC, TASK_CREATED, TASK_UPDATED},
    };
    use uuid::Uuid;

    use super::*;

    fn subscriber(workspace_id: Uuid, role: Role) -> Subscriber {
        Subscriber {
            workspace_id,
            user_id: Uuid::new_v4(),
            team_id: None,
            role,
            tier: WorkspaceType::Core,
        }
    }

    #[tokio::test]
    async fn session_stream_filters_foreign_workspaces() {
        let hub = EventHub::new();
        let mine = Uuid::new_v4();
        let theirs = Uuid::new_v4();
        let mut stream = hub.session_stream(subscriber(mine, Role::Admin));

        hub.push(RealtimeEvent::new(TASK_CREATED, Some(theirs), "task", None, None));
        hub.push(RealtimeEvent::new(TASK_UPDATED, Some(mine), "task", None, None));

        let first = stream.next().await.unwrap();
        assert_eq!(first.event, TASK_UPDATED);
        assert_eq!(first.workspace_id, Some(mine));
    }

    #[tokio::test]
    async fn members_only_learn_the_id_of_hidden_tasks() {
        let hub = EventHub::new();
        let ws = Uuid::new_v4();
        let admin = subscriber(ws, Role::Admin);
        let member = subscriber(ws, Role::Member);
        let mut admin_stream = hub.session_stream(admin);
        let mut member_stream = hub.session_stream(member);

        let task_id = Uuid::new_v4();
        hub.push(
            RealtimeEvent::new(
                TASK_CREATED,
                Some(ws),
                "task",
                Some(task_id),
                Some(serde_json::json!({ "id": task_id, "title": "Secret payroll" })),
            )
            .with_audience(Some(TaskAudience::new(None, [], Some(admin.user_id)))),
        );
        hub.push(
            RealtimeEvent::new(NOTIFICATIONS_READ, Some(ws), "notification", None, None)
                .for_recipient(admin.user_id),
        );
        hub.push(RealtimeEvent::new(TASK_UPDATED, Some(ws), "task", None, None));

        let seen = admin_stream.next().await.unwrap();
        assert_eq!(seen.data.unwrap()["title"], "Secret payroll");

        let hidden = member_stream.next().await.unwrap();
        assert_eq!(hidden.event, TASK_CREATED);
        assert_eq!(hidden.entity_id, Some(task_id));
        assert_eq!(hidden.data, None);
        let serialized = serde_json::to_string(&hidden).unwrap();
        assert!(!serialized.contains("Secret payroll"));

        // The admin's read receipt never reaches the member.
        assert_eq!(member_stream.next().await.unwrap().event, TASK_UPDATED);
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_resync() {
        let hub = EventHub::with_capacity(2);
        let ws = Uuid::new_v4();
        let mut stream = hub.live_stream();

        for _ in 0..5 {
            hub.push(RealtimeEvent::new(TASK_CREATED, Some(ws), "task", None, None));
        }

        let first = stream.next().await.unwrap();
        assert_eq!(first.event, RESYNC);
        let next = stream.next().await.unwrap();
        assert_eq!(next.event, TASK_CREATED);
    }

    #[test]
    fn push_without_subscribers_is_harmless() {
        let hub = EventHub::new();
        hub.push(RealtimeEvent::resync());
        assert_eq!(hub.subscriber_count(), 0);
    }
}
