use std::{sync::Arc, time::Duration};

use db::{
    DBService, TransactionTrait, WorkspaceScope,
    entities::event_outbox,
    events::ActivityPayload,
    models::{change_log::ChangeLog, event_outbox::EventOutbox, notification::Notification},
};
use protocol::{
    RealtimeEvent,
    realtime::NOTIFICATION_CREATED,
};
use utils::event_hub::EventHub;

#[path = "events/types.rs"]
pub mod types;

pub use types::{EventError, FlushReport};

use super::config::OutboxConfig;

/// Drains the event outbox: materializes audit entries and notifications,
/// then fans the confirmed change out to realtime subscribers.
#[derive(Clone)]
pub struct EventService {
    hub: Arc<EventHub>,
    db: DBService,
    settings: OutboxConfig,
}

impl EventService {
    pub fn new(db: DBService, hub: Arc<EventHub>, settings: OutboxConfig) -> Self {
        let service = Self { hub, db, settings };
        service.spawn_outbox_worker();
        service
    }

    /// A service without the background worker, drained by calling
    /// `flush_pending` directly.
    #[cfg(test)]
    pub(crate) fn detached(db: DBService, hub: Arc<EventHub>, settings: OutboxConfig) -> Self {
        Self { hub, db, settings }
    }

    fn spawn_outbox_worker(&self) {
        let service = self.clone();
        tokio::spawn(async move {
            service.run_outbox_loop().await;
        });
    }

    async fn run_outbox_loop(&self) {
        let interval = Duration::from_millis(self.settings.poll_interval_ms);
        loop {
            if let Err(err) = self.flush_pending().await {
                tracing::error!(error = %err, "event outbox flush failed");
            }
            tokio::time::sleep(interval).await;
        }
    }

    pub async fn flush_pending(&self) -> Result<FlushReport, EventError> {
        let entries = EventOutbox::fetch_unpublished(
            &self.db.pool,
            self.settings.batch_limit,
            self.settings.max_attempts,
        )
        .await?;
        let mut report = FlushReport::default();

        for entry in entries {
            match self.dispatch_entry(&entry).await {
                Ok(events) => {
                    EventOutbox::mark_published(&self.db.pool, entry.id).await?;
                    for event in events {
                        self.hub.push(event);
                    }
                    report.published += 1;
                }
                Err(err) => {
                    let err_msg = err.to_string();
                    let attempts =
                        EventOutbox::mark_failed(&self.db.pool, entry.id, &err_msg).await?;
                    if attempts >= self.settings.max_attempts {
                        tracing::error!(
                            event_id = %entry.uuid,
                            event_type = entry.event_type.as_str(),
                            attempts,
                            error = %err_msg,
                            "event dispatch exhausted its retries, leaving it for inspection"
                        );
                    } else {
                        tracing::warn!(
                            event_id = %entry.uuid,
                            attempts,
                            error = %err_msg,
                            "event dispatch failed"
                        );
                    }
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Last flush before the process exits, abandoned after `deadline`.
    /// Anything left stays queued for the next start.
    pub async fn drain(&self, deadline: Duration) -> Option<FlushReport> {
        match tokio::time::timeout(deadline, self.flush_pending()).await {
            Ok(Ok(report)) => {
                tracing::info!(
                    published = report.published,
                    failed = report.failed,
                    "event outbox drained"
                );
                Some(report)
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "event outbox drain failed");
                None
            }
            Err(_) => {
                tracing::warn!(?deadline, "event outbox drain timed out, leaving the rest queued");
                None
            }
        }
    }

    /// Writes the entry's secondary rows in one transaction and returns the
    /// realtime events to publish once the entry is marked done.
    async fn dispatch_entry(
        &self,
        entry: &event_outbox::Model,
    ) -> Result<Vec<RealtimeEvent>, EventError> {
        let payload: ActivityPayload = serde_json::from_value(entry.payload.clone())?;
        let tx = self.db.pool.begin().await?;

        let scope = match payload.workspace_id {
            Some(workspace_id) => WorkspaceScope::resolve(&tx, workspace_id).await?,
            None => None,
        };

        if let Some(draft) = &payload.changelog {
            ChangeLog::record(
                &tx,
                scope.map(|scope| scope.row_id),
                payload.actor.as_ref(),
                draft,
                Some(entry.uuid),
            )
            .await?;
        }

        let mut created = Vec::new();
        if let Some(scope) = &scope {
            for draft in &payload.notifications {
                if let Some(notification) =
                    Notification::create_from_draft(&tx, scope, draft, entry.uuid).await?
                {
                    created.push(notification);
                }
            }
        } else if !payload.notifications.is_empty() {
            tracing::debug!(
                event_id = %entry.uuid,
                "workspace gone, dropping {} notification drafts",
                payload.notifications.len()
            );
        }

        tx.commit().await?;

        let mut events = Vec::with_capacity(created.len() + 1);
        let mut event = RealtimeEvent::new(
            entry.event_type.clone(),
            payload.workspace_id,
            payload.entity_type.clone(),
            payload.entity_id,
            payload.entity.clone(),
        )
        .with_audience(payload.audience.clone());
        if let Some(recipient) = payload.recipient_id {
            event = event.for_recipient(recipient);
        }
        events.push(event);
        for notification in created {
            let recipient = notification.user_id;
            events.push(
                RealtimeEvent::new(
                    NOTIFICATION_CREATED,
                    payload.workspace_id,
                    "notification",
                    Some(notification.id),
                    Some(serde_json::to_value(&notification)?),
                )
                .for_recipient(recipient),
            );
        }
        Ok(events)
    }

    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    pub async fn dead_letter_count(&self) -> Result<u64, EventError> {
        Ok(EventOutbox::dead_letter_count(&self.db.pool, self.settings.max_attempts).await?)
    }
}
