//! Persistence abstraction for webhook events.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use payrail::error::{PaymentError, StorageError};

use crate::event::{WebhookEvent, WebhookStatus};

/// Durable storage for webhook events.
#[async_trait]
pub trait WebhookStore: Send + Sync {
    /// Inserts a new event row.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Storage`] on duplicate id or backend failure.
    async fn insert(&self, event: &WebhookEvent) -> Result<(), PaymentError>;

    /// Fetches an event by id.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Storage`] on backend failure.
    async fn get(&self, event_id: &str) -> Result<Option<WebhookEvent>, PaymentError>;

    /// Overwrites an existing event row with the attempt's result.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Storage`] if the row does not exist.
    async fn update(&self, event: &WebhookEvent) -> Result<(), PaymentError>;

    /// Returns pending events whose `next_retry_at` is at or before `now`,
    /// soonest first.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Storage`] on backend failure.
    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<WebhookEvent>, PaymentError>;

    /// Returns a vendor's events, most recent first, capped at `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Storage`] on backend failure.
    async fn list_for_vendor(
        &self,
        vendor_id: &str,
        limit: usize,
    ) -> Result<Vec<WebhookEvent>, PaymentError>;

    /// Deletes events created before `cutoff` regardless of status and
    /// returns the deleted count.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Storage`] on backend failure.
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, PaymentError>;
}

/// In-memory [`WebhookStore`] backed by a concurrent map.
///
/// Clones share the same underlying rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryWebhookStore {
    events: Arc<DashMap<String, WebhookEvent>>,
}

impl MemoryWebhookStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if the store holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[async_trait]
impl WebhookStore for MemoryWebhookStore {
    async fn insert(&self, event: &WebhookEvent) -> Result<(), PaymentError> {
        match self.events.entry(event.id.clone()) {
            Entry::Occupied(_) => {
                Err(StorageError::new(format!("duplicate webhook event id: {}", event.id)).into())
            }
            Entry::Vacant(slot) => {
                slot.insert(event.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, event_id: &str) -> Result<Option<WebhookEvent>, PaymentError> {
        Ok(self.events.get(event_id).map(|row| row.value().clone()))
    }

    async fn update(&self, event: &WebhookEvent) -> Result<(), PaymentError> {
        match self.events.entry(event.id.clone()) {
            Entry::Occupied(mut slot) => {
                slot.insert(event.clone());
                Ok(())
            }
            Entry::Vacant(_) => {
                Err(StorageError::new(format!("unknown webhook event id: {}", event.id)).into())
            }
        }
    }

    async fn due(&self, now: DateTime<Utc>) -> Result<Vec<WebhookEvent>, PaymentError> {
        let mut due: Vec<WebhookEvent> = self
            .events
            .iter()
            .filter(|row| row.is_due(now))
            .map(|row| row.value().clone())
            .collect();
        due.sort_by_key(|event| event.next_retry_at);
        Ok(due)
    }

    async fn list_for_vendor(
        &self,
        vendor_id: &str,
        limit: usize,
    ) -> Result<Vec<WebhookEvent>, PaymentError> {
        let mut events: Vec<WebhookEvent> = self
            .events
            .iter()
            .filter(|row| row.vendor_id == vendor_id)
            .map(|row| row.value().clone())
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        events.truncate(limit);
        Ok(events)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, PaymentError> {
        let before = self.events.len();
        self.events.retain(|_, event| event.created_at >= cutoff);
        Ok(before - self.events.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use payrail::events::WebhookEventType;

    fn event_at(vendor_id: &str, created_at: DateTime<Utc>) -> WebhookEvent {
        WebhookEvent::pending(
            vendor_id,
            WebhookEventType::PaymentIntentCreated,
            serde_json::json!({}),
            "https://api.acme.example/webhooks".parse().unwrap(),
            3,
            created_at,
        )
    }

    #[tokio::test]
    async fn test_due_excludes_future_and_terminal_events() {
        let store = MemoryWebhookStore::new();
        let now = Utc::now();

        let ready = event_at("v_1", now - Duration::seconds(5));
        store.insert(&ready).await.unwrap();

        let mut future = event_at("v_1", now);
        future.next_retry_at = now + Duration::seconds(60);
        store.insert(&future).await.unwrap();

        let mut sent = event_at("v_1", now - Duration::seconds(5));
        sent.status = WebhookStatus::Sent;
        store.insert(&sent).await.unwrap();

        let due = store.due(now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, ready.id);
    }

    #[tokio::test]
    async fn test_list_is_most_recent_first_and_capped() {
        let store = MemoryWebhookStore::new();
        let now = Utc::now();
        let oldest = event_at("v_1", now - Duration::seconds(30));
        let middle = event_at("v_1", now - Duration::seconds(20));
        let newest = event_at("v_1", now - Duration::seconds(10));
        let other_vendor = event_at("v_2", now);
        for event in [&oldest, &middle, &newest, &other_vendor] {
            store.insert(event).await.unwrap();
        }

        let listed = store.list_for_vendor("v_1", 2).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newest.id);
        assert_eq!(listed[1].id, middle.id);
    }

    #[tokio::test]
    async fn test_purge_removes_old_events_regardless_of_status() {
        let store = MemoryWebhookStore::new();
        let now = Utc::now();

        let mut old_sent = event_at("v_1", now - Duration::days(40));
        old_sent.status = WebhookStatus::Sent;
        store.insert(&old_sent).await.unwrap();

        let mut old_expired = event_at("v_1", now - Duration::days(35));
        old_expired.status = WebhookStatus::Expired;
        store.insert(&old_expired).await.unwrap();

        let recent = event_at("v_1", now - Duration::days(1));
        store.insert(&recent).await.unwrap();

        let deleted = store
            .purge_older_than(now - Duration::days(30))
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.len(), 1);
        assert!(store.get(&recent.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_requires_existing_row() {
        let store = MemoryWebhookStore::new();
        let event = event_at("v_1", Utc::now());
        let err = store.update(&event).await.unwrap_err();
        assert!(matches!(err, PaymentError::Storage(_)));
    }
}
