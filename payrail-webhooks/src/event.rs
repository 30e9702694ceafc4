//! Durable webhook event records.
//!
//! A webhook event is created atomically alongside the domain occurrence it
//! notifies, carrying a fully serialized payload snapshot. Resends always use
//! the snapshot; nothing is recomputed from live entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use url::Url;
use uuid::Uuid;

use payrail::events::WebhookEventType;

/// Delivery status of a [`WebhookEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookStatus {
    /// Waiting for the next delivery attempt.
    Pending,
    /// A 2xx response was received; delivery is done.
    Sent,
    /// Delivery failed; retained for diagnostics.
    Failed,
    /// All attempts were exhausted without a 2xx response.
    Expired,
}

impl WebhookStatus {
    /// Returns `true` once the event can no longer be attempted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Expired)
    }
}

/// A durable, retried obligation to notify a vendor endpoint once.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Unique event identifier (`whe_` + hex).
    pub id: String,
    /// Vendor being notified.
    pub vendor_id: String,
    /// Kind of domain occurrence.
    pub event_type: WebhookEventType,
    /// Serialized payload snapshot captured at enqueue time.
    pub payload: Value,
    /// Endpoint the payload is delivered to.
    pub webhook_url: Url,
    /// Current delivery status.
    pub status: WebhookStatus,
    /// Number of delivery attempts made so far.
    pub attempts: u32,
    /// Attempt ceiling; `attempts` never exceeds it.
    pub max_attempts: u32,
    /// When the next attempt becomes due. Meaningful only while pending.
    pub next_retry_at: DateTime<Utc>,
    /// When the last attempt ran.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// HTTP status of the last response (0 for a transport failure).
    pub last_response_status: Option<u16>,
    /// Body of the last response, truncated.
    pub last_response_body: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last mutation.
    pub updated_at: DateTime<Utc>,
}

impl WebhookEvent {
    /// Creates a pending event due immediately, with a fresh id.
    #[must_use]
    pub fn pending(
        vendor_id: impl Into<String>,
        event_type: WebhookEventType,
        payload: Value,
        webhook_url: Url,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("whe_{}", Uuid::new_v4().simple()),
            vendor_id: vendor_id.into(),
            event_type,
            payload,
            webhook_url,
            status: WebhookStatus::Pending,
            attempts: 0,
            max_attempts,
            next_retry_at: now,
            last_attempt_at: None,
            last_response_status: None,
            last_response_body: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` if the event is pending and due at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == WebhookStatus::Pending && self.next_retry_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event() -> WebhookEvent {
        WebhookEvent::pending(
            "v_123",
            WebhookEventType::PaymentIntentCreated,
            serde_json::json!({"intent_id": "pi_f83c12ab34cd"}),
            "https://api.acme.example/webhooks".parse().unwrap(),
            3,
            Utc::now(),
        )
    }

    #[test]
    fn test_fresh_event_is_due_immediately() {
        let event = event();
        assert!(event.id.starts_with("whe_"));
        assert_eq!(event.attempts, 0);
        assert!(event.is_due(Utc::now()));
    }

    #[test]
    fn test_scheduled_event_is_not_yet_due() {
        let mut event = event();
        event.next_retry_at = Utc::now() + Duration::seconds(60);
        assert!(!event.is_due(Utc::now()));
    }

    #[test]
    fn test_terminal_events_are_never_due() {
        let mut event = event();
        event.status = WebhookStatus::Sent;
        assert!(!event.is_due(Utc::now()));
        assert!(WebhookStatus::Sent.is_terminal());
        assert!(WebhookStatus::Expired.is_terminal());
        assert!(!WebhookStatus::Pending.is_terminal());
    }

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&WebhookStatus::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
        let parsed: WebhookStatus = serde_json::from_str("\"expired\"").unwrap();
        assert_eq!(parsed, WebhookStatus::Expired);
    }
}
