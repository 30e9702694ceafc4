//! The webhook delivery engine.
//!
//! Enqueuing persists a pending event and hands the first delivery attempt to
//! a spawned task, so the domain operation that produced the event returns
//! without waiting on the vendor's endpoint. A repeatable poll sweep
//! ([`WebhookEngine::process_pending`]) retries whatever the push could not
//! deliver, with exponential backoff between attempts and a hard attempt
//! ceiling, after which the event is parked as expired.
//!
//! The engine is the production [`EventSink`]: delivery failures are recorded
//! on the event row and retried, never surfaced to the triggering call.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use payrail::directory::{EventSink, VendorDirectory};
use payrail::error::{PaymentError, StorageError};
use payrail::events::{WebhookEventType, WebhookPayload};

use crate::event::{WebhookEvent, WebhookStatus};
use crate::headers;
use crate::store::WebhookStore;

/// Ceiling on the backoff delay between attempts, in seconds.
const MAX_BACKOFF_SECS: u64 = 3600;

/// Stored response bodies are truncated to this many characters.
const RESPONSE_BODY_LIMIT: usize = 1000;

/// Delivery engine configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Attempt ceiling per event.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay for exponential backoff, in seconds.
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
    /// Per-attempt HTTP timeout, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Events older than this are purged regardless of status.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_base_delay_secs() -> u64 {
    2
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_retention_days() -> u32 {
    30
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            timeout_secs: default_timeout_secs(),
            retention_days: default_retention_days(),
        }
    }
}

/// A single delivery attempt failure.
///
/// Recorded on the event row and retried; never propagated into domain
/// results.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The endpoint answered with a non-2xx status.
    #[error("endpoint returned status {status}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The response body.
        body: String,
    },
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// A 2xx response was received; the event is sent.
    Delivered,
    /// The attempt failed; the next retry is scheduled for the given time.
    Retrying(DateTime<Utc>),
    /// The attempt ceiling was reached; the event is expired.
    Expired,
    /// The event was missing or no longer pending; nothing was done.
    Skipped,
}

/// Durable, retrying webhook notifier.
pub struct WebhookEngine<S> {
    store: Arc<S>,
    vendors: Arc<dyn VendorDirectory>,
    http: reqwest::Client,
    config: WebhookConfig,
}

impl<S> Clone for WebhookEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            vendors: Arc::clone(&self.vendors),
            http: self.http.clone(),
            config: self.config,
        }
    }
}

impl<S> fmt::Debug for WebhookEngine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S: WebhookStore + 'static> WebhookEngine<S> {
    /// Creates an engine over the given store and vendor directory.
    #[must_use]
    pub fn new(store: S, vendors: Arc<dyn VendorDirectory>, config: WebhookConfig) -> Self {
        Self {
            store: Arc::new(store),
            vendors,
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &WebhookConfig {
        &self.config
    }

    /// Persists a pending event for the vendor and pushes the first delivery
    /// attempt onto a background task.
    ///
    /// A vendor without a configured webhook URL is skipped silently and
    /// `None` is returned.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Storage`] if the lookup or insert fails.
    pub async fn enqueue(
        &self,
        vendor_id: &str,
        event_type: WebhookEventType,
        payload: &WebhookPayload,
    ) -> Result<Option<WebhookEvent>, PaymentError> {
        let Some(webhook_url) = self
            .vendors
            .vendor(vendor_id)
            .await?
            .and_then(|vendor| vendor.webhook_url)
        else {
            tracing::debug!(vendor_id, %event_type, "Vendor has no webhook URL; skipping");
            return Ok(None);
        };

        // Snapshot the payload now; resends must not depend on live entities.
        let snapshot = serde_json::to_value(payload)
            .map_err(|e| StorageError::new(format!("serialize webhook payload: {e}")))?;
        let event = WebhookEvent::pending(
            vendor_id,
            event_type,
            snapshot,
            webhook_url,
            self.config.max_attempts,
            Utc::now(),
        );
        self.store.insert(&event).await?;

        tracing::debug!(event_id = %event.id, vendor_id, %event_type, "Enqueued webhook event");

        // Fire-and-forget push; the poll sweep covers anything this misses.
        let engine = self.clone();
        let event_id = event.id.clone();
        drop(tokio::spawn(async move {
            if let Err(err) = engine.attempt_delivery(&event_id).await {
                tracing::warn!(event_id, error = %err, "Webhook push attempt failed to record");
            }
        }));

        Ok(Some(event))
    }

    /// Runs one delivery attempt for the event, applying backoff or expiry.
    ///
    /// A no-op for events that are missing or no longer pending, so pushes
    /// and sweeps can overlap safely.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Storage`] if the event row cannot be read or
    /// written. Endpoint failures are recorded, not returned.
    pub async fn attempt_delivery(&self, event_id: &str) -> Result<DeliveryOutcome, PaymentError> {
        let Some(mut event) = self.store.get(event_id).await? else {
            return Ok(DeliveryOutcome::Skipped);
        };
        if event.status != WebhookStatus::Pending {
            return Ok(DeliveryOutcome::Skipped);
        }

        let now = Utc::now();
        if event.attempts >= event.max_attempts {
            event.status = WebhookStatus::Expired;
            event.updated_at = now;
            self.store.update(&event).await?;
            return Ok(DeliveryOutcome::Expired);
        }

        let result = self.post_once(&event).await;
        event.attempts += 1;
        event.last_attempt_at = Some(now);
        event.updated_at = now;

        match result {
            Ok((status, body)) => {
                event.last_response_status = Some(status);
                event.last_response_body = Some(truncate_body(&body));
                event.status = WebhookStatus::Sent;
                self.store.update(&event).await?;
                tracing::debug!(event_id = %event.id, status, "Webhook delivered");
                Ok(DeliveryOutcome::Delivered)
            }
            Err(err) => {
                let (status, body) = match &err {
                    DeliveryError::Status { status, body } => (*status, truncate_body(body)),
                    DeliveryError::Transport(_) => {
                        (0, truncate_body(&format!("delivery failed: {err}")))
                    }
                };
                event.last_response_status = Some(status);
                event.last_response_body = Some(body);

                if event.attempts >= event.max_attempts {
                    event.status = WebhookStatus::Expired;
                    self.store.update(&event).await?;
                    tracing::warn!(
                        event_id = %event.id,
                        attempts = event.attempts,
                        "Webhook expired after exhausting attempts"
                    );
                    Ok(DeliveryOutcome::Expired)
                } else {
                    let delay = backoff_delay_secs(self.config.base_delay_secs, event.attempts);
                    event.next_retry_at =
                        now + chrono::Duration::seconds(i64::try_from(delay).unwrap_or(3600));
                    self.store.update(&event).await?;
                    tracing::debug!(
                        event_id = %event.id,
                        attempts = event.attempts,
                        retry_in_secs = delay,
                        "Webhook delivery failed; retry scheduled"
                    );
                    Ok(DeliveryOutcome::Retrying(event.next_retry_at))
                }
            }
        }
    }

    /// Attempts every pending event whose retry time has come and returns the
    /// number processed.
    ///
    /// Safe to invoke repeatedly and concurrently with pushes: events that
    /// reached `sent` or `expired` in the meantime are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Storage`] if the store fails.
    pub async fn process_pending(&self) -> Result<usize, PaymentError> {
        let due = self.store.due(Utc::now()).await?;
        let mut processed = 0;
        for event in due {
            self.attempt_delivery(&event.id).await?;
            processed += 1;
        }
        if processed > 0 {
            tracing::info!(processed, "Webhook sweep completed");
        }
        Ok(processed)
    }

    /// Returns a vendor's events, most recent first, capped at `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Storage`] if the store fails.
    pub async fn list(
        &self,
        vendor_id: &str,
        limit: usize,
    ) -> Result<Vec<WebhookEvent>, PaymentError> {
        self.store.list_for_vendor(vendor_id, limit).await
    }

    /// Deletes events older than the configured retention window, regardless
    /// of terminal status, and returns the deleted count.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Storage`] if the store fails.
    pub async fn purge_old_events(&self) -> Result<usize, PaymentError> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(self.config.retention_days));
        let deleted = self.store.purge_older_than(cutoff).await?;
        if deleted > 0 {
            tracing::info!(deleted, "Purged old webhook events");
        }
        Ok(deleted)
    }

    /// Sends one POST to the event's endpoint.
    async fn post_once(&self, event: &WebhookEvent) -> Result<(u16, String), DeliveryError> {
        let timestamp = event
            .payload
            .get("timestamp")
            .and_then(Value::as_str)
            .map_or_else(|| Utc::now().to_rfc3339(), ToOwned::to_owned);

        let response = self
            .http
            .post(event.webhook_url.clone())
            .json(&event.payload)
            .header(reqwest::header::USER_AGENT, headers::USER_AGENT)
            .header(headers::EVENT_TYPE_HEADER, event.event_type.as_str())
            .header(headers::VENDOR_ID_HEADER, event.vendor_id.as_str())
            .header(headers::TIMESTAMP_HEADER, timestamp)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        if (200..300).contains(&status) {
            Ok((status, body))
        } else {
            Err(DeliveryError::Status { status, body })
        }
    }
}

#[async_trait]
impl<S: WebhookStore + 'static> EventSink for WebhookEngine<S> {
    async fn publish(
        &self,
        vendor_id: &str,
        event_type: WebhookEventType,
        payload: WebhookPayload,
    ) {
        if let Err(err) = self.enqueue(vendor_id, event_type, &payload).await {
            tracing::warn!(vendor_id, %event_type, error = %err, "Failed to enqueue webhook");
        }
    }
}

/// Computes the backoff delay after the given attempt count:
/// `base * 2^(attempts - 1)`, capped at one hour.
fn backoff_delay_secs(base_delay_secs: u64, attempts: u32) -> u64 {
    let exponent = attempts.saturating_sub(1).min(31);
    base_delay_secs
        .saturating_mul(1_u64 << exponent)
        .min(MAX_BACKOFF_SECS)
}

/// Truncates a response body for storage.
fn truncate_body(body: &str) -> String {
    body.chars().take(RESPONSE_BODY_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryWebhookStore;
    use payrail::directory::{MemoryVendorDirectory, VendorRecord};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn vendor_with_url(url: Option<&str>) -> MemoryVendorDirectory {
        MemoryVendorDirectory::from_records([VendorRecord {
            vendor_id: "v_123".to_owned(),
            wallet_address: alloy_primitives::address!(
                "742d35cc6635c0532925a3b8d19dac9dd9bf1234"
            ),
            preferred_dest_chain_id: 8453,
            enabled_source_chains: vec![8453, 84532],
            webhook_url: url.map(|u| u.parse().unwrap()),
        }])
    }

    fn engine_for(
        url: Option<&str>,
        store: MemoryWebhookStore,
    ) -> WebhookEngine<MemoryWebhookStore> {
        WebhookEngine::new(
            store,
            Arc::new(vendor_with_url(url)),
            WebhookConfig::default(),
        )
    }

    fn payload() -> WebhookPayload {
        WebhookPayload::new(
            WebhookEventType::PaymentIntentCreated,
            "v_123",
            "p_abc",
            990_000,
            84_532,
            8_453,
        )
        .with_intent_id("pi_f83c12ab34cd")
    }

    async fn enqueue_without_push(
        engine: &WebhookEngine<MemoryWebhookStore>,
        store: &MemoryWebhookStore,
    ) -> WebhookEvent {
        // Insert directly so the test controls every attempt.
        let snapshot = serde_json::to_value(payload()).unwrap();
        let vendor = engine
            .vendors
            .vendor("v_123")
            .await
            .unwrap()
            .expect("test vendor");
        let event = WebhookEvent::pending(
            "v_123",
            WebhookEventType::PaymentIntentCreated,
            snapshot,
            vendor.webhook_url.expect("test vendor has URL"),
            engine.config.max_attempts,
            Utc::now(),
        );
        store.insert(&event).await.unwrap();
        event
    }

    #[test]
    fn test_backoff_schedule() {
        // base 2s: +2s, +4s, +8s after attempts 1, 2, 3
        assert_eq!(backoff_delay_secs(2, 1), 2);
        assert_eq!(backoff_delay_secs(2, 2), 4);
        assert_eq!(backoff_delay_secs(2, 3), 8);
    }

    #[test]
    fn test_backoff_caps_at_one_hour() {
        assert_eq!(backoff_delay_secs(2, 30), 3600);
        assert_eq!(backoff_delay_secs(2, u32::MAX), 3600);
    }

    #[test]
    fn test_truncate_body_limits_length() {
        let long = "x".repeat(5000);
        assert_eq!(truncate_body(&long).len(), 1000);
        assert_eq!(truncate_body("short"), "short");
    }

    #[tokio::test]
    async fn test_successful_attempt_marks_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks"))
            .and(header("x-payrail-event", "payment_intent.created"))
            .and(header("x-payrail-vendor-id", "v_123"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let store = MemoryWebhookStore::new();
        let engine = engine_for(Some(&format!("{}/hooks", server.uri())), store.clone());
        let event = enqueue_without_push(&engine, &store).await;

        let outcome = engine.attempt_delivery(&event.id).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Delivered);

        let stored = store.get(&event.id).await.unwrap().unwrap();
        assert_eq!(stored.status, WebhookStatus::Sent);
        assert_eq!(stored.attempts, 1);
        assert_eq!(stored.last_response_status, Some(200));
        assert_eq!(stored.last_response_body.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_failed_attempt_schedules_backoff() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let store = MemoryWebhookStore::new();
        let engine = engine_for(Some(&server.uri()), store.clone());
        let event = enqueue_without_push(&engine, &store).await;

        let before = Utc::now();
        let outcome = engine.attempt_delivery(&event.id).await.unwrap();
        let DeliveryOutcome::Retrying(next_retry_at) = outcome else {
            panic!("expected Retrying, got {outcome:?}");
        };

        // First failure schedules the retry ~2s out.
        let delay = (next_retry_at - before).num_seconds();
        assert!((1..=3).contains(&delay), "unexpected delay: {delay}s");

        let stored = store.get(&event.id).await.unwrap().unwrap();
        assert_eq!(stored.status, WebhookStatus::Pending);
        assert_eq!(stored.attempts, 1);
        assert_eq!(stored.last_response_status, Some(500));
        assert_eq!(stored.last_response_body.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_exhausted_attempts_expire_and_freeze_schedule() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = MemoryWebhookStore::new();
        let engine = engine_for(Some(&server.uri()), store.clone());
        let event = enqueue_without_push(&engine, &store).await;

        assert!(matches!(
            engine.attempt_delivery(&event.id).await.unwrap(),
            DeliveryOutcome::Retrying(_)
        ));
        assert!(matches!(
            engine.attempt_delivery(&event.id).await.unwrap(),
            DeliveryOutcome::Retrying(_)
        ));
        let after_second = store.get(&event.id).await.unwrap().unwrap().next_retry_at;

        // Third failed attempt exhausts max_attempts = 3.
        let outcome = engine.attempt_delivery(&event.id).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Expired);

        let stored = store.get(&event.id).await.unwrap().unwrap();
        assert_eq!(stored.status, WebhookStatus::Expired);
        assert_eq!(stored.attempts, 3);
        // next_retry_at is no longer advanced once expired.
        assert_eq!(stored.next_retry_at, after_second);

        // Further calls are no-ops.
        assert_eq!(
            engine.attempt_delivery(&event.id).await.unwrap(),
            DeliveryOutcome::Skipped
        );
        assert_eq!(store.get(&event.id).await.unwrap().unwrap().attempts, 3);
    }

    #[tokio::test]
    async fn test_transport_error_records_status_zero() {
        // Nothing listens on port 9; the connection fails outright.
        let store = MemoryWebhookStore::new();
        let engine = engine_for(Some("http://127.0.0.1:9/hooks"), store.clone());
        let event = enqueue_without_push(&engine, &store).await;

        let outcome = engine.attempt_delivery(&event.id).await.unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Retrying(_)));

        let stored = store.get(&event.id).await.unwrap().unwrap();
        assert_eq!(stored.last_response_status, Some(0));
        assert!(
            stored
                .last_response_body
                .as_deref()
                .unwrap()
                .starts_with("delivery failed:")
        );
    }

    #[tokio::test]
    async fn test_enqueue_without_webhook_url_skips_silently() {
        let store = MemoryWebhookStore::new();
        let engine = engine_for(None, store.clone());

        let queued = engine
            .enqueue("v_123", WebhookEventType::PaymentIntentCreated, &payload())
            .await
            .unwrap();
        assert!(queued.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_unknown_vendor_skips_silently() {
        let store = MemoryWebhookStore::new();
        let engine = engine_for(Some("https://api.acme.example/hooks"), store.clone());

        let queued = engine
            .enqueue("v_missing", WebhookEventType::PaymentIntentCreated, &payload())
            .await
            .unwrap();
        assert!(queued.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_pushes_in_background() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = MemoryWebhookStore::new();
        let engine = engine_for(Some(&server.uri()), store.clone());

        let event = engine
            .enqueue("v_123", WebhookEventType::PaymentIntentCreated, &payload())
            .await
            .unwrap()
            .expect("event queued");
        assert_eq!(event.status, WebhookStatus::Pending);

        // The push runs on a spawned task; wait for it to land.
        for _ in 0..200 {
            let stored = store.get(&event.id).await.unwrap().unwrap();
            if stored.status == WebhookStatus::Sent {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("background push never delivered");
    }

    #[tokio::test]
    async fn test_sweep_retries_due_events_and_is_idempotent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = MemoryWebhookStore::new();
        let engine = engine_for(Some(&server.uri()), store.clone());
        let mut event = enqueue_without_push(&engine, &store).await;

        // Simulate a past failed push: one attempt recorded, retry overdue.
        event.attempts = 1;
        event.next_retry_at = Utc::now() - chrono::Duration::seconds(5);
        store.update(&event).await.unwrap();

        assert_eq!(engine.process_pending().await.unwrap(), 1);
        let stored = store.get(&event.id).await.unwrap().unwrap();
        assert_eq!(stored.status, WebhookStatus::Sent);

        // A second sweep finds nothing due.
        assert_eq!(engine.process_pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_payload_snapshot_is_sent_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(wiremock::matchers::body_partial_json(serde_json::json!({
                "event_type": "payment_intent.created",
                "intent_id": "pi_f83c12ab34cd",
                "amount_minor": 990_000,
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let store = MemoryWebhookStore::new();
        let engine = engine_for(Some(&server.uri()), store.clone());
        let event = enqueue_without_push(&engine, &store).await;

        assert_eq!(
            engine.attempt_delivery(&event.id).await.unwrap(),
            DeliveryOutcome::Delivered
        );
    }
}
