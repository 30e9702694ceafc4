//! Webhook event types and wire payloads.
//!
//! Every payment-intent transition produces a domain event that the delivery
//! engine turns into a webhook obligation. The payload here is the exact
//! JSON body a vendor endpoint receives; timestamps serialize as RFC3339
//! strings so a stored snapshot can be resent without recomputation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use serde_with::skip_serializing_none;

use crate::chains::ChainId;

/// Kind of a vendor-facing webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookEventType {
    /// A payment intent was created and handed to the client.
    #[serde(rename = "payment_intent.created")]
    PaymentIntentCreated,
    /// The client reported the source transaction hash.
    #[serde(rename = "payment_intent.submitted")]
    PaymentIntentSubmitted,
    /// The payment settled on the destination chain.
    #[serde(rename = "payment_intent.settled")]
    PaymentIntentSettled,
    /// A subscription renewal produced a charge.
    #[serde(rename = "subscription.renewed")]
    SubscriptionRenewed,
}

impl WebhookEventType {
    /// Returns the wire-format name of this event type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentIntentCreated => "payment_intent.created",
            Self::PaymentIntentSubmitted => "payment_intent.submitted",
            Self::PaymentIntentSettled => "payment_intent.settled",
            Self::SubscriptionRenewed => "subscription.renewed",
        }
    }
}

impl fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The JSON body delivered to a vendor's webhook endpoint.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Kind of event.
    pub event_type: WebhookEventType,
    /// Vendor being notified.
    pub vendor_id: String,
    /// Payment intent the event concerns, if any.
    pub intent_id: Option<String>,
    /// Subscription the event concerns, if any.
    pub subscription_id: Option<String>,
    /// Product being paid for.
    pub product_id: String,
    /// Amount in settlement-token minor units.
    pub amount_minor: u64,
    /// Chain the customer pays from.
    pub src_chain_id: ChainId,
    /// Chain the vendor receives on.
    pub dest_chain_id: ChainId,
    /// Source-chain transaction hash, once known.
    pub src_tx_hash: Option<String>,
    /// Destination-chain transaction hash, once known.
    pub dest_tx_hash: Option<String>,
    /// Customer contact, when supplied at intent creation.
    pub customer_email: Option<String>,
    /// Event timestamp (RFC3339).
    pub timestamp: DateTime<Utc>,
    /// Open metadata map.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl WebhookPayload {
    /// Creates a payload with the required fields; optional fields attach
    /// through the `with_*` builders.
    #[must_use]
    pub fn new(
        event_type: WebhookEventType,
        vendor_id: impl Into<String>,
        product_id: impl Into<String>,
        amount_minor: u64,
        src_chain_id: ChainId,
        dest_chain_id: ChainId,
    ) -> Self {
        Self {
            event_type,
            vendor_id: vendor_id.into(),
            intent_id: None,
            subscription_id: None,
            product_id: product_id.into(),
            amount_minor,
            src_chain_id,
            dest_chain_id,
            src_tx_hash: None,
            dest_tx_hash: None,
            customer_email: None,
            timestamp: Utc::now(),
            metadata: Map::new(),
        }
    }

    /// Sets the payment intent id.
    #[must_use]
    pub fn with_intent_id(mut self, intent_id: impl Into<String>) -> Self {
        self.intent_id = Some(intent_id.into());
        self
    }

    /// Sets the subscription id.
    #[must_use]
    pub fn with_subscription_id(mut self, subscription_id: impl Into<String>) -> Self {
        self.subscription_id = Some(subscription_id.into());
        self
    }

    /// Sets the source transaction hash.
    #[must_use]
    pub fn with_src_tx_hash(mut self, hash: impl Into<String>) -> Self {
        self.src_tx_hash = Some(hash.into());
        self
    }

    /// Sets the destination transaction hash.
    #[must_use]
    pub fn with_dest_tx_hash(mut self, hash: impl Into<String>) -> Self {
        self.dest_tx_hash = Some(hash.into());
        self
    }

    /// Sets the customer email.
    #[must_use]
    pub fn with_customer_email(mut self, email: impl Into<String>) -> Self {
        self.customer_email = Some(email.into());
        self
    }

    /// Sets the event timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Merges entries into the metadata map.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata.extend(metadata);
        self
    }
}
