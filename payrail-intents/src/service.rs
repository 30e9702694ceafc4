//! Orchestration of the payment-intent lifecycle.
//!
//! The service validates against the chain registry and vendor entitlements,
//! captures router calldata at creation, and drives every later mutation
//! through the store's conditional transition. Webhook obligations are handed
//! to the event sink after the transition commits; the sink isolates its own
//! failures, so a vendor's broken endpoint can never fail a payment
//! operation here.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use payrail::chains::{ChainId, ChainRegistry};
use payrail::directory::{EventSink, ProductCatalog, VendorDirectory, VendorRecord};
use payrail::error::{ConflictError, NotFoundError, PaymentError, ValidationError};
use payrail::events::{WebhookEventType, WebhookPayload};
use payrail::intent::{PaymentIntent, PaymentIntentStatus};
use payrail::router::{RouterCallRequest, RouterEncoder};

use crate::store::{IntentStore, IntentUpdate, TransitionOutcome};

/// Request to create a payment intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIntentRequest {
    /// Vendor being paid.
    pub vendor_id: String,
    /// Product being paid for.
    pub product_id: String,
    /// Chain the customer pays from.
    pub src_chain_id: ChainId,
    /// Chain the vendor receives on; defaults to the vendor's preference.
    #[serde(default)]
    pub dest_chain_id: Option<ChainId>,
    /// Amount in minor units; defaults to the product's default price.
    #[serde(default)]
    pub amount_minor: Option<u64>,
    /// Customer contact to carry on notifications.
    #[serde(default)]
    pub customer_email: Option<String>,
    /// Metadata echoed on the created-event payload.
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

/// Request to complete a payment intent with a transaction outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteTransactionRequest {
    /// Hash of the completing transaction.
    #[serde(rename = "transaction_hash")]
    pub tx_hash: String,
    /// Declared outcome; must be `settled` or `failed`.
    #[serde(rename = "payment_status")]
    pub outcome: PaymentIntentStatus,
    /// Chain the payment was made from.
    #[serde(rename = "source_chain_id")]
    pub src_chain_id: ChainId,
    /// Address the payment was made from.
    pub source_address: String,
}

/// Payment-intent state machine service.
pub struct IntentService<S> {
    store: S,
    registry: Arc<ChainRegistry>,
    encoder: RouterEncoder,
    vendors: Arc<dyn VendorDirectory>,
    products: Arc<dyn ProductCatalog>,
    events: Arc<dyn EventSink>,
}

impl<S> std::fmt::Debug for IntentService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentService")
            .field("chains", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl<S: IntentStore> IntentService<S> {
    /// Creates a service over the given store, registry, and collaborators.
    #[must_use]
    pub fn new(
        store: S,
        registry: Arc<ChainRegistry>,
        vendors: Arc<dyn VendorDirectory>,
        products: Arc<dyn ProductCatalog>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let encoder = RouterEncoder::new(Arc::clone(&registry));
        Self {
            store,
            registry,
            encoder,
            vendors,
            products,
            events,
        }
    }

    /// Replaces the calldata encoder (e.g., to swap the payment-id hasher).
    #[must_use]
    pub fn with_encoder(mut self, encoder: RouterEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    /// Creates a payment intent and returns it with its router payload.
    ///
    /// Validation happens entirely before the insert, so a rejected request
    /// leaves no intent row and no webhook event behind. The intent is
    /// persisted in a single write that already carries `awaiting_user_tx`.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::NotFound`] for an unknown vendor or product
    /// - [`PaymentError::Validation`] for a disabled source chain, an
    ///   unsupported chain pair, a missing price, or a zero amount
    /// - [`PaymentError::Storage`] if the insert fails
    pub async fn create(&self, request: CreateIntentRequest) -> Result<PaymentIntent, PaymentError> {
        let vendor = self.resolve_vendor(&request.vendor_id).await?;

        if !vendor.enabled_source_chains.contains(&request.src_chain_id) {
            return Err(ValidationError::new(format!(
                "source chain {} is not enabled for vendor {}",
                request.src_chain_id, vendor.vendor_id
            ))
            .into());
        }

        let dest_chain_id = request
            .dest_chain_id
            .unwrap_or(vendor.preferred_dest_chain_id);
        if !self.registry.validate_pair(request.src_chain_id, dest_chain_id) {
            return Err(ValidationError::new(format!(
                "unsupported chain pair: {} -> {}",
                request.src_chain_id, dest_chain_id
            ))
            .into());
        }

        let product = self
            .products
            .product(&request.product_id)
            .await?
            .ok_or_else(|| NotFoundError::new("product", &request.product_id))?;
        if product.vendor_id != request.vendor_id {
            return Err(ValidationError::new(format!(
                "product {} does not belong to vendor {}",
                product.product_id, request.vendor_id
            ))
            .into());
        }

        let amount_minor = request
            .amount_minor
            .or(product.default_amount_minor)
            .ok_or_else(|| {
                ValidationError::new(format!("product {} has no price set", product.product_id))
            })?;
        if amount_minor == 0 {
            return Err(ValidationError::new("amount must be positive").into());
        }

        let intent_id = new_intent_id();
        let router = self.encoder.encode(&RouterCallRequest {
            recipient: vendor.wallet_address,
            amount_minor,
            src_chain_id: request.src_chain_id,
            dest_chain_id,
            payment_id: intent_id.clone(),
            bridge_address: None,
        })?;

        let now = Utc::now();
        let intent = PaymentIntent {
            intent_id,
            vendor_id: request.vendor_id,
            product_id: request.product_id,
            customer_email: request.customer_email,
            src_chain_id: request.src_chain_id,
            dest_chain_id,
            amount_minor,
            status: PaymentIntentStatus::AwaitingUserTx,
            router,
            src_tx_hash: None,
            dest_tx_hash: None,
            source_address: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&intent).await?;

        tracing::info!(
            intent_id = %intent.intent_id,
            vendor_id = %intent.vendor_id,
            src_chain = intent.src_chain_id,
            dest_chain = intent.dest_chain_id,
            amount = intent.amount_minor,
            "Created payment intent"
        );

        let mut payload = payload_for(&intent, WebhookEventType::PaymentIntentCreated);
        if let Some(metadata) = request.metadata {
            payload = payload.with_metadata(metadata);
        }
        self.events
            .publish(&intent.vendor_id, WebhookEventType::PaymentIntentCreated, payload)
            .await;

        Ok(intent)
    }

    /// Fetches a payment intent by id.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::NotFound`] for an unknown id.
    pub async fn get(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        self.store
            .get(intent_id)
            .await?
            .ok_or_else(|| NotFoundError::new("payment intent", intent_id).into())
    }

    /// Records the source transaction hash reported by the client.
    ///
    /// Legal only from `awaiting_user_tx`; moves the intent to `submitted`
    /// and emits a `payment_intent.submitted` webhook obligation.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::NotFound`] for an unknown id
    /// - [`PaymentError::Conflict`] from any other status
    pub async fn report_source_transaction(
        &self,
        intent_id: &str,
        tx_hash: impl Into<String>,
    ) -> Result<PaymentIntent, PaymentError> {
        let mut update = IntentUpdate::to_status(PaymentIntentStatus::Submitted);
        update.src_tx_hash = Some(tx_hash.into());

        let intent = self
            .apply_transition(intent_id, PaymentIntentStatus::submission_sources(), update)
            .await?;

        tracing::info!(intent_id = %intent.intent_id, "Source transaction submitted");

        let payload = payload_for(&intent, WebhookEventType::PaymentIntentSubmitted);
        self.events
            .publish(&intent.vendor_id, WebhookEventType::PaymentIntentSubmitted, payload)
            .await;

        Ok(intent)
    }

    /// Completes a payment intent with its declared outcome.
    ///
    /// Legal from `created`, `submitted`, or `failed` — the latter permits
    /// retrying a failed payment with a fresh transaction under the same
    /// intent id. A settled outcome records the hash as the destination
    /// transaction and emits `payment_intent.settled`; a failed outcome
    /// records it as the source transaction and emits nothing.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::Validation`] for an outcome other than
    ///   `settled`/`failed`
    /// - [`PaymentError::NotFound`] for an unknown id
    /// - [`PaymentError::Conflict`] from any other status
    pub async fn complete_transaction(
        &self,
        intent_id: &str,
        request: CompleteTransactionRequest,
    ) -> Result<PaymentIntent, PaymentError> {
        if !matches!(
            request.outcome,
            PaymentIntentStatus::Settled | PaymentIntentStatus::Failed
        ) {
            return Err(ValidationError::new(format!(
                "invalid payment status: {}; must be settled or failed",
                request.outcome
            ))
            .into());
        }

        let mut update = IntentUpdate::to_status(request.outcome);
        if request.outcome == PaymentIntentStatus::Settled {
            update.dest_tx_hash = Some(request.tx_hash);
        } else {
            update.src_tx_hash = Some(request.tx_hash);
        }
        update.src_chain_id = Some(request.src_chain_id);
        update.source_address = Some(request.source_address);

        let intent = self
            .apply_transition(intent_id, PaymentIntentStatus::completion_sources(), update)
            .await?;

        tracing::info!(
            intent_id = %intent.intent_id,
            status = %intent.status,
            "Completed payment transaction"
        );

        if intent.status == PaymentIntentStatus::Settled {
            let payload = payload_for(&intent, WebhookEventType::PaymentIntentSettled);
            self.events
                .publish(&intent.vendor_id, WebhookEventType::PaymentIntentSettled, payload)
                .await;
        }

        Ok(intent)
    }

    async fn resolve_vendor(&self, vendor_id: &str) -> Result<VendorRecord, PaymentError> {
        self.vendors
            .vendor(vendor_id)
            .await?
            .ok_or_else(|| NotFoundError::new("vendor", vendor_id).into())
    }

    async fn apply_transition(
        &self,
        intent_id: &str,
        allowed_from: &[PaymentIntentStatus],
        update: IntentUpdate,
    ) -> Result<PaymentIntent, PaymentError> {
        match self.store.transition(intent_id, allowed_from, update).await? {
            TransitionOutcome::Applied(intent) => Ok(intent),
            TransitionOutcome::NotFound => {
                Err(NotFoundError::new("payment intent", intent_id).into())
            }
            TransitionOutcome::Rejected(current) => {
                Err(ConflictError::new(intent_id, current, allowed_from).into())
            }
        }
    }
}

/// Builds the webhook payload snapshot for an intent transition.
fn payload_for(intent: &PaymentIntent, event_type: WebhookEventType) -> WebhookPayload {
    let mut payload = WebhookPayload::new(
        event_type,
        &intent.vendor_id,
        &intent.product_id,
        intent.amount_minor,
        intent.src_chain_id,
        intent.dest_chain_id,
    )
    .with_intent_id(&intent.intent_id);
    if let Some(hash) = &intent.src_tx_hash {
        payload = payload.with_src_tx_hash(hash);
    }
    if let Some(hash) = &intent.dest_tx_hash {
        payload = payload.with_dest_tx_hash(hash);
    }
    if let Some(email) = &intent.customer_email {
        payload = payload.with_customer_email(email);
    }
    payload
}

/// Generates a fresh intent identifier: `pi_` plus 12 hex chars.
fn new_intent_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("pi_{}", &hex[..12])
}
