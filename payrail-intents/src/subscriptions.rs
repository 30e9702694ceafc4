//! Subscription records and their renewal flow.
//!
//! A subscription is a standing agreement to charge a customer once per
//! billing cycle. Renewing one creates a fresh payment intent through the
//! intent service (which emits its usual `payment_intent.created`
//! obligation), advances the next renewal date, and emits a
//! `subscription.renewed` webhook carrying both the subscription and the new
//! intent.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use payrail::chains::ChainId;
use payrail::directory::{EventSink, ProductCatalog, VendorDirectory};
use payrail::error::{NotFoundError, PaymentError, StorageError, ValidationError};
use payrail::events::{WebhookEventType, WebhookPayload};
use payrail::intent::PaymentIntent;

use crate::service::{CreateIntentRequest, IntentService};
use crate::store::IntentStore;

/// Lifecycle status of a [`Subscription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Renewals are charged each billing cycle.
    Active,
    /// Renewals are suspended; the subscription may be resumed.
    Paused,
    /// The subscription was ended by the vendor or customer.
    Cancelled,
    /// The subscription lapsed without renewal.
    Expired,
}

impl SubscriptionStatus {
    /// Returns the wire-format name of this status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How often a subscription renews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    /// Every 30 days.
    Monthly,
    /// Every 90 days.
    Quarterly,
    /// Every 365 days.
    Yearly,
}

impl BillingInterval {
    /// Returns the wire-format name of this interval.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
        }
    }

    /// Returns the length of one billing cycle.
    #[must_use]
    pub fn period(self) -> Duration {
        match self {
            Self::Monthly => Duration::days(30),
            Self::Quarterly => Duration::days(90),
            Self::Yearly => Duration::days(365),
        }
    }
}

impl fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A standing agreement to charge a customer each billing cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Unique subscription identifier (`sub_` + 12 hex chars).
    pub subscription_id: String,
    /// Vendor being paid.
    pub vendor_id: String,
    /// Product the subscription covers.
    pub product_id: String,
    /// Vendor-defined plan identifier.
    pub plan_id: String,
    /// Customer being charged.
    pub customer_email: String,
    /// Current lifecycle status.
    pub status: SubscriptionStatus,
    /// Chain the customer pays from.
    pub src_chain_id: ChainId,
    /// Chain the vendor receives on.
    pub dest_chain_id: ChainId,
    /// Length of one billing cycle.
    pub billing_interval: BillingInterval,
    /// Amount charged per cycle, in settlement-token minor units.
    pub amount_minor: u64,
    /// When the next renewal is due.
    pub next_renewal_at: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last mutation.
    pub updated_at: DateTime<Utc>,
}

/// Request to create a subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubscriptionRequest {
    /// Vendor being paid.
    pub vendor_id: String,
    /// Product the subscription covers.
    pub product_id: String,
    /// Vendor-defined plan identifier.
    pub plan_id: String,
    /// Customer being charged.
    pub customer_email: String,
    /// Chain the customer pays from.
    pub src_chain_id: ChainId,
    /// Chain the vendor receives on.
    pub dest_chain_id: ChainId,
    /// Length of one billing cycle.
    pub billing_interval: BillingInterval,
    /// Amount charged per cycle, in settlement-token minor units.
    pub amount_minor: u64,
}

/// Result of renewing a subscription: the advanced subscription record and
/// the payment intent created for this cycle's charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionRenewal {
    /// The subscription with its renewal date advanced one cycle.
    pub subscription: Subscription,
    /// The payment intent the customer must execute for this cycle.
    pub intent: PaymentIntent,
}

/// Durable storage for subscriptions.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Inserts a new subscription row.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Storage`] on duplicate id or backend failure.
    async fn insert(&self, subscription: &Subscription) -> Result<(), PaymentError>;

    /// Fetches a subscription by id.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Storage`] on backend failure.
    async fn get(&self, subscription_id: &str) -> Result<Option<Subscription>, PaymentError>;

    /// Sets the subscription's status; `None` for an unknown id.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Storage`] on backend failure.
    async fn set_status(
        &self,
        subscription_id: &str,
        status: SubscriptionStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Subscription>, PaymentError>;

    /// Moves the subscription's renewal date forward; `None` for an unknown
    /// id.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Storage`] on backend failure.
    async fn advance_renewal(
        &self,
        subscription_id: &str,
        next_renewal_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Subscription>, PaymentError>;
}

/// In-memory [`SubscriptionStore`] backed by a concurrent map.
///
/// Clones share the same underlying rows.
#[derive(Debug, Clone, Default)]
pub struct MemorySubscriptionStore {
    subscriptions: Arc<DashMap<String, Subscription>>,
}

impl MemorySubscriptionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SubscriptionStore for MemorySubscriptionStore {
    async fn insert(&self, subscription: &Subscription) -> Result<(), PaymentError> {
        match self.subscriptions.entry(subscription.subscription_id.clone()) {
            Entry::Occupied(_) => Err(StorageError::new(format!(
                "duplicate subscription id: {}",
                subscription.subscription_id
            ))
            .into()),
            Entry::Vacant(slot) => {
                slot.insert(subscription.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, subscription_id: &str) -> Result<Option<Subscription>, PaymentError> {
        Ok(self
            .subscriptions
            .get(subscription_id)
            .map(|row| row.value().clone()))
    }

    async fn set_status(
        &self,
        subscription_id: &str,
        status: SubscriptionStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Subscription>, PaymentError> {
        Ok(self.subscriptions.get_mut(subscription_id).map(|mut row| {
            row.status = status;
            row.updated_at = updated_at;
            row.clone()
        }))
    }

    async fn advance_renewal(
        &self,
        subscription_id: &str,
        next_renewal_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Subscription>, PaymentError> {
        Ok(self.subscriptions.get_mut(subscription_id).map(|mut row| {
            row.next_renewal_at = next_renewal_at;
            row.updated_at = updated_at;
            row.clone()
        }))
    }
}

/// Subscription lifecycle service.
pub struct SubscriptionService<S, I> {
    store: S,
    intents: Arc<IntentService<I>>,
    vendors: Arc<dyn VendorDirectory>,
    products: Arc<dyn ProductCatalog>,
    events: Arc<dyn EventSink>,
}

impl<S, I> fmt::Debug for SubscriptionService<S, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionService").finish_non_exhaustive()
    }
}

impl<S: SubscriptionStore, I: IntentStore> SubscriptionService<S, I> {
    /// Creates a service over the given store, intent service, and
    /// collaborators.
    #[must_use]
    pub fn new(
        store: S,
        intents: Arc<IntentService<I>>,
        vendors: Arc<dyn VendorDirectory>,
        products: Arc<dyn ProductCatalog>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            intents,
            vendors,
            products,
            events,
        }
    }

    /// Creates an active subscription whose first renewal is one billing
    /// cycle out.
    ///
    /// The chain pair is not validated here; the intent service checks it on
    /// every renewal, against the registry state current at that time.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::NotFound`] for an unknown vendor or product
    /// - [`PaymentError::Validation`] for a foreign product or a zero amount
    /// - [`PaymentError::Storage`] if the insert fails
    pub async fn create(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<Subscription, PaymentError> {
        if self.vendors.vendor(&request.vendor_id).await?.is_none() {
            return Err(NotFoundError::new("vendor", &request.vendor_id).into());
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
        if request.amount_minor == 0 {
            return Err(ValidationError::new("amount must be positive").into());
        }

        let now = Utc::now();
        let subscription = Subscription {
            subscription_id: new_subscription_id(),
            vendor_id: request.vendor_id,
            product_id: request.product_id,
            plan_id: request.plan_id,
            customer_email: request.customer_email,
            status: SubscriptionStatus::Active,
            src_chain_id: request.src_chain_id,
            dest_chain_id: request.dest_chain_id,
            billing_interval: request.billing_interval,
            amount_minor: request.amount_minor,
            next_renewal_at: now + request.billing_interval.period(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&subscription).await?;

        tracing::info!(
            subscription_id = %subscription.subscription_id,
            vendor_id = %subscription.vendor_id,
            interval = %subscription.billing_interval,
            "Created subscription"
        );

        Ok(subscription)
    }

    /// Fetches a subscription by id.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::NotFound`] for an unknown id.
    pub async fn get(&self, subscription_id: &str) -> Result<Subscription, PaymentError> {
        self.store
            .get(subscription_id)
            .await?
            .ok_or_else(|| NotFoundError::new("subscription", subscription_id).into())
    }

    /// Charges one billing cycle: creates a payment intent for the
    /// subscription's amount, advances the renewal date, and emits a
    /// `subscription.renewed` webhook obligation.
    ///
    /// The intent creation runs the full create validation and emits its own
    /// `payment_intent.created` obligation.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::NotFound`] for an unknown id
    /// - [`PaymentError::Validation`] if the subscription is not active, or
    ///   from the intent creation's own checks
    pub async fn renew(&self, subscription_id: &str) -> Result<SubscriptionRenewal, PaymentError> {
        let subscription = self.get(subscription_id).await?;
        if subscription.status != SubscriptionStatus::Active {
            return Err(ValidationError::new(format!(
                "subscription {} is {}; only active subscriptions renew",
                subscription.subscription_id, subscription.status
            ))
            .into());
        }

        let intent = self
            .intents
            .create(CreateIntentRequest {
                vendor_id: subscription.vendor_id.clone(),
                product_id: subscription.product_id.clone(),
                src_chain_id: subscription.src_chain_id,
                dest_chain_id: Some(subscription.dest_chain_id),
                amount_minor: Some(subscription.amount_minor),
                customer_email: Some(subscription.customer_email.clone()),
                metadata: None,
            })
            .await?;

        let now = Utc::now();
        let next_renewal_at = now + subscription.billing_interval.period();
        let subscription = self
            .store
            .advance_renewal(subscription_id, next_renewal_at, now)
            .await?
            .ok_or_else(|| NotFoundError::new("subscription", subscription_id))?;

        tracing::info!(
            subscription_id = %subscription.subscription_id,
            intent_id = %intent.intent_id,
            next_renewal_at = %subscription.next_renewal_at,
            "Renewed subscription"
        );

        let payload = WebhookPayload::new(
            WebhookEventType::SubscriptionRenewed,
            &subscription.vendor_id,
            &subscription.product_id,
            subscription.amount_minor,
            subscription.src_chain_id,
            subscription.dest_chain_id,
        )
        .with_subscription_id(&subscription.subscription_id)
        .with_intent_id(&intent.intent_id)
        .with_customer_email(&subscription.customer_email);
        self.events
            .publish(
                &subscription.vendor_id,
                WebhookEventType::SubscriptionRenewed,
                payload,
            )
            .await;

        Ok(SubscriptionRenewal {
            subscription,
            intent,
        })
    }

    /// Sets the subscription's status (pause, resume, cancel).
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::NotFound`] for an unknown id.
    pub async fn set_status(
        &self,
        subscription_id: &str,
        status: SubscriptionStatus,
    ) -> Result<Subscription, PaymentError> {
        let updated = self
            .store
            .set_status(subscription_id, status, Utc::now())
            .await?
            .ok_or_else(|| NotFoundError::new("subscription", subscription_id))?;

        tracing::info!(subscription_id, status = %updated.status, "Updated subscription status");

        Ok(updated)
    }
}

/// Generates a fresh subscription identifier: `sub_` plus 12 hex chars.
fn new_subscription_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("sub_{}", &hex[..12])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::IntentService;
    use crate::store::MemoryIntentStore;
    use payrail::chains::{BASE_MAINNET, BASE_SEPOLIA, ChainRegistry};
    use payrail::directory::{
        MemoryProductCatalog, MemoryVendorDirectory, ProductRecord, VendorRecord,
    };
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingSink {
        events: Mutex<Vec<WebhookEventType>>,
    }

    impl RecordingSink {
        fn types(&self) -> Vec<WebhookEventType> {
            self.events.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn publish(
            &self,
            _vendor_id: &str,
            event_type: WebhookEventType,
            _payload: WebhookPayload,
        ) {
            self.events.lock().unwrap().push(event_type);
        }
    }

    struct Fixture {
        service: SubscriptionService<MemorySubscriptionStore, MemoryIntentStore>,
        sink: Arc<RecordingSink>,
    }

    fn fixture() -> Fixture {
        let vendors: Arc<dyn VendorDirectory> =
            Arc::new(MemoryVendorDirectory::from_records([VendorRecord {
                vendor_id: "v_123".to_owned(),
                wallet_address: alloy_primitives::address!(
                    "742d35cc6635c0532925a3b8d19dac9dd9bf1234"
                ),
                preferred_dest_chain_id: BASE_MAINNET,
                enabled_source_chains: vec![BASE_MAINNET, BASE_SEPOLIA],
                webhook_url: None,
            }]));
        let products = Arc::new(MemoryProductCatalog::from_records([
            ProductRecord {
                product_id: "p_abc".to_owned(),
                vendor_id: "v_123".to_owned(),
                default_amount_minor: Some(990_000),
            },
            ProductRecord {
                product_id: "p_other".to_owned(),
                vendor_id: "v_other".to_owned(),
                default_amount_minor: Some(100),
            },
        ]));
        let sink = Arc::new(RecordingSink::default());
        let intents = Arc::new(IntentService::new(
            MemoryIntentStore::new(),
            Arc::new(ChainRegistry::default()),
            Arc::clone(&vendors),
            Arc::clone(&products) as Arc<dyn ProductCatalog>,
            Arc::clone(&sink) as Arc<dyn EventSink>,
        ));
        let service = SubscriptionService::new(
            MemorySubscriptionStore::new(),
            intents,
            vendors,
            products,
            Arc::clone(&sink) as Arc<dyn EventSink>,
        );
        Fixture { service, sink }
    }

    fn create_request() -> CreateSubscriptionRequest {
        CreateSubscriptionRequest {
            vendor_id: "v_123".to_owned(),
            product_id: "p_abc".to_owned(),
            plan_id: "plan_monthly_premium".to_owned(),
            customer_email: "alice@example.com".to_owned(),
            src_chain_id: BASE_SEPOLIA,
            dest_chain_id: BASE_MAINNET,
            billing_interval: BillingInterval::Monthly,
            amount_minor: 9_990_000,
        }
    }

    #[test]
    fn test_billing_interval_periods() {
        assert_eq!(BillingInterval::Monthly.period(), Duration::days(30));
        assert_eq!(BillingInterval::Quarterly.period(), Duration::days(90));
        assert_eq!(BillingInterval::Yearly.period(), Duration::days(365));
    }

    #[test]
    fn test_interval_wire_names() {
        let json = serde_json::to_string(&BillingInterval::Quarterly).unwrap();
        assert_eq!(json, "\"quarterly\"");
        let parsed: SubscriptionStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(parsed, SubscriptionStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_create_starts_active_with_renewal_one_cycle_out() {
        let fx = fixture();
        let before = Utc::now();
        let subscription = fx.service.create(create_request()).await.unwrap();

        assert!(subscription.subscription_id.starts_with("sub_"));
        assert_eq!(subscription.status, SubscriptionStatus::Active);
        let lead = subscription.next_renewal_at - before;
        assert!(lead >= Duration::days(29) && lead <= Duration::days(31));
        // Creation alone charges nothing and notifies nothing.
        assert!(fx.sink.types().is_empty());
    }

    #[tokio::test]
    async fn test_create_unknown_vendor() {
        let fx = fixture();
        let mut request = create_request();
        request.vendor_id = "v_missing".to_owned();
        let err = fx.service.create(request).await.unwrap_err();
        assert!(matches!(err, PaymentError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_foreign_product_rejected() {
        let fx = fixture();
        let mut request = create_request();
        request.product_id = "p_other".to_owned();
        let err = fx.service.create(request).await.unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_zero_amount() {
        let fx = fixture();
        let mut request = create_request();
        request.amount_minor = 0;
        let err = fx.service.create(request).await.unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
    }

    #[tokio::test]
    async fn test_renew_charges_and_advances() {
        let fx = fixture();
        let subscription = fx.service.create(create_request()).await.unwrap();
        let renewal = fx
            .service
            .renew(&subscription.subscription_id)
            .await
            .unwrap();

        assert_eq!(renewal.intent.amount_minor, 9_990_000);
        assert_eq!(renewal.intent.src_chain_id, BASE_SEPOLIA);
        assert_eq!(
            renewal.intent.customer_email.as_deref(),
            Some("alice@example.com")
        );
        assert!(renewal.subscription.next_renewal_at > subscription.next_renewal_at);
        // The renewal's intent creation notifies, then the renewal itself.
        assert_eq!(
            fx.sink.types(),
            vec![
                WebhookEventType::PaymentIntentCreated,
                WebhookEventType::SubscriptionRenewed,
            ]
        );
    }

    #[tokio::test]
    async fn test_renew_fetches_created_intent() {
        let fx = fixture();
        let subscription = fx.service.create(create_request()).await.unwrap();
        let renewal = fx
            .service
            .renew(&subscription.subscription_id)
            .await
            .unwrap();
        assert!(renewal.intent.intent_id.starts_with("pi_"));
        assert_eq!(renewal.intent.router.function, "bridgePayment");
    }

    #[tokio::test]
    async fn test_renew_unknown_subscription() {
        let fx = fixture();
        let err = fx.service.renew("sub_missing").await.unwrap_err();
        assert!(matches!(err, PaymentError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_renew_paused_subscription_rejected() {
        let fx = fixture();
        let subscription = fx.service.create(create_request()).await.unwrap();
        fx.service
            .set_status(&subscription.subscription_id, SubscriptionStatus::Paused)
            .await
            .unwrap();

        let err = fx
            .service
            .renew(&subscription.subscription_id)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Validation(_)));
        assert!(fx.sink.types().is_empty());
    }

    #[tokio::test]
    async fn test_set_status_and_resume() {
        let fx = fixture();
        let subscription = fx.service.create(create_request()).await.unwrap();

        let paused = fx
            .service
            .set_status(&subscription.subscription_id, SubscriptionStatus::Paused)
            .await
            .unwrap();
        assert_eq!(paused.status, SubscriptionStatus::Paused);

        let resumed = fx
            .service
            .set_status(&subscription.subscription_id, SubscriptionStatus::Active)
            .await
            .unwrap();
        assert_eq!(resumed.status, SubscriptionStatus::Active);
        assert!(fx.service.renew(&subscription.subscription_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_set_status_unknown_subscription() {
        let fx = fixture();
        let err = fx
            .service
            .set_status("sub_missing", SubscriptionStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_round_trip() {
        let fx = fixture();
        let subscription = fx.service.create(create_request()).await.unwrap();
        let first = fx.service.get(&subscription.subscription_id).await.unwrap();
        let second = fx.service.get(&subscription.subscription_id).await.unwrap();
        assert_eq!(first, subscription);
        assert_eq!(first, second);
    }
}
