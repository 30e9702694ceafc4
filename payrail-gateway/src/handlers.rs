//! Axum route handlers for the gateway.
//!
//! Handlers are thin: decode the request, call the service, map the result.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Json, Router, routing};
use serde::{Deserialize, Serialize};

use payrail::chains::{ChainConfig, ChainId, ChainRegistry};
use payrail::intent::PaymentIntent;
use payrail::router::{PaymentEstimate, RouterEncoder};
use payrail_intents::{
    CompleteTransactionRequest, CreateIntentRequest, CreateSubscriptionRequest, IntentService,
    MemoryIntentStore, MemorySubscriptionStore, Subscription, SubscriptionRenewal,
    SubscriptionService, SubscriptionStatus,
};
use payrail_webhooks::{MemoryWebhookStore, WebhookEngine, WebhookEvent};

use crate::error::ApiError;

/// Shared application state for the gateway.
#[derive(Debug)]
pub struct Gateway {
    /// Supported-network registry.
    pub registry: Arc<ChainRegistry>,
    /// Calldata encoder for estimates.
    pub encoder: RouterEncoder,
    /// Payment-intent state machine.
    pub intents: Arc<IntentService<MemoryIntentStore>>,
    /// Recurring-billing service.
    pub subscriptions: SubscriptionService<MemorySubscriptionStore, MemoryIntentStore>,
    /// Webhook delivery engine.
    pub webhooks: Arc<WebhookEngine<MemoryWebhookStore>>,
}

/// Shared state handle passed to every handler.
pub type GatewayState = Arc<Gateway>;

/// Body for `POST /intents/{intent_id}/submit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTransactionBody {
    /// Source-chain transaction hash reported by the client.
    pub tx_hash: String,
}

/// Body for `POST /estimate`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EstimateRequest {
    /// Chain the customer pays from.
    pub src_chain_id: ChainId,
    /// Chain the vendor receives on.
    pub dest_chain_id: ChainId,
    /// Amount in settlement-token minor units.
    pub amount_minor: u64,
}

/// Query for `GET /validate`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ValidateQuery {
    /// Chain the customer pays from.
    pub src_chain_id: ChainId,
    /// Chain the vendor receives on.
    pub dest_chain_id: ChainId,
}

/// Response for `GET /validate`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PairValidation {
    /// Whether both chains are in the registry.
    pub supported: bool,
    /// Echoed source chain.
    pub src_chain_id: ChainId,
    /// Echoed destination chain.
    pub dest_chain_id: ChainId,
    /// Whether the pair crosses chains.
    pub is_cross_chain: bool,
    /// Fee rate applied when crossing, in basis points.
    pub bridge_fee_bps: u32,
}

/// Body for `PATCH /subscriptions/{subscription_id}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UpdateSubscriptionBody {
    /// New subscription status.
    pub status: SubscriptionStatus,
}

/// Query for `GET /webhooks/{vendor_id}`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ListEventsQuery {
    /// Maximum number of events to return (default: 50).
    #[serde(default = "default_list_limit")]
    pub limit: usize,
}

const fn default_list_limit() -> usize {
    50
}

/// Response for `POST /webhooks/sweep`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SweepResponse {
    /// Number of due events attempted.
    pub processed: usize,
}

/// `POST /intents` — Creates a payment intent with its router payload.
///
/// # Errors
///
/// Returns 400/404 per the error taxonomy.
pub async fn create_intent(
    State(state): State<GatewayState>,
    Json(body): Json<CreateIntentRequest>,
) -> Result<(StatusCode, Json<PaymentIntent>), ApiError> {
    let intent = state.intents.create(body).await?;
    Ok((StatusCode::CREATED, Json(intent)))
}

/// `GET /intents/{intent_id}` — Fetches a payment intent.
///
/// # Errors
///
/// Returns 404 for an unknown id.
pub async fn get_intent(
    State(state): State<GatewayState>,
    Path(intent_id): Path<String>,
) -> Result<Json<PaymentIntent>, ApiError> {
    Ok(Json(state.intents.get(&intent_id).await?))
}

/// `POST /intents/{intent_id}/submit` — Records the source transaction hash.
///
/// # Errors
///
/// Returns 404 for an unknown id, 409 from an illegal state.
pub async fn submit_transaction(
    State(state): State<GatewayState>,
    Path(intent_id): Path<String>,
    Json(body): Json<SubmitTransactionBody>,
) -> Result<Json<PaymentIntent>, ApiError> {
    let intent = state
        .intents
        .report_source_transaction(&intent_id, body.tx_hash)
        .await?;
    Ok(Json(intent))
}

/// `POST /intents/{intent_id}/complete` — Completes the intent with its
/// declared outcome.
///
/// # Errors
///
/// Returns 400 for a bad outcome, 404 for an unknown id, 409 from an illegal
/// state.
pub async fn complete_transaction(
    State(state): State<GatewayState>,
    Path(intent_id): Path<String>,
    Json(body): Json<CompleteTransactionRequest>,
) -> Result<Json<PaymentIntent>, ApiError> {
    let intent = state.intents.complete_transaction(&intent_id, body).await?;
    Ok(Json(intent))
}

/// `POST /subscriptions` — Creates an active subscription.
///
/// # Errors
///
/// Returns 400/404 per the error taxonomy.
pub async fn create_subscription(
    State(state): State<GatewayState>,
    Json(body): Json<CreateSubscriptionRequest>,
) -> Result<(StatusCode, Json<Subscription>), ApiError> {
    let subscription = state.subscriptions.create(body).await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

/// `GET /subscriptions/{subscription_id}` — Fetches a subscription.
///
/// # Errors
///
/// Returns 404 for an unknown id.
pub async fn get_subscription(
    State(state): State<GatewayState>,
    Path(subscription_id): Path<String>,
) -> Result<Json<Subscription>, ApiError> {
    Ok(Json(state.subscriptions.get(&subscription_id).await?))
}

/// `POST /subscriptions/{subscription_id}/renew` — Charges one billing cycle
/// and returns the payment intent for it.
///
/// # Errors
///
/// Returns 400 for an inactive subscription, 404 for an unknown id.
pub async fn renew_subscription(
    State(state): State<GatewayState>,
    Path(subscription_id): Path<String>,
) -> Result<Json<SubscriptionRenewal>, ApiError> {
    Ok(Json(state.subscriptions.renew(&subscription_id).await?))
}

/// `PATCH /subscriptions/{subscription_id}` — Updates the subscription
/// status (pause, resume, cancel).
///
/// # Errors
///
/// Returns 404 for an unknown id.
pub async fn update_subscription_status(
    State(state): State<GatewayState>,
    Path(subscription_id): Path<String>,
    Json(body): Json<UpdateSubscriptionBody>,
) -> Result<Json<Subscription>, ApiError> {
    let subscription = state
        .subscriptions
        .set_status(&subscription_id, body.status)
        .await?;
    Ok(Json(subscription))
}

/// `GET /chains` — Lists all supported network configurations.
pub async fn list_chains(State(state): State<GatewayState>) -> Json<Vec<ChainConfig>> {
    let chains: Vec<ChainConfig> = state
        .registry
        .supported_chains()
        .into_iter()
        .filter_map(|chain_id| state.registry.get(chain_id).cloned())
        .collect();
    Json(chains)
}

/// `GET /chains/{chain_id}` — Fetches one network configuration.
///
/// # Errors
///
/// Returns 404 for an unsupported chain.
pub async fn get_chain(
    State(state): State<GatewayState>,
    Path(chain_id): Path<ChainId>,
) -> Result<Json<ChainConfig>, ApiError> {
    state.registry.get(chain_id).cloned().map(Json).ok_or_else(|| {
        ApiError(payrail::error::NotFoundError::new("chain", chain_id.to_string()).into())
    })
}

/// `GET /validate` — Checks whether a chain pair is supported.
pub async fn validate_pair(
    State(state): State<GatewayState>,
    Query(query): Query<ValidateQuery>,
) -> Json<PairValidation> {
    let supported = state
        .registry
        .validate_pair(query.src_chain_id, query.dest_chain_id);
    let is_cross_chain = query.src_chain_id != query.dest_chain_id;
    let bridge_fee_bps = if supported && is_cross_chain {
        state
            .registry
            .get(query.src_chain_id)
            .map_or(0, |config| config.bridge_fee_bps)
    } else {
        0
    };
    Json(PairValidation {
        supported,
        src_chain_id: query.src_chain_id,
        dest_chain_id: query.dest_chain_id,
        is_cross_chain,
        bridge_fee_bps,
    })
}

/// `POST /estimate` — Estimates gas and fees for a prospective payment.
///
/// # Errors
///
/// Returns 400 for an unsupported chain.
pub async fn estimate_costs(
    State(state): State<GatewayState>,
    Json(body): Json<EstimateRequest>,
) -> Result<Json<PaymentEstimate>, ApiError> {
    let estimate =
        state
            .encoder
            .estimate(body.src_chain_id, body.dest_chain_id, body.amount_minor)?;
    Ok(Json(estimate))
}

/// `GET /webhooks/{vendor_id}` — Lists a vendor's webhook events, most
/// recent first.
///
/// # Errors
///
/// Returns 500 if the store fails.
pub async fn list_webhook_events(
    State(state): State<GatewayState>,
    Path(vendor_id): Path<String>,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<Vec<WebhookEvent>>, ApiError> {
    Ok(Json(state.webhooks.list(&vendor_id, query.limit).await?))
}

/// `POST /webhooks/sweep` — Runs one webhook poll sweep.
///
/// # Errors
///
/// Returns 500 if the store fails.
pub async fn sweep_webhooks(
    State(state): State<GatewayState>,
) -> Result<Json<SweepResponse>, ApiError> {
    let processed = state.webhooks.process_pending().await?;
    Ok(Json(SweepResponse { processed }))
}

/// `GET /health` — Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Creates an axum [`Router`] with all gateway endpoints.
pub fn gateway_router(state: GatewayState) -> Router {
    Router::new()
        .route("/intents", routing::post(create_intent))
        .route("/intents/{intent_id}", routing::get(get_intent))
        .route("/intents/{intent_id}/submit", routing::post(submit_transaction))
        .route(
            "/intents/{intent_id}/complete",
            routing::post(complete_transaction),
        )
        .route("/subscriptions", routing::post(create_subscription))
        .route(
            "/subscriptions/{subscription_id}",
            routing::get(get_subscription).patch(update_subscription_status),
        )
        .route(
            "/subscriptions/{subscription_id}/renew",
            routing::post(renew_subscription),
        )
        .route("/chains", routing::get(list_chains))
        .route("/chains/{chain_id}", routing::get(get_chain))
        .route("/validate", routing::get(validate_pair))
        .route("/estimate", routing::post(estimate_costs))
        .route("/webhooks/{vendor_id}", routing::get(list_webhook_events))
        .route("/webhooks/sweep", routing::post(sweep_webhooks))
        .route("/health", routing::get(health))
        .with_state(state)
}
