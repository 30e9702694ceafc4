//! Persistence abstraction for payment intents.
//!
//! The store's single synchronization primitive is [`IntentStore::transition`]:
//! an atomic compare-and-update on one row, keyed by the set of legal source
//! statuses. Intents are inserted once and never deleted.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use payrail::chains::ChainId;
use payrail::error::{PaymentError, StorageError};
use payrail::intent::{PaymentIntent, PaymentIntentStatus};

/// Field updates applied by a transition.
///
/// `None` fields are left untouched, so a later settlement does not erase an
/// earlier source-transaction hash.
#[derive(Debug, Clone)]
pub struct IntentUpdate {
    /// New lifecycle status.
    pub status: PaymentIntentStatus,
    /// Source-chain transaction hash to record.
    pub src_tx_hash: Option<String>,
    /// Destination-chain transaction hash to record.
    pub dest_tx_hash: Option<String>,
    /// Observed source chain to record.
    pub src_chain_id: Option<ChainId>,
    /// Paying address to record.
    pub source_address: Option<String>,
    /// Mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl IntentUpdate {
    /// An update that only moves the status.
    #[must_use]
    pub fn to_status(status: PaymentIntentStatus) -> Self {
        Self {
            status,
            src_tx_hash: None,
            dest_tx_hash: None,
            src_chain_id: None,
            source_address: None,
            updated_at: Utc::now(),
        }
    }
}

/// Result of a conditional transition attempt.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// The row matched a legal source status and was updated.
    Applied(PaymentIntent),
    /// No row exists for the intent id.
    NotFound,
    /// The row exists but its status was outside the legal set.
    Rejected(PaymentIntentStatus),
}

/// Durable storage for payment intents.
#[async_trait]
pub trait IntentStore: Send + Sync {
    /// Inserts a new intent row.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Storage`] on duplicate id or backend failure.
    async fn insert(&self, intent: &PaymentIntent) -> Result<(), PaymentError>;

    /// Fetches an intent by id.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Storage`] on backend failure.
    async fn get(&self, intent_id: &str) -> Result<Option<PaymentIntent>, PaymentError>;

    /// Applies `update` iff the row's current status is in `allowed_from`.
    ///
    /// The check and the write are one atomic step; two concurrent calls on
    /// the same intent serialize, and the loser observes the winner's status.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Storage`] on backend failure.
    async fn transition(
        &self,
        intent_id: &str,
        allowed_from: &[PaymentIntentStatus],
        update: IntentUpdate,
    ) -> Result<TransitionOutcome, PaymentError>;
}

/// In-memory [`IntentStore`] backed by a concurrent map.
///
/// Per-key locking in the map gives the conditional-update atomicity the
/// trait requires. Clones share the same underlying rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryIntentStore {
    intents: Arc<DashMap<String, PaymentIntent>>,
}

impl MemoryIntentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored intents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.intents.len()
    }

    /// Returns `true` if the store holds no intents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }
}

#[async_trait]
impl IntentStore for MemoryIntentStore {
    async fn insert(&self, intent: &PaymentIntent) -> Result<(), PaymentError> {
        match self.intents.entry(intent.intent_id.clone()) {
            Entry::Occupied(_) => Err(StorageError::new(format!(
                "duplicate intent id: {}",
                intent.intent_id
            ))
            .into()),
            Entry::Vacant(slot) => {
                slot.insert(intent.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, intent_id: &str) -> Result<Option<PaymentIntent>, PaymentError> {
        Ok(self.intents.get(intent_id).map(|row| row.value().clone()))
    }

    async fn transition(
        &self,
        intent_id: &str,
        allowed_from: &[PaymentIntentStatus],
        update: IntentUpdate,
    ) -> Result<TransitionOutcome, PaymentError> {
        let Some(mut row) = self.intents.get_mut(intent_id) else {
            return Ok(TransitionOutcome::NotFound);
        };
        if !allowed_from.contains(&row.status) {
            return Ok(TransitionOutcome::Rejected(row.status));
        }
        row.status = update.status;
        if let Some(hash) = update.src_tx_hash {
            row.src_tx_hash = Some(hash);
        }
        if let Some(hash) = update.dest_tx_hash {
            row.dest_tx_hash = Some(hash);
        }
        if let Some(chain_id) = update.src_chain_id {
            row.src_chain_id = chain_id;
        }
        if let Some(address) = update.source_address {
            row.source_address = Some(address);
        }
        row.updated_at = update.updated_at;
        Ok(TransitionOutcome::Applied(row.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payrail::chains::{BASE_MAINNET, BASE_SEPOLIA, ChainRegistry};
    use payrail::router::{RouterCallRequest, RouterEncoder};

    fn sample_intent(id: &str) -> PaymentIntent {
        let encoder = RouterEncoder::new(Arc::new(ChainRegistry::default()));
        let router = encoder
            .encode(&RouterCallRequest {
                recipient: alloy_primitives::address!(
                    "742d35cc6635c0532925a3b8d19dac9dd9bf1234"
                ),
                amount_minor: 990_000,
                src_chain_id: BASE_SEPOLIA,
                dest_chain_id: BASE_MAINNET,
                payment_id: id.to_owned(),
                bridge_address: None,
            })
            .unwrap();
        let now = Utc::now();
        PaymentIntent {
            intent_id: id.to_owned(),
            vendor_id: "v_123".to_owned(),
            product_id: "p_abc".to_owned(),
            customer_email: None,
            src_chain_id: BASE_SEPOLIA,
            dest_chain_id: BASE_MAINNET,
            amount_minor: 990_000,
            status: PaymentIntentStatus::AwaitingUserTx,
            router,
            src_tx_hash: None,
            dest_tx_hash: None,
            source_address: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let store = MemoryIntentStore::new();
        let intent = sample_intent("pi_000000000001");
        store.insert(&intent).await.unwrap();
        let first = store.get("pi_000000000001").await.unwrap().unwrap();
        let second = store.get("pi_000000000001").await.unwrap().unwrap();
        assert_eq!(first, intent);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_id() {
        let store = MemoryIntentStore::new();
        let intent = sample_intent("pi_000000000001");
        store.insert(&intent).await.unwrap();
        let err = store.insert(&intent).await.unwrap_err();
        assert!(matches!(err, PaymentError::Storage(_)));
    }

    #[tokio::test]
    async fn test_transition_applies_from_legal_status() {
        let store = MemoryIntentStore::new();
        store.insert(&sample_intent("pi_000000000001")).await.unwrap();

        let mut update = IntentUpdate::to_status(PaymentIntentStatus::Submitted);
        update.src_tx_hash = Some("0xabc".to_owned());
        let outcome = store
            .transition(
                "pi_000000000001",
                PaymentIntentStatus::submission_sources(),
                update,
            )
            .await
            .unwrap();

        let TransitionOutcome::Applied(intent) = outcome else {
            panic!("expected Applied, got {outcome:?}");
        };
        assert_eq!(intent.status, PaymentIntentStatus::Submitted);
        assert_eq!(intent.src_tx_hash.as_deref(), Some("0xabc"));
    }

    #[tokio::test]
    async fn test_transition_rejects_illegal_status() {
        let store = MemoryIntentStore::new();
        store.insert(&sample_intent("pi_000000000001")).await.unwrap();

        // First submission wins.
        store
            .transition(
                "pi_000000000001",
                PaymentIntentStatus::submission_sources(),
                IntentUpdate::to_status(PaymentIntentStatus::Submitted),
            )
            .await
            .unwrap();

        // A stale second submission observes the winner's status.
        let outcome = store
            .transition(
                "pi_000000000001",
                PaymentIntentStatus::submission_sources(),
                IntentUpdate::to_status(PaymentIntentStatus::Submitted),
            )
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            TransitionOutcome::Rejected(PaymentIntentStatus::Submitted)
        ));
    }

    #[tokio::test]
    async fn test_transition_unknown_id() {
        let store = MemoryIntentStore::new();
        let outcome = store
            .transition(
                "pi_missing",
                PaymentIntentStatus::submission_sources(),
                IntentUpdate::to_status(PaymentIntentStatus::Submitted),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, TransitionOutcome::NotFound));
    }

    #[tokio::test]
    async fn test_update_preserves_untouched_fields() {
        let store = MemoryIntentStore::new();
        store.insert(&sample_intent("pi_000000000001")).await.unwrap();

        let mut submit = IntentUpdate::to_status(PaymentIntentStatus::Submitted);
        submit.src_tx_hash = Some("0xsrc".to_owned());
        store
            .transition(
                "pi_000000000001",
                PaymentIntentStatus::submission_sources(),
                submit,
            )
            .await
            .unwrap();

        let mut settle = IntentUpdate::to_status(PaymentIntentStatus::Settled);
        settle.dest_tx_hash = Some("0xdest".to_owned());
        let outcome = store
            .transition(
                "pi_000000000001",
                PaymentIntentStatus::completion_sources(),
                settle,
            )
            .await
            .unwrap();

        let TransitionOutcome::Applied(intent) = outcome else {
            panic!("expected Applied");
        };
        assert_eq!(intent.src_tx_hash.as_deref(), Some("0xsrc"));
        assert_eq!(intent.dest_tx_hash.as_deref(), Some("0xdest"));
    }
}
