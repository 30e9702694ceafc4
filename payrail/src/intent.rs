//! Payment-intent model and its status machine.
//!
//! A payment intent tracks one attempted cross-chain payment. Its status
//! moves monotonically through the lifecycle below; the transition table on
//! [`PaymentIntentStatus`] is the single source of truth, and every mutation
//! is applied as a conditional update keyed by the legal source statuses so
//! concurrent requests cannot clobber each other.
//!
//! ```text
//! created ──► awaiting_user_tx ──► submitted ──► settled
//!    │                                 │            ▲
//!    │                                 ▼            │
//!    └───────────────────────────► failed ──────────┘
//!                                    │ ▲
//!                                    └─┘ (retry with the same intent id)
//! ```
//!
//! Intents are never deleted; settled and failed rows remain as the audit
//! trail, with `failed` re-enterable for one more attempt under the same id.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::chains::ChainId;
use crate::router::RouterCall;

/// Lifecycle status of a [`PaymentIntent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentIntentStatus {
    /// Intent row exists; calldata is ready but not yet handed to a client.
    Created,
    /// Returned to the client; waiting for the wallet to broadcast.
    AwaitingUserTx,
    /// Client reported the source transaction hash.
    Submitted,
    /// Funds confirmed on the destination chain.
    Settled,
    /// The payment attempt failed; the intent may be retried.
    Failed,
}

impl PaymentIntentStatus {
    /// Returns the wire-format name of this status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::AwaitingUserTx => "awaiting_user_tx",
            Self::Submitted => "submitted",
            Self::Settled => "settled",
            Self::Failed => "failed",
        }
    }

    /// Returns `true` if `next` is a legal successor of this status.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Created => matches!(next, Self::AwaitingUserTx | Self::Settled | Self::Failed),
            Self::AwaitingUserTx => matches!(next, Self::Submitted),
            Self::Submitted | Self::Failed => matches!(next, Self::Settled | Self::Failed),
            Self::Settled => false,
        }
    }

    /// Returns `true` for statuses that end the lifecycle.
    ///
    /// `failed` is terminal for reporting purposes but remains re-enterable
    /// through [`Self::completion_sources`].
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Settled | Self::Failed)
    }

    /// Statuses from which a source-transaction report is legal.
    #[must_use]
    pub const fn submission_sources() -> &'static [Self] {
        &[Self::AwaitingUserTx]
    }

    /// Statuses from which a transaction completion is legal.
    ///
    /// `created` permits direct completion, `submitted` is the normal path,
    /// and `failed` permits a retry with a fresh transaction under the same
    /// intent id.
    #[must_use]
    pub const fn completion_sources() -> &'static [Self] {
        &[Self::Created, Self::Submitted, Self::Failed]
    }
}

impl fmt::Display for PaymentIntentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tracked record of one attempted cross-chain payment.
///
/// The router payload is captured at creation and never recomputed: the
/// calldata a client executes is exactly the calldata the intent stored.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Unique intent identifier (`pi_` + 12 hex chars).
    pub intent_id: String,
    /// Owning vendor.
    pub vendor_id: String,
    /// Product being paid for.
    pub product_id: String,
    /// Customer contact, when supplied at creation.
    pub customer_email: Option<String>,
    /// Chain the customer pays from.
    pub src_chain_id: ChainId,
    /// Chain the vendor receives on.
    pub dest_chain_id: ChainId,
    /// Amount in settlement-token minor units; always positive.
    pub amount_minor: u64,
    /// Current lifecycle status.
    pub status: PaymentIntentStatus,
    /// Router payload captured at creation.
    pub router: RouterCall,
    /// Source-chain transaction hash, once reported.
    pub src_tx_hash: Option<String>,
    /// Destination-chain transaction hash, once settled.
    pub dest_tx_hash: Option<String>,
    /// Address the payment was made from, once reported.
    pub source_address: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last mutation.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [PaymentIntentStatus; 5] = [
        PaymentIntentStatus::Created,
        PaymentIntentStatus::AwaitingUserTx,
        PaymentIntentStatus::Submitted,
        PaymentIntentStatus::Settled,
        PaymentIntentStatus::Failed,
    ];

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&PaymentIntentStatus::AwaitingUserTx).unwrap();
        assert_eq!(json, "\"awaiting_user_tx\"");
        let status: PaymentIntentStatus = serde_json::from_str("\"settled\"").unwrap();
        assert_eq!(status, PaymentIntentStatus::Settled);
    }

    #[test]
    fn test_created_reaches_awaiting_and_direct_completion() {
        let from = PaymentIntentStatus::Created;
        assert!(from.can_transition_to(PaymentIntentStatus::AwaitingUserTx));
        assert!(from.can_transition_to(PaymentIntentStatus::Settled));
        assert!(from.can_transition_to(PaymentIntentStatus::Failed));
        assert!(!from.can_transition_to(PaymentIntentStatus::Submitted));
        assert!(!from.can_transition_to(PaymentIntentStatus::Created));
    }

    #[test]
    fn test_awaiting_reaches_only_submitted() {
        let from = PaymentIntentStatus::AwaitingUserTx;
        for next in ALL {
            assert_eq!(
                from.can_transition_to(next),
                next == PaymentIntentStatus::Submitted
            );
        }
    }

    #[test]
    fn test_submitted_reaches_only_outcomes() {
        let from = PaymentIntentStatus::Submitted;
        for next in ALL {
            assert_eq!(from.can_transition_to(next), next.is_terminal());
        }
    }

    #[test]
    fn test_failed_is_reenterable() {
        let from = PaymentIntentStatus::Failed;
        assert!(from.can_transition_to(PaymentIntentStatus::Settled));
        assert!(from.can_transition_to(PaymentIntentStatus::Failed));
        assert!(!from.can_transition_to(PaymentIntentStatus::AwaitingUserTx));
        assert!(!from.can_transition_to(PaymentIntentStatus::Submitted));
    }

    #[test]
    fn test_settled_is_final() {
        for next in ALL {
            assert!(!PaymentIntentStatus::Settled.can_transition_to(next));
        }
    }

    #[test]
    fn test_operation_sources_agree_with_transition_table() {
        for from in PaymentIntentStatus::submission_sources() {
            assert!(from.can_transition_to(PaymentIntentStatus::Submitted));
        }
        for from in PaymentIntentStatus::completion_sources() {
            assert!(from.can_transition_to(PaymentIntentStatus::Settled));
            assert!(from.can_transition_to(PaymentIntentStatus::Failed));
        }
    }
}
