//! Router-contract calldata encoding.
//!
//! Produces the exact byte layout the on-chain payment router expects, as a
//! `0x`-prefixed lowercase hex string: a 4-byte function selector followed by
//! one left-zero-padded 32-byte segment per parameter, in declaration order.
//!
//! The encoder is a pure function of its typed request: identical inputs
//! always yield an identical calldata string, with no hidden state and no
//! I/O. Chain data (router address, gas limit, fee rate) comes from an
//! injected [`ChainRegistry`].

use std::fmt;
use std::sync::Arc;

use alloy_primitives::{Address, hex};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::chains::{ChainId, ChainRegistry};
use crate::error::{PaymentError, ValidationError};

/// Selector for `createPayment(address,uint256,uint32,uint32,bytes32)`.
pub const CREATE_PAYMENT_SELECTOR: &str = "a9059cbb";

/// Selector for `bridgePayment(address,uint256,uint32,uint32,address,bytes32)`.
pub const BRIDGE_PAYMENT_SELECTOR: &str = "23b872dd";

/// Selector for `batchPayment(address[],uint256[],uint32,uint32,bytes32)`.
pub const BATCH_PAYMENT_SELECTOR: &str = "18160ddd";

/// A function of the router-contract interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouterFunction {
    /// Direct payment on a single chain.
    CreatePayment,
    /// Cross-chain payment routed through a bridge.
    BridgePayment,
    /// Payment to multiple recipients in one transaction. Present in the
    /// contract interface; not reached by any intent lifecycle path.
    BatchPayment,
}

impl RouterFunction {
    /// Returns the function name as declared in the contract interface.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreatePayment => "createPayment",
            Self::BridgePayment => "bridgePayment",
            Self::BatchPayment => "batchPayment",
        }
    }

    /// Returns the 4-byte selector as 8 lowercase hex chars.
    #[must_use]
    pub const fn selector(&self) -> &'static str {
        match self {
            Self::CreatePayment => CREATE_PAYMENT_SELECTOR,
            Self::BridgePayment => BRIDGE_PAYMENT_SELECTOR,
            Self::BatchPayment => BATCH_PAYMENT_SELECTOR,
        }
    }

    /// Looks up a function by its declared name.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for a name outside the interface.
    pub fn from_name(name: &str) -> Result<Self, ValidationError> {
        match name {
            "createPayment" => Ok(Self::CreatePayment),
            "bridgePayment" => Ok(Self::BridgePayment),
            "batchPayment" => Ok(Self::BatchPayment),
            other => Err(ValidationError::new(format!(
                "unknown router function: {other}"
            ))),
        }
    }

    /// Selects the function for a payment: same-chain pairs use
    /// `createPayment`, cross-chain pairs use `bridgePayment`.
    #[must_use]
    pub fn select(src_chain_id: ChainId, dest_chain_id: ChainId) -> Self {
        if src_chain_id == dest_chain_id {
            Self::CreatePayment
        } else {
            Self::BridgePayment
        }
    }
}

impl fmt::Display for RouterFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Digests a payment identifier into the 32-byte `paymentId` parameter.
///
/// The algorithm a deployed router's verifier expects is not pinned down, so
/// the hash is pluggable rather than hard-coded; [`Sha256IdHasher`] is the
/// default.
pub trait PaymentIdHasher: Send + Sync {
    /// Returns the 32-byte digest of the identifier's UTF-8 bytes.
    fn digest(&self, payment_id: &str) -> [u8; 32];
}

/// SHA-256 based [`PaymentIdHasher`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256IdHasher;

impl PaymentIdHasher for Sha256IdHasher {
    fn digest(&self, payment_id: &str) -> [u8; 32] {
        Sha256::digest(payment_id.as_bytes()).into()
    }
}

/// Strongly-typed, already-validated input to [`RouterEncoder::encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterCallRequest {
    /// Destination wallet receiving the settlement.
    pub recipient: Address,
    /// Payment amount in settlement-token minor units.
    pub amount_minor: u64,
    /// Chain the customer pays from.
    pub src_chain_id: ChainId,
    /// Chain the vendor receives on.
    pub dest_chain_id: ChainId,
    /// Payment-intent identifier encoded into the `paymentId` parameter.
    pub payment_id: String,
    /// Bridge contract override for cross-chain payments; the zero address
    /// when unset, letting the router pick its default bridge.
    pub bridge_address: Option<Address>,
}

/// Cost breakdown for executing a router call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Gas limit for the router call on the source chain.
    pub gas_limit: u64,
    /// Bridge fee in minor units (0 for same-chain payments).
    pub bridge_fee_minor: u64,
    /// Amount plus bridge fee, in minor units.
    pub total_minor: u64,
}

/// The router payload a client executes, captured on the payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterCall {
    /// Router contract address on the source chain.
    pub address: Address,
    /// Chain the transaction must be executed on.
    pub chain_id: ChainId,
    /// Router function name to call.
    pub function: String,
    /// `0x`-prefixed lowercase hex calldata.
    pub calldata: String,
    /// Gas limit for the call.
    pub gas_limit: u64,
    /// Bridge fee in minor units (0 for same-chain payments).
    pub bridge_fee_minor: u64,
    /// Full cost breakdown.
    pub cost: CostEstimate,
}

/// Summary of one side of a payment for cost estimation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSummary {
    /// Numeric chain identifier.
    pub chain_id: ChainId,
    /// Human-readable network name.
    pub name: String,
    /// Gas limit for router calls on this chain.
    pub gas_limit: u64,
    /// Bridge fee rate in basis points.
    pub bridge_fee_bps: u32,
}

/// Cost estimation for a prospective payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEstimate {
    /// Source-chain summary.
    pub src_chain: ChainSummary,
    /// Destination-chain summary.
    pub dest_chain: ChainSummary,
    /// Bridge fee in minor units (0 for same-chain payments).
    pub bridge_fee_minor: u64,
    /// Amount plus bridge fee, in minor units.
    pub total_minor: u64,
    /// Whether the payment crosses chains.
    pub is_cross_chain: bool,
}

/// Pure encoder producing router call payloads from typed requests.
#[derive(Clone)]
pub struct RouterEncoder {
    registry: Arc<ChainRegistry>,
    hasher: Arc<dyn PaymentIdHasher>,
}

impl fmt::Debug for RouterEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterEncoder")
            .field("chains", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl RouterEncoder {
    /// Creates an encoder over the given registry with the default SHA-256
    /// payment-id hasher.
    #[must_use]
    pub fn new(registry: Arc<ChainRegistry>) -> Self {
        Self {
            registry,
            hasher: Arc::new(Sha256IdHasher),
        }
    }

    /// Replaces the payment-id hasher.
    #[must_use]
    pub fn with_hasher(mut self, hasher: Arc<dyn PaymentIdHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Encodes the router call for a payment.
    ///
    /// Same-chain requests encode `createPayment`; cross-chain requests
    /// encode `bridgePayment` and carry the bridge fee for the source chain.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Validation`] if the source chain is not in the
    /// registry.
    pub fn encode(&self, request: &RouterCallRequest) -> Result<RouterCall, PaymentError> {
        let src = self.registry.get(request.src_chain_id).ok_or_else(|| {
            ValidationError::new(format!(
                "unsupported source chain: {}",
                request.src_chain_id
            ))
        })?;

        let function = RouterFunction::select(request.src_chain_id, request.dest_chain_id);
        let bridge_fee_minor = match function {
            RouterFunction::CreatePayment => 0,
            _ => self
                .registry
                .bridge_fee(request.amount_minor, request.src_chain_id),
        };

        let mut calldata = String::with_capacity(2 + 8 + 6 * 64);
        calldata.push_str("0x");
        calldata.push_str(function.selector());
        calldata.push_str(&encode_address(request.recipient));
        calldata.push_str(&encode_u64(request.amount_minor));
        calldata.push_str(&encode_u64(request.src_chain_id));
        calldata.push_str(&encode_u64(request.dest_chain_id));
        if function == RouterFunction::BridgePayment {
            calldata.push_str(&encode_address(
                request.bridge_address.unwrap_or(Address::ZERO),
            ));
        }
        calldata.push_str(&self.encode_payment_id(&request.payment_id));

        let cost = CostEstimate {
            gas_limit: src.gas_limit,
            bridge_fee_minor,
            total_minor: request.amount_minor + bridge_fee_minor,
        };

        Ok(RouterCall {
            address: src.router_address,
            chain_id: request.src_chain_id,
            function: function.name().to_owned(),
            calldata,
            gas_limit: src.gas_limit,
            bridge_fee_minor,
            cost,
        })
    }

    /// Estimates gas and fees for a prospective payment without encoding it.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Validation`] if either chain is unsupported.
    pub fn estimate(
        &self,
        src_chain_id: ChainId,
        dest_chain_id: ChainId,
        amount_minor: u64,
    ) -> Result<PaymentEstimate, PaymentError> {
        let src = self
            .registry
            .get(src_chain_id)
            .ok_or_else(|| ValidationError::new(format!("unsupported chain: {src_chain_id}")))?;
        let dest = self
            .registry
            .get(dest_chain_id)
            .ok_or_else(|| ValidationError::new(format!("unsupported chain: {dest_chain_id}")))?;

        let is_cross_chain = src_chain_id != dest_chain_id;
        let bridge_fee_minor = if is_cross_chain {
            self.registry.bridge_fee(amount_minor, src_chain_id)
        } else {
            0
        };

        Ok(PaymentEstimate {
            src_chain: summarize(src),
            dest_chain: summarize(dest),
            bridge_fee_minor,
            total_minor: amount_minor + bridge_fee_minor,
            is_cross_chain,
        })
    }

    /// Encodes the `bytes32 paymentId` segment.
    ///
    /// A value that is already 32 bytes of hex (with or without `0x` prefix)
    /// passes through lowercased; anything else is digested by the
    /// configured hasher.
    fn encode_payment_id(&self, payment_id: &str) -> String {
        let bare = payment_id.strip_prefix("0x").unwrap_or(payment_id);
        if bare.len() == 64 && bare.bytes().all(|b| b.is_ascii_hexdigit()) {
            return bare.to_ascii_lowercase();
        }
        hex::encode(self.hasher.digest(payment_id))
    }
}

/// Encodes an address as a left-zero-padded 32-byte hex segment.
fn encode_address(address: Address) -> String {
    format!("{:0>64}", hex::encode(address))
}

/// Encodes an unsigned integer as a left-zero-padded 32-byte hex segment.
fn encode_u64(value: u64) -> String {
    format!("{value:064x}")
}

fn summarize(config: &crate::chains::ChainConfig) -> ChainSummary {
    ChainSummary {
        chain_id: config.chain_id,
        name: config.name.clone(),
        gas_limit: config.gas_limit,
        bridge_fee_bps: config.bridge_fee_bps,
    }
}
