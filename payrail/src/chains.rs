//! Registry of supported network configurations.
//!
//! Each supported network carries the fixed router contract deployed on it,
//! the settlement-token (USDC) deployment, a gas-limit estimate for router
//! calls, and the bridge fee charged when a payment crosses chains.
//!
//! The registry is built once at process start and injected by reference into
//! the calldata encoder and the intent service; it is never ambient global
//! state, so tests can substitute alternate registries.

use std::collections::{BTreeSet, HashMap};

use alloy_primitives::{Address, address};
use serde::{Deserialize, Serialize};

/// An EVM-style numeric chain identifier.
pub type ChainId = u64;

/// Ethereum Mainnet chain ID.
pub const ETHEREUM_MAINNET: ChainId = 1;

/// Optimism Mainnet chain ID.
pub const OPTIMISM_MAINNET: ChainId = 10;

/// Polygon Mainnet chain ID.
pub const POLYGON_MAINNET: ChainId = 137;

/// Base Mainnet chain ID.
pub const BASE_MAINNET: ChainId = 8453;

/// Arbitrum One chain ID.
pub const ARBITRUM_ONE: ChainId = 42161;

/// Base Sepolia (testnet) chain ID.
pub const BASE_SEPOLIA: ChainId = 84532;

/// Router contract address on Ethereum Mainnet.
pub const ROUTER_ETHEREUM: Address = address!("1234567890123456789012345678901234567890");

/// Router contract address on Base Mainnet.
pub const ROUTER_BASE: Address = address!("2345678901234567890123456789012345678901");

/// Router contract address on Base Sepolia.
pub const ROUTER_BASE_SEPOLIA: Address = address!("3456789012345678901234567890123456789012");

/// Router contract address on Optimism.
pub const ROUTER_OPTIMISM: Address = address!("4567890123456789012345678901234567890123");

/// Router contract address on Arbitrum One.
pub const ROUTER_ARBITRUM: Address = address!("5678901234567890123456789012345678901234");

/// Router contract address on Polygon.
pub const ROUTER_POLYGON: Address = address!("6789012345678901234567890123456789012345");

/// USDC contract address on Ethereum Mainnet.
pub const USDC_ETHEREUM: Address = address!("a0b86a33e6c617ad208c59e7c7f8c48e9b1b3b2c");

/// USDC contract address on Base Mainnet.
pub const USDC_BASE: Address = address!("833589fcd6edb6e08f4c7c32d4f71b54bda02913");

/// USDC contract address on Base Sepolia.
pub const USDC_BASE_SEPOLIA: Address = address!("036cbd53842c5426634e7929541ec2318f3dcf7e");

/// USDC contract address on Optimism.
pub const USDC_OPTIMISM: Address = address!("0b2c639c533813f4aa9d7837caf62653d097ff85");

/// USDC contract address on Arbitrum One.
pub const USDC_ARBITRUM: Address = address!("af88d065e77c8cc2239327c5edb3a432268e5831");

/// USDC contract address on Polygon.
pub const USDC_POLYGON: Address = address!("2791bca1f2de4661ed88a30c99a7a9449aa84174");

/// Basis-point denominator for fee math.
const BPS_DENOMINATOR: u128 = 10_000;

/// Configuration for one supported network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Numeric chain identifier.
    pub chain_id: ChainId,
    /// Human-readable network name (e.g., `"Base"`).
    pub name: String,
    /// Address of the fixed router contract on this network.
    pub router_address: Address,
    /// Address of the settlement-token (USDC) deployment on this network.
    pub token_address: Address,
    /// Gas-limit estimate for a router call on this network.
    pub gas_limit: u64,
    /// Bridge fee in basis points, charged when the destination chain differs.
    pub bridge_fee_bps: u32,
}

/// Returns configurations for all networks supported out of the box:
/// Ethereum, four L2/sidechains, and one testnet.
#[must_use]
pub fn known_chains() -> Vec<ChainConfig> {
    vec![
        ChainConfig {
            chain_id: ETHEREUM_MAINNET,
            name: "Ethereum".to_owned(),
            router_address: ROUTER_ETHEREUM,
            token_address: USDC_ETHEREUM,
            gas_limit: 300_000,
            bridge_fee_bps: 5,
        },
        ChainConfig {
            chain_id: BASE_MAINNET,
            name: "Base".to_owned(),
            router_address: ROUTER_BASE,
            token_address: USDC_BASE,
            gas_limit: 250_000,
            bridge_fee_bps: 3,
        },
        ChainConfig {
            chain_id: BASE_SEPOLIA,
            name: "Base Sepolia".to_owned(),
            router_address: ROUTER_BASE_SEPOLIA,
            token_address: USDC_BASE_SEPOLIA,
            gas_limit: 250_000,
            bridge_fee_bps: 5,
        },
        ChainConfig {
            chain_id: OPTIMISM_MAINNET,
            name: "Optimism".to_owned(),
            router_address: ROUTER_OPTIMISM,
            token_address: USDC_OPTIMISM,
            gas_limit: 200_000,
            bridge_fee_bps: 4,
        },
        ChainConfig {
            chain_id: ARBITRUM_ONE,
            name: "Arbitrum".to_owned(),
            router_address: ROUTER_ARBITRUM,
            token_address: USDC_ARBITRUM,
            gas_limit: 180_000,
            bridge_fee_bps: 3,
        },
        ChainConfig {
            chain_id: POLYGON_MAINNET,
            name: "Polygon".to_owned(),
            router_address: ROUTER_POLYGON,
            token_address: USDC_POLYGON,
            gas_limit: 150_000,
            bridge_fee_bps: 6,
        },
    ]
}

/// Immutable registry of supported networks, keyed by chain ID.
///
/// Built from one or more [`ChainConfig`] values at startup. This is the
/// single source of truth for chain support, router addresses, gas limits,
/// and bridge-fee rates.
///
/// # Example
///
/// ```
/// use payrail::chains::{BASE_SEPOLIA, ChainRegistry};
///
/// let registry = ChainRegistry::default();
/// assert!(registry.validate_pair(BASE_SEPOLIA, BASE_SEPOLIA));
/// assert_eq!(registry.bridge_fee(990_000, BASE_SEPOLIA), 495);
/// ```
#[derive(Debug, Clone)]
pub struct ChainRegistry {
    configs: HashMap<ChainId, ChainConfig>,
}

impl ChainRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            configs: HashMap::new(),
        }
    }

    /// Creates a registry pre-populated from a configuration slice.
    #[must_use]
    pub fn from_configs(configs: impl IntoIterator<Item = ChainConfig>) -> Self {
        let mut registry = Self::new();
        registry.register(configs);
        registry
    }

    /// Registers additional networks into this registry.
    ///
    /// A configuration with an already-registered chain ID replaces the
    /// earlier entry.
    pub fn register(&mut self, configs: impl IntoIterator<Item = ChainConfig>) {
        for config in configs {
            self.configs.insert(config.chain_id, config);
        }
    }

    /// Builder-style method: registers an additional network and returns `self`.
    #[must_use]
    pub fn with_config(mut self, config: ChainConfig) -> Self {
        self.register([config]);
        self
    }

    /// Looks up the configuration for a chain, if supported.
    #[must_use]
    pub fn get(&self, chain_id: ChainId) -> Option<&ChainConfig> {
        self.configs.get(&chain_id)
    }

    /// Returns the IDs of all supported chains, in ascending order.
    #[must_use]
    pub fn supported_chains(&self) -> BTreeSet<ChainId> {
        self.configs.keys().copied().collect()
    }

    /// Returns `true` iff both chains are supported.
    ///
    /// Same-chain pairs are valid; a direct payment simply carries no bridge
    /// fee.
    #[must_use]
    pub fn validate_pair(&self, src_chain_id: ChainId, dest_chain_id: ChainId) -> bool {
        self.configs.contains_key(&src_chain_id) && self.configs.contains_key(&dest_chain_id)
    }

    /// Computes the bridge fee in minor units for a payment leaving
    /// `src_chain_id`: `floor(amount * fee_bps / 10000)`.
    ///
    /// Returns 0 for an unknown chain.
    #[must_use]
    pub fn bridge_fee(&self, amount_minor: u64, src_chain_id: ChainId) -> u64 {
        let Some(config) = self.configs.get(&src_chain_id) else {
            return 0;
        };
        let fee = u128::from(amount_minor) * u128::from(config.bridge_fee_bps) / BPS_DENOMINATOR;
        // amount * bps / 10000 <= amount, so the narrowing cannot lose bits.
        u64::try_from(fee).unwrap_or(u64::MAX)
    }

    /// Returns the number of registered networks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    /// Returns `true` if no networks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

impl Default for ChainRegistry {
    /// A registry holding [`known_chains`].
    fn default() -> Self {
        Self::from_configs(known_chains())
    }
}
