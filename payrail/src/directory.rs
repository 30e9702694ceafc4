//! Read-only vendor/product lookups and the event sink seam.
//!
//! Vendor and product records are owned by external CRUD services; payrail
//! only reads them. The traits here are the seams those services plug into,
//! with in-memory implementations for wiring and tests.
//!
//! [`EventSink`] is the outbound seam: the intent service hands structured
//! domain events to it after each committed transition, and the webhook
//! delivery engine is its production implementation. Publishing must never
//! fail the triggering domain operation, so the sink is infallible at this
//! boundary and isolates its own errors.

use std::collections::HashMap;

use alloy_primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::chains::ChainId;
use crate::error::PaymentError;
use crate::events::{WebhookEventType, WebhookPayload};

/// A vendor as seen by payrail: payout and notification preferences only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorRecord {
    /// Unique vendor identifier.
    pub vendor_id: String,
    /// Wallet receiving settlements.
    pub wallet_address: Address,
    /// Chain the vendor prefers to receive on.
    pub preferred_dest_chain_id: ChainId,
    /// Chains customers may pay from.
    pub enabled_source_chains: Vec<ChainId>,
    /// Endpoint for webhook notifications; absent means the vendor opted out.
    pub webhook_url: Option<Url>,
}

/// A product as seen by payrail: ownership and default price only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Unique product identifier.
    pub product_id: String,
    /// Owning vendor.
    pub vendor_id: String,
    /// Default price in settlement-token minor units, if one is set.
    pub default_amount_minor: Option<u64>,
}

/// Read-only vendor lookup.
#[async_trait]
pub trait VendorDirectory: Send + Sync {
    /// Fetches a vendor by id, or `None` if unknown.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Storage`] if the backing store fails.
    async fn vendor(&self, vendor_id: &str) -> Result<Option<VendorRecord>, PaymentError>;
}

/// Read-only product lookup.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Fetches a product by id, or `None` if unknown.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Storage`] if the backing store fails.
    async fn product(&self, product_id: &str) -> Result<Option<ProductRecord>, PaymentError>;
}

/// Receiver of domain events produced by intent transitions.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Accepts one domain event for delivery.
    ///
    /// Implementations isolate their own failures; a broken vendor endpoint
    /// must never surface here.
    async fn publish(&self, vendor_id: &str, event_type: WebhookEventType, payload: WebhookPayload);
}

/// In-memory [`VendorDirectory`] backed by a map, for wiring and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryVendorDirectory {
    vendors: HashMap<String, VendorRecord>,
}

impl MemoryVendorDirectory {
    /// Builds a directory from a collection of vendor records.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = VendorRecord>) -> Self {
        Self {
            vendors: records
                .into_iter()
                .map(|v| (v.vendor_id.clone(), v))
                .collect(),
        }
    }
}

#[async_trait]
impl VendorDirectory for MemoryVendorDirectory {
    async fn vendor(&self, vendor_id: &str) -> Result<Option<VendorRecord>, PaymentError> {
        Ok(self.vendors.get(vendor_id).cloned())
    }
}

/// In-memory [`ProductCatalog`] backed by a map, for wiring and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryProductCatalog {
    products: HashMap<String, ProductRecord>,
}

impl MemoryProductCatalog {
    /// Builds a catalog from a collection of product records.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = ProductRecord>) -> Self {
        Self {
            products: records
                .into_iter()
                .map(|p| (p.product_id.clone(), p))
                .collect(),
        }
    }
}

#[async_trait]
impl ProductCatalog for MemoryProductCatalog {
    async fn product(&self, product_id: &str) -> Result<Option<ProductRecord>, PaymentError> {
        Ok(self.products.get(product_id).cloned())
    }
}

/// An [`EventSink`] that drops every event, for tests and tooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn publish(
        &self,
        _vendor_id: &str,
        _event_type: WebhookEventType,
        _payload: WebhookPayload,
    ) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    fn vendor() -> VendorRecord {
        VendorRecord {
            vendor_id: "v_123".to_owned(),
            wallet_address: address!("742d35cc6635c0532925a3b8d19dac9dd9bf1234"),
            preferred_dest_chain_id: 8453,
            enabled_source_chains: vec![1, 8453, 84532],
            webhook_url: Some("https://api.acme.example/webhooks".parse().unwrap()),
        }
    }

    #[tokio::test]
    async fn test_memory_directory_lookup() {
        let directory = MemoryVendorDirectory::from_records([vendor()]);
        assert!(directory.vendor("v_123").await.unwrap().is_some());
        assert!(directory.vendor("v_missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_catalog_lookup() {
        let catalog = MemoryProductCatalog::from_records([ProductRecord {
            product_id: "p_abc".to_owned(),
            vendor_id: "v_123".to_owned(),
            default_amount_minor: Some(990_000),
        }]);
        let product = catalog.product("p_abc").await.unwrap().unwrap();
        assert_eq!(product.default_amount_minor, Some(990_000));
    }
}
