#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Durable webhook delivery engine for the payrail infrastructure.
//!
//! Guarantees an at-least-once delivery attempt of each domain notification
//! to a vendor-configured HTTP endpoint, bounded by a maximum attempt count
//! and exponential backoff. The triggering domain operation never waits on
//! vendor network I/O: the first attempt runs on a spawned task, and an
//! out-of-band poll sweep retries whatever that push could not deliver.
//!
//! # Modules
//!
//! - [`engine`] - The delivery engine and its configuration
//! - [`event`] - Durable webhook event records
//! - [`headers`] - Delivery header names
//! - [`store`] - Persistence abstraction for webhook events

pub mod engine;
pub mod event;
pub mod headers;
pub mod store;

pub use engine::{DeliveryError, DeliveryOutcome, WebhookConfig, WebhookEngine};
pub use event::{WebhookEvent, WebhookStatus};
pub use store::{MemoryWebhookStore, WebhookStore};
