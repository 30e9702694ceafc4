#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Payment-intent state machine for the payrail infrastructure.
//!
//! This crate orchestrates the lifecycle of a payment intent: creation with
//! router calldata, source-transaction reporting, and settlement/failure
//! completion. Every transition is a conditional update keyed by the legal
//! source statuses, executed atomically per row by the [`store`], so
//! concurrent requests on the same intent cannot clobber each other.
//!
//! Domain events are handed to a [`payrail::directory::EventSink`] after each
//! committed transition; delivery failures never reach the caller.
//!
//! The [`subscriptions`] module layers recurring billing on top: renewing a
//! subscription creates a fresh intent for the cycle's charge and emits a
//! `subscription.renewed` webhook obligation.

pub mod service;
pub mod store;
pub mod subscriptions;

pub use service::{CompleteTransactionRequest, CreateIntentRequest, IntentService};
pub use store::{IntentStore, IntentUpdate, MemoryIntentStore, TransitionOutcome};
pub use subscriptions::{
    BillingInterval, CreateSubscriptionRequest, MemorySubscriptionStore, Subscription,
    SubscriptionRenewal, SubscriptionService, SubscriptionStatus, SubscriptionStore,
};
