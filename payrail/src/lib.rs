#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the payrail payment-intent infrastructure.
//!
//! This crate provides the foundational types used throughout the payrail
//! workspace for accepting a crypto payment on one blockchain network and
//! settling it on another via a fixed on-chain router contract. It is pure
//! data and logic, with persistence and delivery provided by separate crates.
//!
//! # Overview
//!
//! A vendor exposes a product; a customer pays from any chain the vendor has
//! enabled. The service encodes the router-contract call the customer's
//! wallet must execute, tracks the payment intent through its lifecycle, and
//! notifies the vendor of each transition over webhooks.
//!
//! # Modules
//!
//! - [`chains`] - Registry of supported network configurations
//! - [`directory`] - Read-only vendor/product lookups and the event sink seam
//! - [`error`] - Tagged error taxonomy shared by all payrail crates
//! - [`events`] - Webhook event types and wire payloads
//! - [`intent`] - Payment-intent model and its status machine
//! - [`router`] - Router-contract calldata encoding

pub mod chains;
pub mod directory;
pub mod error;
pub mod events;
pub mod intent;
pub mod router;
