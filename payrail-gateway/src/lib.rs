#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Payrail payment-intent gateway.
//!
//! Thin HTTP shell over the intent service and webhook delivery engine:
//! handlers decode requests, call the services, and map domain errors to
//! status codes. All business logic lives in the service crates.

pub mod config;
pub mod error;
pub mod handlers;
