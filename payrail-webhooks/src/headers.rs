//! Delivery header names for outbound webhook requests.
//!
//! Every delivery carries the event type, vendor id, and event timestamp so
//! endpoints can route and deduplicate without parsing the body. A signature
//! header name is reserved; it is not yet populated, so payload integrity is
//! not guaranteed to receivers.

/// Header carrying the event type (e.g., `payment_intent.created`).
pub const EVENT_TYPE_HEADER: &str = "x-payrail-event";

/// Header carrying the vendor id the event belongs to.
pub const VENDOR_ID_HEADER: &str = "x-payrail-vendor-id";

/// Header carrying the event timestamp (RFC3339).
pub const TIMESTAMP_HEADER: &str = "x-payrail-timestamp";

/// Reserved header for an HMAC payload signature. Not yet populated.
pub const SIGNATURE_HEADER: &str = "x-payrail-signature";

/// User-agent string sent with every delivery.
pub const USER_AGENT: &str = concat!("payrail-webhooks/", env!("CARGO_PKG_VERSION"));
