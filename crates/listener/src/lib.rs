//! JobRelay trigger event source infrastructure.
//!
//! Supplies [`trigger::Envelope`]s to the dispatcher and owns the
//! acknowledgement decision for each of them:
//!
//! - [`ChannelEnvelope`]: an in-memory envelope whose acknowledgement is
//!   delivered through a oneshot channel. Used for local queues and tests, and
//!   as the envelope behind every push request.
//!
//! - [`push::router`]: an HTTP endpoint receiving push deliveries
//!   (`POST /push/{subscription}`) in the common push-subscription JSON shape:
//!   `{"message": {"attributes": {...}, "data": "<base64>", "messageId": "..."}}`.
//!   Acknowledgement maps to `204 No Content`, rejection to `503`.
//!
//! - [`SubscriptionWorker`]: binds one subscription's settings to the
//!   dispatcher and processes envelopes, one task per envelope, bounded by the
//!   subscription's `max_in_flight`.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Transport details and message decoding all live here.
//! The dispatcher sees only [`trigger::Envelope`].

pub mod envelope;
pub mod push;
pub mod worker;

#[cfg(test)]
mod testing;

pub use envelope::{ChannelEnvelope, Disposition};
pub use push::router;
pub use worker::SubscriptionWorker;
