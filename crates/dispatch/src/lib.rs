//! JobRelay dispatcher.
//!
//! This crate provides the [`Dispatcher`], which drives one delivered message
//! from transport attributes to a submitted and reported job, and
//! [`OtelDispatchMetrics`], the OpenTelemetry-backed message counters.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** The dispatcher sequences calls between business
//! logic in the [`trigger`] crate (decoding, resolution, job building) and the
//! port traits implemented by infrastructure crates (catalog, submission sink,
//! status reporter). It contains no resolution rules of its own.

pub mod dispatcher;
pub mod metrics;

pub use dispatcher::Dispatcher;
pub use metrics::OtelDispatchMetrics;
