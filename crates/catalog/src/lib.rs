//! JobRelay configuration and static job catalog.
//!
//! Implements the [`trigger::CatalogProvider`] port over a YAML file that
//! holds both the subscription settings and the static job catalog:
//!
//! ```yaml
//! subscriptions:
//!   - name: ci-triggers
//!     allowed_clusters: ["*"]
//!     max_in_flight: 16
//! periodics:
//!   - name: nightly-build
//!     cluster: build
//! presubmits:
//!   k8s/api:
//!     - name: unit-tests
//!       cluster: ci
//!       branches: [main]
//! postsubmits: {}
//! ```
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** File I/O, YAML parsing and reload scheduling live here.
//! The dispatcher only ever sees [`trigger::CatalogProvider`] snapshots.
//!
//! Subscriptions are read once at start-up. Only the job catalog is reloaded.

pub mod config;
pub mod shared;
pub mod static_catalog;

pub use config::{ConfigError, RelayConfig, SubscriptionConfig};
pub use shared::SharedCatalog;
pub use static_catalog::StaticCatalog;
