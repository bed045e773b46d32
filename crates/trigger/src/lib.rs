//! Core domain for JobRelay.
//!
//! This crate contains every domain concept used to turn an inbound "run job X"
//! event into a fully-specified job: the trigger event and its payload codec,
//! catalog job definitions, the resolved and submitted job shapes, the
//! job-class resolvers, and the port traits infrastructure crates implement.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype domain identifiers (`JobRunId`, `OrgRepo`, etc.) |
//! | [`event`] | [`TriggerEvent`], [`RepoRefs`], event-class attributes, payload codec |
//! | [`types`] | Catalog value types (`JobDefinition`, `Brancher`, `PodTemplate`, etc.) |
//! | [`job`] | [`ResolvedJobSpec`], [`SubmittedJob`], [`Outcome`] and standard job metadata |
//! | [`resolver`] | Per-class spec resolution against a catalog snapshot |
//! | [`ports`] | Traits implemented by transport, catalog, sink and reporter adapters |
//! | [`errors`] | Error taxonomy for one dispatch |

pub mod errors;
pub mod event;
pub mod identifiers;
pub mod job;
pub mod ports;
pub mod resolver;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{
    CatalogError, CodecError, DispatchError, ReportingError, SubmissionError, ValidationError,
};
pub use event::{
    OutboundMessage, Pull, RepoRefs, TriggerEvent, EVENT_TYPE_ATTRIBUTE, PERIODIC_JOB_EVENT,
    POSTSUBMIT_JOB_EVENT, PRESUBMIT_JOB_EVENT,
};
pub use identifiers::{CommitSha, JobRunId, OrgRepo, SubscriptionName};
pub use job::{JobState, JobStatus, Outcome, ResolvedJobSpec, SubmittedJob};
pub use ports::{
    CatalogProvider, DispatchMetrics, DynamicJobCatalog, Envelope, JobCatalog, JobSubmitter,
    StatusReporter,
};
pub use resolver::Resolution;
pub use types::{
    BranchPattern, Brancher, Container, EnvVar, JobClass, JobDefinition, Labels, PodTemplate,
    Timestamp,
};
