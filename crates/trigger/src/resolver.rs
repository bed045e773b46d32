//! Job-class resolvers.
//!
//! Each [`JobClass`] turns a [`TriggerEvent`] plus a catalog snapshot into a
//! [`Resolution`], or fails with the first unmet precondition as a
//! [`ValidationError`]. Resolvers never mutate the catalog.
//!
//! Presubmit and postsubmit lookups consult the [`DynamicJobCatalog`] when one
//! is configured. Its answer replaces the static list; a failed lookup falls
//! back to the static list.

use tracing::debug;

use crate::{
    CommitSha, DynamicJobCatalog, JobCatalog, JobClass, JobDefinition, Labels, OrgRepo,
    RepoRefs, ResolvedJobSpec, TriggerEvent, ValidationError,
};

/// A resolved spec plus the catalog labels of the matched definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Fully-specified job.
    pub spec: ResolvedJobSpec,
    /// Labels of the matched catalog entry, before event labels are merged.
    pub labels: Labels,
}

impl JobClass {
    /// Resolves `event` against `catalog` (and `dynamic`, if configured).
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming a missing refs field, or reporting
    /// that no job or more than one job matches.
    pub async fn resolve(
        self,
        catalog: &dyn JobCatalog,
        dynamic: Option<&dyn DynamicJobCatalog>,
        event: &TriggerEvent,
    ) -> Result<Resolution, ValidationError> {
        match self {
            JobClass::Periodic => resolve_periodic(catalog, event),
            JobClass::Presubmit => resolve_presubmit(catalog, dynamic, event).await,
            JobClass::Postsubmit => resolve_postsubmit(catalog, dynamic, event).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-class resolution
// ---------------------------------------------------------------------------

fn resolve_periodic(
    catalog: &dyn JobCatalog,
    event: &TriggerEvent,
) -> Result<Resolution, ValidationError> {
    // Periodic names are expected to be unique; the first match wins.
    let job = catalog
        .all_periodics()
        .iter()
        .find(|job| job.name == event.name)
        .ok_or_else(|| ValidationError::NoSuchJob {
            class: JobClass::Periodic,
            name: event.name.clone(),
        })?;

    Ok(resolution(JobClass::Periodic, job, None))
}

async fn resolve_presubmit(
    catalog: &dyn JobCatalog,
    dynamic: Option<&dyn DynamicJobCatalog>,
    event: &TriggerEvent,
) -> Result<Resolution, ValidationError> {
    let refs = event.refs.as_ref().ok_or(ValidationError::MissingRefs)?;
    require(&refs.org, "org")?;
    require(&refs.repo, "repo")?;
    if refs.pulls.is_empty() {
        return Err(ValidationError::NoPulls);
    }
    require(&refs.base_sha, "base_sha")?;
    require(&refs.base_ref, "base_ref")?;
    let (org_repo, base_sha) = repo_coordinates(refs)?;

    let fetched = match dynamic {
        Some(dynamic) => {
            let head_shas = refs.head_shas();
            match dynamic.presubmits_at(&org_repo, &base_sha, &head_shas).await {
                Ok(jobs) => Some(jobs),
                Err(err) => {
                    debug!(org_repo = %org_repo, error = %err, "Failed to get presubmits, using static configuration");
                    None
                }
            }
        }
        None => None,
    };
    let jobs = fetched
        .as_deref()
        .unwrap_or_else(|| catalog.static_presubmits(&org_repo));

    let job = select_unique(JobClass::Presubmit, jobs, &refs.base_ref, &event.name)?;
    Ok(resolution(JobClass::Presubmit, job, Some(refs.clone())))
}

async fn resolve_postsubmit(
    catalog: &dyn JobCatalog,
    dynamic: Option<&dyn DynamicJobCatalog>,
    event: &TriggerEvent,
) -> Result<Resolution, ValidationError> {
    let refs = event.refs.as_ref().ok_or(ValidationError::MissingRefs)?;
    require(&refs.org, "org")?;
    require(&refs.repo, "repo")?;
    require(&refs.base_sha, "base_sha")?;
    require(&refs.base_ref, "base_ref")?;
    let (org_repo, base_sha) = repo_coordinates(refs)?;

    let fetched = match dynamic {
        Some(dynamic) => match dynamic.postsubmits_at(&org_repo, &base_sha).await {
            Ok(jobs) => Some(jobs),
            Err(err) => {
                debug!(org_repo = %org_repo, error = %err, "Failed to get postsubmits, using static configuration");
                None
            }
        },
        None => None,
    };
    let jobs = fetched
        .as_deref()
        .unwrap_or_else(|| catalog.static_postsubmits(&org_repo));

    let job = select_unique(JobClass::Postsubmit, jobs, &refs.base_ref, &event.name)?;
    Ok(resolution(JobClass::Postsubmit, job, Some(refs.clone())))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn require(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    Ok(())
}

fn repo_coordinates(refs: &RepoRefs) -> Result<(OrgRepo, CommitSha), ValidationError> {
    let org_repo = refs
        .org_repo()
        .ok_or(ValidationError::MissingField { field: "org" })?;
    let base_sha = CommitSha::new(refs.base_sha.clone())
        .ok_or(ValidationError::MissingField { field: "base_sha" })?;
    Ok((org_repo, base_sha))
}

/// Finds the single definition named `name` that could run on `branch`.
///
/// Ambiguity is an error, never resolved by order.
fn select_unique<'a>(
    class: JobClass,
    jobs: &'a [JobDefinition],
    branch: &str,
    name: &str,
) -> Result<&'a JobDefinition, ValidationError> {
    let mut found = None;
    for job in jobs.iter().filter(|job| job.brancher.should_run(branch)) {
        if job.name == name {
            if found.is_some() {
                return Err(ValidationError::AmbiguousJob {
                    name: name.to_string(),
                });
            }
            found = Some(job);
        }
    }
    found.ok_or_else(|| ValidationError::NoSuchJob {
        class,
        name: name.to_string(),
    })
}

fn resolution(class: JobClass, job: &JobDefinition, refs: Option<RepoRefs>) -> Resolution {
    Resolution {
        spec: ResolvedJobSpec {
            job_class: Some(class),
            job: job.name.clone(),
            cluster: job.cluster.clone(),
            refs,
            pod_template: job.spec.clone(),
        },
        labels: job.labels.clone(),
    }
}
