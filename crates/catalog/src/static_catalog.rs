//! In-memory static job catalog.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use trigger::{JobCatalog, JobDefinition, OrgRepo};

/// Job definitions loaded from configuration, keyed by `"org/repo"` for
/// presubmits and postsubmits.
///
/// Immutable once built: a reload produces a new catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticCatalog {
    /// Periodic jobs.
    #[serde(default)]
    pub periodics: Vec<JobDefinition>,
    /// Presubmit jobs per repository.
    #[serde(default)]
    pub presubmits: HashMap<String, Vec<JobDefinition>>,
    /// Postsubmit jobs per repository.
    #[serde(default)]
    pub postsubmits: HashMap<String, Vec<JobDefinition>>,
}

impl StaticCatalog {
    /// Checks the invariants resolvers rely on.
    ///
    /// Every job has a name and a cluster, every repository key looks like
    /// `org/repo`, and periodic names are unique. Presubmit and postsubmit
    /// names may repeat across branches; ambiguity is detected at resolve time.
    pub fn validate(&self) -> Result<(), String> {
        let mut periodic_names = HashSet::new();
        for job in &self.periodics {
            check_job("periodic", job)?;
            if !periodic_names.insert(job.name.as_str()) {
                return Err(format!("duplicated periodic job {:?}", job.name));
            }
        }

        for (kind, by_repo) in [("presubmit", &self.presubmits), ("postsubmit", &self.postsubmits)] {
            for (org_repo, jobs) in by_repo {
                match org_repo.split_once('/') {
                    Some((org, repo)) if !org.is_empty() && !repo.is_empty() => {}
                    _ => return Err(format!("{kind} key {org_repo:?} is not in org/repo form")),
                }
                for job in jobs {
                    check_job(kind, job)?;
                }
            }
        }
        Ok(())
    }

    /// Total number of job definitions.
    pub fn len(&self) -> usize {
        self.periodics.len()
            + self.presubmits.values().map(Vec::len).sum::<usize>()
            + self.postsubmits.values().map(Vec::len).sum::<usize>()
    }

    /// Returns `true` if the catalog holds no jobs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn check_job(kind: &str, job: &JobDefinition) -> Result<(), String> {
    if job.name.trim().is_empty() {
        return Err(format!("{kind} job without a name"));
    }
    if job.cluster.is_empty() {
        return Err(format!("{kind} job {:?} has an empty cluster", job.name));
    }
    Ok(())
}

impl JobCatalog for StaticCatalog {
    fn all_periodics(&self) -> &[JobDefinition] {
        &self.periodics
    }

    fn static_presubmits(&self, org_repo: &OrgRepo) -> &[JobDefinition] {
        self.presubmits
            .get(org_repo.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn static_postsubmits(&self, org_repo: &OrgRepo) -> &[JobDefinition] {
        self.postsubmits
            .get(org_repo.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org_repo(value: &str) -> OrgRepo {
        OrgRepo::new(value).expect("non-empty")
    }

    #[test]
    fn lookups_are_keyed_by_org_repo() {
        let catalog = StaticCatalog {
            presubmits: HashMap::from([(
                "k8s/api".to_string(),
                vec![JobDefinition::new("unit-tests")],
            )]),
            ..StaticCatalog::default()
        };

        assert_eq!(catalog.static_presubmits(&org_repo("k8s/api")).len(), 1);
        assert!(catalog.static_presubmits(&org_repo("k8s/web")).is_empty());
        assert!(catalog.static_postsubmits(&org_repo("k8s/api")).is_empty());
    }

    #[test]
    fn duplicated_periodics_are_invalid() {
        let catalog = StaticCatalog {
            periodics: vec![JobDefinition::new("nightly"), JobDefinition::new("nightly")],
            ..StaticCatalog::default()
        };
        assert!(catalog.validate().is_err());
    }

    #[test]
    fn repeated_presubmit_names_are_allowed() {
        let catalog = StaticCatalog {
            presubmits: HashMap::from([(
                "k8s/api".to_string(),
                vec![JobDefinition::new("unit-tests"), JobDefinition::new("unit-tests")],
            )]),
            ..StaticCatalog::default()
        };
        assert_eq!(catalog.validate(), Ok(()));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn repository_keys_must_be_org_repo() {
        let catalog = StaticCatalog {
            postsubmits: HashMap::from([("api".to_string(), vec![JobDefinition::new("publish")])]),
            ..StaticCatalog::default()
        };
        assert!(catalog.validate().is_err());
    }
}
