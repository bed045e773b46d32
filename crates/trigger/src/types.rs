//! Shared value types for the JobRelay domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! structure and invariants (branch patterns compile and are anchored, job
//! classes are a closed set) and participate in resolution.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// String-to-string metadata map used for labels, annotations and env entries.
///
/// Ordered so that serialised jobs and appended environment variables are
/// deterministic.
pub type Labels = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Job classes
// ---------------------------------------------------------------------------

/// The three classes of job a trigger event can request.
///
/// Selected once per message from the event-class attribute; see
/// [`JobClass::from_event_type`]. Resolution behaviour per class lives in
/// [`crate::resolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobClass {
    /// Scheduled job with no source-repository context.
    Periodic,
    /// Job gated on one or more pull requests against a base branch.
    Presubmit,
    /// Job run after a merge to a base branch.
    Postsubmit,
}

impl JobClass {
    /// Returns the lowercase class name used in labels and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            JobClass::Periodic => "periodic",
            JobClass::Presubmit => "presubmit",
            JobClass::Postsubmit => "postsubmit",
        }
    }
}

impl std::fmt::Display for JobClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Pod template
// ---------------------------------------------------------------------------

/// A single environment variable on a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    /// Variable name.
    pub name: String,
    /// Variable value.
    #[serde(default)]
    pub value: String,
}

impl EnvVar {
    /// Creates an [`EnvVar`].
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One container of a job's pod template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    /// Container name, unique within the template.
    #[serde(default)]
    pub name: String,
    /// Image reference to run.
    pub image: String,
    /// Entrypoint override.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    /// Arguments passed to the entrypoint.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Environment entries, in order. Duplicated names are allowed; the
    /// execution environment decides which one wins.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

/// The execution template of a job: what the cluster actually runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodTemplate {
    /// Containers started for the job.
    pub containers: Vec<Container>,
}

impl PodTemplate {
    /// Appends every entry of `envs` to the environment of every container.
    ///
    /// Existing entries with the same name are left in place.
    pub fn append_envs(&mut self, envs: &Labels) {
        for container in &mut self.containers {
            container
                .env
                .extend(envs.iter().map(|(name, value)| EnvVar::new(name, value)));
        }
    }
}

// ---------------------------------------------------------------------------
// Branch matching
// ---------------------------------------------------------------------------

/// A branch regular expression, anchored at both ends when compiled.
///
/// Serialises as the pattern text the catalog author wrote.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchPattern {
    raw: String,
    regex: Regex,
}

impl BranchPattern {
    /// Compiles `pattern`, matching whole branch names only.
    pub fn new(pattern: impl Into<String>) -> Result<Self, regex::Error> {
        let raw = pattern.into();
        let regex = Regex::new(&format!("^(?:{raw})$"))?;
        Ok(Self { raw, regex })
    }

    /// Returns the pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns `true` if `branch` matches the whole pattern.
    pub fn is_match(&self, branch: &str) -> bool {
        self.regex.is_match(branch)
    }
}

impl PartialEq for BranchPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for BranchPattern {}

impl TryFrom<String> for BranchPattern {
    type Error = regex::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BranchPattern> for String {
    fn from(value: BranchPattern) -> Self {
        value.raw
    }
}

/// Branch predicate attached to presubmit and postsubmit definitions.
///
/// A branch runs when it matches none of `skip_branches` and either
/// `branches` is empty or at least one of `branches` matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brancher {
    /// Branches the job runs against. Empty means every branch.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<BranchPattern>,
    /// Branches the job never runs against. Takes precedence over `branches`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_branches: Vec<BranchPattern>,
}

impl Brancher {
    /// Returns `true` if a job with this predicate could run against `branch`.
    pub fn should_run(&self, branch: &str) -> bool {
        if self.skip_branches.iter().any(|p| p.is_match(branch)) {
            return false;
        }
        self.branches.is_empty() || self.branches.iter().any(|p| p.is_match(branch))
    }
}

// ---------------------------------------------------------------------------
// Catalog entries
// ---------------------------------------------------------------------------

fn default_cluster() -> String {
    JobDefinition::DEFAULT_CLUSTER.to_string()
}

/// One catalog entry: a job that events may ask to run.
///
/// Read-only to resolvers. Periodic definitions ignore the branch predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Job name matched against [`crate::TriggerEvent::name`].
    pub name: String,
    /// Labels copied onto every job created from this definition.
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
    /// Catalog-side annotations. Informational; not copied onto jobs.
    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub annotations: Labels,
    /// Cluster alias the job runs on.
    #[serde(default = "default_cluster")]
    pub cluster: String,
    /// Branch predicate (presubmit and postsubmit only).
    #[serde(flatten)]
    pub brancher: Brancher,
    /// Execution template. Jobs without one are still created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<PodTemplate>,
}

impl JobDefinition {
    /// Cluster alias used when a definition names none.
    pub const DEFAULT_CLUSTER: &'static str = "default";

    /// Creates a definition with no labels, no branch restriction and no
    /// template, running on [`JobDefinition::DEFAULT_CLUSTER`].
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: Labels::new(),
            annotations: Labels::new(),
            cluster: default_cluster(),
            brancher: Brancher::default(),
            spec: None,
        }
    }

    /// Sets the cluster alias.
    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self
    }

    /// Adds one label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Sets the branch predicate.
    pub fn with_brancher(mut self, brancher: Brancher) -> Self {
        self.brancher = brancher;
        self
    }

    /// Sets the execution template.
    pub fn with_spec(mut self, spec: PodTemplate) -> Self {
        self.spec = Some(spec);
        self
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_display_as_rfc3339() {
        let shown = Timestamp::now().to_string();

        assert!(DateTime::parse_from_rfc3339(&shown).is_ok(), "{shown}");
    }

    fn patterns(raw: &[&str]) -> Vec<BranchPattern> {
        raw.iter()
            .map(|p| BranchPattern::new(*p).expect("valid pattern"))
            .collect()
    }

    #[test]
    fn empty_brancher_runs_everywhere() {
        assert!(Brancher::default().should_run("main"));
        assert!(Brancher::default().should_run("release-1.0"));
    }

    #[test]
    fn branch_patterns_are_anchored() {
        let brancher = Brancher {
            branches: patterns(&["main"]),
            skip_branches: Vec::new(),
        };
        assert!(brancher.should_run("main"));
        assert!(!brancher.should_run("main-backport"));
        assert!(!brancher.should_run("not-main"));
    }

    #[test]
    fn skip_branches_take_precedence() {
        let brancher = Brancher {
            branches: patterns(&["release-.*"]),
            skip_branches: patterns(&["release-0\\..*"]),
        };
        assert!(brancher.should_run("release-1.2"));
        assert!(!brancher.should_run("release-0.9"));
        assert!(!brancher.should_run("main"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(BranchPattern::new("release-(").is_err());
    }

    #[test]
    fn append_envs_reaches_every_container_without_dedup() {
        let mut template = PodTemplate {
            containers: vec![
                Container {
                    name: "test".into(),
                    image: "golang".into(),
                    env: vec![EnvVar::new("GOFLAGS", "-mod=vendor")],
                    ..Container::default()
                },
                Container {
                    name: "sidecar".into(),
                    image: "busybox".into(),
                    ..Container::default()
                },
            ],
        };
        let envs = Labels::from([("GOFLAGS".to_string(), "-v".to_string())]);

        template.append_envs(&envs);

        assert_eq!(
            template.containers[0].env,
            vec![EnvVar::new("GOFLAGS", "-mod=vendor"), EnvVar::new("GOFLAGS", "-v")]
        );
        assert_eq!(template.containers[1].env, vec![EnvVar::new("GOFLAGS", "-v")]);
    }

    #[test]
    fn job_definition_defaults_from_yaml() {
        let def: JobDefinition = serde_yaml::from_str(
            "name: unit-tests\nbranches: [main]\nspec:\n  containers:\n    - image: golang\n",
        )
        .expect("valid definition");
        assert_eq!(def.cluster, JobDefinition::DEFAULT_CLUSTER);
        assert!(def.brancher.should_run("main"));
        assert!(!def.brancher.should_run("dev"));
        assert_eq!(def.spec.map(|s| s.containers.len()), Some(1));
    }
}
