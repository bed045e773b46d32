//! Configuration file loading and validation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use trigger::SubscriptionName;

use crate::StaticCatalog;

/// Errors produced while loading the configuration file.
///
/// The service never starts with an invalid configuration; a reload that
/// fails keeps the previous catalog.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid YAML of the expected shape.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The file parsed but breaks a configuration rule.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_max_in_flight() -> usize {
    SubscriptionConfig::DEFAULT_MAX_IN_FLIGHT
}

/// Settings for one transport subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    /// Subscription name, as it appears on the transport and in metrics.
    pub name: SubscriptionName,
    /// Clusters jobs triggered through this subscription may run on. `"*"`
    /// allows every cluster. An empty list is rejected at load time.
    pub allowed_clusters: Vec<String>,
    /// Maximum number of messages handled concurrently.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl SubscriptionConfig {
    /// Concurrency used when a subscription does not set `max_in_flight`.
    pub const DEFAULT_MAX_IN_FLIGHT: usize = 10;
}

/// The whole configuration file: subscriptions plus the static catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Subscriptions this instance serves.
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionConfig>,
    /// Static job catalog.
    #[serde(flatten)]
    pub catalog: StaticCatalog,
}

impl RelayConfig {
    /// Parses and validates configuration from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: RelayConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the configuration file at `path`.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_yaml(&text)
    }

    /// Looks up a subscription by name.
    pub fn subscription(&self, name: &str) -> Option<&SubscriptionConfig> {
        self.subscriptions.iter().find(|s| s.name.as_str() == name)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        for subscription in &self.subscriptions {
            let name = subscription.name.as_str();
            if name.is_empty() {
                return Err(ConfigError::Invalid("subscription without a name".into()));
            }
            if !names.insert(name) {
                return Err(ConfigError::Invalid(format!("duplicated subscription {name:?}")));
            }
            if subscription.allowed_clusters.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "subscription {name:?} allows no cluster; use \"*\" to allow all"
                )));
            }
            if subscription.max_in_flight == 0 {
                return Err(ConfigError::Invalid(format!(
                    "subscription {name:?} has max_in_flight 0"
                )));
            }
        }
        self.catalog.validate().map_err(ConfigError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use trigger::{JobCatalog, OrgRepo};

    use super::*;

    const EXAMPLE: &str = r#"
subscriptions:
  - name: ci-triggers
    allowed_clusters: ["*"]
  - name: release-triggers
    allowed_clusters: [release]
    max_in_flight: 2
periodics:
  - name: nightly-build
    cluster: build
    labels:
      tier: nightly
presubmits:
  k8s/api:
    - name: unit-tests
      cluster: ci
      branches: [main]
      spec:
        containers:
          - name: test
            image: golang:1.22
            command: [make, test]
postsubmits:
  k8s/api:
    - name: publish
      skip_branches: ["release-0\\..*"]
"#;

    #[test]
    fn parses_subscriptions_and_catalog() {
        let config = RelayConfig::from_yaml(EXAMPLE).expect("valid configuration");

        let ci = config.subscription("ci-triggers").expect("present");
        assert_eq!(ci.allowed_clusters, vec!["*".to_string()]);
        assert_eq!(ci.max_in_flight, SubscriptionConfig::DEFAULT_MAX_IN_FLIGHT);
        assert_eq!(config.subscription("release-triggers").map(|s| s.max_in_flight), Some(2));
        assert!(config.subscription("unknown").is_none());

        let org_repo = OrgRepo::new("k8s/api").expect("non-empty");
        assert_eq!(config.catalog.all_periodics()[0].cluster, "build");
        let presubmit = &config.catalog.static_presubmits(&org_repo)[0];
        assert!(presubmit.brancher.should_run("main"));
        assert!(!presubmit.brancher.should_run("dev"));
        let postsubmit = &config.catalog.static_postsubmits(&org_repo)[0];
        assert!(!postsubmit.brancher.should_run("release-0.1"));
        assert!(postsubmit.brancher.should_run("main"));
    }

    #[test]
    fn subscriptions_need_an_allow_list() {
        let err = RelayConfig::from_yaml(
            "subscriptions:\n  - name: ci\n    allowed_clusters: []\n",
        )
        .expect_err("empty allow-list");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn duplicated_subscriptions_are_rejected() {
        let err = RelayConfig::from_yaml(
            "subscriptions:\n  - name: ci\n    allowed_clusters: ['*']\n  - name: ci\n    allowed_clusters: ['*']\n",
        )
        .expect_err("duplicate");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn invalid_branch_pattern_fails_to_parse() {
        let err = RelayConfig::from_yaml(
            "presubmits:\n  k8s/api:\n    - name: lint\n      branches: ['release-(']\n",
        )
        .expect_err("bad regex");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[tokio::test]
    async fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(EXAMPLE.as_bytes()).expect("write");

        let config = RelayConfig::load(file.path()).await.expect("loads");

        assert_eq!(config.subscriptions.len(), 2);
        assert_eq!(config.catalog.len(), 3);
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let err = RelayConfig::load(Path::new("/nonexistent/jobrelay.yaml"))
            .await
            .expect_err("missing file");
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
