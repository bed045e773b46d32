//! Hot-swappable catalog snapshot.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use trigger::{CatalogProvider, JobCatalog};

use crate::{ConfigError, RelayConfig, StaticCatalog};

/// Owns the current [`StaticCatalog`] and hands out snapshots of it.
///
/// Readers clone an `Arc` under a short read lock and then work lock-free on
/// an immutable catalog. [`SharedCatalog::replace`] swaps the whole catalog;
/// in-flight dispatches keep the snapshot they started with.
#[derive(Debug, Default)]
pub struct SharedCatalog {
    current: RwLock<Arc<StaticCatalog>>,
}

impl SharedCatalog {
    /// Creates a shared catalog starting at `catalog`.
    pub fn new(catalog: StaticCatalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    /// Returns the current catalog.
    pub fn current(&self) -> Arc<StaticCatalog> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swaps in `catalog` for every subsequent snapshot.
    pub fn replace(&self, catalog: StaticCatalog) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *current = Arc::new(catalog);
    }

    /// Re-reads the configuration file and swaps in its catalog.
    ///
    /// On error the current catalog is kept.
    pub async fn reload_from(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let config = RelayConfig::load(path).await?;
        let jobs = config.catalog.len();
        if *self.current() != config.catalog {
            self.replace(config.catalog);
            info!(path = %path.display(), jobs, "Job catalog reloaded");
        } else {
            debug!(path = %path.display(), "Job catalog unchanged");
        }
        Ok(())
    }

    /// Spawns a task reloading the catalog from `path` every `interval`.
    ///
    /// Failed reloads are logged and retried on the next tick. Abort the
    /// returned handle to stop reloading.
    pub fn spawn_reload(self: Arc<Self>, path: PathBuf, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; the catalog was just loaded.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = self.reload_from(&path).await {
                    warn!(path = %path.display(), error = %err, "Failed to reload job catalog, keeping previous one");
                }
            }
        })
    }
}

impl CatalogProvider for SharedCatalog {
    fn snapshot(&self) -> Arc<dyn JobCatalog> {
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use trigger::JobDefinition;

    use super::*;

    fn catalog_with(name: &str) -> StaticCatalog {
        StaticCatalog {
            periodics: vec![JobDefinition::new(name)],
            ..StaticCatalog::default()
        }
    }

    #[test]
    fn snapshots_survive_replacement() {
        let shared = SharedCatalog::new(catalog_with("before"));
        let snapshot = shared.snapshot();

        shared.replace(catalog_with("after"));

        assert_eq!(snapshot.all_periodics()[0].name, "before");
        assert_eq!(shared.snapshot().all_periodics()[0].name, "after");
    }

    #[tokio::test]
    async fn reload_swaps_in_new_catalog_and_keeps_old_on_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"periodics:\n  - name: reloaded\n").expect("write");
        let shared = SharedCatalog::new(catalog_with("initial"));

        shared.reload_from(file.path()).await.expect("reload succeeds");
        assert_eq!(shared.current().periodics[0].name, "reloaded");

        let broken = tempfile::NamedTempFile::new().expect("temp file");
        std::fs::write(broken.path(), "periodics: [").expect("write");
        assert!(shared.reload_from(broken.path()).await.is_err());
        assert_eq!(shared.current().periodics[0].name, "reloaded");
    }

    #[tokio::test]
    async fn reload_task_picks_up_file_changes() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        std::fs::write(file.path(), "periodics:\n  - name: first\n").expect("write");
        let shared = Arc::new(SharedCatalog::new(catalog_with("first")));
        let handle = shared
            .clone()
            .spawn_reload(file.path().to_path_buf(), Duration::from_millis(20));

        std::fs::write(file.path(), "periodics:\n  - name: second\n").expect("write");
        for _ in 0..250 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if shared.current().periodics[0].name == "second" {
                break;
            }
        }

        assert_eq!(shared.current().periodics[0].name, "second");
        handle.abort();
    }
}
