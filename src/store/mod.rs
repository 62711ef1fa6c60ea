pub mod disk;
pub mod memory;

use crate::core::config::{AppConfig, BackendConfig, BackendKind};
use crate::core::store::Store;
use anyhow::{Context, Result};
use disk::DiskStore;
use memory::MemoryStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// A named storage target the gateway writes through to.
#[derive(Clone)]
pub struct Backend {
    pub name: String,
    pub store: Arc<dyn Store>,
}

impl Backend {
    pub fn new(name: &str, store: Arc<dyn Store>) -> Self {
        Self {
            name: name.to_string(),
            store,
        }
    }
}

fn backend_path(config: &AppConfig, backend: &BackendConfig) -> Result<PathBuf> {
    if let Some(path) = &backend.path {
        return Ok(PathBuf::from(path));
    }
    Ok(config.default_data_path()?.join("store").join(&backend.name))
}

/// Opens every configured backend in order. The first one is the read side
/// of the freshness cache.
pub fn open_backends(config: &AppConfig) -> Result<Vec<Backend>> {
    config
        .backends
        .iter()
        .map(|backend| {
            let store: Arc<dyn Store> = match backend.kind {
                BackendKind::Memory => Arc::new(MemoryStore::new()),
                BackendKind::Disk => {
                    let path = backend_path(config, backend)?;
                    let store = DiskStore::open(&path).with_context(|| {
                        format!(
                            "Failed to open storage backend '{}' at {}",
                            backend.name,
                            path.display()
                        )
                    })?;
                    Arc::new(store)
                }
            };
            info!(backend = %backend.name, kind = ?backend.kind, "Storage backend ready");
            Ok(Backend::new(&backend.name, store))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_backends_in_config_order() {
        let dir = tempdir().unwrap();
        let yaml = format!(
            r#"
data_path: "{}"
backends:
  - name: primary
    kind: disk
  - name: scratch
    kind: memory
"#,
            dir.path().display()
        );
        let config: AppConfig = serde_yaml::from_str(&yaml).unwrap();

        let backends = open_backends(&config).unwrap();
        let names: Vec<&str> = backends.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["primary", "scratch"]);
        assert!(dir.path().join("store").join("primary").exists());
    }
}
