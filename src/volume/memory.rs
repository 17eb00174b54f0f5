use super::{Volume, VolumeStore};
use crate::Result;
use anyhow::anyhow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// In-process [`VolumeStore`] keyed by `(path, dataset)`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    volumes: RwLock<BTreeMap<(PathBuf, String), Volume>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, dataset: &str, volume: Volume) {
        let mut volumes = self.volumes.write().unwrap_or_else(|e| e.into_inner());
        volumes.insert((path.into(), dataset.to_string()), volume);
    }
}

impl VolumeStore for MemoryStore {
    fn open(&self, path: &Path, dataset: &str) -> Result<Volume> {
        let volumes = self
            .volumes
            .read()
            .map_err(|_| anyhow!("volume store lock poisoned"))?;
        volumes
            .get(&(path.to_path_buf(), dataset.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("dataset {} not found in {}", dataset, path.display()))
    }

    fn write(&self, path: &Path, dataset: &str, volume: &Volume) -> Result<()> {
        self.insert(path, dataset, volume.clone());
        Ok(())
    }

    fn list_datasets(&self, path: &Path) -> Result<Vec<String>> {
        let volumes = self
            .volumes
            .read()
            .map_err(|_| anyhow!("volume store lock poisoned"))?;
        let datasets: Vec<String> = volumes
            .keys()
            .filter(|(p, _)| p == path)
            .map(|(_, d)| d.clone())
            .collect();
        if datasets.is_empty() {
            return Err(anyhow!("no datasets stored under {}", path.display()));
        }
        Ok(datasets)
    }
}
