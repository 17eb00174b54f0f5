//! Gzip-compressed JSON container holding any number of named volumes.

use super::{Volume, VolumeStore};
use crate::Result;
use anyhow::{anyhow, Context};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::{self, DeserializeSeed, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_EXTENSION: &str = "vol";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Archive {
    datasets: BTreeMap<String, Volume>,
}

/// File-backed [`VolumeStore`]. Every write rewrites the whole archive through
/// a temporary sibling file that is renamed into place.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    compression: Compression,
}

impl Default for ArchiveStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveStore {
    pub fn new() -> Self {
        Self {
            compression: Compression::default(),
        }
    }

    pub fn with_compression(level: u32) -> Self {
        Self {
            compression: Compression::new(level.min(9)),
        }
    }

    fn read_archive(&self, path: &Path) -> Result<Archive> {
        let decoder = open_decoder(path)?;
        serde_json::from_reader(decoder)
            .with_context(|| format!("failed to decode archive {}", path.display()))
    }

    /// Streams the archive through `seed`, which only materialises the
    /// datasets it asks for.
    fn read_with<S, T>(&self, path: &Path, seed: S) -> Result<T>
    where
        S: for<'de> DeserializeSeed<'de, Value = T>,
        T: Default,
    {
        let mut deserializer = serde_json::Deserializer::from_reader(open_decoder(path)?);
        let value = InDatasets(seed)
            .deserialize(&mut deserializer)
            .and_then(|value| deserializer.end().map(|_| value))
            .with_context(|| format!("failed to decode archive {}", path.display()))?;
        Ok(value)
    }

    fn write_archive(&self, path: &Path, archive: &Archive) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let staging = staging_path(path);
        {
            let file = File::create(&staging)
                .with_context(|| format!("failed to create {}", staging.display()))?;
            let mut encoder = GzEncoder::new(BufWriter::new(file), self.compression);
            serde_json::to_writer(&mut encoder, archive)?;
            encoder.finish()?.flush()?;
        }
        fs::rename(&staging, path).with_context(|| {
            format!(
                "failed to move {} into place at {}",
                staging.display(),
                path.display()
            )
        })
    }
}

fn open_decoder(path: &Path) -> Result<GzDecoder<BufReader<File>>> {
    let file =
        File::open(path).with_context(|| format!("failed to open archive {}", path.display()))?;
    Ok(GzDecoder::new(BufReader::new(file)))
}

/// Hands the `datasets` map of an archive to the inner seed.
struct InDatasets<S>(S);

impl<'de, S> DeserializeSeed<'de> for InDatasets<S>
where
    S: DeserializeSeed<'de>,
    S::Value: Default,
{
    type Value = S::Value;

    fn deserialize<D: de::Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de, S> Visitor<'de> for InDatasets<S>
where
    S: DeserializeSeed<'de>,
    S::Value: Default,
{
    type Value = S::Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a volume archive")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
        let mut seed = Some(self.0);
        let mut value = None;
        while let Some(key) = map.next_key::<String>()? {
            match (key.as_str(), seed.take()) {
                ("datasets", Some(inner)) => value = Some(map.next_value_seed(inner)?),
                (_, inner) => {
                    seed = inner;
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(value.unwrap_or_default())
    }
}

/// Decodes one named dataset and skips the rest without building them.
struct SelectDataset<'a>(&'a str);

impl<'de> DeserializeSeed<'de> for SelectDataset<'_> {
    type Value = Option<Volume>;

    fn deserialize<D: de::Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for SelectDataset<'_> {
    type Value = Option<Volume>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of datasets")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
        let mut found = None;
        while let Some(name) = map.next_key::<String>()? {
            if found.is_none() && name == self.0 {
                found = Some(map.next_value::<Volume>()?);
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }
        Ok(found)
    }
}

/// Collects dataset names without decoding any volume.
struct DatasetNames;

impl<'de> DeserializeSeed<'de> for DatasetNames {
    type Value = Vec<String>;

    fn deserialize<D: de::Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for DatasetNames {
    type Value = Vec<String>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of datasets")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
        let mut names = Vec::new();
        while let Some(name) = map.next_key::<String>()? {
            map.next_value::<IgnoredAny>()?;
            names.push(name);
        }
        Ok(names)
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

impl VolumeStore for ArchiveStore {
    fn open(&self, path: &Path, dataset: &str) -> Result<Volume> {
        self.read_with(path, SelectDataset(dataset))?
            .ok_or_else(|| anyhow!("dataset {} not found in {}", dataset, path.display()))
    }

    fn write(&self, path: &Path, dataset: &str, volume: &Volume) -> Result<()> {
        let mut archive = if path.exists() {
            self.read_archive(path)?
        } else {
            Archive::default()
        };
        archive.datasets.insert(dataset.to_string(), volume.clone());
        tracing::debug!(path = %path.display(), dataset, shape = ?volume.shape(), "writing dataset");
        self.write_archive(path, &archive)
    }

    fn list_datasets(&self, path: &Path) -> Result<Vec<String>> {
        self.read_with(path, DatasetNames)
    }
}
