//! End-to-end reference lookup and training-set extraction
//!
//! Finds which reference file an input volume was cut from, crops the
//! matching training and mask datasets of that file to the input's
//! footprint and writes them, together with the labels, to one output file.

use super::applier::AlignmentApplier;
use super::candidate_search::{CandidateSearch, SearchReport};
use super::types::{Alignment, CandidateRef, CropInterval, DatasetRole};
use crate::config::{Config, SearchConfig};
use crate::data::{load_image_stack, scan_candidates};
use crate::volume::{Volume, VolumeStore};
use crate::Result;
use anyhow::Context;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Dataset path for each role inside a candidate file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRoles {
    pub reference: String,
    pub training: String,
    pub mask: String,
    pub label: String,
}

impl DatasetRoles {
    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            reference: config.reference_dataset.clone(),
            training: config.training_dataset.clone(),
            mask: config.mask_dataset.clone(),
            label: config.label_dataset.clone(),
        }
    }

    /// Role of a dataset found in a candidate file. Labels live in their own
    /// file and are never resolved here.
    pub fn resolve(&self, dataset: &str) -> Option<DatasetRole> {
        if dataset == self.reference {
            Some(DatasetRole::Reference)
        } else if dataset == self.training {
            Some(DatasetRole::Training)
        } else if dataset == self.mask {
            Some(DatasetRole::Mask)
        } else {
            None
        }
    }
}

/// Where the input volume comes from.
#[derive(Debug, Clone)]
pub enum InputSource {
    Archive { path: PathBuf, dataset: String },
    ImageStack(PathBuf),
}

impl InputSource {
    pub fn load(&self, store: &dyn VolumeStore) -> Result<Volume> {
        match self {
            InputSource::Archive { path, dataset } => store
                .open(path, dataset)
                .with_context(|| format!("failed to open input {}:{}", path.display(), dataset)),
            InputSource::ImageStack(dir) => load_image_stack(dir),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CropRequest {
    pub input: InputSource,
    pub search_folder: PathBuf,
    pub label_file: Option<PathBuf>,
    pub output_folder: PathBuf,
}

/// What a successful run wrote.
#[derive(Debug)]
pub struct CropReport {
    pub search: SearchReport,
    pub reference: CandidateRef,
    pub alignment: Alignment,
    pub output: PathBuf,
    pub intervals: BTreeMap<String, CropInterval>,
    pub written: Vec<String>,
}

pub struct CropFinder {
    store: Arc<dyn VolumeStore>,
    search: CandidateSearch,
    roles: DatasetRoles,
    extension: String,
    filter: String,
}

impl CropFinder {
    pub fn new(
        store: Arc<dyn VolumeStore>,
        search: CandidateSearch,
        roles: DatasetRoles,
        extension: impl Into<String>,
        filter: impl Into<String>,
    ) -> Self {
        Self {
            store,
            search,
            roles,
            extension: extension.into(),
            filter: filter.into(),
        }
    }

    pub fn from_config(store: Arc<dyn VolumeStore>, config: &Config) -> Result<Self> {
        let search = CandidateSearch::from_config(store.clone(), config)?;
        Ok(Self::new(
            store,
            search,
            DatasetRoles::from_config(&config.search),
            config.search.extension.clone(),
            config.search.filter.clone(),
        ))
    }

    /// Runs the whole workflow. `Ok(None)` means no reference matched and
    /// nothing was written.
    pub fn run(&self, request: &CropRequest) -> Result<Option<CropReport>> {
        let files = scan_candidates(&request.search_folder, &self.extension, &self.filter)?;
        let input = request.input.load(self.store.as_ref())?;
        tracing::info!(
            input = ?input.shape(),
            candidates = files.len(),
            "searching for the reference of the input volume"
        );

        let candidates: Vec<CandidateRef> = files
            .into_iter()
            .map(|path| CandidateRef::new(path, self.roles.reference.clone()))
            .collect();
        let report = self.search.search(&input, &candidates);

        let Some((reference, alignment)) = report.winner.clone() else {
            tracing::warn!(
                candidates = candidates.len(),
                failures = report.failures(),
                "no reference matches the input, nothing written"
            );
            return Ok(None);
        };
        tracing::info!(reference = %reference, %alignment, "input comes from reference");

        let outputs = self.collect_outputs(&reference, &alignment, &input, request.label_file.as_deref())?;

        let file_name = reference
            .path
            .file_name()
            .with_context(|| format!("reference path {} has no file name", reference.path.display()))?;
        let output = request.output_folder.join(file_name);
        std::fs::create_dir_all(&request.output_folder)
            .with_context(|| format!("failed to create {}", request.output_folder.display()))?;

        let mut written = Vec::with_capacity(outputs.volumes.len());
        for (dataset, volume) in &outputs.volumes {
            tracing::info!(output = %output.display(), dataset, shape = ?volume.shape(), "saving dataset");
            self.store.write(&output, dataset, volume)?;
            written.push(dataset.clone());
        }

        Ok(Some(CropReport {
            search: report,
            reference,
            alignment,
            output,
            intervals: outputs.intervals,
            written,
        }))
    }

    /// Computes every output volume before anything is written.
    fn collect_outputs(
        &self,
        reference: &CandidateRef,
        alignment: &Alignment,
        input: &Volume,
        label_file: Option<&Path>,
    ) -> Result<Outputs> {
        let reference_volume = self.store.open(&reference.path, &self.roles.reference)?;
        let applier = AlignmentApplier::for_reference(&reference_volume);
        let target_xy = (input.width(), input.height());

        let mut outputs = Outputs::default();
        for dataset in self.store.list_datasets(&reference.path)? {
            let Some(role) = self.roles.resolve(&dataset) else {
                continue;
            };
            let Some(output_dataset) = role.output_dataset().filter(|_| role.is_cropped()) else {
                continue;
            };

            let volume = self.store.open(&reference.path, &dataset)?;
            let Some(interval) = applier.crop_interval(alignment, &volume, target_xy) else {
                tracing::info!(dataset, "footprint differs from reference, skipping");
                continue;
            };
            tracing::info!(dataset, min = ?interval.min, max = ?interval.max, "cropping");
            let cropped = volume
                .crop(&interval)
                .with_context(|| format!("failed to crop {} of {}", dataset, reference.path.display()))?;
            outputs.volumes.insert(output_dataset.to_string(), cropped);
            outputs.intervals.insert(dataset, interval);
        }

        if let (Some(path), Some(output_dataset)) = (label_file, DatasetRole::Label.output_dataset()) {
            let labels = self
                .store
                .open(path, &self.roles.label)
                .with_context(|| format!("failed to read labels from {}", path.display()))?;
            outputs.volumes.insert(output_dataset.to_string(), labels);
        }

        Ok(outputs)
    }
}

#[derive(Default)]
struct Outputs {
    volumes: BTreeMap<String, Volume>,
    intervals: BTreeMap<String, CropInterval>,
}
