use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub features: FeatureConfig,
    pub matching: MatchingConfig,
    pub ransac: RansacConfig,
    pub alignment: AlignmentConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

/// Which feature extractor the slice aligner uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    Brief,
    Sift,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub extractor: ExtractorKind,
    /// FAST intensity threshold in 8-bit units.
    pub fast_threshold: f32,
    pub max_keypoints: usize,
    pub patch_radius: u32,
    pub suppression_radius: f32,
    pub sift: SiftConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiftConfig {
    pub n_features: i32,
    pub n_octave_layers: i32,
    pub contrast_threshold: f64,
    pub edge_threshold: f64,
    pub sigma: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Maximum ratio of best to second-best descriptor distance.
    pub ratio_threshold: f32,
    pub max_distance: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacConfig {
    pub max_iterations: usize,
    /// Inlier residual bound in pixels.
    pub inlier_tolerance: f64,
    pub min_inlier_ratio: f64,
    pub min_inliers: usize,
    pub max_refinements: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Number of randomly drawn slices; 0 evaluates every slice.
    pub sample_count: usize,
    pub strict: bool,
    pub channel: usize,
    /// Seed for slice sampling; `None` draws from the thread RNG.
    pub sampling_seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub workers: usize,
    pub strict: bool,
    pub extension: String,
    pub filter: String,
    pub reference_dataset: String,
    pub training_dataset: String,
    pub mask_dataset: String,
    pub label_dataset: String,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            extractor: ExtractorKind::Brief,
            fast_threshold: 20.0,
            max_keypoints: 500,
            patch_radius: 15,
            suppression_radius: 3.0,
            sift: SiftConfig::default(),
        }
    }
}

impl Default for SiftConfig {
    fn default() -> Self {
        Self {
            n_features: 1000,
            n_octave_layers: 3,
            contrast_threshold: 0.04,
            edge_threshold: 10.0,
            sigma: 1.6,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            ratio_threshold: 0.75,
            max_distance: None,
        }
    }
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            inlier_tolerance: 25.0, // pixels
            min_inlier_ratio: 0.005,
            min_inliers: 7,
            max_refinements: 10,
            seed: 0x5eed_5eed,
        }
    }
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            sample_count: 0,
            strict: false,
            channel: 0,
            sampling_seed: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            strict: true,
            extension: crate::volume::archive::DEFAULT_EXTENSION.to_string(),
            filter: String::new(),
            reference_dataset: "/reference".to_string(),
            training_dataset: "/training".to_string(),
            mask_dataset: "/mask".to_string(),
            label_dataset: "/labels".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        if content.trim_start().starts_with('{') {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P, format: ConfigFormat) -> crate::Result<()> {
        let content = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };

        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.features.max_keypoints == 0 {
            errors.push("features.max_keypoints must be positive".to_string());
        }

        if !(3..=127).contains(&self.features.patch_radius) {
            errors.push("features.patch_radius must be between 3 and 127".to_string());
        }

        if self.features.fast_threshold < 0.0 {
            errors.push("features.fast_threshold must be non-negative".to_string());
        }

        if !(self.matching.ratio_threshold > 0.0 && self.matching.ratio_threshold <= 1.0) {
            errors.push("matching.ratio_threshold must be in (0, 1]".to_string());
        }

        if self.ransac.max_iterations == 0 {
            errors.push("ransac.max_iterations must be positive".to_string());
        }

        if self.ransac.inlier_tolerance <= 0.0 {
            errors.push("ransac.inlier_tolerance must be positive".to_string());
        }

        if !(0.0..=1.0).contains(&self.ransac.min_inlier_ratio) {
            errors.push("ransac.min_inlier_ratio must be in [0, 1]".to_string());
        }

        if self.search.workers == 0 {
            errors.push("search.workers must be at least 1".to_string());
        }

        if self.search.reference_dataset.is_empty() {
            errors.push("search.reference_dataset must not be empty".to_string());
        }

        if let Err(e) = self.logging.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone)]
pub enum ConfigFormat {
    Json,
    Toml,
}

/// Defaults when no file is given; otherwise the file, loaded and validated.
///
/// A file that cannot be read, parsed or validated is an error so that a run
/// never proceeds on settings the operator did not choose.
pub fn load_config(config_path: Option<&Path>) -> Result<Config, ConfigError> {
    let Some(path) = config_path else {
        return Ok(Config::default());
    };
    let config = Config::load_from_file(path)?;
    config.validate().map_err(|errors| {
        ConfigError::Invalid(format!("{}: {}", path.display(), errors.join("; ")))
    })?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_reference_constants() {
        let config = Config::default();
        assert_eq!(config.ransac.max_iterations, 1000);
        assert_eq!(config.ransac.inlier_tolerance, 25.0);
        assert_eq!(config.ransac.min_inlier_ratio, 0.005);
        assert_eq!(config.matching.ratio_threshold, 0.75);
        assert_eq!(config.alignment.sample_count, 0);
        assert!(!config.alignment.strict);
        assert!(config.search.strict);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_collects_every_error() {
        let mut config = Config::default();
        config.search.workers = 0;
        config.ransac.max_iterations = 0;
        config.matching.ratio_threshold = 1.5;
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("workers")));
    }

    #[test]
    fn test_toml_and_json_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.search.workers = 3;
        config.alignment.sampling_seed = Some(11);

        let toml_path = temp_dir.path().join("config.toml");
        config.save_to_file(&toml_path, ConfigFormat::Toml).unwrap();
        let loaded = Config::load_from_file(&toml_path).unwrap();
        assert_eq!(loaded.search.workers, 3);
        assert_eq!(loaded.alignment.sampling_seed, Some(11));

        let json_path = temp_dir.path().join("config.json");
        config.save_to_file(&json_path, ConfigFormat::Json).unwrap();
        let loaded = Config::load_from_file(&json_path).unwrap();
        assert_eq!(loaded.search.workers, 3);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str("[search]\nworkers = 2\nfilter = \"wing\"\n").unwrap();
        assert_eq!(config.search.workers, 2);
        assert_eq!(config.search.filter, "wing");
        assert_eq!(config.search.reference_dataset, "/reference");
        assert_eq!(config.ransac.min_inliers, 7);
    }

    #[test]
    fn test_no_file_means_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.ransac.max_iterations, 1000);
    }

    #[test]
    fn test_bad_config_file_is_an_error() {
        let missing = load_config(Some(Path::new("/nonexistent/refalign.toml")));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let temp_dir = TempDir::new().unwrap();
        let garbled = temp_dir.path().join("garbled.toml");
        fs::write(&garbled, "[search\nworkers = ").unwrap();
        assert!(matches!(load_config(Some(&garbled)), Err(ConfigError::Parse(_))));

        let invalid = temp_dir.path().join("invalid.toml");
        fs::write(&invalid, "[search]\nworkers = 0\n").unwrap();
        match load_config(Some(&invalid)) {
            Err(ConfigError::Invalid(message)) => assert!(message.contains("search.workers")),
            other => panic!("expected a validation error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_valid_config_file_is_kept() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("refalign.toml");
        fs::write(&path, "[search]\nreference_dataset = \"/raw/membrane\"\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.search.reference_dataset, "/raw/membrane");
    }
}
