use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::vision::{DEFAULT_ENDPOINT, Feature, FeatureRequest};

/// Top-level configuration for the cloud-vision client.
///
/// Missing fields in a config file fall back to their defaults, so a file
/// containing only `{"api_key": "..."}` is valid.
///
/// # Loading
///
/// ```rust,no_run
/// use cloud_vision::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.api_key = "AIza...".into();
/// config.batch_size = 16;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key appended to every annotate call.
    pub api_key: String,
    /// API root, without the trailing `/images:annotate`.
    pub endpoint: String,
    /// Maximum number of images per annotate call.
    pub batch_size: usize,
    /// Features requested for every image.
    pub features: Vec<FeatureConfig>,
    /// Per-request HTTP timeout. `None` leaves reqwest's default.
    pub timeout_secs: Option<u64>,
}

/// A feature and its `maxResults` bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub feature: Feature,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

fn default_max_results() -> u32 {
    1
}

impl From<FeatureConfig> for FeatureRequest {
    fn from(config: FeatureConfig) -> Self {
        FeatureRequest::new(config.feature, config.max_results)
    }
}

impl From<FeatureRequest> for FeatureConfig {
    fn from(request: FeatureRequest) -> Self {
        Self {
            feature: request.feature,
            max_results: request.max_results,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            batch_size: 10,
            features: vec![FeatureConfig {
                feature: Feature::LabelDetection,
                max_results: 10,
            }],
            timeout_secs: None,
        }
    }
}

impl Config {
    /// `config.json` in the directory holding the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Configured features in wire form.
    pub fn feature_requests(&self) -> Vec<FeatureRequest> {
        self.features.iter().copied().map(Into::into).collect()
    }
}
