use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EcgError, EcgResult};

// ---------------------------------------------------------------------------
// Service configuration
// ---------------------------------------------------------------------------

/// Where the dataset and model come from, and what to do when the model
/// artifact cannot be used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Headerless signal table (CSV, JSON or Parquet).
    pub dataset_path: PathBuf,
    /// Model artifact; `None` goes straight to the fallback network.
    pub model_path: Option<PathBuf>,
    /// Build a freshly initialized network when the artifact is unusable.
    pub allow_fallback: bool,
    /// Seed for the fallback network's weights.
    pub fallback_seed: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("sample_mitbih.csv"),
            model_path: Some(PathBuf::from("ecg_model.json")),
            allow_fallback: true,
            fallback_seed: 42,
        }
    }
}

impl ServiceConfig {
    /// Defaults, then the JSON file named by `ECG_CONFIG`, then the
    /// `ECG_DATASET`, `ECG_MODEL`, `ECG_ALLOW_FALLBACK` and
    /// `ECG_FALLBACK_SEED` overrides.
    pub fn from_env() -> EcgResult<Self> {
        let mut config = match std::env::var_os("ECG_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> EcgResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| EcgError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| EcgError::Config(format!("{}: {e}", path.display())))
    }

    /// Apply `ECG_*` overrides from `lookup`. An empty or `none` model path
    /// disables the artifact.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> EcgResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dataset) = lookup("ECG_DATASET") {
            self.dataset_path = PathBuf::from(dataset);
        }
        if let Some(model) = lookup("ECG_MODEL") {
            let trimmed = model.trim();
            self.model_path = if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(PathBuf::from(trimmed))
            };
        }
        if let Some(flag) = lookup("ECG_ALLOW_FALLBACK") {
            self.allow_fallback = parse_bool(&flag)
                .ok_or_else(|| EcgError::Config(format!("ECG_ALLOW_FALLBACK: '{flag}' is not a boolean")))?;
        }
        if let Some(seed) = lookup("ECG_FALLBACK_SEED") {
            self.fallback_seed = seed
                .trim()
                .parse()
                .map_err(|_| EcgError::Config(format!("ECG_FALLBACK_SEED: '{seed}' is not an integer")))?;
        }
        Ok(())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
