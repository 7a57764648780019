use std::fmt;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;

use super::network::{ConvNet, ModelArtifact};
use crate::config::ServiceConfig;
use crate::error::{EcgError, EcgResult};

// ---------------------------------------------------------------------------
// Classifier capability
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    LoadedFromArtifact,
    FreshlyInitialized,
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelVariant::LoadedFromArtifact => f.write_str("loaded from artifact"),
            ModelVariant::FreshlyInitialized => f.write_str("freshly initialized fallback"),
        }
    }
}

/// Something that maps a normalized signal to P(abnormal).
///
/// Callers go through [`ClassifierAdapter::predict`], which checks the input
/// length before `score` is reached.
pub trait Classifier: Send + Sync + fmt::Debug {
    fn input_len(&self) -> usize;
    fn variant(&self) -> ModelVariant;
    fn score(&self, normalized: &[f64]) -> f64;
}

/// Network restored from a model artifact.
#[derive(Debug)]
pub struct ArtifactClassifier {
    network: ConvNet,
    source: PathBuf,
}

impl ArtifactClassifier {
    pub fn load(path: &Path, input_len: usize) -> anyhow::Result<Self> {
        let network = ModelArtifact::read(path, input_len)?;
        Ok(ArtifactClassifier {
            network,
            source: path.to_path_buf(),
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

impl Classifier for ArtifactClassifier {
    fn input_len(&self) -> usize {
        self.network.input_len
    }

    fn variant(&self) -> ModelVariant {
        ModelVariant::LoadedFromArtifact
    }

    fn score(&self, normalized: &[f64]) -> f64 {
        self.network.forward(normalized)
    }
}

/// Same architecture with seeded random weights. Its scores carry no
/// diagnostic meaning; it keeps the pipeline serviceable.
#[derive(Debug)]
pub struct FallbackClassifier {
    network: ConvNet,
}

impl FallbackClassifier {
    pub fn new(input_len: usize, seed: u64) -> anyhow::Result<Self> {
        Ok(FallbackClassifier {
            network: ConvNet::initialized(input_len, seed)?,
        })
    }
}

impl Classifier for FallbackClassifier {
    fn input_len(&self) -> usize {
        self.network.input_len
    }

    fn variant(&self) -> ModelVariant {
        ModelVariant::FreshlyInitialized
    }

    fn score(&self, normalized: &[f64]) -> f64 {
        self.network.forward(normalized)
    }
}

// ---------------------------------------------------------------------------
// ClassifierAdapter – variant selection and shape checks
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ClassifierAdapter {
    model: Box<dyn Classifier>,
}

impl ClassifierAdapter {
    /// Pick a classifier for signals of `input_len`: the artifact when it
    /// loads and matches, otherwise the fallback network if allowed.
    pub fn load(config: &ServiceConfig, input_len: usize) -> EcgResult<Self> {
        let artifact_error = match &config.model_path {
            Some(path) => match ArtifactClassifier::load(path, input_len) {
                Ok(model) => {
                    info!("Model loaded from {}", model.source().display());
                    return Ok(Self::from_classifier(Box::new(model)));
                }
                Err(e) => format!("{}: {e:#}", path.display()),
            },
            None => "no model artifact configured".to_string(),
        };

        if !config.allow_fallback {
            return Err(EcgError::ModelUnavailable(artifact_error));
        }

        warn!("Model artifact unusable ({artifact_error}), building fallback network");
        let fallback = FallbackClassifier::new(input_len, config.fallback_seed).map_err(|e| {
            EcgError::ModelUnavailable(format!("{artifact_error}; fallback failed: {e:#}"))
        })?;
        warn!(
            "Created fallback model architecture with seed {} (predictions may not be accurate)",
            config.fallback_seed
        );
        Ok(Self::from_classifier(Box::new(fallback)))
    }

    pub fn from_classifier(model: Box<dyn Classifier>) -> Self {
        ClassifierAdapter { model }
    }

    pub fn input_len(&self) -> usize {
        self.model.input_len()
    }

    pub fn variant(&self) -> ModelVariant {
        self.model.variant()
    }

    /// Raw P(abnormal) for a normalized signal of exactly `input_len` values.
    pub fn predict(&self, normalized: &[f64]) -> EcgResult<f64> {
        let expected = self.model.input_len();
        if normalized.len() != expected {
            return Err(EcgError::ShapeMismatch {
                expected,
                actual: normalized.len(),
            });
        }
        Ok(self.model.score(normalized))
    }
}
