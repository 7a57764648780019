use log::{info, warn};

use crate::config::ServiceConfig;
use crate::data::loader::load_file;
use crate::data::model::{EcgDataset, LabelClass};
use crate::error::{EcgError, EcgResult};
use crate::inference::classifier::{ClassifierAdapter, ModelVariant};
use crate::inference::scaler::MinMaxScaler;
use crate::inference::verdict::Verdict;

// ---------------------------------------------------------------------------
// ReadyContext – everything a request needs, built once
// ---------------------------------------------------------------------------

/// Dataset, fitted scaler and classifier. Never mutated after construction.
#[derive(Debug)]
pub struct ReadyContext {
    dataset: EcgDataset,
    scaler: MinMaxScaler,
    classifier: ClassifierAdapter,
}

impl ReadyContext {
    /// Startup sequence: dataset load → scaler fit → classifier load.
    pub fn load(config: &ServiceConfig) -> EcgResult<Self> {
        info!("Loading dataset from {}", config.dataset_path.display());
        let dataset = load_file(&config.dataset_path)?;
        log_label_distribution(&dataset);

        let scaler = fit_scaler(&dataset)?;
        let classifier = ClassifierAdapter::load(config, dataset.signal_len())?;
        Self::assemble(dataset, scaler, classifier)
    }

    /// Build a context around an already chosen classifier.
    pub fn with_classifier(dataset: EcgDataset, classifier: ClassifierAdapter) -> EcgResult<Self> {
        let scaler = fit_scaler(&dataset)?;
        Self::assemble(dataset, scaler, classifier)
    }

    fn assemble(
        dataset: EcgDataset,
        scaler: MinMaxScaler,
        classifier: ClassifierAdapter,
    ) -> EcgResult<Self> {
        if classifier.input_len() != dataset.signal_len() {
            return Err(EcgError::ModelUnavailable(format!(
                "classifier expects {} samples per signal, dataset has {}",
                classifier.input_len(),
                dataset.signal_len()
            )));
        }
        if classifier.variant() == ModelVariant::FreshlyInitialized {
            warn!("Serving with an untrained fallback network");
        }
        info!("Classifier ready ({})", classifier.variant());
        Ok(ReadyContext {
            dataset,
            scaler,
            classifier,
        })
    }

    pub fn dataset(&self) -> &EcgDataset {
        &self.dataset
    }

    pub fn scaler(&self) -> &MinMaxScaler {
        &self.scaler
    }

    pub fn model_variant(&self) -> ModelVariant {
        self.classifier.variant()
    }

    /// Normalize with the fitted range, score, and threshold.
    pub fn classify(&self, signal: &[f64]) -> EcgResult<Verdict> {
        let normalized = self.scaler.transform(signal)?;
        let raw_score = self.classifier.predict(&normalized)?;
        Ok(Verdict::from_score(raw_score))
    }
}

fn fit_scaler(dataset: &EcgDataset) -> EcgResult<MinMaxScaler> {
    let mut scaler = MinMaxScaler::new();
    scaler.fit(dataset.flattened_values())?;
    if let Some(range) = scaler.range() {
        info!("Scaler range: [{}, {}]", range.min, range.max);
        if range.min == range.max {
            warn!("Signal values are constant across the dataset, every signal normalizes to 0");
        }
    }
    Ok(scaler)
}

fn log_label_distribution(dataset: &EcgDataset) {
    info!("Label distribution:");
    for (label, count) in &dataset.summary().label_counts {
        info!(
            "  Label {label:?} ({}): {count} samples",
            LabelClass::from_label(*label)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::classifier::FallbackClassifier;

    #[test]
    fn rejects_classifier_of_wrong_length() {
        let dataset = EcgDataset::from_rows(vec![(vec![0.0; 20], 0.0)]).unwrap();
        let classifier =
            ClassifierAdapter::from_classifier(Box::new(FallbackClassifier::new(24, 1).unwrap()));
        let err = ReadyContext::with_classifier(dataset, classifier).unwrap_err();
        assert_eq!(err.kind(), "model_unavailable");
    }

    #[test]
    fn classify_rejects_wrong_signal_length() {
        let dataset = EcgDataset::from_rows(vec![(vec![0.5; 16], 0.0), (vec![1.5; 16], 1.0)]).unwrap();
        let classifier =
            ClassifierAdapter::from_classifier(Box::new(FallbackClassifier::new(16, 1).unwrap()));
        let ctx = ReadyContext::with_classifier(dataset, classifier).unwrap();
        assert_eq!(
            ctx.classify(&[0.0; 10]).unwrap_err(),
            EcgError::ShapeMismatch { expected: 16, actual: 10 }
        );
        assert!(ctx.classify(&[1.0; 16]).is_ok());
    }
}
