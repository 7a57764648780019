use log::debug;

use crate::error::{EcgError, EcgResult};

// ---------------------------------------------------------------------------
// Min-max scaler (single channel)
// ---------------------------------------------------------------------------

/// Fitted range of the single signal channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalerRange {
    pub min: f64,
    pub max: f64,
}

/// Per-channel min-max scaler, fitted once over the whole dataset.
///
/// `transform` always uses the fit-time range, so a signal outside that
/// range maps outside `[0, 1]`. A constant channel (`min == max`) maps to 0.
#[derive(Debug, Clone, Default)]
pub struct MinMaxScaler {
    range: Option<ScalerRange>,
}

impl MinMaxScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute min and max over the flattened pool of signal values.
    pub fn fit<I>(&mut self, values: I) -> EcgResult<()>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut seen = 0usize;
        for v in values {
            min = min.min(v);
            max = max.max(v);
            seen += 1;
        }
        if seen == 0 {
            return Err(EcgError::DataLoad(
                "cannot fit scaler on an empty value pool".into(),
            ));
        }

        debug!("Scaler fitted on {seen} values: min={min}, max={max}");
        self.range = Some(ScalerRange { min, max });
        Ok(())
    }

    pub fn range(&self) -> Option<ScalerRange> {
        self.range
    }

    pub fn is_fitted(&self) -> bool {
        self.range.is_some()
    }

    /// Element-wise `(x - min) / (max - min)` with the fitted range.
    pub fn transform(&self, signal: &[f64]) -> EcgResult<Vec<f64>> {
        let ScalerRange { min, max } = self.range.ok_or(EcgError::NotFitted)?;
        let span = max - min;
        if span == 0.0 {
            return Ok(vec![0.0; signal.len()]);
        }
        Ok(signal.iter().map(|&x| (x - min) / span).collect())
    }
}
