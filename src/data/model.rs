use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::filter::{FilterKind, FilterViews};
use crate::error::{EcgError, EcgResult};

/// A label within this distance of 0.0 counts as Normal. Labels are stored
/// as floats and the nominal 0.0 may carry representation noise.
pub const NORMAL_TOLERANCE: f64 = 0.001;

// ---------------------------------------------------------------------------
// LabelClass – binary class derived from a label
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LabelClass {
    Normal,
    Abnormal,
}

impl LabelClass {
    pub fn from_label(label: f64) -> Self {
        if (label - 0.0).abs() < NORMAL_TOLERANCE {
            LabelClass::Normal
        } else {
            LabelClass::Abnormal
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LabelClass::Normal => "Normal",
            LabelClass::Abnormal => "Abnormal",
        }
    }
}

impl fmt::Display for LabelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// BeatType – MIT-BIH heartbeat category encoded by the label
// ---------------------------------------------------------------------------

/// Descriptive heartbeat category. Only used for display; the binary
/// [`LabelClass`] rule decides Normal/Abnormal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BeatType {
    Normal,
    SupraventricularPremature,
    PrematureVentricular,
    Fusion,
    Unknown,
    /// Label outside the 0..=4 code table.
    Unclassified,
}

impl BeatType {
    pub const ALL: [BeatType; 6] = [
        BeatType::Normal,
        BeatType::SupraventricularPremature,
        BeatType::PrematureVentricular,
        BeatType::Fusion,
        BeatType::Unknown,
        BeatType::Unclassified,
    ];

    pub fn from_label(label: f64) -> Self {
        let code = label.round();
        if (label - code).abs() >= NORMAL_TOLERANCE {
            return BeatType::Unclassified;
        }
        match code as i64 {
            0 => BeatType::Normal,
            1 => BeatType::SupraventricularPremature,
            2 => BeatType::PrematureVentricular,
            3 => BeatType::Fusion,
            4 => BeatType::Unknown,
            _ => BeatType::Unclassified,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            BeatType::Normal => "Normal heartbeat",
            BeatType::SupraventricularPremature => "Supraventricular premature beat",
            BeatType::PrematureVentricular => "Premature ventricular contraction",
            BeatType::Fusion => "Fusion of ventricular beat",
            BeatType::Unknown => "Unknown beat type",
            BeatType::Unclassified => "Unclassified label",
        }
    }
}

impl fmt::Display for BeatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

// ---------------------------------------------------------------------------
// Sample – one row of the dataset file
// ---------------------------------------------------------------------------

/// A single heartbeat (one row of the source file).
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Absolute row index, equal to the load order.
    pub index: usize,
    /// Amplitude samples, `signal_len` of them.
    pub signal: Vec<f64>,
    /// Ground-truth label from the last column.
    pub label: f64,
}

impl Sample {
    pub fn class(&self) -> LabelClass {
        LabelClass::from_label(self.label)
    }

    pub fn beat_type(&self) -> BeatType {
        BeatType::from_label(self.label)
    }
}

// ---------------------------------------------------------------------------
// DatasetSummary – counts computed once at load time
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub total_rows: usize,
    pub signal_length: usize,
    pub normal_count: usize,
    pub abnormal_count: usize,
    /// Distinct raw labels in ascending order with their row counts.
    pub label_counts: Vec<(f64, usize)>,
}

impl DatasetSummary {
    /// `"Normal"`/`"Abnormal"` → count.
    pub fn class_distribution(&self) -> BTreeMap<String, usize> {
        BTreeMap::from([
            (LabelClass::Normal.name().to_string(), self.normal_count),
            (LabelClass::Abnormal.name().to_string(), self.abnormal_count),
        ])
    }

    /// Raw label (formatted like `2.0`) → count.
    pub fn label_distribution(&self) -> BTreeMap<String, usize> {
        self.label_counts
            .iter()
            .map(|(label, count)| (format!("{label:?}"), *count))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// EcgDataset – the complete loaded dataset
// ---------------------------------------------------------------------------

/// The immutable dataset with its filter views and summary pre-computed.
#[derive(Debug, Clone)]
pub struct EcgDataset {
    samples: Vec<Sample>,
    signal_len: usize,
    views: FilterViews,
    summary: DatasetSummary,
}

impl EcgDataset {
    /// Build the index from `(signal, label)` rows in load order.
    ///
    /// Fails when there are no rows, a signal is empty, or signal lengths
    /// differ between rows.
    pub fn from_rows(rows: Vec<(Vec<f64>, f64)>) -> EcgResult<Self> {
        let Some((first, _)) = rows.first() else {
            return Err(EcgError::DataLoad("dataset contains no rows".into()));
        };
        let signal_len = first.len();
        if signal_len == 0 {
            return Err(EcgError::DataLoad("row 0 has no signal columns".into()));
        }

        let mut samples = Vec::with_capacity(rows.len());
        for (index, (signal, label)) in rows.into_iter().enumerate() {
            if signal.len() != signal_len {
                return Err(EcgError::DataLoad(format!(
                    "row {index} has {} signal values, expected {signal_len}",
                    signal.len()
                )));
            }
            samples.push(Sample { index, signal, label });
        }

        let views = FilterViews::build(&samples);
        let summary = summarize(&samples, signal_len, &views);

        Ok(EcgDataset {
            samples,
            signal_len,
            views,
            summary,
        })
    }

    /// Number of samples (N).
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false for a constructed dataset; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Signal length (L) shared by every sample.
    pub fn signal_len(&self) -> usize {
        self.signal_len
    }

    /// Fetch a sample by absolute row index.
    pub fn get(&self, row: i64) -> EcgResult<&Sample> {
        usize::try_from(row)
            .ok()
            .and_then(|i| self.samples.get(i))
            .ok_or(EcgError::OutOfRange {
                index: row,
                len: self.samples.len(),
            })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Ordered absolute indices of the rows matching `kind`.
    pub fn view(&self, kind: FilterKind) -> &[usize] {
        self.views.resolve(kind)
    }

    pub fn summary(&self) -> &DatasetSummary {
        &self.summary
    }

    /// Every signal value of every sample, in row order.
    pub fn flattened_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().flat_map(|s| s.signal.iter().copied())
    }
}

fn summarize(samples: &[Sample], signal_len: usize, views: &FilterViews) -> DatasetSummary {
    let mut label_counts: Vec<(f64, usize)> = Vec::new();
    for sample in samples {
        match label_counts
            .iter_mut()
            .find(|(label, _)| label.total_cmp(&sample.label).is_eq())
        {
            Some((_, count)) => *count += 1,
            None => label_counts.push((sample.label, 1)),
        }
    }
    label_counts.sort_by(|a, b| a.0.total_cmp(&b.0));

    DatasetSummary {
        total_rows: samples.len(),
        signal_length: signal_len,
        normal_count: views.resolve(FilterKind::Normal).len(),
        abnormal_count: views.resolve(FilterKind::Abnormal).len(),
        label_counts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(labels: &[f64]) -> Vec<(Vec<f64>, f64)> {
        labels
            .iter()
            .enumerate()
            .map(|(i, &l)| (vec![i as f64, 1.0, 2.0], l))
            .collect()
    }

    #[test]
    fn label_class_uses_tolerance() {
        assert_eq!(LabelClass::from_label(0.0), LabelClass::Normal);
        assert_eq!(LabelClass::from_label(0.0009), LabelClass::Normal);
        assert_eq!(LabelClass::from_label(-0.0009), LabelClass::Normal);
        assert_eq!(LabelClass::from_label(0.001), LabelClass::Abnormal);
        assert_eq!(LabelClass::from_label(2.0), LabelClass::Abnormal);
    }

    #[test]
    fn beat_types_follow_label_codes() {
        assert_eq!(BeatType::from_label(0.0), BeatType::Normal);
        assert_eq!(BeatType::from_label(2.0), BeatType::PrematureVentricular);
        assert_eq!(BeatType::from_label(4.0004), BeatType::Unknown);
        assert_eq!(BeatType::from_label(1.5), BeatType::Unclassified);
        assert_eq!(BeatType::from_label(9.0), BeatType::Unclassified);
    }

    #[test]
    fn indices_are_contiguous_in_load_order() {
        let ds = EcgDataset::from_rows(rows(&[0.0, 2.0, 0.0, 1.0])).unwrap();
        assert_eq!(ds.len(), 4);
        assert_eq!(ds.signal_len(), 3);
        for (i, sample) in ds.samples().iter().enumerate() {
            assert_eq!(sample.index, i);
            assert_eq!(sample.signal[0], i as f64);
        }
    }

    #[test]
    fn get_rejects_out_of_range() {
        let ds = EcgDataset::from_rows(rows(&[0.0, 1.0])).unwrap();
        assert_eq!(ds.get(1).unwrap().label, 1.0);
        assert_eq!(ds.get(2), Err(EcgError::OutOfRange { index: 2, len: 2 }));
        assert_eq!(ds.get(-1), Err(EcgError::OutOfRange { index: -1, len: 2 }));
    }

    #[test]
    fn rejects_empty_and_ragged_rows() {
        assert!(matches!(
            EcgDataset::from_rows(Vec::new()),
            Err(EcgError::DataLoad(_))
        ));
        let ragged = vec![(vec![1.0, 2.0], 0.0), (vec![1.0], 1.0)];
        assert!(matches!(
            EcgDataset::from_rows(ragged),
            Err(EcgError::DataLoad(_))
        ));
    }

    #[test]
    fn summary_counts_classes_and_labels() {
        let ds = EcgDataset::from_rows(rows(&[0.0, 2.0, 0.0, 1.0, 2.0])).unwrap();
        let summary = ds.summary();
        assert_eq!(summary.total_rows, 5);
        assert_eq!(summary.signal_length, 3);
        assert_eq!(summary.normal_count, 2);
        assert_eq!(summary.abnormal_count, 3);
        assert_eq!(summary.label_counts, vec![(0.0, 2), (1.0, 1), (2.0, 2)]);
        assert_eq!(summary.label_distribution().get("2.0"), Some(&2));
        assert_eq!(summary.class_distribution().get("Normal"), Some(&2));
    }
}
