use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::model::{LabelClass, Sample};
use crate::error::EcgError;

// ---------------------------------------------------------------------------
// FilterKind – named subset selector
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    All,
    Normal,
    Abnormal,
}

impl FilterKind {
    pub const ALL: [FilterKind; 3] = [FilterKind::All, FilterKind::Normal, FilterKind::Abnormal];

    pub fn as_str(self) -> &'static str {
        match self {
            FilterKind::All => "all",
            FilterKind::Normal => "normal",
            FilterKind::Abnormal => "abnormal",
        }
    }
}

impl FromStr for FilterKind {
    type Err = EcgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(FilterKind::All),
            "normal" => Ok(FilterKind::Normal),
            "abnormal" => Ok(FilterKind::Abnormal),
            _ => Err(EcgError::InvalidFilter(s.to_string())),
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FilterViews – memoized index lists, one per kind
// ---------------------------------------------------------------------------

/// Absolute row indices for each [`FilterKind`], in dataset order.
///
/// Built by a single scan when the dataset is constructed. The dataset is
/// immutable, so the views never go stale.
#[derive(Debug, Clone, Default)]
pub struct FilterViews {
    all: Vec<usize>,
    normal: Vec<usize>,
    abnormal: Vec<usize>,
}

impl FilterViews {
    pub fn build(samples: &[Sample]) -> Self {
        let mut views = FilterViews {
            all: Vec::with_capacity(samples.len()),
            ..Default::default()
        };
        for sample in samples {
            views.all.push(sample.index);
            match sample.class() {
                LabelClass::Normal => views.normal.push(sample.index),
                LabelClass::Abnormal => views.abnormal.push(sample.index),
            }
        }
        views
    }

    pub fn resolve(&self, kind: FilterKind) -> &[usize] {
        match kind {
            FilterKind::All => &self.all,
            FilterKind::Normal => &self.normal,
            FilterKind::Abnormal => &self.abnormal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(labels: &[f64]) -> Vec<Sample> {
        labels
            .iter()
            .enumerate()
            .map(|(index, &label)| Sample {
                index,
                signal: vec![0.0; 4],
                label,
            })
            .collect()
    }

    #[test]
    fn parses_known_kinds_only() {
        assert_eq!("all".parse::<FilterKind>(), Ok(FilterKind::All));
        assert_eq!(" Normal ".parse::<FilterKind>(), Ok(FilterKind::Normal));
        assert_eq!("ABNORMAL".parse::<FilterKind>(), Ok(FilterKind::Abnormal));
        assert_eq!(
            "weird".parse::<FilterKind>(),
            Err(EcgError::InvalidFilter("weird".into()))
        );
    }

    #[test]
    fn resolves_example_views() {
        let views = FilterViews::build(&samples(&[0.0, 2.0, 0.0, 1.0]));
        assert_eq!(views.resolve(FilterKind::All), &[0, 1, 2, 3]);
        assert_eq!(views.resolve(FilterKind::Normal), &[0, 2]);
        assert_eq!(views.resolve(FilterKind::Abnormal), &[1, 3]);
    }

    #[test]
    fn normal_and_abnormal_partition_all() {
        let labels = [0.0, 0.0004, 3.0, 0.002, 4.0, 0.0, -0.0, 1.0, 2.0];
        let views = FilterViews::build(&samples(&labels));

        let mut union: Vec<usize> = views
            .resolve(FilterKind::Normal)
            .iter()
            .chain(views.resolve(FilterKind::Abnormal))
            .copied()
            .collect();
        union.sort_unstable();
        assert_eq!(union, views.resolve(FilterKind::All));

        for i in views.resolve(FilterKind::Normal) {
            assert!(!views.resolve(FilterKind::Abnormal).contains(i));
        }
        assert_eq!(views.resolve(FilterKind::All).len(), labels.len());
    }

    #[test]
    fn views_keep_dataset_order() {
        let views = FilterViews::build(&samples(&[1.0, 0.0, 1.0, 0.0, 1.0]));
        for kind in FilterKind::ALL {
            let view = views.resolve(kind);
            assert!(view.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
