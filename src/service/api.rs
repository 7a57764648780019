use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::filter::FilterKind;
use crate::data::model::LabelClass;
use crate::error::EcgError;
use crate::inference::classifier::ModelVariant;
use crate::inference::verdict::Verdict;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// One call on the logical request surface.
///
/// Filter kinds stay strings here so an unknown kind reaches the service and
/// comes back as an `invalid_filter` response rather than a parse failure.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Row { index: i64 },
    FilteredIndices { kind: String },
    FilteredRow { kind: String, filtered_index: i64 },
    Info,
}

// ---------------------------------------------------------------------------
// Responses – one fixed schema per operation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowResponse {
    pub row_index: usize,
    #[serde(rename = "signal_data")]
    pub signal: Vec<f64>,
    pub actual_label: f64,
    pub actual_class: LabelClass,
    pub prediction: Verdict,
    pub total_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredIndicesResponse {
    pub filter_type: FilterKind,
    pub indices: Vec<usize>,
    pub count: usize,
    pub total_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredRowResponse {
    pub row_index: usize,
    pub filtered_index: usize,
    pub filter_type: FilterKind,
    #[serde(rename = "signal_data")]
    pub signal: Vec<f64>,
    pub actual_label: f64,
    pub actual_class: LabelClass,
    pub prediction: Verdict,
    pub total_filtered: usize,
    pub total_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfoResponse {
    pub total_rows: usize,
    pub signal_length: usize,
    /// `Normal` / `Abnormal` → row count.
    pub class_distribution: BTreeMap<String, usize>,
    /// Raw label → row count.
    pub label_distribution: BTreeMap<String, usize>,
    pub model: ModelVariant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub kind: &'static str,
    pub error: String,
}

impl From<&EcgError> for ErrorResponse {
    fn from(err: &EcgError) -> Self {
        ErrorResponse {
            kind: err.kind(),
            error: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Row(RowResponse),
    FilteredIndices(FilteredIndicesResponse),
    FilteredRow(FilteredRowResponse),
    Info(InfoResponse),
    Error(ErrorResponse),
}

impl Response {
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }
}

impl From<EcgError> for Response {
    fn from(err: EcgError) -> Self {
        Response::Error(ErrorResponse::from(&err))
    }
}
