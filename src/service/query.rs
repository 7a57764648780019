use std::sync::OnceLock;

use log::{debug, info, warn};

use super::api::{
    FilteredIndicesResponse, FilteredRowResponse, InfoResponse, Request, Response, RowResponse,
};
use super::context::ReadyContext;
use crate::config::ServiceConfig;
use crate::data::filter::FilterKind;
use crate::error::{EcgError, EcgResult};

// ---------------------------------------------------------------------------
// QueryService – Uninitialized → Ready, then read-only
// ---------------------------------------------------------------------------

/// Answers row and filter queries once the ready context is published.
///
/// The context sits behind a `OnceLock`, so it is either absent or complete;
/// there is no way back to the uninitialized state. Once ready the service is
/// lock-free and can be shared across threads.
#[derive(Debug, Default)]
pub struct QueryService {
    ready: OnceLock<ReadyContext>,
}

impl QueryService {
    /// A service in the uninitialized state.
    pub fn new() -> Self {
        Self::default()
    }

    /// A service that is ready from the start.
    pub fn with_context(context: ReadyContext) -> Self {
        let service = Self::new();
        let _ = service.ready.set(context);
        service
    }

    /// Run the startup sequence and publish the result.
    ///
    /// On failure the service stays uninitialized. A service that is
    /// already ready refuses with `AlreadyInitialized` and keeps its context.
    pub fn start(&self, config: &ServiceConfig) -> EcgResult<()> {
        if self.is_ready() {
            return Err(EcgError::AlreadyInitialized);
        }
        let context = ReadyContext::load(config)?;
        self.install(context)
    }

    pub fn install(&self, context: ReadyContext) -> EcgResult<()> {
        self.ready
            .set(context)
            .map_err(|_| EcgError::AlreadyInitialized)?;
        info!("Query service ready");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.get().is_some()
    }

    pub fn context(&self) -> EcgResult<&ReadyContext> {
        self.ready.get().ok_or(EcgError::ServiceNotReady)
    }

    /// Sample at an absolute row with its verdict.
    pub fn by_row(&self, row: i64) -> EcgResult<RowResponse> {
        let ctx = self.context()?;
        let dataset = ctx.dataset();
        let sample = dataset.get(row)?;
        let prediction = ctx.classify(&sample.signal)?;
        debug!("row {row}: label {} → {}", sample.label, prediction.class_name);

        Ok(RowResponse {
            row_index: sample.index,
            signal: sample.signal.clone(),
            actual_label: sample.label,
            actual_class: sample.class(),
            prediction,
            total_rows: dataset.len(),
        })
    }

    /// Absolute indices of the rows matching `kind`.
    pub fn filtered_indices(&self, kind: &str) -> EcgResult<FilteredIndicesResponse> {
        let ctx = self.context()?;
        let kind: FilterKind = kind.parse()?;
        let indices = ctx.dataset().view(kind).to_vec();

        Ok(FilteredIndicesResponse {
            filter_type: kind,
            count: indices.len(),
            indices,
            total_rows: ctx.dataset().len(),
        })
    }

    /// The `filtered_index`-th row of the `kind` view, with its verdict.
    pub fn by_filter(&self, kind: &str, filtered_index: i64) -> EcgResult<FilteredRowResponse> {
        let ctx = self.context()?;
        let kind: FilterKind = kind.parse()?;
        let view = ctx.dataset().view(kind);

        let position = usize::try_from(filtered_index)
            .ok()
            .filter(|&i| i < view.len())
            .ok_or(EcgError::OutOfRange {
                index: filtered_index,
                len: view.len(),
            })?;
        let row = view[position];

        let RowResponse {
            row_index,
            signal,
            actual_label,
            actual_class,
            prediction,
            total_rows,
        } = self.by_row(row as i64)?;

        Ok(FilteredRowResponse {
            row_index,
            filtered_index: position,
            filter_type: kind,
            signal,
            actual_label,
            actual_class,
            prediction,
            total_filtered: view.len(),
            total_rows,
        })
    }

    /// Dataset size, signal length and class counts.
    pub fn info(&self) -> EcgResult<InfoResponse> {
        let ctx = self.context()?;
        let summary = ctx.dataset().summary();

        Ok(InfoResponse {
            total_rows: summary.total_rows,
            signal_length: summary.signal_length,
            class_distribution: summary.class_distribution(),
            label_distribution: summary.label_distribution(),
            model: ctx.model_variant(),
        })
    }

    /// Dispatch a request; errors become structured error responses.
    pub fn handle(&self, request: &Request) -> Response {
        let result = match request {
            Request::Row { index } => self.by_row(*index).map(Response::Row),
            Request::FilteredIndices { kind } => {
                self.filtered_indices(kind).map(Response::FilteredIndices)
            }
            Request::FilteredRow {
                kind,
                filtered_index,
            } => self
                .by_filter(kind, *filtered_index)
                .map(Response::FilteredRow),
            Request::Info => self.info().map(Response::Info),
        };
        result.unwrap_or_else(|err| {
            debug!("request {request:?} failed: {err}");
            Response::from(err)
        })
    }

    /// Parse one JSON request line and answer it.
    ///
    /// A line that is not valid JSON or names an unknown `op` becomes an
    /// `invalid_request` response.
    pub fn handle_line(&self, line: &str) -> Response {
        match serde_json::from_str::<Request>(line) {
            Ok(request) => self.handle(&request),
            Err(e) => {
                warn!("Malformed request {line:?}: {e}");
                Response::from(EcgError::InvalidRequest(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::EcgDataset;
    use crate::inference::classifier::{Classifier, ClassifierAdapter, ModelVariant};

    /// Scores a signal by its mean normalized amplitude.
    #[derive(Debug)]
    struct MeanClassifier(usize);

    impl Classifier for MeanClassifier {
        fn input_len(&self) -> usize {
            self.0
        }

        fn variant(&self) -> ModelVariant {
            ModelVariant::LoadedFromArtifact
        }

        fn score(&self, normalized: &[f64]) -> f64 {
            normalized.iter().sum::<f64>() / normalized.len() as f64
        }
    }

    fn service(labels: &[f64]) -> QueryService {
        let rows = labels
            .iter()
            .enumerate()
            .map(|(i, &label)| (vec![i as f64; 3], label))
            .collect();
        let dataset = EcgDataset::from_rows(rows).unwrap();
        let classifier = ClassifierAdapter::from_classifier(Box::new(MeanClassifier(3)));
        QueryService::with_context(ReadyContext::with_classifier(dataset, classifier).unwrap())
    }

    #[test]
    fn uninitialized_service_refuses_queries() {
        let svc = QueryService::new();
        assert!(!svc.is_ready());
        assert_eq!(svc.by_row(0).unwrap_err(), EcgError::ServiceNotReady);
        assert_eq!(svc.info().unwrap_err(), EcgError::ServiceNotReady);
        assert_eq!(
            svc.filtered_indices("all").unwrap_err(),
            EcgError::ServiceNotReady
        );
        assert_eq!(
            svc.by_filter("normal", 0).unwrap_err(),
            EcgError::ServiceNotReady
        );
    }

    #[test]
    fn by_filter_maps_to_absolute_row() {
        let svc = service(&[0.0, 2.0, 0.0, 1.0]);
        let resp = svc.by_filter("abnormal", 1).unwrap();
        assert_eq!(resp.row_index, 3);
        assert_eq!(resp.filtered_index, 1);
        assert_eq!(resp.total_filtered, 2);
        assert_eq!(resp.total_rows, 4);
        assert_eq!(resp.actual_label, 1.0);

        let direct = svc.by_row(3).unwrap();
        assert_eq!(resp.signal, direct.signal);
        assert_eq!(resp.prediction, direct.prediction);
    }

    #[test]
    fn verdict_comes_from_normalized_signal() {
        // values 0..=3 normalize to 0, 1/3, 2/3, 1
        let svc = service(&[0.0, 0.0, 1.0, 1.0]);
        let low = svc.by_row(0).unwrap().prediction;
        assert_eq!(low.class_name, "Normal");
        assert_eq!(low.confidence, 1.0);

        let high = svc.by_row(3).unwrap().prediction;
        assert_eq!(high.predicted_class, 1);
        assert_eq!(high.raw_score, 1.0);
    }

    #[test]
    fn out_of_range_and_invalid_filter() {
        let svc = service(&[0.0, 2.0, 0.0, 1.0]);
        assert_eq!(
            svc.by_row(4).unwrap_err(),
            EcgError::OutOfRange { index: 4, len: 4 }
        );
        assert_eq!(
            svc.by_row(-1).unwrap_err(),
            EcgError::OutOfRange { index: -1, len: 4 }
        );
        assert_eq!(
            svc.by_filter("normal", 2).unwrap_err(),
            EcgError::OutOfRange { index: 2, len: 2 }
        );
        assert_eq!(
            svc.by_filter("normal", -1).unwrap_err(),
            EcgError::OutOfRange { index: -1, len: 2 }
        );
        assert_eq!(
            svc.filtered_indices("sideways").unwrap_err(),
            EcgError::InvalidFilter("sideways".into())
        );
    }

    #[test]
    fn handle_turns_errors_into_responses() {
        let svc = service(&[0.0, 2.0]);
        let resp = svc.handle(&Request::Row { index: 9 });
        match resp {
            Response::Error(err) => assert_eq!(err.kind, "out_of_range"),
            other => panic!("expected error response, got {other:?}"),
        }
        assert!(!svc.handle(&Request::Info).is_error());
    }

    #[test]
    fn handle_line_answers_json_requests() {
        let svc = service(&[0.0, 2.0, 0.0, 1.0]);

        match svc.handle_line(r#"{"op":"filtered_row","kind":"abnormal","filtered_index":1}"#) {
            Response::FilteredRow(row) => {
                assert_eq!(row.row_index, 3);
                assert_eq!(row.total_filtered, 2);
            }
            other => panic!("expected a filtered row, got {other:?}"),
        }

        for line in [r#"{"op":"row","index":"#, r#"{"op":"teleport"}"#, "not json"] {
            match svc.handle_line(line) {
                Response::Error(err) => assert_eq!(err.kind, "invalid_request"),
                other => panic!("expected invalid_request for {line:?}, got {other:?}"),
            }
        }

        // a well-formed request still reports its own error kind
        let json = serde_json::to_value(svc.handle_line(r#"{"op":"row","index":-1}"#)).unwrap();
        assert_eq!(json["kind"], "out_of_range");
    }

    #[test]
    fn handle_line_before_ready_is_not_ready() {
        let svc = QueryService::new();
        match svc.handle_line(r#"{"op":"info"}"#) {
            Response::Error(err) => assert_eq!(err.kind, "service_not_ready"),
            other => panic!("expected service_not_ready, got {other:?}"),
        }
    }

    #[test]
    fn cannot_initialize_twice() {
        let svc = service(&[0.0]);
        let dataset = EcgDataset::from_rows(vec![(vec![1.0; 3], 0.0)]).unwrap();
        let classifier = ClassifierAdapter::from_classifier(Box::new(MeanClassifier(3)));
        let ctx = ReadyContext::with_classifier(dataset, classifier).unwrap();
        assert_eq!(svc.install(ctx).unwrap_err(), EcgError::AlreadyInitialized);
        assert_eq!(
            svc.start(&ServiceConfig::default()).unwrap_err(),
            EcgError::AlreadyInitialized
        );
        assert_eq!(svc.info().unwrap().total_rows, 1);
    }

    #[test]
    fn info_reports_counts() {
        let svc = service(&[0.0, 2.0, 0.0, 1.0]);
        let info = svc.info().unwrap();
        assert_eq!(info.total_rows, 4);
        assert_eq!(info.signal_length, 3);
        assert_eq!(info.class_distribution["Normal"], 2);
        assert_eq!(info.class_distribution["Abnormal"], 2);
        assert_eq!(info.label_distribution["0.0"], 2);
    }
}
