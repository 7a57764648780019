use std::path::PathBuf;

use rusty_ecg::config::ServiceConfig;
use rusty_ecg::data::filter::FilterKind;
use rusty_ecg::service::api::{FilteredRowResponse, InfoResponse};
use rusty_ecg::QueryService;

use crate::color::ColorMap;

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Service answering every query; uninitialized until a dataset loads.
    pub service: QueryService,

    /// Paths and fallback policy used when starting the service.
    pub config: ServiceConfig,

    /// Active filter view.
    pub filter: FilterKind,

    /// Absolute row indices of the active view (cached).
    pub visible_indices: Vec<usize>,

    /// Position inside `visible_indices`.
    pub position: usize,

    /// Currently displayed row with its verdict.
    pub current: Option<FilteredRowResponse>,

    /// Dataset summary, fetched once the service is ready.
    pub info: Option<InfoResponse>,

    /// Beat type → colour.
    pub color_map: ColorMap,

    /// Plot the normalized signal instead of raw amplitudes.
    pub show_normalized: bool,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    /// Build the state and start the service when the configured dataset exists.
    pub fn new(config: ServiceConfig) -> Self {
        let mut state = Self {
            service: QueryService::new(),
            config,
            filter: FilterKind::All,
            visible_indices: Vec::new(),
            position: 0,
            current: None,
            info: None,
            color_map: ColorMap::default(),
            show_normalized: false,
            status_message: None,
        };
        if state.config.dataset_path.exists() {
            state.start();
        } else {
            log::info!(
                "Dataset {} not found, waiting for File → Open dataset…",
                state.config.dataset_path.display()
            );
        }
        state
    }

    /// Run the startup sequence with the current config.
    pub fn start(&mut self) {
        match self.service.start(&self.config) {
            Ok(()) => {
                self.info = self.service.info().ok();
                self.status_message = None;
                self.set_filter(FilterKind::All);
            }
            Err(e) => {
                log::error!("Failed to start service: {e}");
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.service.is_ready()
    }

    pub fn set_dataset_path(&mut self, path: PathBuf) {
        self.config.dataset_path = path;
        self.start();
    }

    /// Use a different model artifact and retry startup when the dataset is known.
    pub fn set_model_path(&mut self, path: PathBuf) {
        self.config.model_path = Some(path);
        if !self.is_ready() && self.config.dataset_path.exists() {
            self.start();
        }
    }

    /// Switch the active view and show its first row.
    pub fn set_filter(&mut self, kind: FilterKind) {
        match self.service.filtered_indices(kind.as_str()) {
            Ok(resp) => {
                self.filter = kind;
                self.visible_indices = resp.indices;
                self.position = 0;
                self.load_current();
            }
            Err(e) => self.status_message = Some(format!("Error: {e}")),
        }
    }

    /// Fetch the row at `position` in the active view.
    pub fn load_current(&mut self) {
        if self.visible_indices.is_empty() {
            self.current = None;
            self.status_message = Some("No samples found for the selected filter".to_string());
            return;
        }
        match self
            .service
            .by_filter(self.filter.as_str(), self.position as i64)
        {
            Ok(row) => {
                self.current = Some(row);
                self.status_message = None;
            }
            Err(e) => {
                log::warn!("Failed to load {} #{}: {e}", self.filter, self.position);
                self.status_message = Some(format!("Error: {e}"));
            }
        }
    }

    pub fn next(&mut self) {
        if self.position + 1 < self.visible_indices.len() {
            self.position += 1;
            self.load_current();
        }
    }

    pub fn previous(&mut self) {
        if self.position > 0 {
            self.position -= 1;
            self.load_current();
        }
    }

    /// Show an absolute row, staying in the active view when it contains it.
    pub fn jump_to_row(&mut self, row: usize) {
        match self.visible_indices.iter().position(|&i| i == row) {
            Some(pos) => self.position = pos,
            None => match self.service.filtered_indices(FilterKind::All.as_str()) {
                Ok(resp) => {
                    self.filter = FilterKind::All;
                    self.visible_indices = resp.indices;
                    self.position = row.min(self.visible_indices.len().saturating_sub(1));
                }
                Err(e) => {
                    self.status_message = Some(format!("Error: {e}"));
                    return;
                }
            },
        }
        self.load_current();
    }

    /// The signal to plot, normalized with the fitted range when requested.
    pub fn plotted_signal(&self) -> Option<Vec<f64>> {
        let row = self.current.as_ref()?;
        if !self.show_normalized {
            return Some(row.signal.clone());
        }
        let ctx = self.service.context().ok()?;
        ctx.scaler().transform(&row.signal).ok()
    }
}
