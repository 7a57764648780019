//! ECG heartbeat serving and classification.
//!
//! A fixed dataset of single-lead heartbeat signals is indexed by row and by
//! class filter; each signal is min-max normalized with the dataset-wide range
//! and scored by a 1-D convolutional classifier.

pub mod config;
pub mod data;
pub mod error;
pub mod inference;
pub mod service;

pub use config::ServiceConfig;
pub use error::{EcgError, EcgResult};
pub use service::QueryService;
