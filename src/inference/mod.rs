//! Inference layer: normalization, the classifier, and verdicts.
//!
//! ```text
//!   raw signal ──► MinMaxScaler ──► ClassifierAdapter ──► Verdict
//!                  (fit once)       (artifact | fallback)  (0.5 threshold)
//! ```

pub mod classifier;
pub mod network;
pub mod rng;
pub mod scaler;
pub mod verdict;
