/// Data layer: core types, loading, and filtering.
///
/// Architecture:
/// ```text
///  .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → (signal, label) rows
///   └──────────┘
///        │
///        ▼
///   ┌────────────┐
///   │ EcgDataset  │  Vec<Sample>, summary, filter views
///   └────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  all / normal / abnormal → absolute indices
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod filter;
