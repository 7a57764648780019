//! Query service: the ready-state context and the request surface built on it.

pub mod api;
pub mod context;
pub mod query;

pub use api::{Request, Response};
pub use context::ReadyContext;
pub use query::QueryService;
