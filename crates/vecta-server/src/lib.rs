//! HTTP front-end for the Vecta clinical analysis service.
//!
//! - [`config`]: TOML and environment configuration
//! - [`routes`]: axum router and handlers
//! - [`upload`]: text extraction from uploads
//! - [`scheduler`]: background learning trigger
//! - [`port`]: free port search

pub mod config;
pub mod error;
pub mod logging;
pub mod port;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod upload;

pub use config::{ConfigError, ServiceConfig};
pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use state::AppState;
