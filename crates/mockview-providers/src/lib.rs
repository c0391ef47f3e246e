//! mockview-providers: answer analyzer and authentication backends.
//!
//! Implements the `AnswerAnalyzer` and `AuthBackend` traits over HTTP and as
//! offline mocks, and builds them from `mockview.toml`.

pub mod auth;
pub mod config;
mod error;
pub mod http;
pub mod mock;

pub use config::{
    create_analyzer, create_auth_backend, load_config, load_config_from, AnalyzerConfig,
    AuthConfig, MockviewConfig,
};
