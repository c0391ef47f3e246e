//! mockview-core: interview session engine, authentication session, and
//! score aggregation.
//!
//! The engine drives a practice interview one question at a time, delegating
//! scoring to an [`traits::AnswerAnalyzer`] and gating every operation on the
//! shared [`auth::AuthSession`].

pub mod auth;
pub mod bank;
pub mod engine;
pub mod error;
pub mod model;
pub mod parser;
pub mod statistics;
pub mod store;
pub mod traits;
