//! Subcommand implementations.

pub mod app;
pub mod history;
pub mod init;
pub mod interview;
pub mod login;
pub mod summary;
pub mod validate;
