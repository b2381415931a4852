//! Database driver implementations.
//!
//! - [`postgres`]: PostgreSQL source and target connections
//! - [`common`]: Shared utilities (TLS)

pub mod common;
pub mod postgres;

pub use common::SslMode;
pub use postgres::{PostgresDialect, PostgresSource, PostgresTarget};
