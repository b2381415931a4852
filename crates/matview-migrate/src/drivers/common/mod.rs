//! Utilities shared by database drivers.

pub mod tls;

pub use tls::{make_tls_connector, SslMode};
