//! PostgreSQL SQL dialect.

use crate::core::Dialect;

/// PostgreSQL identifier quoting and `$n` placeholders.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Create a new PostgreSQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn quote_ident(&self, name: &str) -> String {
        // Embedded double quotes are doubled
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.quote_ident("users"), "\"users\"");
        assert_eq!(dialect.quote_ident("MixedCase"), "\"MixedCase\"");
        assert_eq!(dialect.quote_ident("with\"quote"), "\"with\"\"quote\"");
    }

    #[test]
    fn test_qualify() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.qualify("public", "sales"), "\"public\".\"sales\"");
    }

    #[test]
    fn test_param_placeholder() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.param_placeholder(1), "$1");
        assert_eq!(dialect.param_placeholder(10), "$10");
    }
}
