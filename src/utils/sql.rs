/// Quote a SQL identifier (table, column or index name).
///
/// Embedded double quotes are doubled and the result is wrapped in double
/// quotes, which both PostgreSQL and SQLite accept. Dotted names such as
/// `audit.schema_migrations` are quoted part by part so a schema prefix keeps
/// working.
pub fn quote_identifier(identifier: &str) -> String {
    identifier
        .split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

/// Quote a string literal for use in generated DDL (column defaults).
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier_plain() {
        assert_eq!(
            quote_identifier("schema_migrations"),
            "\"schema_migrations\""
        );
    }

    #[test]
    fn test_quote_identifier_escapes_quotes() {
        assert_eq!(quote_identifier("bad\"name"), "\"bad\"\"name\"");
    }

    #[test]
    fn test_quote_identifier_dotted() {
        assert_eq!(
            quote_identifier("audit.schema_migrations"),
            "\"audit\".\"schema_migrations\""
        );
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("it's"), "'it''s'");
    }
}
