mod sql;

pub use sql::{quote_identifier, quote_literal};

use chrono::Utc;

/// Default name of the tracking table
pub const DEFAULT_TABLE_NAME: &str = "schema_migrations";

/// Default directory scanned for migration files
pub const DEFAULT_MIGRATIONS_PATH: &str = "migrations";

/// Name of the optional configuration file
pub const CONFIG_FILE: &str = "migrator.json";

/// Extensions discovery accepts when none are configured
pub const DEFAULT_EXTENSIONS: &[&str] = &["sql"];

/// Format of the timestamp prefix of every migration filename
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Get current timestamp in ISO 8601 format
pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

/// Get the current UTC time as a 14-digit migration timestamp
pub fn now_timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_timestamp_is_fourteen_digits() {
        let ts = now_timestamp();
        assert_eq!(ts.len(), 14);
        assert!(ts.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_now_iso_parses() {
        assert!(chrono::DateTime::parse_from_rfc3339(&now_iso()).is_ok());
    }
}
