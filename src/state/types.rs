use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A row of the tracking table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    /// Filename of the applied migration
    pub name: String,
    /// When the `up` transaction committed
    pub applied_at: DateTime<Utc>,
}
