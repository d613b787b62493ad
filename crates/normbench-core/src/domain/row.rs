//! Dataset rows.

use serde::{Deserialize, Serialize};

/// One benchmark example. File order is significant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasetRow {
    pub row_id: String,
    /// Informal string to normalise
    pub input: String,
    /// Canonical reference answer
    pub expected: String,
}

impl DatasetRow {
    pub fn new(row_id: &str, input: &str, expected: &str) -> Self {
        Self {
            row_id: row_id.to_string(),
            input: input.to_string(),
            expected: expected.to_string(),
        }
    }
}
