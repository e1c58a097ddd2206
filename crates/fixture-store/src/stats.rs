use crate::ImageFormat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistics about one full catalog load
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadStats {
    /// Number of files loaded
    pub files: usize,

    /// Total bytes held in memory
    pub bytes: u64,

    /// Files per format tag (unknown formats are counted under "")
    pub formats: BTreeMap<String, usize>,

    /// Time taken in milliseconds
    pub time_ms: u64,
}

impl LoadStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, format: ImageFormat, len: usize) {
        self.files += 1;
        self.bytes += len as u64;
        *self.formats.entry(format.as_str().to_string()).or_insert(0) += 1;
    }
}
