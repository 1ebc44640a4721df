use serde::{Deserialize, Serialize};

use crate::fetch::{self, LoadError};
use crate::ranking::DEFAULT_RANKING_SIZE;
use crate::source::DocumentSource;

pub const CONFIG_DOCUMENT: &str = "reportd.json";
pub const DATASET_ENV: &str = "REPORTD_DATASET";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct DashboardConfig {
    pub class_directory: String,
    pub test_directory: String,
    pub marks_dir: String,
    pub notes_file: String,
    pub ranking_size: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            class_directory: "classes.json".to_string(),
            test_directory: "tests-directory.json".to_string(),
            marks_dir: "test_marks".to_string(),
            notes_file: "notes.json".to_string(),
            ranking_size: DEFAULT_RANKING_SIZE,
        }
    }
}

impl DashboardConfig {
    pub fn marks_reference(&self, marks_file: &str) -> String {
        let dir = self.marks_dir.trim().trim_end_matches('/');
        if dir.is_empty() {
            marks_file.to_string()
        } else {
            format!("{dir}/{marks_file}")
        }
    }
}

/// Reads `reportd.json` from the dataset root, falling back to defaults when absent.
pub fn load_config(source: &dyn DocumentSource) -> Result<DashboardConfig, LoadError> {
    if !source.contains(CONFIG_DOCUMENT) {
        return Ok(DashboardConfig::default());
    }
    fetch::fetch_json::<DashboardConfig>(source, CONFIG_DOCUMENT)
}
