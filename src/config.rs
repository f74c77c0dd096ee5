use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Workbook holding the Members and Payments sheets
    pub data_file: PathBuf,
    /// YAML file with login accounts and cookie settings
    pub credentials_file: PathBuf,
    pub bind_addr: String,
    /// Shown next to amounts on pages
    pub currency: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            data_file: PathBuf::from("data/members.xlsx"),
            credentials_file: PathBuf::from("config.yaml"),
            bind_addr: "127.0.0.1:3000".to_string(),
            currency: "AED".to_string(),
        }
    }
}

impl AppConfig {
    /// Load settings from `path`, or defaults if there is no file
    ///
    /// Keys missing from the file keep their default values.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let Some(path) = path.filter(|p| p.exists()) else {
            return Ok(Self::default());
        };

        let content = fs::read_to_string(path)?;
        serde_yaml::from_str(&content)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
    }
}
