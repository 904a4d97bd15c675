//! Registry configuration and per-session identity

use crate::error::{RegistryError, Result};
use lineage::DEFAULT_ROOT_TOKEN;
use lineage::naming::DEFAULT_PADDING;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Absolute root of the project tree
    pub project_root: PathBuf,

    /// Directory under the project root holding registry records
    pub database_dir: String,

    /// Zero padding width of version numbers in file names
    pub version_padding: usize,

    /// Token written in place of the project root in portable paths
    pub root_token: String,
}

impl RegistryConfig {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let project_root = std::env::var("LINEAGE_PROJECT_ROOT")
            .map_err(|_| RegistryError::Config("LINEAGE_PROJECT_ROOT is not set".to_string()))?;

        Ok(Self {
            project_root: PathBuf::from(project_root),
            database_dir: std::env::var("LINEAGE_DATABASE_DIR")
                .unwrap_or_else(|_| ".lineage".to_string()),
            version_padding: std::env::var("LINEAGE_VERSION_PADDING")
                .unwrap_or_else(|_| DEFAULT_PADDING.to_string())
                .parse()
                .map_err(|_| {
                    RegistryError::Config("Invalid LINEAGE_VERSION_PADDING value".to_string())
                })?,
            root_token: std::env::var("LINEAGE_ROOT_TOKEN")
                .unwrap_or_else(|_| DEFAULT_ROOT_TOKEN.to_string()),
        })
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            database_dir: ".lineage".to_string(),
            version_padding: DEFAULT_PADDING,
            root_token: DEFAULT_ROOT_TOKEN.to_string(),
        }
    }
}

/// Who is acting on the registry and from where
///
/// Passed explicitly into every operation that records authorship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: String,
    pub workstation: String,
}

impl Session {
    pub fn new(user: impl Into<String>, workstation: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            workstation: workstation.into(),
        }
    }

    /// Identity of the current process owner
    pub fn from_env() -> Self {
        let first = |keys: &[&str]| {
            keys.iter()
                .find_map(|key| std::env::var(key).ok().filter(|value| !value.is_empty()))
                .unwrap_or_else(|| "unknown".to_string())
        };
        Self {
            user: first(&["LINEAGE_USER", "USER", "USERNAME"]),
            workstation: first(&["HOSTNAME", "COMPUTERNAME"]),
        }
    }
}
