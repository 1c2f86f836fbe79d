//! Configuration for the quill workspace.
//!
//! Configuration is a small TOML file with two concerns: where the document
//! workspace lives and how large the in-process cache may grow. Values are
//! resolved in the usual order: explicit environment overrides, then the
//! config file, then platform defaults.
//!
//! ## File location
//!
//! Searched in order:
//! - `$QUILL_CONFIG_DIR/config.toml`
//! - `$XDG_CONFIG_HOME/quill/config.toml`
//! - the platform config directory reported by `directories`
//!
//! ## Example
//!
//! ```toml
//! [workspace]
//! root = "/home/user/knowledge"
//!
//! [cache]
//! max_documents = 128
//! ```
//!
//! `QUILL_WORKSPACE_ROOT` overrides `workspace.root` regardless of what the
//! file says, which is how tests and one-off invocations point the server at
//! a scratch directory.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const fn default_max_documents() -> usize {
    128
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace location.
    pub workspace: WorkspaceConfig,
    /// In-process cache bounds.
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Where the document tree lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Root directory; every document path resolves beneath it.
    pub root: PathBuf,
}

/// Cache sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of parsed documents held in memory; least recently
    /// accessed entries are evicted past this bound.
    #[serde(default = "default_max_documents")]
    pub max_documents: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_documents: default_max_documents(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to
    /// defaults when no file exists.
    pub fn load() -> Result<Self> {
        let path = Self::config_file()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default_config()?)
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::from_io(e, path))?;
        let mut config: Self = toml::from_str(&text)
            .map_err(|e| Error::Io(std::io::Error::other(format!("invalid config: {e}"))))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Write configuration to a file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::from_io(e, parent))?;
        }
        let text = toml::to_string_pretty(self)
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        fs::write(path, text).map_err(|e| Error::from_io(e, path))
    }

    /// Build a configuration rooted at an explicit directory. Used by tests
    /// and by embedders that manage their own paths.
    #[must_use]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            workspace: WorkspaceConfig { root },
            cache: CacheConfig::default(),
        }
    }

    fn default_config() -> Result<Self> {
        let mut config = Self {
            workspace: WorkspaceConfig {
                root: Self::default_root()?,
            },
            cache: CacheConfig::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("QUILL_WORKSPACE_ROOT") {
            let trimmed = root.trim();
            if !trimmed.is_empty() {
                self.workspace.root = PathBuf::from(trimmed);
            }
        }
    }

    fn config_file() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("QUILL_CONFIG_DIR") {
            let trimmed = dir.trim();
            if !trimmed.is_empty() {
                return Ok(PathBuf::from(trimmed).join("config.toml"));
            }
        }
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            let trimmed = xdg.trim();
            if !trimmed.is_empty() {
                return Ok(PathBuf::from(trimmed).join("quill").join("config.toml"));
            }
        }
        let dirs = ProjectDirs::from("", "", "quill").ok_or_else(|| {
            Error::Io(std::io::Error::other(
                "failed to determine configuration directory",
            ))
        })?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    fn default_root() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "quill").ok_or_else(|| {
            Error::Io(std::io::Error::other("failed to determine data directory"))
        })?;
        Ok(dirs.data_dir().join("workspace"))
    }
}
