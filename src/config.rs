//! Persisted launcher configuration.
//!
//! Holds the registry of ComfyUI builds, the active selection, the console
//! visibility preference, and the browser-patch registry (read and preserved
//! here; the patching itself lives outside this core). The single-path setup
//! is just a registry of size one with that build active.

use crate::error::{ConfigError, FileError, find_similar_build};
use crate::launch::StartupMode;
use crate::{Result, env, launch};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A named ComfyUI installation with its preferred startup mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Build {
    #[serde(skip)]
    pub id: String,
    pub path: PathBuf,
    #[serde(default)]
    pub startup_mode: StartupMode,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub icon: Option<PathBuf>,
    /// Set once a launch of this build has been confirmed ready. Until then
    /// the readiness poll runs without a timeout (first-run initialization
    /// can take arbitrarily long).
    #[serde(default)]
    pub has_started: bool,
}

impl Build {
    pub fn is_valid(&self) -> bool {
        launch::comfy_exists(&self.path)
    }
}

/// Browser-patch bookkeeping for one build path. Owned by the patching side
/// activity; carried here untouched so it round-trips through the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchEntry {
    pub patched: bool,
    pub file_hash: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    #[serde(default)]
    pub builds: IndexMap<String, Build>,
    /// Id of the currently selected build.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub active: Option<String>,
    /// Show the server in its own console window instead of capturing output.
    #[serde(default = "default_show_cmd")]
    pub show_cmd: bool,
    #[serde(default)]
    pub browser_patch_registry: BTreeMap<String, PatchEntry>,
    #[serde(skip)]
    path: PathBuf,
}

fn default_show_cmd() -> bool {
    true
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self::new(env::CONFIG_FILE.clone())
    }
}

impl LauncherConfig {
    pub fn new(path: PathBuf) -> Self {
        Self {
            builds: Default::default(),
            active: None,
            show_cmd: true,
            browser_patch_registry: Default::default(),
            path,
        }
    }

    /// Load the config from the default location, falling back to defaults
    /// when the file is missing or unreadable.
    pub fn load() -> Self {
        let path = &*env::CONFIG_FILE;
        Self::read(path).unwrap_or_else(|e| {
            warn!("Could not read config file: {e}, starting fresh");
            Self::new(path.to_path_buf())
        })
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new(path.to_path_buf()));
        }
        let _lock = xx::fslock::get(path, false)?;
        let raw = xx::file::read_to_string(path).unwrap_or_else(|e| {
            warn!("Error reading config file {:?}: {}", path, e);
            String::new()
        });
        let mut config: Self = toml::from_str(&raw).unwrap_or_else(|e| {
            warn!("Error parsing config file {:?}: {}", path, e);
            Self::new(path.to_path_buf())
        });
        config.path = path.to_path_buf();
        for (id, build) in config.builds.iter_mut() {
            build.id = id.clone();
        }
        Ok(config)
    }

    pub fn write(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            xx::file::mkdirp(parent)?;
        }
        let _lock = xx::fslock::get(&self.path, false)?;
        let raw = toml::to_string(self).map_err(|e| FileError::SerializeError {
            path: self.path.clone(),
            source: e,
        })?;
        xx::file::write(&self.path, raw).map_err(|e| FileError::WriteError {
            path: self.path.clone(),
            details: Some(e.to_string()),
        })?;
        Ok(())
    }

    /// Look a build up by id, with a fuzzy suggestion on miss.
    pub fn build(&self, id: &str) -> Result<&Build> {
        self.builds.get(id).ok_or_else(|| {
            ConfigError::BuildNotFound {
                id: id.to_string(),
                suggestion: find_similar_build(id, self.builds.keys().map(|k| k.as_str())),
            }
            .into()
        })
    }

    /// The currently selected build.
    pub fn active_build(&self) -> Result<&Build> {
        let id = self.active.as_ref().ok_or(ConfigError::NoActiveBuild)?;
        self.build(id)
    }

    pub fn mark_started(&mut self, id: &str) {
        if let Some(build) = self.builds.get_mut(id) {
            build.has_started = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_config(dir: &TempDir) -> LauncherConfig {
        let mut config = LauncherConfig::new(dir.path().join("config.toml"));
        config.builds.insert(
            "portable".to_string(),
            Build {
                id: "portable".to_string(),
                path: dir.path().join("ComfyUI"),
                startup_mode: StartupMode::GpuFast,
                icon: None,
                has_started: false,
            },
        );
        config.active = Some("portable".to_string());
        config
    }

    #[test]
    fn test_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut config = sample_config(&dir);
        config.show_cmd = false;
        config.browser_patch_registry.insert(
            dir.path().join("ComfyUI").to_string_lossy().to_string(),
            PatchEntry {
                patched: true,
                file_hash: "d41d8cd98f00b204e9800998ecf8427e".to_string(),
                timestamp: "2025-11-02T10:00:00".to_string(),
            },
        );
        config.write().unwrap();

        let loaded = LauncherConfig::read(dir.path().join("config.toml")).unwrap();
        assert_eq!(loaded.active.as_deref(), Some("portable"));
        assert!(!loaded.show_cmd);
        let build = loaded.active_build().unwrap();
        assert_eq!(build.id, "portable");
        assert_eq!(build.startup_mode, StartupMode::GpuFast);
        assert_eq!(loaded.browser_patch_registry.len(), 1);
    }

    #[test]
    fn test_missing_file_defaults() {
        let dir = TempDir::new().unwrap();
        let config = LauncherConfig::read(dir.path().join("nope.toml")).unwrap();
        assert!(config.builds.is_empty());
        assert!(config.show_cmd);
        assert!(config.active_build().is_err());
    }

    #[test]
    fn test_build_lookup_suggestion() {
        let dir = TempDir::new().unwrap();
        let config = sample_config(&dir);
        assert!(config.build("portable").is_ok());
        let err = config.build("portble").unwrap_err();
        assert!(format!("{err:?}").contains("portable"));
    }
}
