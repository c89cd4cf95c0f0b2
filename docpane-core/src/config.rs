use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::types::{Quality, RenderParameters, ViewMode};

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000";
pub const ENV_API_URL: &str = "DOCPANE_API_URL";
pub const ENV_TOKEN: &str = "DOCPANE_TOKEN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub api_base_url: String,
    pub access_token: Option<String>,
    pub quality: Quality,
    pub zoom: f32,
    pub view_mode: ViewMode,
    /// Units loaded in one batch right after the document info arrives.
    pub initial_range: u32,
    /// Neighbours fetched on each side of a newly visible unit.
    pub prefetch_radius: u32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            access_token: None,
            quality: Quality::default(),
            zoom: RenderParameters::DEFAULT_ZOOM,
            view_mode: ViewMode::default(),
            initial_range: 3,
            prefetch_radius: 1,
        }
    }
}

impl ViewerConfig {
    pub fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("net", "docpane", "docpane")
    }

    pub fn default_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn from_toml_str(source: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(?path, "no config file, using defaults");
            return Ok(Self::default());
        }
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source, path)
    }

    /// Applies `DOCPANE_API_URL` and `DOCPANE_TOKEN` on top of the file values.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.access_token = Some(token);
        }
        self
    }

    pub fn render_parameters(&self) -> RenderParameters {
        RenderParameters::new(self.zoom, self.quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = ViewerConfig::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.initial_range, 3);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "api_base_url = \"http://docs.internal:8080\"\nquality = \"high\"\nzoom = 9.0\nview_mode = \"text_overlay\"\n",
        )
        .unwrap();

        let config = ViewerConfig::load(&path).unwrap();
        assert_eq!(config.api_base_url, "http://docs.internal:8080");
        assert_eq!(config.quality, Quality::High);
        assert_eq!(config.view_mode, ViewMode::TextOverlay);
        assert_eq!(config.prefetch_radius, 1);
        assert_eq!(config.render_parameters().zoom(), RenderParameters::MAX_ZOOM);
    }

    #[test]
    fn invalid_file_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "quality = \"ultra\"").unwrap();
        let err = ViewerConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn environment_overrides_file() {
        let env: HashMap<&str, &str> = [(ENV_API_URL, "http://env:1"), (ENV_TOKEN, "")]
            .into_iter()
            .collect();
        let config = ViewerConfig::default()
            .with_env_overrides(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.api_base_url, "http://env:1");
        assert_eq!(config.access_token, None);
    }
}
