use anyhow::{bail, Context, Result};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Configuration {
    pub server: Option<String>,
    pub downloads_folder: String,
    pub vlc_auto_exit: bool,
    pub enable_theme: bool,
    pub theme: String,
    /// Program handed the signed media URL.
    pub player: String,
    /// Keys this version does not know about, written back untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            server: None,
            downloads_folder: "~/Downloads".to_string(),
            vlc_auto_exit: false,
            enable_theme: true,
            theme: "default".to_string(),
            player: "vlc".to_string(),
            extra: Map::new(),
        }
    }
}

/// Right-biased shallow merge: keys in `overrides` replace those in
/// `defaults`, keys missing from it keep their default.
pub fn merge(defaults: Value, overrides: Value) -> Value {
    match (defaults, overrides) {
        (Value::Object(mut base), Value::Object(top)) => {
            for (key, value) in top {
                base.insert(key, value);
            }
            Value::Object(base)
        }
        (_, overrides) => overrides,
    }
}

impl Configuration {
    pub fn from_json(content: &str) -> Result<Self> {
        let loaded: Value = serde_json::from_str(content)?;
        if !loaded.is_object() {
            bail!("configuration must be a JSON object");
        }
        let defaults = serde_json::to_value(Configuration::default())?;
        let config = serde_json::from_value(merge(defaults, loaded))?;
        Ok(config)
    }

    /// Loads `path` over the defaults. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
        debug!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// `$XDG_CONFIG_HOME/breadbox/config.json` or the platform equivalent.
    pub fn default_path() -> PathBuf {
        ProjectDirs::from("", "", "breadbox")
            .map(|d| d.config_dir().join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    }

    pub fn has_server(&self) -> bool {
        self.server.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    pub fn downloads_dir(&self) -> PathBuf {
        expand_home(&self.downloads_folder)
    }
}

fn expand_home(path: &str) -> PathBuf {
    let home = || BaseDirs::new().map(|d| d.home_dir().to_path_buf());

    if path == "~" {
        if let Some(home) = home() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = home() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
