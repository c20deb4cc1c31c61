use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name the API key is stored under.
pub const SERVICE_NAME: &str = "breadbox";

/// File-backed store for the Breadbox API key, kept beside the config file
/// and readable only by its owner.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Credentials live next to whichever config file is in use.
    pub fn beside(config_path: &Path) -> Self {
        Self::new(config_path.with_file_name("credentials"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            debug!("No credential file at {}", self.path.display());
            return Ok(None);
        }

        let entries = self.read_entries()?;
        Ok(entries
            .get(SERVICE_NAME)
            .and_then(Value::as_str)
            .filter(|key| !key.is_empty())
            .map(str::to_string))
    }

    pub fn store(&self, api_key: &str) -> Result<()> {
        let mut entries = if self.path.exists() {
            self.read_entries()?
        } else {
            Map::new()
        };
        entries.insert(SERVICE_NAME.to_string(), Value::String(api_key.to_string()));
        self.write_entries(&entries)?;
        info!("Stored API key in {}", self.path.display());
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let mut entries = self.read_entries()?;
        entries.remove(SERVICE_NAME);
        self.write_entries(&entries)?;
        info!("Removed stored API key");
        Ok(())
    }

    fn read_entries(&self) -> Result<Map<String, Value>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let entries = serde_json::from_str(&content)
            .with_context(|| format!("malformed credential file {}", self.path.display()))?;
        Ok(entries)
    }

    fn write_entries(&self, entries: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(entries)?)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        restrict_permissions(&self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
