//! File-based configuration provider (YAML)

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_yaml::Value;

use super::settings::{apply_env_overrides, Settings};
use super::traits::{ConfigError, ConfigProvider, ConfigResult};

/// Config level (user or workspace)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLevel {
    /// `~/.config/cloudtriage/config.yaml`
    User,
    /// `.config/cloudtriage/config.yaml` in the workspace root
    Workspace,
}

impl ConfigLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigLevel::User => "user",
            ConfigLevel::Workspace => "workspace",
        }
    }
}

/// One YAML settings file
///
/// The raw document is cached after the first read; `reload` drops the cache.
pub struct FileConfigProvider {
    path: PathBuf,
    level: ConfigLevel,
    cache: RwLock<Option<Value>>,
}

impl FileConfigProvider {
    pub fn new(path: impl Into<PathBuf>, level: ConfigLevel) -> Self {
        Self {
            path: path.into(),
            level,
            cache: RwLock::new(None),
        }
    }

    /// `~/.config/cloudtriage/config.yaml` (platform config dir)
    pub fn user() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config"));
        Self::new(config_dir.join("cloudtriage").join("config.yaml"), ConfigLevel::User)
    }

    /// `<workspace_root>/.config/cloudtriage/config.yaml`
    pub fn workspace(workspace_root: impl AsRef<Path>) -> Self {
        let path = workspace_root
            .as_ref()
            .join(".config")
            .join("cloudtriage")
            .join("config.yaml");
        Self::new(path, ConfigLevel::Workspace)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn level(&self) -> ConfigLevel {
        self.level
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// The raw YAML document; `Null` when the file does not exist
    pub fn raw(&self) -> ConfigResult<Value> {
        if let Some(value) = self.cache.read().as_ref() {
            return Ok(value.clone());
        }
        self.reload()
    }

    /// Re-read the file from disk
    pub fn reload(&self) -> ConfigResult<Value> {
        let value = if self.path.exists() {
            let content = fs::read_to_string(&self.path)?;
            if content.trim().is_empty() {
                Value::Null
            } else {
                serde_yaml::from_str(&content)?
            }
        } else {
            Value::Null
        };
        *self.cache.write() = Some(value.clone());
        Ok(value)
    }

    /// Copy the current file to `config.yaml.backup`
    pub fn backup(&self) -> ConfigResult<Option<PathBuf>> {
        if !self.exists() {
            return Ok(None);
        }
        let backup_path = self.path.with_extension("yaml.backup");
        fs::copy(&self.path, &backup_path)?;
        Ok(Some(backup_path))
    }
}

impl std::fmt::Debug for FileConfigProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileConfigProvider")
            .field("path", &self.path)
            .field("level", &self.level)
            .field("exists", &self.exists())
            .finish()
    }
}

#[async_trait]
impl ConfigProvider for FileConfigProvider {
    async fn load(&self) -> ConfigResult<Settings> {
        settings_from_value(self.raw()?)
    }

    async fn save(&self, settings: &Settings) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let value = serde_yaml::to_value(settings)?;
        fs::write(&self.path, serde_yaml::to_string(&value)?)?;
        *self.cache.write() = Some(value);
        Ok(())
    }
}

/// User and workspace files merged, then environment overrides
#[derive(Debug)]
pub struct LayeredConfigProvider {
    user: FileConfigProvider,
    workspace: Option<FileConfigProvider>,
    use_env: bool,
}

impl LayeredConfigProvider {
    pub fn new(user: FileConfigProvider, workspace: Option<FileConfigProvider>) -> Self {
        Self {
            user,
            workspace,
            use_env: true,
        }
    }

    /// Standard locations for a workspace rooted at `workspace_root`
    pub fn discover(workspace_root: Option<&Path>) -> Self {
        Self::new(
            FileConfigProvider::user(),
            workspace_root.map(FileConfigProvider::workspace),
        )
    }

    /// Skip environment overrides (tests)
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }
}

#[async_trait]
impl ConfigProvider for LayeredConfigProvider {
    async fn load(&self) -> ConfigResult<Settings> {
        let mut merged = self.user.raw()?;
        if let Some(workspace) = &self.workspace {
            merged = merge_settings(merged, workspace.raw()?);
        }
        let mut settings = settings_from_value(merged)?;
        if self.use_env {
            apply_env_overrides(&mut settings, |k| std::env::var(k).ok())?;
        }
        settings.validate()?;
        Ok(settings)
    }

    async fn save(&self, _settings: &Settings) -> ConfigResult<()> {
        Err(ConfigError::ReadOnly)
    }
}

/// Deep-merge two YAML documents, `overlay` winning
///
/// Mappings merge key by key; any other value in `overlay` replaces the
/// base value. A `Null` overlay leaves the base untouched.
pub fn merge_settings(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (base, Value::Null) => base,
        (Value::Mapping(mut base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => merge_settings(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Mapping(base)
        }
        (_, overlay) => overlay,
    }
}

fn settings_from_value(value: Value) -> ConfigResult<Settings> {
    if value.is_null() {
        return Ok(Settings::default());
    }
    Ok(serde_yaml::from_value(value)?)
}
