//! In-memory configuration provider

use async_trait::async_trait;
use parking_lot::RwLock;

use super::settings::Settings;
use super::traits::{ConfigProvider, ConfigResult};

/// Settings held in memory, for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryConfigProvider {
    settings: RwLock<Settings>,
}

impl MemoryConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    /// Mutate the held settings in place
    pub fn update(&self, f: impl FnOnce(&mut Settings)) {
        f(&mut self.settings.write());
    }
}

#[async_trait]
impl ConfigProvider for MemoryConfigProvider {
    async fn load(&self) -> ConfigResult<Settings> {
        let settings = self.settings.read().clone();
        settings.validate()?;
        Ok(settings)
    }

    async fn save(&self, settings: &Settings) -> ConfigResult<()> {
        settings.validate()?;
        *self.settings.write() = settings.clone();
        Ok(())
    }
}
