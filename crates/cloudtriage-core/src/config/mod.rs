//! Configuration
//!
//! Settings are read from YAML at two levels, workspace overriding user:
//! - `FileConfigProvider::user()`: `~/.config/cloudtriage/config.yaml`
//! - `FileConfigProvider::workspace(root)`: `<root>/.config/cloudtriage/config.yaml`
//!
//! `LayeredConfigProvider` merges the two and applies environment overrides.
//! `MemoryConfigProvider` holds settings in memory for tests.

mod traits;
mod settings;
mod file;
mod memory;

pub use traits::{ConfigProvider, ConfigError, ConfigResult};
pub use settings::{
    Settings, AuthSettings, AuthMethod, ModelSettings, TimeoutSettings,
    HandlerCacheSettings, McpSettings, apply_env_overrides, ENV_OVERRIDES,
};
pub use file::{FileConfigProvider, LayeredConfigProvider, ConfigLevel, merge_settings};
pub use memory::MemoryConfigProvider;
