pub mod base;
pub mod settings;

pub use base::{Config, ConfigError, APP_STRATEGY};
pub use settings::{
    find_setting_key, SettingKey, Settings, SettingsSource, StaticSettings, SETTING_KEYS,
};
