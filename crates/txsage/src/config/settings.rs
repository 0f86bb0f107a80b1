use serde::{Deserialize, Serialize};

use super::base::{Config, ConfigError};
use crate::model::ModelConfig;
use crate::prompt::Language;

pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const TXSAGE_GEMINI_HOST: &str = "TXSAGE_GEMINI_HOST";
pub const TXSAGE_MCP_ENDPOINT: &str = "TXSAGE_MCP_ENDPOINT";
pub const TXSAGE_MODEL: &str = "TXSAGE_MODEL";
pub const TXSAGE_TEMPERATURE: &str = "TXSAGE_TEMPERATURE";
pub const TXSAGE_MAX_OUTPUT_TOKENS: &str = "TXSAGE_MAX_OUTPUT_TOKENS";
pub const TXSAGE_LANGUAGE: &str = "TXSAGE_LANGUAGE";

pub const DEFAULT_GEMINI_HOST: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_OUTPUT_TOKENS: i32 = 2048;

/// A configuration key the assistant understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SettingKey {
    pub name: &'static str,
    pub secret: bool,
    pub default: Option<&'static str>,
}

/// Every key read by [`Settings::from_config`], in display order.
pub const SETTING_KEYS: &[SettingKey] = &[
    SettingKey {
        name: GEMINI_API_KEY,
        secret: true,
        default: None,
    },
    SettingKey {
        name: TXSAGE_GEMINI_HOST,
        secret: false,
        default: Some(DEFAULT_GEMINI_HOST),
    },
    SettingKey {
        name: TXSAGE_MCP_ENDPOINT,
        secret: false,
        default: None,
    },
    SettingKey {
        name: TXSAGE_MODEL,
        secret: false,
        default: Some(DEFAULT_MODEL),
    },
    SettingKey {
        name: TXSAGE_TEMPERATURE,
        secret: false,
        default: Some("0.7"),
    },
    SettingKey {
        name: TXSAGE_MAX_OUTPUT_TOKENS,
        secret: false,
        default: Some("2048"),
    },
    SettingKey {
        name: TXSAGE_LANGUAGE,
        secret: false,
        default: Some("en-US"),
    },
];

pub fn find_setting_key(name: &str) -> Option<&'static SettingKey> {
    SETTING_KEYS
        .iter()
        .find(|key| key.name.eq_ignore_ascii_case(name))
}

/// The resolved settings an [`crate::Assistant`] runs with.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub api_key: Option<String>,
    pub gemini_host: String,
    pub mcp_endpoint: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: i32,
    pub language: Language,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("gemini_host", &self.gemini_host)
            .field("mcp_endpoint", &self.mcp_endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("language", &self.language)
            .finish()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            gemini_host: DEFAULT_GEMINI_HOST.to_string(),
            mcp_endpoint: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            language: Language::default(),
        }
    }
}

impl Settings {
    /// Resolve every key against `config`, applying defaults for missing values.
    ///
    /// Out of range values are corrected rather than rejected: the temperature is
    /// clamped to `[0, 1]` and a non-positive output cap falls back to the default.
    /// Empty strings count as unset.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let defaults = Settings::default();

        let temperature = optional::<f32>(config.get_param(TXSAGE_TEMPERATURE))?
            .map(clamp_temperature)
            .unwrap_or(defaults.temperature);

        let max_output_tokens = match optional::<i32>(config.get_param(TXSAGE_MAX_OUTPUT_TOKENS))? {
            Some(tokens) if tokens > 0 => tokens,
            Some(tokens) => {
                tracing::warn!(tokens, "Ignoring non-positive {}", TXSAGE_MAX_OUTPUT_TOKENS);
                defaults.max_output_tokens
            }
            None => defaults.max_output_tokens,
        };

        let language = optional_string(config.get_param(TXSAGE_LANGUAGE))?
            .map(|code| Language::from_code(&code))
            .unwrap_or_default();

        Ok(Self {
            api_key: optional_string(config.get_secret(GEMINI_API_KEY))?,
            gemini_host: optional_string(config.get_param(TXSAGE_GEMINI_HOST))?
                .unwrap_or(defaults.gemini_host),
            mcp_endpoint: optional_string(config.get_param(TXSAGE_MCP_ENDPOINT))?,
            model: optional_string(config.get_param(TXSAGE_MODEL))?.unwrap_or(defaults.model),
            temperature,
            max_output_tokens,
            language,
        })
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model_config(&self) -> ModelConfig {
        ModelConfig::new(self.model.clone())
            .with_temperature(Some(self.temperature))
            .with_max_tokens(Some(self.max_output_tokens))
    }
}

fn clamp_temperature(temperature: f32) -> f32 {
    if temperature.is_nan() {
        return DEFAULT_TEMPERATURE;
    }
    temperature.clamp(0.0, 1.0)
}

fn optional<T>(result: Result<T, ConfigError>) -> Result<Option<T>, ConfigError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn optional_string(result: Result<String, ConfigError>) -> Result<Option<String>, ConfigError> {
    Ok(optional(result)?.filter(|value| !value.trim().is_empty()))
}

/// Where an assistant reads its settings from.
///
/// [`Config`] is the production source; tests plug in [`StaticSettings`].
pub trait SettingsSource: Send + Sync {
    fn load(&self) -> Result<Settings, ConfigError>;
}

impl SettingsSource for Config {
    fn load(&self) -> Result<Settings, ConfigError> {
        Settings::from_config(self)
    }
}

/// A fixed set of settings.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings(pub Settings);

impl SettingsSource for StaticSettings {
    fn load(&self) -> Result<Settings, ConfigError> {
        Ok(self.0.clone())
    }
}
