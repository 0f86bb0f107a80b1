use etcetera::{choose_app_strategy, AppStrategy, AppStrategyArgs};
use fs2::FileExt;
use once_cell::sync::Lazy;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub static APP_STRATEGY: Lazy<AppStrategyArgs> = Lazy::new(|| AppStrategyArgs {
    top_level_domain: "io".to_string(),
    author: "txsage".to_string(),
    app_name: "txsage".to_string(),
});

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration value not found: {0}")]
    NotFound(String),
    #[error("Failed to deserialize value: {0}")]
    DeserializeError(String),
    #[error("Failed to read config file: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Failed to create config directory: {0}")]
    DirectoryError(String),
    #[error("Failed to lock config file: {0}")]
    LockError(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::DeserializeError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::DeserializeError(err.to_string())
    }
}

/// Flat key-value configuration backed by two YAML files.
///
/// Values are looked up with the following precedence:
/// 1. Environment variables (key converted to UPPERCASE)
/// 2. The params file (`~/.config/txsage/config.yaml` by default) or, for
///    secrets, the secrets file (`~/.config/txsage/secrets.yaml`)
///
/// Both files are rewritten atomically: the new content goes to a locked
/// temporary file which then replaces the original.
///
/// ```no_run
/// use txsage::config::Config;
///
/// let config = Config::from_default_location().unwrap();
/// let model: String = config.get_param("TXSAGE_MODEL").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    config_path: PathBuf,
    secrets_path: PathBuf,
}

impl Config {
    /// Open the configuration in the platform config directory, creating the
    /// directory when needed.
    ///
    /// - macOS/Linux: ~/.config/txsage/
    /// - Windows:     ~\AppData\Roaming\txsage\txsage\config\
    pub fn from_default_location() -> Result<Self, ConfigError> {
        let config_dir = choose_app_strategy(APP_STRATEGY.clone())
            .map_err(|e| ConfigError::DirectoryError(e.to_string()))?
            .config_dir();

        std::fs::create_dir_all(&config_dir)
            .map_err(|e| ConfigError::DirectoryError(e.to_string()))?;

        Ok(Config {
            config_path: config_dir.join("config.yaml"),
            secrets_path: config_dir.join("secrets.yaml"),
        })
    }

    /// Create a configuration over explicit paths, mostly for tests.
    pub fn new<P1: AsRef<Path>, P2: AsRef<Path>>(config_path: P1, secrets_path: P2) -> Self {
        Config {
            config_path: config_path.as_ref().to_path_buf(),
            secrets_path: secrets_path.as_ref().to_path_buf(),
        }
    }

    pub fn load_values(&self) -> Result<HashMap<String, Value>, ConfigError> {
        read_yaml_map(&self.config_path)
    }

    pub fn load_secrets(&self) -> Result<HashMap<String, Value>, ConfigError> {
        read_yaml_map(&self.secrets_path)
    }

    pub fn save_values(&self, values: HashMap<String, Value>) -> Result<(), ConfigError> {
        write_yaml_map(&self.config_path, &values)
    }

    pub fn get(&self, key: &str, is_secret: bool) -> Result<Value, ConfigError> {
        if is_secret {
            self.get_secret(key)
        } else {
            self.get_param(key)
        }
    }

    pub fn set(&self, key: &str, value: Value, is_secret: bool) -> Result<(), ConfigError> {
        if is_secret {
            self.set_secret(key, value)
        } else {
            self.set_param(key, value)
        }
    }

    /// Get a non-secret value, deserialized into the requested type.
    ///
    /// Environment values are parsed as JSON first so that `TXSAGE_TEMPERATURE=0.3`
    /// reads as a number; anything that is not valid JSON is taken as a string.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when neither the environment nor the file holds the key,
    /// and `DeserializeError` when the value has the wrong shape.
    pub fn get_param<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<T, ConfigError> {
        if let Some(value) = env_override(key) {
            return Ok(serde_json::from_value(value)?);
        }

        let values = self.load_values()?;
        values
            .get(key)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))
            .and_then(|v| Ok(serde_json::from_value(v.clone())?))
    }

    pub fn set_param(&self, key: &str, value: Value) -> Result<(), ConfigError> {
        let mut values = self.load_values()?;
        values.insert(key.to_string(), value);
        self.save_values(values)
    }

    pub fn delete(&self, key: &str) -> Result<(), ConfigError> {
        let mut values = self.load_values()?;
        values.remove(key);
        self.save_values(values)
    }

    /// Get a secret value, with the same environment override as [`Config::get_param`].
    pub fn get_secret<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<T, ConfigError> {
        if let Some(value) = env_override(key) {
            return Ok(serde_json::from_value(value)?);
        }

        let values = self.load_secrets()?;
        values
            .get(key)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))
            .and_then(|v| Ok(serde_json::from_value(v.clone())?))
    }

    pub fn set_secret(&self, key: &str, value: Value) -> Result<(), ConfigError> {
        let mut values = self.load_secrets()?;
        values.insert(key.to_string(), value);
        write_yaml_map(&self.secrets_path, &values)
    }

    pub fn delete_secret(&self, key: &str) -> Result<(), ConfigError> {
        let mut values = self.load_secrets()?;
        values.remove(key);
        write_yaml_map(&self.secrets_path, &values)
    }
}

fn env_override(key: &str) -> Option<Value> {
    let val = env::var(key.to_uppercase()).ok()?;
    Some(serde_json::from_str(&val).unwrap_or(Value::String(val)))
}

fn read_yaml_map(path: &Path) -> Result<HashMap<String, Value>, ConfigError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(HashMap::new());
    }

    let yaml_value: serde_yaml::Value = serde_yaml::from_str(&content)?;
    match serde_json::to_value(yaml_value)? {
        Value::Object(map) => Ok(map.into_iter().collect()),
        _ => Ok(HashMap::new()),
    }
}

fn write_yaml_map(path: &Path, values: &HashMap<String, Value>) -> Result<(), ConfigError> {
    let yaml_value = serde_yaml::to_string(values)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::DirectoryError(e.to_string()))?;
    }

    let temp_path = path.with_extension("tmp");
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;

        file.lock_exclusive()
            .map_err(|e| ConfigError::LockError(e.to_string()))?;

        file.write_all(yaml_value.as_bytes())?;
        file.sync_all()?;
        // unlocked on drop
    }

    std::fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn temp_config() -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        let config = Config::new(dir.path().join("config.yaml"), dir.path().join("secrets.yaml"));
        (dir, config)
    }

    #[test]
    fn test_model_name_round_trips_through_file() -> Result<(), ConfigError> {
        let (dir, config) = temp_config();

        config.set_param("txsage_model", Value::String("gemini-2.0-flash".to_string()))?;
        let reopened = Config::new(dir.path().join("config.yaml"), dir.path().join("secrets.yaml"));
        let model: String = reopened.get_param("txsage_model")?;
        assert_eq!(model, "gemini-2.0-flash");

        Ok(())
    }

    #[test]
    #[serial]
    fn test_env_override_is_parsed_as_json() -> Result<(), ConfigError> {
        let (_dir, config) = temp_config();
        config.set_param("txsage_env_sample", serde_json::json!(0.2))?;

        std::env::set_var("TXSAGE_ENV_SAMPLE", "0.9");
        let value: f32 = config.get_param("txsage_env_sample")?;
        std::env::remove_var("TXSAGE_ENV_SAMPLE");
        assert_eq!(value, 0.9);

        let value: f32 = config.get_param("txsage_env_sample")?;
        assert_eq!(value, 0.2);
        Ok(())
    }

    #[test]
    fn test_missing_value() {
        let (_dir, config) = temp_config();

        let result: Result<String, ConfigError> = config.get_param("txsage_nonexistent_key");
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_written_file_is_plain_yaml() -> Result<(), ConfigError> {
        let (dir, config) = temp_config();

        config.set_param("txsage_language", Value::String("ko-KR".to_string()))?;
        config.set_param("txsage_max_tokens", Value::Number(2048.into()))?;

        let content = std::fs::read_to_string(dir.path().join("config.yaml"))?;
        assert!(content.contains("txsage_language: ko-KR"));
        assert!(content.contains("txsage_max_tokens: 2048"));
        assert!(!dir.path().join("config.tmp").exists());

        config.delete("txsage_language")?;
        let result: Result<String, ConfigError> = config.get_param("txsage_language");
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
        let kept: i64 = config.get_param("txsage_max_tokens")?;
        assert_eq!(kept, 2048);

        Ok(())
    }

    #[test]
    fn test_secrets_live_in_their_own_file() -> Result<(), ConfigError> {
        let (dir, config) = temp_config();

        config.set("txsage_secret_sample", Value::String("s3cret".to_string()), true)?;
        let value: String = config.get_secret("txsage_secret_sample")?;
        assert_eq!(value, "s3cret");

        let params = std::fs::read_to_string(dir.path().join("config.yaml")).unwrap_or_default();
        assert!(!params.contains("s3cret"));

        config.delete_secret("txsage_secret_sample")?;
        let result: Result<String, ConfigError> = config.get_secret("txsage_secret_sample");
        assert!(matches!(result, Err(ConfigError::NotFound(_))));

        Ok(())
    }

    #[test]
    fn test_corrupted_file_is_an_error() {
        let (dir, config) = temp_config();
        std::fs::write(dir.path().join("config.yaml"), "key: [unclosed").unwrap();

        let result: Result<String, ConfigError> = config.get_param("key");
        assert!(matches!(result, Err(ConfigError::DeserializeError(_))));
    }
}
