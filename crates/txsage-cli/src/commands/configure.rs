use anyhow::{bail, Result};
use console::style;
use serde_json::Value;

use txsage::config::{find_setting_key, Config, SettingKey, SETTING_KEYS};

/// Numeric keys are stored as numbers, everything else as a string.
fn parse_value(key: &SettingKey, raw: &str) -> Value {
    let numeric = key.default.is_some_and(|d| d.parse::<f64>().is_ok());
    if numeric {
        if let Ok(number) = raw.trim().parse::<serde_json::Number>() {
            return Value::Number(number);
        }
    }
    Value::String(raw.to_string())
}

pub fn handle_configure(config: &Config, key: &str, value: &str, secret: bool) -> Result<()> {
    let Some(setting) = find_setting_key(key) else {
        let known: Vec<&str> = SETTING_KEYS.iter().map(|key| key.name).collect();
        bail!("Unknown key {}. Known keys: {}", key, known.join(", "));
    };

    let secret = secret || setting.secret;
    config.set(setting.name, parse_value(setting, value), secret)?;

    let shown = if secret { "***" } else { value };
    println!(
        "{} {} = {}",
        style("saved").green(),
        style(setting.name).cyan(),
        shown
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use txsage::config::settings::{GEMINI_API_KEY, TXSAGE_MODEL, TXSAGE_TEMPERATURE};

    #[test]
    fn test_values_keep_their_type() {
        let temperature = find_setting_key(TXSAGE_TEMPERATURE).unwrap();
        assert_eq!(parse_value(temperature, "0.3"), json!(0.3));
        assert_eq!(parse_value(temperature, "warm"), json!("warm"));

        let model = find_setting_key(TXSAGE_MODEL).unwrap();
        assert_eq!(parse_value(model, "2"), json!("2"));
    }

    #[test]
    fn test_api_key_goes_to_secrets() {
        let dir = TempDir::new().unwrap();
        let config = Config::new(dir.path().join("config.yaml"), dir.path().join("secrets.yaml"));

        handle_configure(&config, "gemini_api_key", "abc123", false).unwrap();

        assert!(config.load_values().unwrap().is_empty());
        assert_eq!(
            config.load_secrets().unwrap().get(GEMINI_API_KEY),
            Some(&json!("abc123"))
        );
        assert!(handle_configure(&config, "NOT_A_KEY", "x", false).is_err());
    }
}
