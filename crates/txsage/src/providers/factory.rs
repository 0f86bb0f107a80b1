use std::sync::Arc;

use super::base::Provider;
use super::errors::ProviderError;
use super::google::GoogleProvider;
use crate::config::Settings;

/// Builds the model client for a set of settings.
///
/// The assistant rebuilds its provider through this seam whenever settings are
/// reloaded, so tests can hand out mock providers instead.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, settings: &Settings) -> Result<Arc<dyn Provider>, ProviderError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GoogleProviderFactory;

impl ProviderFactory for GoogleProviderFactory {
    fn create(&self, settings: &Settings) -> Result<Arc<dyn Provider>, ProviderError> {
        create(settings)
    }
}

pub fn create(settings: &Settings) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = settings.api_key.as_deref().ok_or_else(|| {
        ProviderError::Authentication("No Gemini API key configured".to_string())
    })?;
    // We use Arc instead of Box to be able to share the provider across sessions
    Ok(Arc::new(GoogleProvider::new(
        &settings.gemini_host,
        api_key,
        settings.model_config(),
    )?))
}
