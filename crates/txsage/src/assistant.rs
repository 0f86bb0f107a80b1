use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::settings::GEMINI_API_KEY;
use crate::config::{Config, Settings, SettingsSource};
use crate::engine::{AnswerEngine, Exchange};
use crate::errors::AssistantError;
use crate::message::Message;
use crate::prompt::{Language, PromptBuilder};
use crate::providers::base::Provider;
use crate::providers::factory::{GoogleProviderFactory, ProviderFactory};
use crate::tools::registry::RegistryStatus;
use crate::tools::{McpConnector, ToolConnector, ToolRegistry};

/// What has been initialized so far. Reading it has no side effects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub settings_loaded: bool,
    pub model_client_ready: bool,
    pub model: Option<String>,
    pub language: Language,
    pub tool_registry: RegistryStatus,
    pub last_error: Option<String>,
}

#[derive(Default)]
struct Runtime {
    settings: Option<Settings>,
    provider: Option<Arc<dyn Provider>>,
    last_error: Option<String>,
}

/// The long-lived background service shared by every [`crate::Session`].
///
/// Owns the settings, the model client and the tool registry. The tool
/// connection is established once and reused until settings or tools are
/// reloaded.
pub struct Assistant {
    settings_source: Arc<dyn SettingsSource>,
    provider_factory: Arc<dyn ProviderFactory>,
    registry: Arc<ToolRegistry>,
    prompts: Arc<PromptBuilder>,
    runtime: RwLock<Runtime>,
}

pub struct AssistantBuilder {
    settings_source: Option<Arc<dyn SettingsSource>>,
    provider_factory: Arc<dyn ProviderFactory>,
    connector: Arc<dyn ToolConnector>,
}

impl Default for AssistantBuilder {
    fn default() -> Self {
        Self {
            settings_source: None,
            provider_factory: Arc::new(GoogleProviderFactory),
            connector: Arc::new(McpConnector::default()),
        }
    }
}

impl AssistantBuilder {
    pub fn settings_source(mut self, source: Arc<dyn SettingsSource>) -> Self {
        self.settings_source = Some(source);
        self
    }

    pub fn provider_factory(mut self, factory: Arc<dyn ProviderFactory>) -> Self {
        self.provider_factory = factory;
        self
    }

    pub fn connector(mut self, connector: Arc<dyn ToolConnector>) -> Self {
        self.connector = connector;
        self
    }

    /// Build the assistant and load its settings once.
    ///
    /// Invalid settings or a missing credential do not fail the build: they are
    /// reported by [`Assistant::diagnostics`] and by the first exchange. Nothing
    /// is sent over the network here.
    pub fn build(self) -> Result<Assistant, AssistantError> {
        let settings_source: Arc<dyn SettingsSource> = match self.settings_source {
            Some(source) => source,
            None => Arc::new(Config::from_default_location()?),
        };

        let mut runtime = Runtime::default();
        match settings_source.load() {
            Ok(settings) => {
                runtime.provider =
                    build_provider(&*self.provider_factory, &settings, &mut runtime.last_error);
                runtime.settings = Some(settings);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load settings");
                runtime.last_error = Some(e.to_string());
            }
        }

        let endpoint = runtime
            .settings
            .as_ref()
            .and_then(|settings| settings.mcp_endpoint.clone());

        Ok(Assistant {
            settings_source,
            provider_factory: self.provider_factory,
            registry: Arc::new(ToolRegistry::new(self.connector, endpoint)),
            prompts: Arc::new(PromptBuilder::new()?),
            runtime: RwLock::new(runtime),
        })
    }
}

/// `None` when there is no credential or the client could not be built; the
/// latter is recorded in `last_error`.
fn build_provider(
    factory: &dyn ProviderFactory,
    settings: &Settings,
    last_error: &mut Option<String>,
) -> Option<Arc<dyn Provider>> {
    if !settings.has_credential() {
        tracing::info!("No Gemini API key configured, the model client is disabled");
        return None;
    }
    match factory.create(settings) {
        Ok(provider) => Some(provider),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create the model client");
            *last_error = Some(e.to_string());
            None
        }
    }
}

impl Assistant {
    pub fn builder() -> AssistantBuilder {
        AssistantBuilder::default()
    }

    pub fn prompts(&self) -> &PromptBuilder {
        &self.prompts
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// The configured response language, `en-US` until settings load.
    pub async fn language(&self) -> Language {
        self.runtime
            .read()
            .await
            .settings
            .as_ref()
            .map(|settings| settings.language)
            .unwrap_or_default()
    }

    async fn provider(&self) -> Result<Arc<dyn Provider>, AssistantError> {
        let runtime = self.runtime.read().await;
        if let Some(provider) = &runtime.provider {
            return Ok(provider.clone());
        }
        let message = match &runtime.settings {
            None => format!(
                "Settings are not loaded: {}",
                runtime.last_error.as_deref().unwrap_or("unknown error")
            ),
            Some(settings) if !settings.has_credential() => format!(
                "No Gemini API key configured. Set {} and reload settings.",
                GEMINI_API_KEY
            ),
            Some(_) => format!(
                "The model client is not available: {}",
                runtime.last_error.as_deref().unwrap_or("unknown error")
            ),
        };
        Err(AssistantError::Configuration(message))
    }

    /// Run one exchange. The credential is checked before anything touches the
    /// network, tool discovery included.
    pub async fn run_exchange(
        &self,
        language: Language,
        transcript: &[Message],
        prompt: &str,
    ) -> Result<Exchange, AssistantError> {
        let provider = self.provider().await?;
        AnswerEngine::new(provider, self.registry.clone(), self.prompts.clone())
            .run(language, transcript, prompt)
            .await
    }

    /// Re-read settings, rebuild the model client and re-run tool discovery
    /// against the configured endpoint.
    ///
    /// The previous settings stay in effect when they cannot be read. Discovery
    /// failures are reported through [`Assistant::diagnostics`] only.
    #[tracing::instrument(skip(self))]
    pub async fn reload_settings(&self) -> Result<Diagnostics, AssistantError> {
        let settings = match self.settings_source.load() {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to reload settings");
                self.runtime.write().await.last_error = Some(e.to_string());
                return Err(e.into());
            }
        };

        let endpoint = settings.mcp_endpoint.clone();
        {
            let mut runtime = self.runtime.write().await;
            runtime.last_error = None;
            runtime.provider =
                build_provider(&*self.provider_factory, &settings, &mut runtime.last_error);
            runtime.settings = Some(settings);
        }
        tracing::info!("Settings reloaded");

        self.registry.configure(endpoint.clone()).await;
        if endpoint.is_some() {
            if let Err(e) = self.registry.reload().await {
                tracing::warn!(error = %e, "Tool discovery failed after reloading settings");
            }
        }

        Ok(self.diagnostics().await)
    }

    pub async fn diagnostics(&self) -> Diagnostics {
        let tool_registry = self.registry.status().await;
        let runtime = self.runtime.read().await;
        Diagnostics {
            settings_loaded: runtime.settings.is_some(),
            model_client_ready: runtime.provider.is_some(),
            model: runtime.provider.as_ref().map(|p| p.get_model_config().model_name),
            language: runtime
                .settings
                .as_ref()
                .map(|settings| settings.language)
                .unwrap_or_default(),
            tool_registry,
            last_error: runtime.last_error.clone(),
        }
    }
}
