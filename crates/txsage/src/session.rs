use std::sync::Arc;
use tokio::sync::Mutex;

use crate::assistant::{Assistant, Diagnostics};
use crate::command::{Command, CommandResponse, Reply, Turn};
use crate::engine::ReplyContent;
use crate::errors::AssistantError;
use crate::message::Message;
use crate::prompt::Language;
use crate::tools::{RegistryState, ToolDescriptor};

struct SessionState {
    subject: String,
    language: Option<Language>,
    transcript: Vec<Message>,
}

/// A conversation about one subject, such as a transaction signature.
///
/// Exchanges on a session run one at a time: a second question waits for the
/// first to finish, so transcript turns are never interleaved.
pub struct Session {
    assistant: Arc<Assistant>,
    gate: Mutex<()>,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new<S: Into<String>>(assistant: Arc<Assistant>, subject: S) -> Self {
        Self {
            assistant,
            gate: Mutex::new(()),
            state: Mutex::new(SessionState {
                subject: subject.into(),
                language: None,
                transcript: Vec::new(),
            }),
        }
    }

    /// Answer in `language` instead of the configured one.
    pub fn with_language(mut self, language: Language) -> Self {
        self.state.get_mut().language = Some(language);
        self
    }

    pub fn assistant(&self) -> &Arc<Assistant> {
        &self.assistant
    }

    pub async fn subject(&self) -> String {
        self.state.lock().await.subject.clone()
    }

    pub async fn transcript(&self) -> Vec<Message> {
        self.state.lock().await.transcript.clone()
    }

    pub async fn language(&self) -> Language {
        let selected = self.state.lock().await.language;
        match selected {
            Some(language) => language,
            None => self.assistant.language().await,
        }
    }

    pub async fn set_language(&self, language: Language) {
        self.state.lock().await.language = Some(language);
    }

    /// Summarize the subject. The transcript is left as it is.
    #[tracing::instrument(skip(self))]
    pub async fn summarize(&self) -> Result<Reply, AssistantError> {
        let _gate = self.gate.lock().await;
        let subject = self.subject().await;
        let language = self.language().await;

        let prompt = self.assistant.prompts().summary(&subject, language)?;
        let exchange = self.assistant.run_exchange(language, &[], &prompt).await?;
        Ok(Reply::from(exchange))
    }

    /// Ask a follow-up question.
    ///
    /// When the model answers with text, the question and the answer are
    /// appended as two turns. Failures and empty answers leave the transcript
    /// unchanged.
    #[tracing::instrument(skip(self, question))]
    pub async fn chat(&self, question: &str) -> Result<Reply, AssistantError> {
        let _gate = self.gate.lock().await;
        let (subject, transcript) = {
            let state = self.state.lock().await;
            (state.subject.clone(), state.transcript.clone())
        };
        let language = self.language().await;

        let prompt = self
            .assistant
            .prompts()
            .chat(&subject, language, question, &transcript)?;
        let exchange = self
            .assistant
            .run_exchange(language, &transcript, &prompt)
            .await?;

        match &exchange.content {
            ReplyContent::Text(answer) => {
                let mut state = self.state.lock().await;
                state.transcript.push(Message::user(question));
                state.transcript.push(Message::assistant(answer.as_str()));
            }
            ReplyContent::NoContent => {
                tracing::warn!("Model returned no text, the transcript is unchanged");
            }
        }
        Ok(Reply::from(exchange))
    }

    /// Move to another subject, dropping the conversation.
    pub async fn reset<S: Into<String>>(&self, subject: S) {
        let _gate = self.gate.lock().await;
        let mut state = self.state.lock().await;
        state.subject = subject.into();
        state.transcript.clear();
    }

    /// Replace the transcript with turns kept by the caller.
    pub async fn restore(&self, history: Vec<Message>) {
        let _gate = self.gate.lock().await;
        self.state.lock().await.transcript = history;
    }

    /// Reload settings and tools. The transcript survives.
    pub async fn reload_settings(&self) -> Result<Diagnostics, AssistantError> {
        self.assistant.reload_settings().await
    }

    /// Drop the tool connection and discover again. A failed discovery yields
    /// no tools; the reason is in the diagnostics.
    pub async fn reload_tools(&self) -> (RegistryState, Vec<ToolDescriptor>) {
        let registry = self.assistant.registry();
        let tools = match registry.reload().await {
            Ok(tools) => tools,
            Err(e) => {
                tracing::warn!(error = %e, "Tool reload failed");
                Vec::new()
            }
        };
        (registry.state().await, tools)
    }

    pub async fn diagnostics(&self) -> Diagnostics {
        self.assistant.diagnostics().await
    }

    /// Run one command from the UI layer. Errors become
    /// [`CommandResponse::Error`] with a readable message.
    pub async fn handle(&self, command: Command) -> CommandResponse {
        match command {
            Command::Summarize => self.summarize().await.into(),
            Command::Chat { question, history } => {
                if let Some(history) = history {
                    self.restore(history.into_iter().map(Turn::into_message).collect())
                        .await;
                }
                self.chat(&question).await.into()
            }
            Command::ReloadSettings => match self.reload_settings().await {
                Ok(diagnostics) => CommandResponse::SettingsReloaded(diagnostics),
                Err(e) => CommandResponse::error(e),
            },
            Command::ReloadTools => {
                let (state, tools) = self.reload_tools().await;
                CommandResponse::Tools { state, tools }
            }
            Command::Diagnostics => CommandResponse::Diagnostics(self.diagnostics().await),
        }
    }
}
