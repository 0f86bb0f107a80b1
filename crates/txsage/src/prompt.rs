//! Language-specific prompt construction.
//!
//! Templates live under `src/prompts/<language>/` and are embedded at build time.
//! Each language provides `summary.md`, `chat.md` and `tool_results.md`.

use include_dir::{include_dir, Dir};
use minijinja::{context, Environment, UndefinedBehavior};
use rmcp::model::Role;
use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::tools::ToolCallOutcome;

static PROMPTS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/prompts");

/// A response language with its own prompt templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Language {
    #[default]
    EnUs,
    ZhCn,
    JaJp,
    KoKr,
    EsEs,
}

struct LanguageEntry {
    language: Language,
    code: &'static str,
    user_label: &'static str,
    assistant_label: &'static str,
}

const LANGUAGES: &[LanguageEntry] = &[
    LanguageEntry {
        language: Language::EnUs,
        code: "en-US",
        user_label: "User",
        assistant_label: "Assistant",
    },
    LanguageEntry {
        language: Language::ZhCn,
        code: "zh-CN",
        user_label: "用户",
        assistant_label: "助手",
    },
    LanguageEntry {
        language: Language::JaJp,
        code: "ja-JP",
        user_label: "ユーザー",
        assistant_label: "アシスタント",
    },
    LanguageEntry {
        language: Language::KoKr,
        code: "ko-KR",
        user_label: "사용자",
        assistant_label: "어시스턴트",
    },
    LanguageEntry {
        language: Language::EsEs,
        code: "es-ES",
        user_label: "Usuario",
        assistant_label: "Asistente",
    },
];

impl Language {
    pub const ALL: [Language; 5] = [
        Language::EnUs,
        Language::ZhCn,
        Language::JaJp,
        Language::KoKr,
        Language::EsEs,
    ];

    /// Resolve a language code such as `ja-JP`, `ja_jp` or `ja`.
    ///
    /// Unknown codes resolve to [`Language::EnUs`].
    pub fn from_code(code: &str) -> Self {
        let normalized = code.trim().replace('_', "-").to_ascii_lowercase();

        let exact = LANGUAGES
            .iter()
            .find(|entry| entry.code.eq_ignore_ascii_case(&normalized));
        let by_primary = || {
            LANGUAGES.iter().find(|entry| {
                !normalized.contains('-')
                    && entry.code.split('-').next() == Some(normalized.as_str())
            })
        };

        match exact.or_else(by_primary) {
            Some(entry) => entry.language,
            None => {
                tracing::debug!(code, "Unsupported language code, using en-US");
                Language::default()
            }
        }
    }

    fn entry(self) -> &'static LanguageEntry {
        LANGUAGES
            .iter()
            .find(|entry| entry.language == self)
            .unwrap_or(&LANGUAGES[0])
    }

    pub fn code(self) -> &'static str {
        self.entry().code
    }

    fn role_label(self, role: &Role) -> &'static str {
        if *role == Role::User {
            self.entry().user_label
        } else {
            self.entry().assistant_label
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl From<String> for Language {
    fn from(code: String) -> Self {
        Language::from_code(&code)
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.code().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptKind {
    Summary,
    Chat,
    ToolResults,
}

impl PromptKind {
    fn file_name(self) -> &'static str {
        match self {
            PromptKind::Summary => "summary.md",
            PromptKind::Chat => "chat.md",
            PromptKind::ToolResults => "tool_results.md",
        }
    }

    fn template_name(self, language: Language) -> String {
        format!("{}/{}", language.code(), self.file_name())
    }
}

#[derive(Serialize)]
struct TurnView<'a> {
    label: &'static str,
    text: &'a str,
}

#[derive(Serialize)]
struct OutcomeView<'a> {
    name: &'a str,
    ok: bool,
    payload: String,
    error: &'a str,
}

/// Renders the prompts sent to the model. Interpolation is raw: nothing is escaped.
pub struct PromptBuilder {
    env: Environment<'static>,
}

impl PromptBuilder {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        for dir in PROMPTS_DIR.dirs() {
            for file in dir.files() {
                let name = file.path().to_string_lossy().replace('\\', "/");
                let source = String::from_utf8_lossy(file.contents()).into_owned();
                env.add_template_owned(name, source)?;
            }
        }

        Ok(Self { env })
    }

    fn render<S: Serialize>(
        &self,
        kind: PromptKind,
        language: Language,
        ctx: S,
    ) -> Result<String, minijinja::Error> {
        let template = match self.env.get_template(&kind.template_name(language)) {
            Ok(template) => template,
            Err(e) if matches!(e.kind(), minijinja::ErrorKind::TemplateNotFound) => {
                tracing::warn!(%language, "Missing prompt template, using en-US");
                self.env
                    .get_template(&kind.template_name(Language::default()))?
            }
            Err(e) => return Err(e),
        };
        template.render(ctx)
    }

    /// Prompt asking for a summary of `subject`.
    pub fn summary(&self, subject: &str, language: Language) -> Result<String, minijinja::Error> {
        self.render(PromptKind::Summary, language, context! { subject })
    }

    /// Prompt for one chat question, with the prior turns serialized into it.
    pub fn chat(
        &self,
        subject: &str,
        language: Language,
        question: &str,
        history: &[Message],
    ) -> Result<String, minijinja::Error> {
        let history: Vec<TurnView<'_>> = history
            .iter()
            .map(|turn| TurnView {
                label: language.role_label(&turn.role),
                text: &turn.text,
            })
            .collect();
        self.render(
            PromptKind::Chat,
            language,
            context! { subject, question, history },
        )
    }

    /// Follow-up prompt: the original prompt plus one section per tool outcome,
    /// in the order the calls were requested.
    pub fn tool_results(
        &self,
        language: Language,
        original_prompt: &str,
        outcomes: &[ToolCallOutcome],
    ) -> Result<String, minijinja::Error> {
        let outcomes: Vec<OutcomeView<'_>> = outcomes
            .iter()
            .map(|outcome| match &outcome.result {
                Ok(payload) => OutcomeView {
                    name: &outcome.name,
                    ok: true,
                    payload: serde_json::to_string_pretty(payload)
                        .unwrap_or_else(|_| payload.to_string()),
                    error: "",
                },
                Err(error) => OutcomeView {
                    name: &outcome.name,
                    ok: false,
                    payload: String::new(),
                    error,
                },
            })
            .collect();
        self.render(
            PromptKind::ToolResults,
            language,
            context! { original_prompt, outcomes },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_language_has_every_template() {
        let builder = PromptBuilder::new().unwrap();
        for language in Language::ALL {
            for kind in [PromptKind::Summary, PromptKind::Chat, PromptKind::ToolResults] {
                assert!(
                    builder.env.get_template(&kind.template_name(language)).is_ok(),
                    "missing {}",
                    kind.template_name(language)
                );
            }
        }
    }

    #[test]
    fn test_every_language_renders_the_subject() {
        let builder = PromptBuilder::new().unwrap();
        let history = vec![Message::user("Who paid?"), Message::assistant("Wallet A.")];
        for language in Language::ALL {
            let summary = builder.summary("SIG123", language).unwrap();
            assert!(!summary.trim().is_empty());
            assert!(summary.contains("SIG123"), "{language}: {summary}");

            let chat = builder
                .chat("SIG123", language, "What fee was paid?", &history)
                .unwrap();
            assert!(chat.contains("SIG123"));
            assert!(chat.contains("What fee was paid?"));
            assert!(chat.contains("Wallet A."));
            assert!(chat.contains(language.role_label(&Role::User)));
        }
    }

    #[test]
    fn test_unsupported_code_falls_back_to_english() {
        let builder = PromptBuilder::new().unwrap();
        let fallback = builder.summary("SIG123", Language::from_code("fr-FR")).unwrap();
        let english = builder.summary("SIG123", Language::EnUs).unwrap();
        assert_eq!(fallback, english);
    }

    #[test]
    fn test_language_code_normalization() {
        assert_eq!(Language::from_code("ja-JP"), Language::JaJp);
        assert_eq!(Language::from_code("zh_cn"), Language::ZhCn);
        assert_eq!(Language::from_code(" KO-kr "), Language::KoKr);
        assert_eq!(Language::from_code("es"), Language::EsEs);
        assert_eq!(Language::from_code("zh-TW"), Language::EnUs);
        assert_eq!(Language::from_code(""), Language::EnUs);
        assert_eq!(Language::EsEs.to_string(), "es-ES");
    }

    #[test]
    fn test_language_serde_uses_codes() {
        assert_eq!(serde_json::to_value(Language::ZhCn).unwrap(), json!("zh-CN"));
        let language: Language = serde_json::from_value(json!("ja")).unwrap();
        assert_eq!(language, Language::JaJp);
    }

    #[test]
    fn test_chat_without_history_has_no_history_section() {
        let builder = PromptBuilder::new().unwrap();
        let chat = builder
            .chat("SIG123", Language::EnUs, "What fee was paid?", &[])
            .unwrap();
        assert!(!chat.contains("Conversation so far"));
    }

    #[test]
    fn test_tool_results_keep_order_and_failures() {
        let builder = PromptBuilder::new().unwrap();
        let outcomes = vec![
            ToolCallOutcome::success(
                "get_solana_transaction",
                json!({"signature": "SIG123"}),
                json!({"fee": 5000}),
            ),
            ToolCallOutcome::failure("get_account_info", json!({}), "account lookup timed out"),
            ToolCallOutcome::success(
                "get_slot",
                json!({}),
                json!([{"type": "text", "text": "123"}]),
            ),
        ];

        let prompt = builder
            .tool_results(Language::EnUs, "Summarize SIG123", &outcomes)
            .unwrap();

        assert!(prompt.starts_with("Summarize SIG123"));
        assert!(prompt.contains("\"fee\": 5000"));
        assert!(prompt.contains("Failed: account lookup timed out"));

        let first = prompt.find("### get_solana_transaction").unwrap();
        let second = prompt.find("### get_account_info").unwrap();
        let third = prompt.find("### get_slot").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn test_prompts_are_not_escaped() {
        let builder = PromptBuilder::new().unwrap();
        let chat = builder
            .chat("SIG<&>", Language::EnUs, "Is \"this\" <safe>?", &[])
            .unwrap();
        assert!(chat.contains("SIG<&>"));
        assert!(chat.contains("Is \"this\" <safe>?"));
    }
}
