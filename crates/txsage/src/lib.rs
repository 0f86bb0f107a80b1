pub mod assistant;
pub mod command;
pub mod config;
pub mod engine;
pub mod errors;
pub mod message;
pub mod model;
pub mod prompt;
pub mod providers;
pub mod session;
pub mod tools;

pub use assistant::{Assistant, AssistantBuilder, Diagnostics};
pub use command::{Command, CommandResponse, Reply, ToolCallReport, Turn};
pub use engine::{AnswerEngine, Exchange, ReplyContent};
pub use errors::AssistantError;
pub use prompt::{Language, PromptBuilder};
pub use session::Session;
