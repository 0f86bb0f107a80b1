use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use txsage::config::Config;
use txsage::{Assistant, Language, Session};

use crate::chat;
use crate::commands::configure::handle_configure;
use crate::commands::tools::{handle_diagnostics, handle_tools};
use crate::logging::setup_logging;
use crate::output;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Summarize a transaction
    Summarize {
        /// Transaction signature
        signature: String,

        #[arg(
            short,
            long,
            value_name = "CODE",
            help = "Response language (en-US, zh-CN, ja-JP, ko-KR, es-ES)"
        )]
        language: Option<String>,

        #[arg(long, help = "Print the reply as JSON")]
        json: bool,
    },

    /// Ask questions about a transaction interactively
    Chat {
        /// Transaction signature
        signature: String,

        #[arg(short, long, value_name = "CODE", help = "Response language")]
        language: Option<String>,
    },

    /// List the tools offered by the configured tool server
    Tools {
        #[arg(long, help = "Reconnect and discover the tools again")]
        reload: bool,
    },

    /// Show what has been initialized
    #[command(alias = "diag")]
    Diagnostics {
        #[arg(long, help = "Print as JSON")]
        json: bool,
    },

    /// Store a configuration value
    Configure {
        /// Key name, e.g. TXSAGE_MODEL
        key: String,

        value: String,

        #[arg(long, help = "Store the value in the secrets file")]
        secret: bool,
    },
}

fn session(assistant: Arc<Assistant>, signature: String, language: Option<String>) -> Session {
    let session = Session::new(assistant, signature);
    match language {
        Some(code) => session.with_language(Language::from_code(&code)),
        None => session,
    }
}

pub async fn cli() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = setup_logging() {
        eprintln!("Warning: Failed to set up logging: {}", e);
    }

    if let Command::Configure { key, value, secret } = &cli.command {
        let config = Config::from_default_location()?;
        return handle_configure(&config, key, value, *secret);
    }

    tracing::debug!(command = ?cli.command, "Running command");
    let assistant = Arc::new(Assistant::builder().build()?);

    match cli.command {
        Command::Summarize {
            signature,
            language,
            json,
        } => {
            let session = session(assistant, signature, language);
            output::show_thinking();
            match session.summarize().await {
                Ok(reply) if json => println!("{}", serde_json::to_string_pretty(&reply)?),
                Ok(reply) => output::render_reply(&reply),
                Err(e) => {
                    output::render_error(&e.to_string());
                    std::process::exit(1);
                }
            }
        }
        Command::Chat {
            signature,
            language,
        } => {
            let session = session(assistant, signature, language);
            chat::interactive(&session).await?;
        }
        Command::Tools { reload } => handle_tools(&assistant, reload).await?,
        Command::Diagnostics { json } => handle_diagnostics(&assistant, json).await?,
        Command::Configure { .. } => {}
    }

    Ok(())
}
