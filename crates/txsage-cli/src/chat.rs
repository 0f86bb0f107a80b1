use anyhow::Result;
use etcetera::{choose_app_strategy, AppStrategy};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use txsage::config::APP_STRATEGY;
use txsage::{Command, CommandResponse, Language, Session};

use crate::output;

enum Input {
    Question(String),
    Slash(Command),
    Tools,
    Language(Language),
    Exit,
    Empty,
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    match line {
        "" => Input::Empty,
        "/exit" | "/quit" => Input::Exit,
        "/reload" => Input::Slash(Command::ReloadSettings),
        "/reload-tools" => Input::Slash(Command::ReloadTools),
        "/diag" => Input::Slash(Command::Diagnostics),
        "/tools" => Input::Tools,
        _ if line.starts_with("/lang ") => Input::Language(Language::from_code(&line[6..])),
        _ if line.starts_with('/') => Input::Unknown(line.to_string()),
        _ => Input::Question(line.to_string()),
    }
}

/// Run the interactive chat loop until `/exit` or end of input.
pub async fn interactive(session: &Session) -> Result<()> {
    let mut editor = DefaultEditor::new()?;

    let history_file = choose_app_strategy(APP_STRATEGY.clone())
        .ok()
        .map(|strategy| strategy.config_dir().join("history.txt"));
    if let Some(history_file) = &history_file {
        if history_file.exists() {
            if let Err(err) = editor.load_history(history_file) {
                eprintln!("Warning: Failed to load command history: {}", err);
            }
        }
    }

    output::display_greeting(&session.subject().await);
    loop {
        let line = match editor.readline("txsage> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        };

        match parse_input(&line) {
            Input::Empty => continue,
            Input::Exit => break,
            Input::Unknown(command) => {
                output::render_error(&format!("Unknown command: {}", command));
                continue;
            }
            Input::Tools => {
                let tools = session.assistant().registry().tools().await;
                output::render_tools(&tools);
            }
            Input::Language(language) => {
                session.set_language(language).await;
                println!("Answering in {}", language);
            }
            Input::Slash(command) => render_response(session.handle(command).await),
            Input::Question(question) => {
                output::show_thinking();
                let command = Command::Chat {
                    question,
                    history: None,
                };
                render_response(session.handle(command).await);
            }
        }

        let _ = editor.add_history_entry(line.as_str());
        if let Some(history_file) = &history_file {
            if let Err(err) = editor.save_history(history_file) {
                eprintln!("Warning: Failed to save command history: {}", err);
            }
        }
    }

    Ok(())
}

fn render_response(response: CommandResponse) {
    match response {
        CommandResponse::Reply(reply) => output::render_reply(&reply),
        CommandResponse::Tools { tools, .. } => output::render_tools(&tools),
        CommandResponse::SettingsReloaded(diagnostics)
        | CommandResponse::Diagnostics(diagnostics) => output::render_diagnostics(&diagnostics),
        CommandResponse::Error { message } => output::render_error(&message),
    }
}
