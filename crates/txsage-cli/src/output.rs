use console::style;

use txsage::tools::ToolDescriptor;
use txsage::{Diagnostics, Reply, ReplyContent};

pub fn display_greeting(subject: &str) {
    println!(
        "\n{} {}",
        style("Chatting about transaction").dim(),
        style(subject).cyan().bold()
    );
    println!("{}\n", style("Type /lang <code>, /reload, /tools, /diag or /exit.").dim());
}

pub fn show_thinking() {
    eprintln!("{}", style("Thinking...").dim().italic());
}

pub fn render_reply(reply: &Reply) {
    for call in &reply.tool_calls {
        let status = if call.ok {
            style("ok").green()
        } else {
            style("failed").red()
        };
        println!(
            "{} {} {}",
            style("tool").dim(),
            style(&call.name).cyan(),
            status
        );
        if let Some(error) = &call.error {
            println!("  {}", style(error).red().dim());
        }
    }
    if !reply.tool_calls.is_empty() {
        println!();
    }

    match &reply.content {
        ReplyContent::Text(text) => println!("{}\n", text),
        ReplyContent::NoContent => {
            println!("{}\n", style("(the model returned no text)").yellow())
        }
    }
}

pub fn render_tools(tools: &[ToolDescriptor]) {
    if tools.is_empty() {
        println!("{}", style("No tools available.").yellow());
        return;
    }
    for tool in tools {
        println!("{}", style(&tool.name).cyan().bold());
        if !tool.description.is_empty() {
            println!("  {}", tool.description);
        }
        if !tool.parameters.required.is_empty() {
            println!(
                "  {} {}",
                style("required:").dim(),
                tool.parameters.required.join(", ")
            );
        }
    }
}

pub fn render_diagnostics(diagnostics: &Diagnostics) {
    let flag = |ok: bool| {
        if ok {
            style("yes").green()
        } else {
            style("no").red()
        }
    };
    println!("settings loaded:    {}", flag(diagnostics.settings_loaded));
    println!("model client ready: {}", flag(diagnostics.model_client_ready));
    if let Some(model) = &diagnostics.model {
        println!("model:              {}", model);
    }
    println!("language:           {}", diagnostics.language);

    let registry = &diagnostics.tool_registry;
    println!(
        "tool registry:      {:?} ({} tools)",
        registry.state, registry.tool_count
    );
    if let Some(endpoint) = &registry.endpoint {
        println!("tool endpoint:      {}", endpoint);
    }
    if let Some(error) = &registry.last_error {
        println!("tool error:         {}", style(error).red());
    }
    if let Some(error) = &diagnostics.last_error {
        println!("last error:         {}", style(error).red());
    }
}

pub fn render_error(message: &str) {
    println!("\n  {} {}\n", style("error:").red().bold(), message);
}
