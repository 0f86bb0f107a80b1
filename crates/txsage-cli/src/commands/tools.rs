use anyhow::Result;
use console::style;

use txsage::Assistant;

use crate::output;

pub async fn handle_tools(assistant: &Assistant, reload: bool) -> Result<()> {
    let registry = assistant.registry();
    let tools = if reload {
        registry.reload().await?
    } else {
        registry.tools().await
    };

    let status = registry.status().await;
    if let Some(error) = &status.last_error {
        output::render_error(error);
    }
    output::render_tools(&tools);
    Ok(())
}

pub async fn handle_diagnostics(assistant: &Assistant, json: bool) -> Result<()> {
    let diagnostics = assistant.diagnostics().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&diagnostics)?);
    } else {
        println!("{}", style("txsage diagnostics").bold());
        output::render_diagnostics(&diagnostics);
    }
    Ok(())
}
