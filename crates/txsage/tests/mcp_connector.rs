use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use txsage::tools::{McpConnector, RegistryState, ToolRegistry};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn tool_server() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(json!({"method": "initialize"})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Mcp-Session-Id", "session-1")
                .set_body_json(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": {
                        "protocolVersion": "2025-03-26",
                        "capabilities": {"tools": {}},
                        "serverInfo": {"name": "solana-tools", "version": "1.0.0"}
                    }
                })),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(
            json!({"method": "notifications/initialized"}),
        ))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(json!({"method": "tools/list"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 2,
            "result": {
                "tools": [{
                    "name": "get_solana_transaction",
                    "description": "Fetch a transaction by signature",
                    "inputSchema": {
                        "type": "object",
                        "properties": {"signature": {"type": "string"}},
                        "required": ["signature"]
                    }
                }]
            }
        })))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    server
}

/// Wait for finished tasks to be reaped, up to two seconds.
async fn alive_tasks_within(limit: usize) -> usize {
    let metrics = tokio::runtime::Handle::current().metrics();
    for _ in 0..200 {
        if metrics.num_alive_tasks() <= limit {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    metrics.num_alive_tasks()
}

#[tokio::test]
async fn test_discovers_over_streamable_http() {
    let server = tool_server().await;
    let registry = ToolRegistry::new(
        Arc::new(McpConnector::default()),
        Some(format!("{}/mcp", server.uri())),
    );

    let tools = registry.tools().await;
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].parameters.required, vec!["signature"]);
    assert_eq!(registry.state().await, RegistryState::Ready);
}

#[tokio::test]
async fn test_reload_releases_the_old_connection() {
    let server = tool_server().await;
    let registry = ToolRegistry::new(
        Arc::new(McpConnector::default()),
        Some(format!("{}/mcp", server.uri())),
    );

    assert_eq!(registry.tools().await.len(), 1);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let baseline = tokio::runtime::Handle::current()
        .metrics()
        .num_alive_tasks();

    for _ in 0..5 {
        assert_eq!(registry.reload().await.unwrap().len(), 1);
    }
    assert!(alive_tasks_within(baseline).await <= baseline);

    registry.configure(None).await;
    assert_eq!(alive_tasks_within(0).await, 0);
}
