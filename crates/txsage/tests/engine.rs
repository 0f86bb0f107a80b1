use std::sync::Arc;

use serde_json::json;
use txsage::engine::{AnswerEngine, ReplyContent};
use txsage::message::{Message, ModelReply};
use txsage::prompt::{Language, PromptBuilder};
use txsage::providers::errors::ProviderError;
use txsage::tools::{RegistryState, ToolRegistry};
use txsage::AssistantError;

mod test_support;
use test_support::{MockConnector, MockToolServer, ScriptedProvider, ENDPOINT};

const PROMPT: &str = "What fee was paid for SIG123?";

fn engine(
    provider: Arc<ScriptedProvider>,
    server: Arc<MockToolServer>,
    endpoint: Option<&str>,
) -> (AnswerEngine, Arc<ToolRegistry>) {
    let registry = Arc::new(ToolRegistry::new(
        Arc::new(MockConnector(server)),
        endpoint.map(str::to_string),
    ));
    let engine = AnswerEngine::new(
        provider,
        registry.clone(),
        Arc::new(PromptBuilder::new().unwrap()),
    );
    (engine, registry)
}

fn transaction_server() -> Arc<MockToolServer> {
    let server = MockToolServer::new();
    server.add_tool("get_solana_transaction", "Fetch a transaction by signature");
    server.add_tool("get_account_info", "Fetch an account");
    server.add_tool("get_slot", "Current slot");
    server
}

#[tokio::test]
async fn test_plain_answer_takes_one_model_call() {
    let provider = ScriptedProvider::text("SIG123 moved 1 SOL.");
    let (engine, _) = engine(provider.clone(), MockToolServer::new(), None);
    let transcript = vec![Message::user("Who signed?"), Message::assistant("Wallet A.")];

    let exchange = engine.run(Language::EnUs, &transcript, PROMPT).await.unwrap();

    assert_eq!(exchange.content, ReplyContent::Text("SIG123 moved 1 SOL.".into()));
    assert_eq!(exchange.model_calls, 1);
    assert!(exchange.tool_calls.is_empty());
    assert_eq!(exchange.usage.total_tokens, Some(15));

    let calls = provider.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].tools.is_empty());
    assert_eq!(calls[0].messages.len(), 3);
    assert_eq!(calls[0].messages[0].text, "Who signed?");
    assert!(calls[0].messages[2].is_user());
    assert_eq!(calls[0].messages[2].text, PROMPT);
}

#[tokio::test]
async fn test_zero_discovered_tools_still_answers() {
    let provider = ScriptedProvider::text("No tools needed.");
    let (engine, registry) = engine(provider.clone(), MockToolServer::new(), Some(ENDPOINT));

    let exchange = engine.run(Language::EnUs, &[], PROMPT).await.unwrap();

    assert_eq!(exchange.content.text(), Some("No tools needed."));
    assert!(provider.calls()[0].tools.is_empty());
    assert_eq!(registry.state().await, RegistryState::Ready);
}

#[tokio::test]
async fn test_discovery_failure_degrades_to_plain_answers() {
    let provider = ScriptedProvider::text("Answer without tools.");
    let server = MockToolServer::unreachable();
    let (engine, registry) = engine(provider.clone(), server.clone(), Some(ENDPOINT));

    let exchange = engine.run(Language::EnUs, &[], PROMPT).await.unwrap();
    assert_eq!(exchange.content.text(), Some("Answer without tools."));
    assert_eq!(registry.state().await, RegistryState::Failed);

    // no automatic retry
    let provider_again = ScriptedProvider::text("Still no tools.");
    let engine_again = AnswerEngine::new(
        provider_again,
        registry.clone(),
        Arc::new(PromptBuilder::new().unwrap()),
    );
    engine_again.run(Language::EnUs, &[], PROMPT).await.unwrap();
    assert_eq!(server.connects(), 1);
}

#[tokio::test]
async fn test_tool_calls_run_in_order_with_one_follow_up() {
    let server = transaction_server();
    server.respond("get_solana_transaction", json!({"fee": 5000}));
    server.respond("get_account_info", json!({"lamports": 1_000_000}));
    let provider = ScriptedProvider::new(vec![
        Ok(ModelReply::default()
            .with_tool_call("get_solana_transaction", json!({"signature": "SIG123"}))
            .with_tool_call("get_account_info", json!({"address": "Wallet1"}))),
        Ok(ModelReply::default().with_text("The fee was 0.000005 SOL.")),
    ]);
    let (engine, _) = engine(provider.clone(), server.clone(), Some(ENDPOINT));

    let exchange = engine.run(Language::EnUs, &[], PROMPT).await.unwrap();

    assert_eq!(exchange.content.text(), Some("The fee was 0.000005 SOL."));
    assert_eq!(exchange.model_calls, 2);
    assert_eq!(exchange.usage.total_tokens, Some(30));
    assert_eq!(
        server.calls(),
        vec![
            ("get_solana_transaction".to_string(), json!({"signature": "SIG123"})),
            ("get_account_info".to_string(), json!({"address": "Wallet1"})),
        ]
    );
    assert_eq!(exchange.tool_calls.len(), 2);
    assert!(exchange.tool_calls.iter().all(|outcome| outcome.is_success()));

    let calls = provider.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].tools.len(), 3);
    assert_eq!(calls[1].tools.len(), 3);

    // the follow-up is a fresh single turn built from the original prompt
    assert_eq!(calls[1].messages.len(), 1);
    let follow_up = &calls[1].messages[0].text;
    assert!(follow_up.starts_with(PROMPT));
    assert!(follow_up.contains("\"fee\": 5000"));
    let first = follow_up.find("### get_solana_transaction").unwrap();
    let second = follow_up.find("### get_account_info").unwrap();
    assert!(first < second);
}

#[tokio::test]
async fn test_failed_tool_call_does_not_stop_the_others() {
    let server = transaction_server();
    server.respond("get_solana_transaction", json!({"fee": 5000}));
    server.fail("get_account_info", "account lookup timed out");
    server.respond("get_slot", json!({"slot": 123}));
    let provider = ScriptedProvider::new(vec![
        Ok(ModelReply::default()
            .with_tool_call("get_solana_transaction", json!({"signature": "SIG123"}))
            .with_tool_call("get_account_info", json!({}))
            .with_tool_call("get_slot", json!({}))),
        Ok(ModelReply::default().with_text("Partial answer.")),
    ]);
    let (engine, _) = engine(provider.clone(), server.clone(), Some(ENDPOINT));

    let exchange = engine.run(Language::EnUs, &[], PROMPT).await.unwrap();

    assert_eq!(server.calls().len(), 3);
    assert_eq!(exchange.tool_calls.len(), 3);
    assert!(exchange.tool_calls[0].is_success());
    assert!(!exchange.tool_calls[1].is_success());
    assert!(exchange.tool_calls[2].is_success());

    let follow_up = &provider.calls()[1].messages[0].text;
    assert!(follow_up.contains("Failed: "));
    assert!(follow_up.contains("account lookup timed out"));
    assert!(follow_up.contains("\"fee\": 5000"));
    assert!(follow_up.contains("\"slot\": 123"));
}

#[tokio::test]
async fn test_tool_calls_from_the_follow_up_are_not_executed() {
    let server = transaction_server();
    server.respond("get_solana_transaction", json!({"fee": 5000}));
    let provider = ScriptedProvider::new(vec![
        Ok(ModelReply::default()
            .with_tool_call("get_solana_transaction", json!({"signature": "SIG123"}))),
        Ok(ModelReply::default()
            .with_text("The fee was 0.000005 SOL.")
            .with_tool_call("get_slot", json!({}))),
    ]);
    let (engine, _) = engine(provider.clone(), server.clone(), Some(ENDPOINT));

    let exchange = engine.run(Language::EnUs, &[], PROMPT).await.unwrap();

    assert_eq!(exchange.content.text(), Some("The fee was 0.000005 SOL."));
    assert_eq!(exchange.model_calls, 2);
    assert_eq!(server.calls().len(), 1);
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn test_empty_follow_up_is_no_content() {
    let server = transaction_server();
    server.respond("get_solana_transaction", json!({"fee": 5000}));
    let provider = ScriptedProvider::new(vec![
        Ok(ModelReply::default()
            .with_tool_call("get_solana_transaction", json!({"signature": "SIG123"}))),
        Ok(ModelReply::default().with_text("  ")),
    ]);
    let (engine, _) = engine(provider, server, Some(ENDPOINT));

    let exchange = engine.run(Language::EnUs, &[], PROMPT).await.unwrap();
    assert_eq!(exchange.content, ReplyContent::NoContent);
    assert_eq!(exchange.tool_calls.len(), 1);
}

#[tokio::test]
async fn test_failed_follow_up_fails_the_exchange() {
    let server = transaction_server();
    server.respond("get_solana_transaction", json!({"fee": 5000}));
    let provider = ScriptedProvider::new(vec![
        Ok(ModelReply::default()
            .with_tool_call("get_solana_transaction", json!({"signature": "SIG123"}))),
        Err(ProviderError::ServerError("backend unavailable".into())),
    ]);
    let (engine, _) = engine(provider, server, Some(ENDPOINT));

    let err = engine.run(Language::EnUs, &[], PROMPT).await.unwrap_err();
    assert!(matches!(
        err,
        AssistantError::ModelCall(ProviderError::ServerError(_))
    ));
}

#[tokio::test]
async fn test_tool_names_are_passed_through_unchecked() {
    let provider = ScriptedProvider::new(vec![
        Ok(ModelReply::default()
            .with_tool_call("bad name", json!({"x": 1}))
            .with_tool_call("get_solana_transaction", json!({"signature": "SIG123"}))),
        Ok(ModelReply::default().with_text("One lookup worked.")),
    ]);
    let server = MockToolServer::new();
    server.add_tool("get_solana_transaction", "Fetch a transaction");
    server.respond("get_solana_transaction", json!({"fee": 5000}));
    let (engine, _) = engine(provider, server.clone(), Some(ENDPOINT));

    let exchange = engine.run(Language::EnUs, &[], PROMPT).await.unwrap();

    assert_eq!(
        server.calls(),
        vec![
            ("bad name".to_string(), json!({"x": 1})),
            (
                "get_solana_transaction".to_string(),
                json!({"signature": "SIG123"})
            ),
        ]
    );
    let error = exchange.tool_calls[0].result.clone().unwrap_err();
    assert!(error.contains("Unknown tool: bad name"));
    assert_eq!(exchange.tool_calls[1].result, Ok(json!({"fee": 5000})));
}

#[tokio::test]
async fn test_requests_without_a_tool_service_fail() {
    let provider = ScriptedProvider::new(vec![
        Ok(ModelReply::default()
            .with_tool_call("get_solana_transaction", json!({"signature": "SIG123"}))),
        Ok(ModelReply::default().with_text("Could not look it up.")),
    ]);
    let server = MockToolServer::new();
    // no endpoint: the registry never connects, so there is no invoker
    let (engine, _) = engine(provider, server.clone(), None);

    let exchange = engine.run(Language::EnUs, &[], PROMPT).await.unwrap();

    assert_eq!(exchange.content.text(), Some("Could not look it up."));
    assert!(server.calls().is_empty());
    let error = exchange.tool_calls[0].result.clone().unwrap_err();
    assert!(error.contains("not available"));
}
