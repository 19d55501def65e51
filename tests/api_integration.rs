//! End-to-end tests for the HTTP surface.
//!
//! Each test spins up the full router on a random port with an in-memory
//! database, a scripted LLM and stub tool backends, then drives it with
//! reqwest.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use humblebrag_api::auth::{CredentialVerifier, Principal, StaticTokenVerifier};
use humblebrag_api::config::ServerConfig;
use humblebrag_api::llm::{LlmProvider, ScriptedProvider, ToolCall, ToolCompletionResponse};
use humblebrag_api::profile::ProfileService;
use humblebrag_api::server::{AppState, build_router};
use humblebrag_api::store::{LibSqlBackend, Stores};
use humblebrag_api::tools::ToolError;
use humblebrag_api::tools::builtin::{
    BuiltinDeps, CompanyEnricher, EnrichmentResult, WeatherReport, WeatherSource,
};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const ADMIN: &str = "admin-token";
const READER: &str = "reader-token";

struct SunnyWeather;

#[async_trait]
impl WeatherSource for SunnyWeather {
    async fn current(&self, location: &str) -> Result<WeatherReport, ToolError> {
        Ok(WeatherReport {
            temperature: 24.0,
            feels_like: 25.0,
            humidity: 40.0,
            wind_speed: 8.0,
            wind_gust: 12.0,
            conditions: "Clear sky".to_string(),
            location: location.to_string(),
        })
    }
}

struct NoEnrichment;

#[async_trait]
impl CompanyEnricher for NoEnrichment {
    async fn enrich(&self, _company: &str) -> Result<EnrichmentResult, ToolError> {
        Err(ToolError::ExecutionFailed("offline".to_string()))
    }
}

struct TestServer {
    base: String,
    llm: Arc<ScriptedProvider>,
    client: reqwest::Client,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    /// GET a tRPC query or subscription with `?input=<json>`.
    async fn query(&self, procedure: &str, token: &str, input: Value) -> reqwest::Response {
        self.client
            .get(self.url(&format!("/trpc/{procedure}")))
            .query(&[("input", input.to_string())])
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    async fn post(&self, path: &str, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

fn test_config() -> ServerConfig {
    let env: HashMap<&str, &str> = HashMap::from([
        ("OPENAI_API_KEY", "sk-test"),
        ("AGENT_MODEL", "scripted"),
        ("AGENT_MAX_STEPS", "6"),
    ]);
    ServerConfig::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap()
}

/// Start the app on a random port with the given LLM script.
async fn start_server(script: Vec<ToolCompletionResponse>) -> TestServer {
    let config = test_config();
    let stores = Stores::new(Arc::new(LibSqlBackend::new_memory().await.unwrap()));
    let llm = Arc::new(ScriptedProvider::new(script));
    let verifier: Arc<dyn CredentialVerifier> = Arc::new(
        StaticTokenVerifier::new()
            .with_token(ADMIN, Principal::new("alice", ["*"]))
            .with_token(READER, Principal::new("bob", ["todos.read"])),
    );
    let deps = BuiltinDeps {
        weather: Arc::new(SunnyWeather),
        enricher: Arc::new(NoEnrichment),
        profiles: ProfileService::new(stores.clone()),
    };
    let provider: Arc<dyn LlmProvider> = llm.clone();
    let state = AppState::with_deps(&config, stores, provider, verifier, deps).unwrap();
    let app = build_router(state, &config.cors_origins);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        base: format!("http://127.0.0.1:{port}"),
        llm,
        client: reqwest::Client::new(),
    }
}

fn call(id: &str, name: &str, args: Value) -> ToolCall {
    ToolCall {
        id: id.into(),
        name: name.into(),
        arguments: args,
    }
}

/// Split an SSE body into its `data:` payloads.
fn sse_data(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.trim().to_string())
        .collect()
}

/// JSON chunks of a UI message stream, without the `[DONE]` marker.
fn ui_chunks(body: &str) -> Vec<Value> {
    sse_data(body)
        .into_iter()
        .filter(|d| d != "[DONE]")
        .map(|d| serde_json::from_str(&d).expect("chunk is not JSON"))
        .collect()
}

fn chunk_types(chunks: &[Value]) -> Vec<&str> {
    chunks.iter().filter_map(|c| c["type"].as_str()).collect()
}

// ── Health & auth ────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_public() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(vec![]).await;
        let resp = server.client.get(server.url("/health")).send().await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["db"]["ok"], true);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn missing_or_unknown_token_is_unauthorized() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(vec![]).await;

        let resp = server.client.get(server.url("/todos")).send().await.unwrap();
        assert_eq!(resp.status(), 401);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["code"], "UNAUTHORIZED");

        let resp = server.get("/todos", "nope").await;
        assert_eq!(resp.status(), 401);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn missing_scope_is_forbidden() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(vec![]).await;

        assert_eq!(server.get("/todos", READER).await.status(), 200);

        let resp = server.post("/todos", READER, json!({"title": "nope"})).await;
        assert_eq!(resp.status(), 403);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["code"], "FORBIDDEN");

        assert_eq!(server.get("/chat", READER).await.status(), 403);
    })
    .await
    .expect("test timed out");
}

// ── Todos ────────────────────────────────────────────────────────────

#[tokio::test]
async fn todo_lifecycle() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(vec![]).await;

        let resp = server.post("/todos", ADMIN, json!({"title": "Write brag doc"})).await;
        assert_eq!(resp.status(), 201);
        let todo: Value = resp.json().await.unwrap();
        let id = todo["id"].as_str().unwrap().to_string();
        assert_eq!(todo["completed"], false);

        let list: Value = server.get("/todos", ADMIN).await.json().await.unwrap();
        assert_eq!(list["data"].as_array().unwrap().len(), 1);

        let toggled: Value = server
            .post(&format!("/todos/{id}/toggle"), ADMIN, json!({}))
            .await
            .json()
            .await
            .unwrap();
        assert_eq!(toggled["completed"], true);

        let resp = server
            .client
            .delete(server.url(&format!("/todos/{id}")))
            .bearer_auth(ADMIN)
            .send()
            .await
            .unwrap();
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], true);

        let resp = server.post(&format!("/todos/{id}/toggle"), ADMIN, json!({})).await;
        assert_eq!(resp.status(), 404);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["code"], "TODO_NOT_FOUND");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn blank_todo_title_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(vec![]).await;
        let resp = server.post("/todos", ADMIN, json!({"title": "   "})).await;
        assert_eq!(resp.status(), 400);
    })
    .await
    .expect("test timed out");
}

// ── Chat ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_streams_ui_chunks_and_persists_thread() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(vec![ToolCompletionResponse::text("Hello Alice!")]).await;

        let resp = server
            .post(
                "/chat",
                ADMIN,
                json!({
                    "threadId": "t1",
                    "messages": [{"id": "u1", "role": "user", "parts": [{"type": "text", "text": "hi"}]}]
                }),
            )
            .await;
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers()
                .get("x-vercel-ai-ui-message-stream")
                .and_then(|v| v.to_str().ok()),
            Some("v1")
        );
        let body = resp.text().await.unwrap();
        assert_eq!(sse_data(&body).last().map(String::as_str), Some("[DONE]"));

        let chunks = ui_chunks(&body);
        let types = chunk_types(&chunks);
        assert_eq!(types.first(), Some(&"start"));
        assert_eq!(types.last(), Some(&"finish"));
        assert!(chunks.iter().any(|c| c["delta"] == "Hello Alice!"));

        let recalled: Value = server.get("/chat?threadId=t1", ADMIN).await.json().await.unwrap();
        let messages = recalled["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "assistant");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn recall_of_unknown_thread_is_empty() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(vec![]).await;
        let body: Value = server.get("/chat?threadId=nothing", ADMIN).await.json().await.unwrap();
        assert!(body["messages"].as_array().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn weather_agent_suspends_then_resumes() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(vec![
            ToolCompletionResponse::with_tool_calls(vec![call("call_ask", "askLocationTool", json!({}))]),
            ToolCompletionResponse::with_tool_calls(vec![call(
                "call_weather",
                "fetchWeatherTool",
                json!({"location": "Lisbon"}),
            )]),
            ToolCompletionResponse::text("Clear skies in Lisbon, 24°C."),
        ])
        .await;

        let body = server
            .post(
                "/chat",
                ADMIN,
                json!({
                    "threadId": "w1",
                    "agentId": "weather-agent",
                    "messages": [{"id": "u1", "role": "user", "parts": [{"type": "text", "text": "What's the weather?"}]}]
                }),
            )
            .await
            .text()
            .await
            .unwrap();
        let chunks = ui_chunks(&body);
        let suspended = chunks
            .iter()
            .find(|c| c["type"] == "data-tool-call-suspended")
            .expect("no suspension chunk");
        assert_eq!(suspended["data"]["toolCallId"], "call_ask");
        assert!(suspended["data"]["suspendPayload"]["question"].is_string());
        assert_eq!(chunk_types(&chunks).last(), Some(&"finish"));

        let body = server
            .post(
                "/chat",
                ADMIN,
                json!({
                    "threadId": "w1",
                    "agentId": "weather-agent",
                    "messages": [],
                    "resume": {"toolCallId": "call_ask", "data": {"city": "Lisbon"}}
                }),
            )
            .await
            .text()
            .await
            .unwrap();
        let chunks = ui_chunks(&body);
        let output = chunks
            .iter()
            .find(|c| c["type"] == "tool-output-available" && c["toolCallId"] == "call_ask")
            .expect("resumed call has no output");
        assert_eq!(output["output"]["city"], "Lisbon");
        let weather = chunks
            .iter()
            .find(|c| c["type"] == "tool-output-available" && c["toolCallId"] == "call_weather")
            .expect("weather call has no output");
        assert_eq!(weather["output"]["conditions"], "Clear sky");
        assert!(chunks.iter().any(|c| c["delta"] == "Clear skies in Lisbon, 24°C."));
        assert_eq!(server.llm.remaining(), 0);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn resume_with_unknown_call_id_is_bad_request() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(vec![]).await;
        let resp = server
            .post(
                "/chat",
                ADMIN,
                json!({
                    "threadId": "w1",
                    "agentId": "weather-agent",
                    "messages": [],
                    "resume": {"toolCallId": "call_missing", "data": {"city": "Oslo"}}
                }),
            )
            .await;
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["code"], "BAD_REQUEST");
    })
    .await
    .expect("test timed out");
}

// ── Profile ──────────────────────────────────────────────────────────

#[tokio::test]
async fn profile_agent_persists_profile() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(vec![
            ToolCompletionResponse::with_tool_calls(vec![call(
                "call_save",
                "profilePersistenceTool",
                json!({"userId": "alice", "action": "append", "data": {"role": "Staff Engineer"}}),
            )]),
            ToolCompletionResponse::text("Saved your role."),
        ])
        .await;

        assert_eq!(server.get("/profile", ADMIN).await.status(), 404);

        let body = server
            .post(
                "/chat",
                ADMIN,
                json!({
                    "id": "onboarding",
                    "messages": [{"id": "u1", "role": "user", "parts": [{"type": "text", "text": "I'm a staff engineer"}]}]
                }),
            )
            .await
            .text()
            .await
            .unwrap();
        let chunks = ui_chunks(&body);
        let saved = chunks
            .iter()
            .find(|c| c["type"] == "tool-output-available" && c["toolCallId"] == "call_save")
            .expect("profile tool produced no output");
        assert_eq!(saved["output"]["success"], true);

        let profile: Value = server.get("/profile", ADMIN).await.json().await.unwrap();
        assert_eq!(profile["role"], "Staff Engineer");
    })
    .await
    .expect("test timed out");
}

// ── RPC ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn rpc_todos_use_trpc_envelope() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(vec![]).await;

        let created: Value = server
            .post("/trpc/todos.create", ADMIN, json!({"title": "Ship it"}))
            .await
            .json()
            .await
            .unwrap();
        assert_eq!(created["result"]["data"]["title"], "Ship it");

        let all: Value = server.get("/trpc/todos.getAll", ADMIN).await.json().await.unwrap();
        assert_eq!(all["result"]["data"].as_array().unwrap().len(), 1);

        let resp = server.get("/trpc/todos.create", ADMIN).await;
        assert_eq!(resp.status(), 405);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "METHOD_NOT_SUPPORTED");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rpc_agent_lookups_report_errors() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(vec![]).await;

        let input: Value = serde_json::from_str(r#"{"agentId":"weather-agent"}"#).unwrap();
        let body: Value = server.query("chat.getMemory", ADMIN, input)
            .await
            .json()
            .await
            .unwrap();
        assert_eq!(body["result"]["data"]["memory"]["lastMessages"], 10);

        let input: Value = serde_json::from_str(r#"{"agentId":"ghost"}"#).unwrap();
        let resp = server.query("chat.getAgent", ADMIN, input).await;
        assert_eq!(resp.status(), 404);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rpc_send_message_then_list_and_delete_threads() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(vec![ToolCompletionResponse::text("Noted.")]).await;

        let sent: Value = server
            .post(
                "/trpc/chat.sendMessage",
                ADMIN,
                json!({"agentId": "profile-agent", "message": "hello", "threadId": "r1"}),
            )
            .await
            .json()
            .await
            .unwrap();
        assert_eq!(sent["result"]["data"]["text"], "Noted.");
        assert_eq!(sent["result"]["data"]["threadId"], "r1");

        let input: Value = serde_json::from_str(r#"{"agentId":"profile-agent","resourceId":"alice"}"#).unwrap();
        let threads: Value = server.query("chat.getThreads", ADMIN, input)
            .await
            .json()
            .await
            .unwrap();
        assert_eq!(threads["result"]["data"][0]["id"], "r1");

        let input: Value = serde_json::from_str(r#"{"agentId":"profile-agent","resourceId":"mallory"}"#).unwrap();
        let resp = server.query("chat.getThreads", ADMIN, input).await;
        assert_eq!(resp.status(), 403);

        let deleted: Value = server
            .post(
                "/trpc/chat.deleteThread",
                ADMIN,
                json!({"agentId": "profile-agent", "threadId": "r1"}),
            )
            .await
            .json()
            .await
            .unwrap();
        assert_eq!(deleted["result"]["data"]["success"], true);

        let input: Value = serde_json::from_str(r#"{"agentId":"profile-agent","threadId":"r1"}"#).unwrap();
        let messages: Value = server.query("chat.getThreadMessages", ADMIN, input)
            .await
            .json()
            .await
            .unwrap();
        assert!(messages["result"]["data"]["messages"].as_array().unwrap().is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rpc_stream_chat_emits_chunks_then_finish() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(vec![ToolCompletionResponse::text("Streaming works")]).await;

        let input: Value = serde_json::from_str(r#"{"agentId":"profile-agent","message":"hi","threadId":"s1"}"#).unwrap();
        let body = server.query("chat.streamChat", ADMIN, input)
            .await
            .text()
            .await
            .unwrap();
        let events: Vec<Value> = sse_data(&body)
            .iter()
            .map(|d| serde_json::from_str(d).unwrap())
            .collect();
        assert!(events.iter().any(|e| e["type"] == "chunk" && e["content"] == "Streaming works"));
        let last = events.last().unwrap();
        assert_eq!(last["type"], "finish");
        assert_eq!(last["threadId"], "s1");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rpc_stream_chat_reports_unknown_agent_in_stream() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server(vec![]).await;
        let input: Value = serde_json::from_str(r#"{"agentId":"ghost","message":"hi","threadId":"s1"}"#).unwrap();
        let body = server.query("chat.streamChat", ADMIN, input)
            .await
            .text()
            .await
            .unwrap();
        let events = sse_data(&body);
        assert_eq!(events.len(), 1);
        let event: Value = serde_json::from_str(&events[0]).unwrap();
        assert_eq!(event["type"], "error");
    })
    .await
    .expect("test timed out");
}
