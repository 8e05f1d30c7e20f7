use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use dealhunt::agent::{AgentSettings, ToolAgent};
use dealhunt::backend::{McpBackend, StaticTarget};
use dealhunt::dispatch::{DispatchConfig, Dispatcher, SearchError};
use dealhunt::llm::LlmClient;
use dealhunt::platform::PlatformCatalog;
use dealhunt::search::NO_IMAGE_SENTINEL;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

const SESSION_ID: &str = "fixture-session-1";

#[derive(Default)]
struct Fixture {
    sessions_opened: AtomicUsize,
    sessions_closed: AtomicUsize,
    session_headers: Mutex<Vec<Option<String>>>,
    tool_calls: Mutex<Vec<(String, Value)>>,
    chat_requests: Mutex<Vec<Value>>,
}

fn rpc_result(id: &Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

async fn mcp_post(
    State(fixture): State<Arc<Fixture>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let method = body["method"].as_str().unwrap_or_default().to_string();
    let id = body.get("id").cloned().unwrap_or(Value::Null);
    if method != "initialize" {
        let session = headers
            .get("mcp-session-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        fixture.session_headers.lock().unwrap().push(session);
    }

    match method.as_str() {
        "initialize" => {
            fixture.sessions_opened.fetch_add(1, Ordering::SeqCst);
            let result = rpc_result(
                &id,
                json!({
                    "protocolVersion": "2025-03-26",
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": "fixture", "version": "0.0.1" }
                }),
            );
            ([("mcp-session-id", SESSION_ID)], Json(result)).into_response()
        }
        "notifications/initialized" => StatusCode::ACCEPTED.into_response(),
        "tools/list" => {
            let page = if body["params"]["cursor"].is_string() {
                json!({
                    "tools": [{
                        "name": "web_data_amazon_product",
                        "description": "Structured Amazon product data for a product URL",
                        "inputSchema": {
                            "type": "object",
                            "properties": { "url": { "type": "string" } },
                            "required": ["url"]
                        }
                    }]
                })
            } else {
                json!({
                    "tools": [{
                        "name": "search_engine",
                        "description": "Search the web",
                        "inputSchema": {
                            "type": "object",
                            "properties": { "query": { "type": "string" } },
                            "required": ["query"]
                        }
                    }],
                    "nextCursor": "page-2"
                })
            };
            // Served as an event stream to exercise that transport shape.
            let event = format!("event: message\ndata: {}\n\n", rpc_result(&id, page));
            ([(header::CONTENT_TYPE, "text/event-stream")], event).into_response()
        }
        "tools/call" => {
            let name = body["params"]["name"].as_str().unwrap_or_default().to_string();
            let arguments = body["params"]["arguments"].clone();
            fixture.tool_calls.lock().unwrap().push((name, arguments));
            Json(rpc_result(
                &id,
                json!({
                    "content": [{
                        "type": "text",
                        "text": "1. Sony WH-1000XM4 https://amazon.example/p1 4.7 stars"
                    }],
                    "isError": false
                }),
            ))
            .into_response()
        }
        _ => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": -32601, "message": "method not found" }
        }))
        .into_response(),
    }
}

async fn mcp_delete(State(fixture): State<Arc<Fixture>>, headers: HeaderMap) -> StatusCode {
    if headers.get("mcp-session-id").is_some() {
        fixture.sessions_closed.fetch_add(1, Ordering::SeqCst);
    }
    StatusCode::NO_CONTENT
}

fn chat_message(message: Value) -> Json<Value> {
    Json(json!({
        "id": "chatcmpl-fixture",
        "object": "chat.completion",
        "choices": [{ "index": 0, "message": message, "finish_reason": "stop" }]
    }))
}

async fn chat_completions(State(fixture): State<Arc<Fixture>>, Json(body): Json<Value>) -> Json<Value> {
    fixture.chat_requests.lock().unwrap().push(body.clone());
    let messages = body["messages"].as_array().cloned().unwrap_or_default();
    let user = messages
        .iter()
        .find(|m| m["role"] == "user")
        .and_then(|m| m["content"].as_str())
        .unwrap_or_default()
        .to_string();
    let last_role = messages.last().map(|m| m["role"].clone()).unwrap_or(Value::Null);

    if last_role != "tool" {
        return chat_message(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {
                    "name": "search_engine",
                    "arguments": "{\"query\":\"wireless headphones\"}"
                }
            }]
        }));
    }

    let answer = if user.ends_with("Platforms: Amazon") {
        json!({
            "platform": "amazon",
            "hits": [{
                "title": " Sony WH-1000XM4 ",
                "url": "https://amazon.example/p1",
                "rating": "4.7",
                "price": "",
                "image_url": NO_IMAGE_SENTINEL
            }]
        })
    } else {
        json!({ "platform": "Walmart", "hits": [] })
    };
    chat_message(json!({ "role": "assistant", "content": answer.to_string() }))
}

async fn serve(fixture: Arc<Fixture>) -> SocketAddr {
    let app = Router::new()
        .route("/mcp", post(mcp_post).delete(mcp_delete))
        .route("/v1/chat/completions", post(chat_completions))
        .with_state(fixture);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn dispatcher(addr: SocketAddr) -> Dispatcher {
    let target = StaticTarget(Url::parse(&format!("http://{}/mcp", addr)).unwrap());
    let backend = McpBackend::new(Arc::new(target));
    let llm = LlmClient::new("sk-fixture").with_base_url(format!("http://{}/v1/", addr));
    let agent = ToolAgent::new(Arc::new(backend), Arc::new(llm), AgentSettings::default());
    Dispatcher::new(
        Arc::new(agent),
        PlatformCatalog::default(),
        DispatchConfig {
            cooldown: Duration::from_secs(1),
            platform_timeout: Duration::from_secs(30),
            ..DispatchConfig::default()
        },
    )
}

#[tokio::test]
async fn test_search_through_mcp_and_chat_fixtures() {
    let fixture = Arc::new(Fixture::default());
    let addr = serve(fixture.clone()).await;
    let dispatcher = dispatcher(addr);

    let result = dispatcher
        .search("wireless headphones", &["Amazon", "Walmart"])
        .await
        .unwrap();

    assert_eq!(result.platforms.len(), 1);
    let amazon = &result.platforms[0];
    assert_eq!(amazon.platform.as_str(), "Amazon");
    assert_eq!(amazon.hits.len(), 1);
    let hit = &amazon.hits[0];
    assert_eq!(hit.title, "Sony WH-1000XM4");
    assert_eq!(hit.rating.as_deref(), Some("4.7"));
    assert_eq!(hit.price, None);
    assert_eq!(hit.image_url, None);

    assert_eq!(fixture.sessions_opened.load(Ordering::SeqCst), 2);
    assert_eq!(fixture.sessions_closed.load(Ordering::SeqCst), 2);
    assert!(fixture
        .session_headers
        .lock()
        .unwrap()
        .iter()
        .all(|s| s.as_deref() == Some(SESSION_ID)));

    let calls = fixture.tool_calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, "search_engine");
    assert_eq!(calls[0].1, json!({ "query": "wireless headphones" }));

    let requests = fixture.chat_requests.lock().unwrap();
    let first = &requests[0];
    assert_eq!(first["tools"].as_array().unwrap().len(), 2);
    assert_eq!(first["response_format"]["type"], "json_schema");
    assert_eq!(first["response_format"]["json_schema"]["strict"], true);
    assert_eq!(
        first["messages"][1]["content"],
        "wireless headphones\n\nPlatforms: Amazon"
    );
}

#[tokio::test]
async fn test_unreachable_backend_is_total_failure() {
    let fixture = Arc::new(Fixture::default());
    let addr = serve(fixture.clone()).await;

    // Nothing listens on the backend port, the model endpoint is never reached.
    let dead = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead_addr = dead.local_addr().unwrap();
    drop(dead);

    let target = StaticTarget(Url::parse(&format!("http://{}/mcp", dead_addr)).unwrap());
    let backend = McpBackend::new(Arc::new(target));
    let llm = LlmClient::new("sk-fixture").with_base_url(format!("http://{}/v1", addr));
    let agent = ToolAgent::new(Arc::new(backend), Arc::new(llm), AgentSettings::default());
    let dispatcher = Dispatcher::new(
        Arc::new(agent),
        PlatformCatalog::default(),
        DispatchConfig {
            max_retries: 1,
            retry_base_delay: Duration::from_millis(10),
            ..DispatchConfig::default()
        },
    );

    match dispatcher.search("kettle", &["Target"]).await {
        Err(SearchError::TotalFailure { failures }) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].error_type, "connection_error");
        }
        other => panic!("expected total failure, got {:?}", other.map(|r| r.total_hits())),
    }
    assert!(fixture.chat_requests.lock().unwrap().is_empty());
}
