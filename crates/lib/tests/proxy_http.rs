//! Integration tests: start the proxy on a local port with a stub model and exercise
//! `/`, `/api/chat` and `/api/summary` over real HTTP. No model credential required.

use lib::client::{ClientError, ProxyClient};
use lib::config::Config;
use lib::conversation::Message;
use lib::llm::{ChatMessage, GatewayError, ModelGateway, OpenAiClient};
use lib::prompts::Prompts;
use lib::proxy::{self, ProxyState, Sampling, CHAT_FALLBACK, SUMMARY_FALLBACK};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

#[derive(Debug, Clone)]
struct Call {
    instruction: String,
    messages: Vec<ChatMessage>,
    max_output_tokens: u32,
    temperature: f32,
}

/// Records every call and answers with a fixed text, or fails when `reply` is None.
struct StubModel {
    reply: Option<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Call>>,
}

impl StubModel {
    fn answering(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn answering_after(delay: Duration, reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            delay: Some(delay),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ModelGateway for StubModel {
    async fn complete(
        &self,
        instruction: &str,
        messages: &[ChatMessage],
        max_output_tokens: u32,
        temperature: f32,
    ) -> Result<String, GatewayError> {
        self.calls.lock().unwrap().push(Call {
            instruction: instruction.to_string(),
            messages: messages.to_vec(),
            max_output_tokens,
            temperature,
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply
            .clone()
            .ok_or_else(|| GatewayError::Api("429 Too Many Requests".to_string()))
    }
}

fn test_prompts() -> Prompts {
    Prompts {
        chat: "CHAT INSTRUCTIONS".to_string(),
        summary: "SUMMARY INSTRUCTIONS".to_string(),
    }
}

/// Serve the router on an ephemeral port; the task runs until the test process ends.
async fn start_proxy(model: Arc<StubModel>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let port = listener.local_addr().expect("local_addr").port();
    let state = ProxyState {
        gateway: model,
        prompts: Arc::new(test_prompts()),
        sampling: Sampling::default(),
        port,
    };
    tokio::spawn(async move {
        let _ = proxy::serve(listener, state, std::future::pending()).await;
    });
    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn chat_forwards_instruction_and_conversation() {
    let model = StubModel::answering("Hello! Let's look at your idle. When does it happen?");
    let base = start_proxy(model.clone()).await;

    let res = reqwest::Client::new()
        .post(format!("{}/api/chat", base))
        .json(&serde_json::json!({
            "messages": [{"sender": "user", "text": "My 1975 911 idles rough"}]
        }))
        .send()
        .await
        .expect("send");
    assert_eq!(res.status().as_u16(), 200);
    let body: serde_json::Value = res.json().await.expect("json");
    assert_eq!(
        body["reply"],
        "Hello! Let's look at your idle. When does it happen?"
    );

    let calls = model.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].instruction, "CHAT INSTRUCTIONS");
    assert_eq!(
        calls[0].messages,
        vec![ChatMessage::user("My 1975 911 idles rough")]
    );
    assert_eq!(calls[0].max_output_tokens, 1000);
    assert!((calls[0].temperature - 0.2).abs() < f32::EPSILON);
}

#[tokio::test]
async fn summary_uses_report_instruction_and_bound() {
    let model = StubModel::answering("## Vehicle\n1975 911");
    let base = start_proxy(model.clone()).await;

    let res = reqwest::Client::new()
        .post(format!("{}/api/summary", base))
        .json(&serde_json::json!({
            "messages": [
                {"sender": "user", "text": "My 1975 911 idles rough"},
                {"sender": "assistant", "text": "When does it happen?"},
                {"sender": "user", "text": "Only when warm"}
            ]
        }))
        .send()
        .await
        .expect("send");
    assert_eq!(res.status().as_u16(), 200);
    let body: serde_json::Value = res.json().await.expect("json");
    assert_eq!(body["summary"], "## Vehicle\n1975 911");

    let calls = model.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].instruction, "SUMMARY INSTRUCTIONS");
    assert_eq!(calls[0].max_output_tokens, 800);
    assert_eq!(
        calls[0].messages,
        vec![
            ChatMessage::user("My 1975 911 idles rough"),
            ChatMessage::assistant("When does it happen?"),
            ChatMessage::user("Only when warm"),
        ]
    );
}

#[tokio::test]
async fn blank_entries_are_not_forwarded() {
    let model = StubModel::answering("How can I help with your air-cooled Porsche?");
    let base = start_proxy(model.clone()).await;

    let res = reqwest::Client::new()
        .post(format!("{}/api/chat", base))
        .json(&serde_json::json!({
            "messages": [{"sender": "user", "text": "   "}]
        }))
        .send()
        .await
        .expect("send");
    assert_eq!(res.status().as_u16(), 200);

    let calls = model.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].messages.is_empty());
}

#[tokio::test]
async fn model_failure_returns_fallbacks() {
    let base = start_proxy(StubModel::failing()).await;
    let client = reqwest::Client::new();
    let body = serde_json::json!({
        "messages": [{"sender": "user", "text": "Valve adjustment interval?"}]
    });

    let res = client
        .post(format!("{}/api/chat", base))
        .json(&body)
        .send()
        .await
        .expect("send");
    assert_eq!(res.status().as_u16(), 500);
    let json: serde_json::Value = res.json().await.expect("json");
    assert_eq!(json["reply"], CHAT_FALLBACK);

    let res = client
        .post(format!("{}/api/summary", base))
        .json(&body)
        .send()
        .await
        .expect("send");
    assert_eq!(res.status().as_u16(), 500);
    let json: serde_json::Value = res.json().await.expect("json");
    assert_eq!(json["summary"], SUMMARY_FALLBACK);
}

#[tokio::test]
async fn malformed_body_is_rejected_without_model_call() {
    let model = StubModel::answering("unused");
    let base = start_proxy(model.clone()).await;
    let client = reqwest::Client::new();

    for body in ["not json", "{}", r#"{"messages": "hi"}"#] {
        let res = client
            .post(format!("{}/api/chat", base))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .expect("send");
        assert_eq!(res.status().as_u16(), 400, "body {:?}", body);
        let json: serde_json::Value = res.json().await.expect("json");
        assert_eq!(json["reply"], CHAT_FALLBACK);
    }
    assert!(model.calls().is_empty());
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let base = start_proxy(StubModel::answering("ok")).await;
    let res = reqwest::Client::new()
        .post(format!("{}/api/chat", base))
        .header("origin", "http://localhost:3000")
        .json(&serde_json::json!({"messages": []}))
        .send()
        .await
        .expect("send");
    assert_eq!(
        res.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

#[tokio::test]
async fn proxy_client_round_trip() {
    let model = StubModel::answering("Check the points gap first.");
    let base = start_proxy(model.clone()).await;
    let client = ProxyClient::new(format!("{}/", base));

    let conversation = vec![
        Message::quote("“Change is easy.”\n— Dr. Ferdinand Porsche"),
        Message::user("Car stalls at lights"),
    ];
    let reply = client.submit_turn(&conversation).await.expect("reply");
    assert_eq!(reply, "Check the points gap first.");
    let summary = client.summarize(&conversation).await.expect("summary");
    assert_eq!(summary, "Check the points gap first.");

    // The quote entry maps to the assistant role.
    let calls = model.calls();
    assert_eq!(
        calls[0].messages,
        vec![
            ChatMessage::assistant("“Change is easy.”\n— Dr. Ferdinand Porsche"),
            ChatMessage::user("Car stalls at lights"),
        ]
    );
}

#[tokio::test]
async fn proxy_client_shows_chat_fallback_but_fails_summary() {
    let base = start_proxy(StubModel::failing()).await;
    let client = ProxyClient::new(base);
    let conversation = vec![Message::user("Oil temp runs high")];

    let reply = client.submit_turn(&conversation).await.expect("fallback reply");
    assert_eq!(reply, CHAT_FALLBACK);

    match client.summarize(&conversation).await {
        Err(ClientError::Status(500, _)) => {}
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn proxy_client_reports_unreachable_proxy() {
    let client = ProxyClient::new(format!("http://127.0.0.1:{}", free_port()));
    let err = client
        .submit_turn(&[Message::user("hello")])
        .await
        .expect_err("nothing is listening");
    assert!(matches!(err, ClientError::Request(_)));
}

#[tokio::test]
async fn proxy_client_gives_up_on_a_stalled_proxy() {
    let model = StubModel::answering_after(Duration::from_secs(5), "too late");
    let base = start_proxy(model.clone()).await;
    let client = ProxyClient::with_timeout(base, Duration::from_millis(200));

    let started = std::time::Instant::now();
    let err = client
        .submit_turn(&[Message::user("Fuel smell after shutdown")])
        .await
        .expect_err("reply arrives after the timeout");
    match err {
        ClientError::Request(e) => assert!(e.is_timeout(), "{}", e),
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn run_proxy_health_responds_with_running() {
    let port = free_port();
    let config_dir =
        std::env::temp_dir().join(format!("aircooled-proxy-test-{}", uuid::Uuid::new_v4()));
    let config_path = config_dir.join("config.json");

    let mut config = Config::default();
    config.server.port = port;
    config.server.bind = "127.0.0.1".to_string();

    let handle = tokio::spawn(async move {
        let _ = proxy::run_proxy(config, config_path).await;
    });

    let url = format!("http://127.0.0.1:{}/", port);
    let client = reqwest::Client::new();
    let mut last_err = None;
    for _ in 0..100 {
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let json: serde_json::Value = resp.json().await.expect("parse JSON");
                assert_eq!(json.get("runtime").and_then(|v| v.as_str()), Some("running"));
                assert_eq!(json.get("port").and_then(|v| v.as_u64()), Some(port as u64));
                handle.abort();
                return;
            }
            Ok(_) => {}
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    handle.abort();
    panic!(
        "GET {} did not return 200 with health JSON within 5s; last error: {:?}",
        url, last_err
    );
}

/// Fake OpenAI-compatible upstream: records the auth header and body, answers from
/// `status`/`body`.
async fn start_fake_upstream(
    status: u16,
    body: serde_json::Value,
) -> (String, Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>) {
    use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};

    type Seen = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let reply = Arc::new((status, body));

    let app = Router::new()
        .route(
            "/v1/chat/completions",
            post(
                |State((seen, reply)): State<(Seen, Arc<(u16, serde_json::Value)>)>,
                 headers: HeaderMap,
                 Json(req): Json<serde_json::Value>| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    seen.lock().unwrap().push((auth, req));
                    let status = axum::http::StatusCode::from_u16(reply.0).unwrap();
                    (status, Json(reply.1.clone()))
                },
            ),
        )
        .with_state((seen.clone(), reply));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let port = listener.local_addr().expect("local_addr").port();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://127.0.0.1:{}/v1", port), seen)
}

#[tokio::test]
async fn openai_client_sends_instruction_and_bounds() {
    let (base, seen) = start_fake_upstream(
        200,
        serde_json::json!({"choices": [{"message": {"role": "assistant", "content": "Hello..."}}]}),
    )
    .await;
    let client =
        OpenAiClient::new(Some(base), "gpt-4-1106-preview", Some("sk-test".to_string()));

    let text = client
        .complete(
            "CHAT INSTRUCTIONS",
            &[ChatMessage::user("My 1975 911 idles rough")],
            1000,
            0.2,
        )
        .await
        .expect("completion");
    assert_eq!(text, "Hello...");

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    let (auth, body) = &seen[0];
    assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
    assert_eq!(body["model"], "gpt-4-1106-preview");
    assert_eq!(body["max_tokens"], 1000);
    assert_eq!(
        body["messages"],
        serde_json::json!([
            {"role": "system", "content": "CHAT INSTRUCTIONS"},
            {"role": "user", "content": "My 1975 911 idles rough"}
        ])
    );
    let temperature = body["temperature"].as_f64().expect("temperature");
    assert!((temperature - 0.2).abs() < 1e-6);
}

#[tokio::test]
async fn openai_client_maps_error_status_to_api_error() {
    let (base, _seen) = start_fake_upstream(
        401,
        serde_json::json!({"error": {"message": "Incorrect API key provided"}}),
    )
    .await;
    let client =
        OpenAiClient::new(Some(base), "gpt-4-1106-preview", Some("sk-bad".to_string()));
    let err = client
        .complete("x", &[ChatMessage::user("hi")], 10, 0.2)
        .await
        .expect_err("401 is an error");
    match err {
        GatewayError::Api(msg) => assert!(msg.contains("401"), "{}", msg),
        other => panic!("expected Api error, got {:?}", other),
    }
}

/// Accepts connections and reads requests but never answers.
async fn start_stalled_upstream() -> String {
    use tokio::io::AsyncReadExt;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let port = listener.local_addr().expect("local_addr").port();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                while let Ok(n) = socket.read(&mut buf).await {
                    if n == 0 {
                        break;
                    }
                }
            });
        }
    });
    format!("http://127.0.0.1:{}/v1", port)
}

#[tokio::test]
async fn openai_client_times_out_on_a_stalled_upstream() {
    let base = start_stalled_upstream().await;
    let client = OpenAiClient::new(Some(base), "gpt-4-1106-preview", Some("sk-test".to_string()))
        .with_timeout(Duration::from_millis(200));

    let err = client
        .complete("x", &[ChatMessage::user("hi")], 10, 0.2)
        .await
        .expect_err("no answer within the timeout");
    match err {
        GatewayError::Request(e) => assert!(e.is_timeout(), "{}", e),
        other => panic!("expected request timeout, got {:?}", other),
    }
}
