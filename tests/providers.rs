//! Provider clients against an in-process mock of each service's HTTP API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode, Uri};
use axum::routing::post;
use axum::{Json, Router};
use docqa::docqa_core::embedding::EmbeddingProvider;
use docqa::docqa_core::error::{EmbeddingError, GenerationError};
use docqa::docqa_core::generation::AnswerGenerator;
use docqa::embedding::{GeminiEmbedder, OllamaEmbedder, OpenAIEmbedder};
use docqa::generation::{GeminiGenerator, OllamaGenerator, OpenAIGenerator};
use docqa::http::{RetryPolicy, ServiceSettings};
use serde_json::{json, Value};

async fn spawn_mock(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn settings(base_url: &str, api_key: Option<&str>) -> ServiceSettings {
    ServiceSettings {
        model: "test-model".to_string(),
        api_key: api_key.map(str::to_string),
        base_url: base_url.to_string(),
        timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            max_retries: 2,
            backoff: Duration::from_millis(10),
        },
    }
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ============ Embedding ============

#[tokio::test]
async fn test_openai_embeddings_sent_with_bearer_and_reordered() {
    let app = Router::new().route(
        "/v1/embeddings",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            assert_eq!(headers["authorization"], "Bearer sk-test");
            assert_eq!(body["model"], "test-model");
            assert_eq!(body["input"], json!(["a", "b"]));
            Json(json!({
                "data": [
                    { "index": 1, "embedding": [0.0, 1.0] },
                    { "index": 0, "embedding": [1.0, 0.0] }
                ]
            }))
        }),
    );
    let base = spawn_mock(app).await;

    let embedder = OpenAIEmbedder::new(settings(&base, Some("sk-test")), 2).unwrap();
    let vectors = embedder.embed_batch(&texts(&["a", "b"])).await.unwrap();
    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
}

#[tokio::test]
async fn test_gemini_batch_embed_path_and_key_header() {
    let app = Router::new().fallback(
        |uri: Uri, headers: HeaderMap, Json(body): Json<Value>| async move {
            assert_eq!(uri.path(), "/v1beta/models/test-model:batchEmbedContents");
            assert_eq!(headers["x-goog-api-key"], "g-key");
            assert_eq!(body["requests"][0]["content"]["parts"][0]["text"], "hello");
            Json(json!({ "embeddings": [{ "values": [0.25, 0.5, 0.75] }] }))
        },
    );
    let base = spawn_mock(app).await;

    let embedder = GeminiEmbedder::new(settings(&base, Some("g-key")), 3).unwrap();
    let vector = embedder.embed("hello").await.unwrap();
    assert_eq!(vector, vec![0.25, 0.5, 0.75]);
}

#[tokio::test]
async fn test_server_error_retried_then_succeeds() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/api/embed",
        post(move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "busy" })))
                } else {
                    (StatusCode::OK, Json(json!({ "embeddings": [[1.0, 2.0]] })))
                }
            }
        }),
    );
    let base = spawn_mock(app).await;

    let embedder = OllamaEmbedder::new(settings(&base, None), 2).unwrap();
    let vector = embedder.embed("x").await.unwrap();
    assert_eq!(vector, vec![1.0, 2.0]);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_retries_exhausted_reports_last_status() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/api/embed",
        post(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { StatusCode::TOO_MANY_REQUESTS }
        }),
    );
    let base = spawn_mock(app).await;

    let embedder = OllamaEmbedder::new(settings(&base, None), 2).unwrap();
    let err = embedder.embed("x").await.unwrap_err();
    assert!(matches!(err, EmbeddingError::Http { status: 429, .. }));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_auth_failure_not_retried() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/v1/embeddings",
        post(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { (StatusCode::UNAUTHORIZED, "invalid api key") }
        }),
    );
    let base = spawn_mock(app).await;

    let embedder = OpenAIEmbedder::new(settings(&base, Some("bad")), 2).unwrap();
    let err = embedder.embed("x").await.unwrap_err();
    match err {
        EmbeddingError::Auth { message, .. } => assert_eq!(message, "invalid api key"),
        other => panic!("expected auth error, got {:?}", other),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_wrong_dimensionality_rejected() {
    let app = Router::new().route(
        "/api/embed",
        post(|| async { Json(json!({ "embeddings": [[1.0, 2.0]] })) }),
    );
    let base = spawn_mock(app).await;

    let embedder = OllamaEmbedder::new(settings(&base, None), 3).unwrap();
    let err = embedder.embed("x").await.unwrap_err();
    assert_eq!(
        err,
        EmbeddingError::DimensionMismatch {
            expected: 3,
            actual: 2
        }
    );
}

#[tokio::test]
async fn test_slow_service_times_out() {
    let app = Router::new().route(
        "/api/embed",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({ "embeddings": [[1.0]] }))
        }),
    );
    let base = spawn_mock(app).await;

    let mut s = settings(&base, None);
    s.timeout = Duration::from_millis(200);
    s.retry.max_retries = 0;
    let embedder = OllamaEmbedder::new(s, 1).unwrap();
    let err = embedder.embed("x").await.unwrap_err();
    assert!(matches!(err, EmbeddingError::Timeout { .. }));
}

#[test]
fn test_hosted_providers_require_key() {
    assert!(OpenAIEmbedder::new(settings("http://localhost", None), 2).is_err());
    assert!(GeminiGenerator::new(settings("http://localhost", None), None).is_err());
}

// ============ Generation ============

#[tokio::test]
async fn test_openai_chat_completion_verbatim() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["messages"][0]["role"], "user");
            assert_eq!(body["messages"][0]["content"], "the prompt");
            assert_eq!(body["temperature"], json!(0.0));
            Json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "  Title: X\nID: 1234\n" } }]
            }))
        }),
    );
    let base = spawn_mock(app).await;

    let generator = OpenAIGenerator::new(settings(&base, Some("sk")), Some(0.0)).unwrap();
    let text = generator.generate("the prompt").await.unwrap();
    assert_eq!(text, "  Title: X\nID: 1234\n");
}

#[tokio::test]
async fn test_gemini_parts_concatenated() {
    let app = Router::new().fallback(|uri: Uri| async move {
        assert_eq!(uri.path(), "/v1beta/models/test-model:generateContent");
        Json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hello, " }, { "text": "world" }] } }]
        }))
    });
    let base = spawn_mock(app).await;

    let generator = GeminiGenerator::new(settings(&base, Some("g")), None).unwrap();
    assert_eq!(generator.generate("p").await.unwrap(), "Hello, world");
}

#[tokio::test]
async fn test_ollama_generate_disables_streaming() {
    let app = Router::new().route(
        "/api/generate",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["stream"], json!(false));
            assert_eq!(body["prompt"], "p");
            Json(json!({ "response": "answer", "done": true }))
        }),
    );
    let base = spawn_mock(app).await;

    let generator = OllamaGenerator::new(settings(&base, None), None).unwrap();
    assert_eq!(generator.generate("p").await.unwrap(), "answer");
}

#[tokio::test]
async fn test_empty_completion_is_error() {
    let app = Router::new().route(
        "/api/generate",
        post(|| async { Json(json!({ "response": "   " })) }),
    );
    let base = spawn_mock(app).await;

    let generator = OllamaGenerator::new(settings(&base, None), None).unwrap();
    let err = generator.generate("p").await.unwrap_err();
    assert!(matches!(err, GenerationError::Empty { .. }));
}

#[tokio::test]
async fn test_missing_completion_field_is_malformed() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async { Json(json!({ "choices": [] })) }),
    );
    let base = spawn_mock(app).await;

    let generator = OpenAIGenerator::new(settings(&base, Some("sk")), None).unwrap();
    let err = generator.generate("p").await.unwrap_err();
    assert!(matches!(err, GenerationError::MalformedResponse { .. }));
}
