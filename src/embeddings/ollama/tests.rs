use super::*;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, method, path},
};

fn client_for(server: &MockServer) -> OllamaClient {
    let address = server.address();
    let mut config = Config::default();
    config.ollama.host = address.ip().to_string();
    config.ollama.port = address.port();

    OllamaClient::new(&config)
        .expect("should create client")
        .with_timeout(Duration::from_secs(5))
        .with_backoff(Duration::from_millis(1))
}

async fn embed_blocking(client: OllamaClient, text: &'static str) -> Result<Vec<f32>> {
    tokio::task::spawn_blocking(move || client.embed(text))
        .await
        .expect("embedding task should not panic")
}

#[test]
fn client_configuration() {
    let mut config = Config::default();
    config.ollama.host = "test-host".to_string();
    config.ollama.port = 1234;
    config.ollama.model = "test-model".to_string();

    let client = OllamaClient::new(&config).expect("should create client");

    assert_eq!(client.model(), "test-model");
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert_eq!(client.retry_attempts, DEFAULT_RETRY_ATTEMPTS);
}

#[test]
fn client_builder_methods() {
    let client = OllamaClient::new(&Config::default())
        .expect("should create client")
        .with_timeout(Duration::from_secs(60))
        .with_retry_attempts(0);

    assert_eq!(client.retry_attempts, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn embeds_single_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_json(json!({"model": "all-minilm:latest", "input": "hello"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"embeddings": [[0.1, 0.2, 0.3]]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let embedding = embed_blocking(client_for(&server), "hello")
        .await
        .expect("should embed text");

    assert_eq!(embedding, vec![0.1, 0.2, 0.3]);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_embedding_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embeddings": []})))
        .mount(&server)
        .await;

    let result = embed_blocking(client_for(&server), "hello").await;

    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let result = embed_blocking(client_for(&server), "hello").await;

    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let result = embed_blocking(client_for(&server), "hello").await;

    let message = format!("{:#}", result.expect_err("404 should fail"));
    assert!(message.contains("HTTP 404"), "unexpected error: {message}");
}

#[tokio::test(flavor = "multi_thread")]
async fn health_check_requires_model() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "nomic-embed-text:latest", "size": 274302450}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let models = {
        let client = client.clone();
        tokio::task::spawn_blocking(move || client.list_models())
            .await
            .expect("task should not panic")
            .expect("should list models")
    };
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].name, "nomic-embed-text:latest");

    let health = tokio::task::spawn_blocking(move || client.health_check())
        .await
        .expect("task should not panic");
    assert!(health.is_err());
}
