//! Contract tests for the HTTP provider adapters and backend client

use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use imagegen_studio::account::{BackendClient, HttpBackendClient, SessionStore};
use imagegen_studio::catalog::ModelFamily;
use imagegen_studio::config::{BackendConfig, HuggingFaceConfig, Settings};
use imagegen_studio::error::AppError;
use imagegen_studio::params::ParameterMapper;
use imagegen_studio::provider::huggingface::HuggingFaceProvider;
use imagegen_studio::provider::proxy::ProxyProvider;
use imagegen_studio::provider::{ImageProvider, ProviderRequest};
use imagegen_studio::storage::blob::{BlobMode, BlobStore};

const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

fn request(model: &str) -> ProviderRequest {
    ProviderRequest {
        prompt: "a castle on a hill".to_string(),
        model: Some(model.to_string()),
        params: ParameterMapper::default()
            .map("16:9", 5, ModelFamily::Standard)
            .unwrap(),
        n: 1,
        seed: Some(42),
    }
}

fn hf_provider(server: &MockServer, blobs: BlobStore) -> HuggingFaceProvider {
    let config = HuggingFaceConfig {
        base_url: server.uri(),
        api_key: "hf_test".to_string(),
    };
    HuggingFaceProvider::new(&config, Arc::new(blobs)).unwrap()
}

fn backend_config(server: &MockServer) -> BackendConfig {
    let mut config = Settings::default().backend;
    config.url = server.uri();
    config.anon_key = "anon".to_string();
    config
}

#[tokio::test]
async fn test_hf_binary_response_becomes_data_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/stabilityai/sdxl-turbo"))
        .and(header("authorization", "Bearer hf_test"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(PNG),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = hf_provider(&server, BlobStore::new(BlobMode::DataUrl));
    let images = provider.generate(&request("stabilityai/sdxl-turbo")).await.unwrap();

    assert_eq!(images.len(), 1);
    assert!(images[0].starts_with("data:image/png;base64,"));

    let received = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["inputs"], "a castle on a hill");
    assert_eq!(body["parameters"]["width"], 1024);
    assert_eq!(body["parameters"]["height"], 576);
    assert_eq!(body["parameters"]["num_images_per_prompt"], 1);
    assert_eq!(body["parameters"]["seed"], 42);
}

#[tokio::test]
async fn test_hf_blob_written_to_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(PNG),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let blobs = BlobStore::new(BlobMode::File {
        dir: dir.path().to_path_buf(),
        url_prefix: "http://localhost:8080/blobs".to_string(),
    });
    let provider = hf_provider(&server, blobs);
    let images = provider.generate(&request("stabilityai/sdxl-turbo")).await.unwrap();

    let file = images[0]
        .strip_prefix("http://localhost:8080/blobs/")
        .unwrap();
    assert!(file.ends_with(".png"));
    assert_eq!(std::fs::read(dir.path().join(file)).unwrap(), PNG);
}

#[tokio::test]
async fn test_hf_unknown_model_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "error": "Model acme/nope does not exist" })),
        )
        .mount(&server)
        .await;

    let provider = hf_provider(&server, BlobStore::new(BlobMode::DataUrl));
    let error = provider.generate(&request("acme/nope")).await.unwrap_err();
    assert!(matches!(error, AppError::PermanentProvider(_)), "{:?}", error);
}

#[tokio::test]
async fn test_hf_loading_model_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({ "error": "Model is currently loading" })),
        )
        .mount(&server)
        .await;

    let provider = hf_provider(&server, BlobStore::new(BlobMode::DataUrl));
    let error = provider.generate(&request("stabilityai/sdxl-turbo")).await.unwrap_err();
    assert!(matches!(error, AppError::TransientProvider(_)), "{:?}", error);
}

#[tokio::test]
async fn test_proxy_returns_all_urls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/generate-image"))
        .and(header("apikey", "anon"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "imageUrls": ["https://cdn.test/a.png", "https://cdn.test/b.png"]
        })))
        .mount(&server)
        .await;

    let backend = Arc::new(HttpBackendClient::new(&backend_config(&server)).unwrap());
    let provider = ProxyProvider::new(backend, Arc::new(SessionStore::new()), "generate-image");
    let images = provider.generate(&request("ignored")).await.unwrap();
    assert_eq!(images, vec!["https://cdn.test/a.png", "https://cdn.test/b.png"]);

    let received = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body, json!({ "prompt": "a castle on a hill", "size": "1024x576", "n": 1 }));
}

#[tokio::test]
async fn test_proxy_accepts_legacy_single_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/generate-image"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "imageUrl": "https://cdn.test/one.png" })))
        .mount(&server)
        .await;

    let backend = Arc::new(HttpBackendClient::new(&backend_config(&server)).unwrap());
    let provider = ProxyProvider::new(backend, Arc::new(SessionStore::new()), "generate-image");
    assert_eq!(
        provider.generate(&request("ignored")).await.unwrap(),
        vec!["https://cdn.test/one.png"]
    );
}

#[tokio::test]
async fn test_proxy_billing_limit_is_distinct() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/generate-image"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "Billing hard limit has been reached",
            "errorCode": "BILLING_LIMIT_REACHED"
        })))
        .mount(&server)
        .await;

    let backend = Arc::new(HttpBackendClient::new(&backend_config(&server)).unwrap());
    let provider = ProxyProvider::new(backend, Arc::new(SessionStore::new()), "generate-image");
    let error = provider.generate(&request("ignored")).await.unwrap_err();
    assert!(matches!(error, AppError::BillingLimit(_)));
    assert!(!error.is_retryable());
}

#[tokio::test]
async fn test_backend_password_sign_in() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "jwt",
            "refresh_token": "refresh",
            "expires_in": 3600,
            "user": { "id": "user-1", "email": "ada@gmail.com" }
        })))
        .mount(&server)
        .await;

    let client = HttpBackendClient::new(&backend_config(&server)).unwrap();
    let session = client.sign_in("ada@gmail.com", "pw").await.unwrap();
    assert_eq!(session.access_token, "jwt");
    assert_eq!(session.user.id, "user-1");
    assert!(session.expires_at_ms > chrono::Utc::now().timestamp_millis());
}

#[tokio::test]
async fn test_backend_rejected_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        })))
        .mount(&server)
        .await;

    let client = HttpBackendClient::new(&backend_config(&server)).unwrap();
    match client.sign_in("ada@gmail.com", "wrong").await {
        Err(AppError::AuthenticationFailed(message)) => assert_eq!(message, "Invalid login credentials"),
        other => panic!("unexpected result: {:?}", other),
    }
}
