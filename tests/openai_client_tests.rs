// OpenAI HTTP client tests against a mock server
// Author: kelexine (https://github.com/kelexine)

use cachegate::config::OpenAiConfig;
use cachegate::error::ProxyError;
use cachegate::models::{CompletionOptions, CompletionRequest, EmbeddingRequest};
use cachegate::openai::{CompletionProvider, EmbeddingProvider, OpenAiClient};
use mockito::Matcher;
use serde_json::json;

fn client_for(server: &mockito::ServerGuard) -> OpenAiClient {
    let config = OpenAiConfig {
        api_base_url: server.url(),
        api_key: Some("sk-test".to_string()),
        ..Default::default()
    };
    OpenAiClient::new(&config).unwrap()
}

#[tokio::test]
async fn test_completion_request_shape() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::Json(json!({
            "model": "text-ada-001",
            "prompt": "hi",
            "max_tokens": 5
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "cmpl-1",
                "choices": [{"text": "!", "index": 0}],
                "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let request = CompletionRequest {
        model: "text-ada-001".to_string(),
        prompt: "hi".to_string(),
        options: CompletionOptions {
            max_tokens: Some(5),
            ..Default::default()
        },
    };
    let response = client_for(&server).create_completion(&request).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.status, 200);
    let data = response.into_data().unwrap();
    assert_eq!(data.total_tokens(), Some(2));
    assert_eq!(data.body["id"], "cmpl-1");
}

#[tokio::test]
async fn test_embedding_response_parsed() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/embeddings")
        .match_body(Matcher::PartialJson(json!({"input": ["a", "b"]})))
        .with_status(200)
        .with_body(
            json!({
                "object": "list",
                "data": [
                    {"object": "embedding", "embedding": [0.5], "index": 1},
                    {"object": "embedding", "embedding": [0.25], "index": 0}
                ],
                "usage": {"prompt_tokens": 2, "total_tokens": 2}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let request = EmbeddingRequest {
        model: "text-embedding-ada-002".to_string(),
        input: vec!["a".to_string(), "b".to_string()],
    };
    let data = client_for(&server)
        .create_embedding(&request)
        .await
        .unwrap()
        .into_data()
        .unwrap();

    mock.assert_async().await;
    assert_eq!(data.data.len(), 2);
    assert_eq!(data.data[0].index, 1);
    assert_eq!(data.total_tokens(), Some(2));
}

#[tokio::test]
async fn test_error_status_is_returned_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/completions")
        .with_status(429)
        .with_body(r#"{"error": {"message": "Rate limit reached for sk-test"}}"#)
        .expect(1)
        .create_async()
        .await;

    let request = CompletionRequest {
        model: "text-ada-001".to_string(),
        prompt: "hi".to_string(),
        options: CompletionOptions::default(),
    };
    let response = client_for(&server).create_completion(&request).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.status, 429);
    assert!(response.data.is_none());
    assert!(matches!(
        response.into_data(),
        Err(ProxyError::Upstream { status: 429, .. })
    ));
}

#[tokio::test]
async fn test_unparseable_body_is_an_api_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/embeddings")
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let request = EmbeddingRequest {
        model: "text-embedding-ada-002".to_string(),
        input: vec!["a".to_string()],
    };
    let err = client_for(&server).create_embedding(&request).await.unwrap_err();
    assert!(matches!(err, ProxyError::OpenAiApi(_)));
}
