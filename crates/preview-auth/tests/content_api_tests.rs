//! Content API issuer tests against a mock server.

use preview_auth::{
    AuthError, ContentApiConfig, ContentApiSecretIssuer, SecretIssuer, SecretSettings,
    SecretSource,
};
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn issuer(server: &MockServer) -> ContentApiSecretIssuer {
    let config = ContentApiConfig::new(server.uri()).with_token("test-token");
    ContentApiSecretIssuer::new(config, SecretSettings::default())
        .unwrap()
        .with_source(SecretSource::new("presentation").with_user_id("user-1"))
}

#[tokio::test]
async fn test_create_preview_secret_posts_create_mutation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2023-11-09/data/mutate/production"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "transactionId": "tx-1", "results": [] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let secret = issuer(&server).create_preview_secret().await.unwrap();
    assert!(!secret.is_expired());

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let doc = &body["mutations"][0]["create"];
    assert_eq!(doc["_type"], "sanity.previewUrlSecret");
    assert_eq!(doc["secret"], secret.secret.as_str());
    assert_eq!(doc["source"], "presentation");
    assert_eq!(doc["userId"], "user-1");
    assert!(doc["_id"].as_str().unwrap().starts_with("drafts."));
}

#[tokio::test]
async fn test_read_shared_secret() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2023-11-09/data/query/production"))
        .and(query_param("$id", "\"sanity-preview-url-secret.share-access\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "shared-abc" })))
        .mount(&server)
        .await;

    let shared = issuer(&server).read_shared_secret().await.unwrap();
    assert_eq!(shared.as_deref(), Some("shared-abc"));
}

#[tokio::test]
async fn test_read_shared_secret_when_sharing_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2023-11-09/data/query/production"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": null })))
        .mount(&server)
        .await;

    assert_eq!(issuer(&server).read_shared_secret().await.unwrap(), None);
}

#[tokio::test]
async fn test_error_statuses_are_mapped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("insufficient grants"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let issuer = issuer(&server);
    match issuer.create_preview_secret().await {
        Err(AuthError::PermissionDenied(message)) => assert_eq!(message, "insufficient grants"),
        other => panic!("expected permission denied, got {:?}", other),
    }
    assert!(matches!(
        issuer.read_shared_secret().await,
        Err(AuthError::AuthenticationFailed)
    ));
}

#[tokio::test]
async fn test_server_error_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = issuer(&server).create_preview_secret().await.unwrap_err();
    assert!(err.is_server_error());
    assert_eq!(err.error_code(), "API_ERROR");
}
