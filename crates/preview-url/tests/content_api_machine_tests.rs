//! End-to-end resolution against a mock content API.

use std::sync::Arc;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use preview_auth::{ContentApiConfig, ContentApiSecretIssuer, SecretSettings};
use preview_rbac::{GrantKind, PermissionSet, StaticPermissionChecker};
use preview_url::{
    ConfiguredResolvers, MachineState, PreviewModeSettings, PreviewModeState, PreviewSettings,
    PreviewUrlMachine, PreviewUrlOptions, Stage, SEARCH_PARAM_SECRET,
};

fn resolvers(server: &MockServer) -> ConfiguredResolvers {
    let issuer = ContentApiSecretIssuer::new(
        ContentApiConfig::new(server.uri()).with_token("test-token"),
        SecretSettings::default(),
    )
    .unwrap();
    ConfiguredResolvers::new(PreviewSettings::default(), Arc::new(issuer)).with_preview_url(
        PreviewUrlOptions::new()
            .initial("http://localhost:3000/blog")
            .preview_mode(PreviewModeSettings::new("/api/draft-mode/enable")),
    )
}

#[tokio::test]
async fn test_created_secret_is_stored_and_attached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v2023-11-09/data/mutate/production"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "transactionId": "tx-1" })))
        .expect(1)
        .mount(&server)
        .await;

    let machine = PreviewUrlMachine::start(
        Arc::new(resolvers(&server)),
        Arc::new(StaticPermissionChecker::allow_all()),
        None,
    );
    let snapshot = machine
        .wait_for_state(MachineState::PreviewMode(PreviewModeState::Success))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    let stored = body["mutations"][0]["create"]["secret"].as_str().unwrap().to_string();

    let url = snapshot.preview_url.unwrap();
    let attached = url
        .query_pairs()
        .find(|(k, _)| k == SEARCH_PARAM_SECRET)
        .map(|(_, v)| v.into_owned());
    assert_eq!(attached, Some(stored));
    assert_eq!(url.path(), "/api/draft-mode/enable");
}

#[tokio::test]
async fn test_shared_secret_is_read_when_create_denied() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2023-11-09/data/query/production"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "shared-abc" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let checker = StaticPermissionChecker::with_permissions(PermissionSet::from_iter([
        GrantKind::ReadShareAccess.permission(),
    ]));
    let machine = PreviewUrlMachine::start(Arc::new(resolvers(&server)), Arc::new(checker), None);
    let snapshot = machine
        .wait_for_state(MachineState::PreviewMode(PreviewModeState::Success))
        .await
        .unwrap();

    assert!(snapshot
        .preview_url
        .unwrap()
        .as_str()
        .contains("sanity-preview-secret=shared-abc"));
}

#[tokio::test]
async fn test_content_api_failure_fails_preview_mode() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let machine = PreviewUrlMachine::start(
        Arc::new(resolvers(&server)),
        Arc::new(StaticPermissionChecker::allow_all()),
        None,
    );
    let snapshot = machine.wait_for(|s| s.is_error()).await.unwrap();

    assert_eq!(snapshot.state, MachineState::PreviewMode(PreviewModeState::Error));
    let error = snapshot.error.unwrap();
    assert_eq!(error.stage(), Some(Stage::CreateSecret));
    assert_eq!(error.error_code(), "API_ERROR");
    assert!(error.to_string().starts_with("Failed to create preview secret"));
}
