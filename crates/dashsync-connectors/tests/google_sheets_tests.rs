use std::sync::Arc;

use dashsync::{
    ArtifactWriter, Connector, ConnectorConfig, ConnectorError, ConnectorRegistry,
    GoogleCredentials, Orchestrator, SourceSpec, SyncContext, TransformRunner,
};
use dashsync_connectors::GoogleSheetsConnector;
use dashsync_store::DataDirectory;
use serde_json::json;
use wiremock::matchers::{bearer_token, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SHEET_KEY: &str = "1AbCdEfGhIjKlMn";

fn signed_in() -> SyncContext {
    SyncContext::new().with_google(GoogleCredentials::new("ya29.test"))
}

fn config() -> ConnectorConfig {
    let mut config = ConnectorConfig::new();
    config.insert(
        "url".into(),
        json!(format!("https://docs.google.com/spreadsheets/d/{SHEET_KEY}/edit#gid=0")),
    );
    config
}

async fn mount_metadata(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/v4/spreadsheets/{SHEET_KEY}")))
        .and(query_param("fields", "sheets.properties(title,index)"))
        .and(bearer_token("ya29.test"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            include_str!("fixtures/sheet_metadata.json"),
            "application/json",
        ))
        .mount(server)
        .await;
}

#[tokio::test]
async fn first_worksheet_is_synced_to_csv() {
    let server = MockServer::start().await;
    mount_metadata(&server).await;
    Mock::given(method("GET"))
        .and(path_regex(format!("^/v4/spreadsheets/{SHEET_KEY}/values/.*Sales")))
        .and(query_param("valueRenderOption", "UNFORMATTED_VALUE"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            include_str!("fixtures/sheet_values.json"),
            "application/json",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let data = Arc::new(DataDirectory::new(dir.path()));
    let base = server.uri();
    let mut registry = ConnectorRegistry::new();
    registry.register_with(move || GoogleSheetsConnector::new().with_api_base_url(base.clone()));
    let orchestrator = Orchestrator::new(
        registry.discover(),
        TransformRunner::new(dir.path().join("handlers")),
        data as Arc<dyn ArtifactWriter>,
    );

    let spec = SourceSpec::new("google_sheets", "sales.csv").with_config(config());
    let synced = orchestrator.sync(&spec, &signed_in()).await.unwrap();

    assert_eq!(synced.table.row_count(), 3);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("sales.csv")).unwrap(),
        "region,amount,note\nnorth,10,steady\nsouth,12.5,\neast,7,new\n"
    );
}

async fn load_with_status(status: u16, body: &str) -> ConnectorError {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(status).set_body_raw(body.to_owned(), "application/json"),
        )
        .mount(&server)
        .await;

    GoogleSheetsConnector::new()
        .with_api_base_url(server.uri())
        .load(&config(), &signed_in())
        .await
        .unwrap_err()
}

#[tokio::test]
async fn http_statuses_map_to_error_kinds() {
    assert!(matches!(load_with_status(401, "{}").await, ConnectorError::Auth(_)));
    assert!(matches!(
        load_with_status(403, "{}").await,
        ConnectorError::PermissionDenied(_)
    ));

    let not_found = load_with_status(404, "{}").await;
    assert!(matches!(not_found, ConnectorError::NotFound(_)));
    assert!(not_found.to_string().contains("check the link"));

    let server_error = load_with_status(
        500,
        r#"{"error":{"code":500,"message":"Internal error encountered."}}"#,
    )
    .await;
    assert!(matches!(server_error, ConnectorError::Api(_)));
    assert_eq!(
        server_error.to_string(),
        "Google API error: Internal error encountered."
    );
}

#[tokio::test]
async fn malformed_link_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = ConnectorConfig::new();
    config.insert("url".into(), json!("test.csv"));
    let err = GoogleSheetsConnector::new()
        .with_api_base_url(server.uri())
        .load(&config, &signed_in())
        .await
        .unwrap_err();

    assert!(matches!(err, ConnectorError::Config(_)));
    assert!(err.to_string().contains("malformed link or ID"));
}

#[tokio::test]
async fn signed_out_sync_fails_validation() {
    let mut registry = ConnectorRegistry::new();
    registry.register_with(GoogleSheetsConnector::new);
    let dir = tempfile::tempdir().unwrap();
    let orchestrator = Orchestrator::new(
        registry.discover(),
        TransformRunner::new(dir.path()),
        Arc::new(DataDirectory::new(dir.path())),
    );

    let spec = SourceSpec::new("google_sheets", "sales.csv").with_config(config());
    let err = orchestrator.sync(&spec, &SyncContext::new()).await.unwrap_err();

    assert!(err.to_string().contains("not logged in to Google"));
    assert!(!dir.path().join("sales.csv").exists());
}
