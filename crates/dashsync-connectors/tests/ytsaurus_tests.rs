use dashsync::{Connector, ConnectorConfig, ConnectorError, SyncContext};
use dashsync_connectors::YtsaurusConnector;
use serde_json::{Value, json};
use wiremock::matchers::{header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer, table: &str) -> ConnectorConfig {
    let mut config = ConnectorConfig::new();
    config.insert("proxy".into(), json!(server.uri()));
    config.insert("token".into(), json!("yt-token"));
    config.insert("path".into(), json!(table));
    config.insert("limit".into(), json!(2));
    config
}

async fn mount_exists(server: &MockServer, table: &str, exists: bool) {
    Mock::given(method("GET"))
        .and(path("/api/v4/exists"))
        .and(query_param("path", table))
        .and(header("Authorization", "OAuth yt-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": exists})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn reads_rows_with_a_row_range() {
    let server = MockServer::start().await;
    mount_exists(&server, "//home/analytics/daily", true).await;
    Mock::given(method("GET"))
        .and(path("/api/v4/read_table"))
        .and(header("Authorization", "OAuth yt-token"))
        .and(header_exists("X-YT-Parameters"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{\"day\":\"2024-05-01\",\"visits\":10}\n{\"day\":\"2024-05-02\",\"visits\":14}\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let table = YtsaurusConnector::new()
        .load(&config_for(&server, "//home/analytics/daily"), &SyncContext::new())
        .await
        .unwrap();

    assert_eq!(table.columns, vec!["day", "visits"]);
    assert_eq!(table.row_count(), 2);

    let requests = server.received_requests().await.unwrap();
    let read = requests
        .iter()
        .find(|r| r.url.path() == "/api/v4/read_table")
        .unwrap();
    let parameters: Value = serde_json::from_str(
        read.headers.get("X-YT-Parameters").unwrap().to_str().unwrap(),
    )
    .unwrap();
    assert_eq!(parameters["output_format"], json!("json"));
    assert_eq!(parameters["path"]["$value"], json!("//home/analytics/daily"));
    assert_eq!(
        parameters["path"]["$attributes"]["ranges"][0]["upper_limit"]["row_index"],
        json!(2)
    );
}

#[tokio::test]
async fn missing_path_is_not_found() {
    let server = MockServer::start().await;
    mount_exists(&server, "//home/nope", false).await;
    Mock::given(method("GET"))
        .and(path("/api/v4/read_table"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = YtsaurusConnector::new()
        .load(&config_for(&server, "//home/nope"), &SyncContext::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ConnectorError::NotFound(_)));
    assert!(err.to_string().contains("//home/nope"));
}

#[tokio::test]
async fn rejected_token_is_an_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/exists"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = YtsaurusConnector::new()
        .load(&config_for(&server, "//home/t"), &SyncContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectorError::Auth(_)));
}

#[tokio::test]
async fn bare_boolean_exists_response_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/exists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v4/read_table"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"a\":1}\n"))
        .mount(&server)
        .await;

    let table = YtsaurusConnector::new()
        .load(&config_for(&server, "//home/t"), &SyncContext::new())
        .await
        .unwrap();
    assert_eq!(table.rows, vec![vec![json!(1)]]);
}
