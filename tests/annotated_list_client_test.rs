use names_sync::app::ports::AnnotatedListPort;
use names_sync::config::HttpConfig;
use names_sync::infra::http_client::build_client;
use names_sync::infra::vliz_client::AnnotatedListClient;
use names_sync::types::{DatasetRef, NewAnnotatedEntry};
use names_sync::SyncError;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/login_check"))
        .and(body_string_contains("_username=curator"))
        .and(body_string_contains("_password=secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "t0k3n"})))
        .expect(1)
        .mount(server)
        .await;
}

async fn connect(server: &MockServer) -> Result<AnnotatedListClient, SyncError> {
    let client = build_client(&HttpConfig::default()).unwrap();
    AnnotatedListClient::connect(
        client,
        &format!("{}/api", server.uri()),
        &format!("{}/api/login_check", server.uri()),
        "curator",
        "secret",
    )
    .await
    .map(|c| c.with_page_size(2))
}

fn page(names: &[&str]) -> serde_json::Value {
    json!(names
        .iter()
        .enumerate()
        .map(|(i, n)| json!({"id": i, "scientificName": n, "scientificNameAuthorship": null}))
        .collect::<Vec<_>>())
}

fn new_entry(name: &str) -> NewAnnotatedEntry {
    NewAnnotatedEntry {
        scientific_name: name.to_string(),
        scientific_name_authorship: Some("Smith, 1900".to_string()),
        phylum: Some("Annelida".to_string()),
        class: None,
        order: None,
        family: None,
        genus: Some("Capitella".to_string()),
        record_count: 12,
        datasets: vec![DatasetRef {
            id: "d1".to_string(),
            url: "https://ipt.example.org/d1".to_string(),
        }],
    }
}

#[tokio::test]
async fn fetch_all_stops_at_first_empty_page() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    for (number, body) in [
        ("1", page(&["Abra alba", "Abra nitida"])),
        ("2", page(&["Capitella capitata", "Nereis sp."])),
        ("3", json!([])),
    ] {
        Mock::given(method("GET"))
            .and(path("/api/annotated_lists"))
            .and(query_param("itemsPerPage", "2"))
            .and(query_param("page", number))
            .and(header("authorization", "Bearer t0k3n"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;
    }

    let client = connect(&server).await.unwrap();
    let entries = client.fetch_all().await.unwrap();

    let names: Vec<_> = entries
        .iter()
        .map(|e| e.scientific_name.clone().unwrap())
        .collect();
    assert_eq!(
        names,
        vec!["Abra alba", "Abra nitida", "Capitella capitata", "Nereis sp."]
    );
    let page_requests = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() == "GET")
        .count();
    assert_eq!(page_requests, 3);
}

#[tokio::test]
async fn expired_token_mid_pagination_is_fatal() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/annotated_lists"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["Abra alba", "Abra nitida"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/annotated_lists"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Expired JWT Token"))
        .mount(&server)
        .await;

    let client = connect(&server).await.unwrap();
    let err = client.fetch_all().await.unwrap_err();

    assert!(matches!(err, SyncError::Authentication { status: 401, .. }));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn server_error_during_pagination_is_fatal() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/annotated_lists"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let client = connect(&server).await.unwrap();
    let err = client.fetch_all().await.unwrap_err();

    assert!(matches!(err, SyncError::ListFetch { page: 1, status: 502, .. }));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn rejected_credentials_fail_construction() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/login_check"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid credentials."})))
        .mount(&server)
        .await;

    let err = connect(&server).await.unwrap_err();
    assert!(matches!(err, SyncError::Authentication { status: 401, .. }));
}

#[tokio::test]
async fn create_posts_payload_and_returns_remote_id() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/annotated_lists"))
        .and(header("authorization", "Bearer t0k3n"))
        .and(wiremock::matchers::body_json(json!({
            "scientificName": "Capitella capitata",
            "scientificNameAuthorship": "Smith, 1900",
            "phylum": "Annelida",
            "class": null,
            "order": null,
            "family": null,
            "genus": "Capitella",
            "recordCount": 12,
            "datasets": [{"uuid": "d1", "url": "https://ipt.example.org/d1"}]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 981})))
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await.unwrap();
    let created = client.create(&new_entry("Capitella capitata")).await.unwrap();

    assert_eq!(created.remote_id.as_deref(), Some("981"));
}

#[tokio::test]
async fn see_other_means_already_exists() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/annotated_lists"))
        .respond_with(ResponseTemplate::new(303).insert_header("Location", "/api/annotated_lists/12"))
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await.unwrap();
    let err = client.create(&new_entry("Capitella capitata")).await.unwrap_err();

    match err {
        SyncError::AlreadyExists { key } => assert_eq!(key, "Capitella capitata|Smith, 1900"),
        other => panic!("expected AlreadyExists, got {other:?}"),
    }
}

#[tokio::test]
async fn other_create_failures_are_per_item() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/annotated_lists"))
        .respond_with(ResponseTemplate::new(422).set_body_string("recordCount: invalid"))
        .mount(&server)
        .await;

    let client = connect(&server).await.unwrap();
    let err = client.create(&new_entry("Capitella capitata")).await.unwrap_err();

    assert!(matches!(err, SyncError::CreateFailed { status: 422, .. }));
    assert!(!err.is_fatal());
}
