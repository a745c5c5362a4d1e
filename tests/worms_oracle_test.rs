use names_sync::app::ports::MatchingOraclePort;
use names_sync::config::HttpConfig;
use names_sync::infra::http_client::build_client;
use names_sync::infra::worms_oracle::WormsOracle;
use names_sync::types::{LookupFailure, MatchDecision};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn oracle(server: &MockServer) -> WormsOracle {
    let client = build_client(&HttpConfig::default()).unwrap();
    WormsOracle::new(client, &format!("{}/rest", server.uri()))
}

fn aphia(match_type: &str, authority: &str) -> serde_json::Value {
    json!({
        "AphiaID": 141433,
        "scientificname": "Abra alba",
        "authority": authority,
        "status": "accepted",
        "match_type": match_type
    })
}

#[tokio::test]
async fn exact_match_with_equal_authority() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/AphiaRecordsByMatchNames"))
        .and(query_param("scientificnames[]", "Abra alba"))
        .and(query_param("marine_only", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([[
            aphia("phonetic", "(W. Wood, 1802)"),
            aphia("exact", "(W. Wood, 1802)")
        ]])))
        .expect(2)
        .mount(&server)
        .await;

    let oracle = oracle(&server);
    assert_eq!(
        oracle.is_authority_resolved("Abra alba", Some("(W. Wood, 1802)")).await,
        MatchDecision::ExactMatch
    );
    assert_eq!(
        oracle.is_authority_resolved("Abra alba", Some("Wood 1802")).await,
        MatchDecision::NoMatch
    );
}

#[tokio::test]
async fn no_content_is_no_match() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/AphiaRecordsByMatchNames"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    assert_eq!(
        oracle(&server).is_authority_resolved("Nomen nudum", None).await,
        MatchDecision::NoMatch
    );
}

#[tokio::test]
async fn several_groups_is_a_contract_violation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/AphiaRecordsByMatchNames"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            [aphia("exact", "L.")],
            [aphia("exact", "L.")]
        ])))
        .mount(&server)
        .await;

    assert_eq!(
        oracle(&server).is_authority_resolved("Abra alba", None).await,
        MatchDecision::LookupFailed(LookupFailure::ContractViolation { groups: 2 })
    );
}

#[tokio::test]
async fn server_errors_and_garbage_are_lookup_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("scientificnames[]", "Down"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("scientificnames[]", "Garbled"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let oracle = oracle(&server);
    assert!(matches!(
        oracle.is_authority_resolved("Down", None).await,
        MatchDecision::LookupFailed(LookupFailure::Transport(_))
    ));
    assert!(matches!(
        oracle.is_authority_resolved("Garbled", None).await,
        MatchDecision::LookupFailed(LookupFailure::Transport(_))
    ));
}
