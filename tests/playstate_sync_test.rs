mod common;

use std::time::Duration;

use common::TestHarness;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn mark_played_replicates_to_other_backend_by_provider_id() {
    let backend_a = MockServer::start().await;
    let backend_b = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/Users/u1/PlayedItems/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Played": true})))
        .mount(&backend_a)
        .await;

    Mock::given(method("GET"))
        .and(path("/Items/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Id": "abc",
            "ProviderIds": {"Tmdb": "999"},
        })))
        .mount(&backend_a)
        .await;

    Mock::given(method("GET"))
        .and(path("/Items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [{"Id": "matched", "ProviderIds": {"Tmdb": "999"}}],
        })))
        .mount(&backend_b)
        .await;

    Mock::given(method("POST"))
        .and(path("/Users/u2/PlayedItems/matched"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Played": true})))
        .mount(&backend_b)
        .await;

    let (harness, addr) = TestHarness::with_server().await;
    let (user_id, _) = harness.create_user("sync-user", "password123", false);
    let token = harness.create_session(user_id);
    let backend_id_a = harness.create_backend("s1", "A", &backend_a.uri());
    let backend_id_b = harness.create_backend("s2", "B", &backend_b.uri());
    harness.create_mapping(user_id, backend_id_a, "u1", "token-a");
    harness.create_mapping(user_id, backend_id_b, "u2", "token-b");

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/Users/{user_id}/PlayedItems/s1_abc"))
        .header("X-Emby-Token", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    tokio::time::sleep(Duration::from_millis(500)).await;

    let replicated = backend_b.received_requests().await.unwrap();
    assert!(
        replicated
            .iter()
            .any(|r| r.method.as_str() == "POST" && r.url.path() == "/Users/u2/PlayedItems/matched"),
        "expected replayed mutation on backend B, got: {:?}",
        replicated.iter().map(|r| r.url.path().to_string()).collect::<Vec<_>>()
    );
}
