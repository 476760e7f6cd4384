mod common;

use common::TestHarness;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Five consecutive 5xx responses on live fan-out requests should trip the
/// breaker for that backend; a view-merge request issued afterward must
/// silently exclude it instead of failing the whole call.
#[tokio::test]
async fn five_consecutive_server_errors_trip_breaker_and_exclude_backend() {
    let backend_a = MockServer::start().await;
    let backend_b = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Items"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&backend_a)
        .await;

    Mock::given(method("GET"))
        .and(path("/Items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [{"Id": "item-1"}],
            "TotalRecordCount": 1,
        })))
        .mount(&backend_b)
        .await;

    let (harness, addr) = TestHarness::with_server().await;
    let (user_id, _) = harness.create_user("breaker", "password123", false);
    let token = harness.create_session(user_id);

    let backend_id_a = harness.create_backend("s1", "Server A", &backend_a.uri());
    let backend_id_b = harness.create_backend("s2", "Server B", &backend_b.uri());
    harness.create_mapping(user_id, backend_id_a, "ua", "ta");
    harness.create_mapping(user_id, backend_id_b, "ub", "tb");

    let client = reqwest::Client::new();

    assert!(harness.ctx.health.is_available(backend_id_a));

    for _ in 0..5 {
        let resp = client
            .get(format!("http://{addr}/Items?ParentId=merged_movies"))
            .header("X-Emby-Token", &token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    assert!(
        !harness.ctx.health.is_available(backend_id_a),
        "backend A should have tripped to unavailable after five consecutive 5xx responses"
    );
    assert!(harness.ctx.health.is_available(backend_id_b));

    let resp = client
        .get(format!("http://{addr}/Items?ParentId=merged_movies"))
        .header("X-Emby-Token", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["TotalRecordCount"], 1);
    let ids: Vec<String> = body["Items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["Id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["s2_item-1".to_string()]);

    harness.ctx.health.record_probe_success(backend_id_a);
    assert!(harness.ctx.health.is_available(backend_id_a));
}

/// A single 4xx response is the backend behaving correctly and must never
/// contribute to the live failure counter.
#[tokio::test]
async fn client_errors_never_trip_the_breaker() {
    let backend = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Items"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&backend)
        .await;

    let (harness, addr) = TestHarness::with_server().await;
    let (user_id, _) = harness.create_user("notfound", "password123", false);
    let token = harness.create_session(user_id);
    let backend_id = harness.create_backend("s1", "Server", &backend.uri());
    harness.create_mapping(user_id, backend_id, "u1", "t1");

    let client = reqwest::Client::new();
    for _ in 0..10 {
        client
            .get(format!("http://{addr}/Items?ParentId=merged_movies"))
            .header("X-Emby-Token", &token)
            .send()
            .await
            .unwrap();
    }

    assert!(harness.ctx.health.is_available(backend_id));
}
