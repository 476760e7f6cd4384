mod common;

use common::TestHarness;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn views_merge_same_collection_type_across_backends() {
    let backend_a = MockServer::start().await;
    let backend_b = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Users/backend-user-a/Views"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [{"Id": "lib-a", "Name": "Movies", "CollectionType": "movies"}],
            "TotalRecordCount": 1,
        })))
        .mount(&backend_a)
        .await;

    Mock::given(method("GET"))
        .and(path("/Users/backend-user-b/Views"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [{"Id": "lib-b", "Name": "Films", "CollectionType": "movies"}],
            "TotalRecordCount": 1,
        })))
        .mount(&backend_b)
        .await;

    let (harness, addr) = TestHarness::with_server().await;
    let (user_id, _) = harness.create_user("viewer", "password123", false);
    let token = harness.create_session(user_id);

    let backend_id_a = harness.create_backend("s1", "Server A", &backend_a.uri());
    let backend_id_b = harness.create_backend("s2", "Server B", &backend_b.uri());
    harness.create_mapping(user_id, backend_id_a, "backend-user-a", "token-a");
    harness.create_mapping(user_id, backend_id_b, "backend-user-b", "token-b");

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{addr}/Users/{user_id}/Views"))
        .header("X-Emby-Token", &token)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let items = body["Items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["Id"], "merged_movies");
    assert_eq!(items[0]["CollectionType"], "movies");
}

#[tokio::test]
async fn fan_out_sums_record_counts_across_backends() {
    let backend_a = MockServer::start().await;
    let backend_b = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [{"Id": "item-1"}],
            "TotalRecordCount": 1,
        })))
        .mount(&backend_a)
        .await;

    Mock::given(method("GET"))
        .and(path("/Items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [{"Id": "item-2"}, {"Id": "item-3"}],
            "TotalRecordCount": 2,
        })))
        .mount(&backend_b)
        .await;

    let (harness, addr) = TestHarness::with_server().await;
    let (user_id, _) = harness.create_user("fanout", "password123", false);
    let token = harness.create_session(user_id);

    let backend_id_a = harness.create_backend("s1", "Server A", &backend_a.uri());
    let backend_id_b = harness.create_backend("s2", "Server B", &backend_b.uri());
    harness.create_mapping(user_id, backend_id_a, "ua", "ta");
    harness.create_mapping(user_id, backend_id_b, "ub", "tb");

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{addr}/Items?ParentId=merged_movies"))
        .header("X-Emby-Token", &token)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["TotalRecordCount"], 3);
    let ids: Vec<String> = body["Items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["Id"].as_str().unwrap().to_string())
        .collect();
    assert!(ids.contains(&"s1_item-1".to_string()));
    assert!(ids.contains(&"s2_item-2".to_string()));
    assert!(ids.contains(&"s2_item-3".to_string()));
}

#[tokio::test]
async fn fan_out_tolerates_one_backend_failing() {
    let backend_a = MockServer::start().await;
    let backend_b = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Items": [{"Id": "item-1"}],
            "TotalRecordCount": 1,
        })))
        .mount(&backend_a)
        .await;

    Mock::given(method("GET"))
        .and(path("/Items"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&backend_b)
        .await;

    let (harness, addr) = TestHarness::with_server().await;
    let (user_id, _) = harness.create_user("partial", "password123", false);
    let token = harness.create_session(user_id);

    let backend_id_a = harness.create_backend("s1", "Server A", &backend_a.uri());
    let backend_id_b = harness.create_backend("s2", "Server B", &backend_b.uri());
    harness.create_mapping(user_id, backend_id_a, "ua", "ta");
    harness.create_mapping(user_id, backend_id_b, "ub", "tb");

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{addr}/Items?ParentId=merged_movies"))
        .header("X-Emby-Token", &token)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["TotalRecordCount"], 1);
}

#[tokio::test]
async fn single_backend_item_lookup_rewrites_ids() {
    let backend = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/Items/abc-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Id": "abc-123",
            "ParentId": "parent-xyz",
            "Name": "Test Movie",
        })))
        .mount(&backend)
        .await;

    let (harness, addr) = TestHarness::with_server().await;
    let (user_id, _) = harness.create_user("lookup", "password123", false);
    let token = harness.create_session(user_id);
    let backend_id = harness.create_backend("s1", "Server", &backend.uri());
    harness.create_mapping(user_id, backend_id, "u1", "t1");

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{addr}/Items/s1_abc-123"))
        .header("X-Emby-Token", &token)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["Id"], "s1_abc-123");
    assert_eq!(body["ParentId"], "s1_parent-xyz");
}
