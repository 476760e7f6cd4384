mod common;

use common::TestHarness;
use jfp_core::config::Config;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn playback_info_rewrites_urls_and_ids() {
    let backend = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/Items/abcd1234abcd1234abcd1234abcd1234/PlaybackInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "MediaSources": [{
                "Id": "abcd1234abcd1234abcd1234abcd1234",
                "TranscodingUrl": format!(
                    "{}/videos/abcd1234abcd1234abcd1234abcd1234/master.m3u8?ApiKey=BACKENDSECRET&MediaSourceId=abcd1234abcd1234abcd1234abcd1234",
                    backend.uri()
                ),
                "DirectStreamUrl": format!(
                    "{}/videos/abcd1234abcd1234abcd1234abcd1234/stream?ApiKey=BACKENDSECRET&static=true",
                    backend.uri()
                ),
            }]
        })))
        .mount(&backend)
        .await;

    let mut config = Config::default();
    config.server.external_url = Some("https://proxy.example.com".to_string());
    let (harness, addr) = TestHarness::with_server_config(config).await;

    let (user_id, _) = harness.create_user("watcher", "password123", false);
    let token = harness.create_session(user_id);
    let backend_id = harness.create_backend("s1", "Server", &backend.uri());
    harness.create_mapping(user_id, backend_id, "backend-user", "backend-token");

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/Items/s1_abcd1234abcd1234abcd1234abcd1234/PlaybackInfo"))
        .header("X-Emby-Token", &token)
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let source = &body["MediaSources"][0];
    let transcoding = source["TranscodingUrl"].as_str().unwrap();
    let direct = source["DirectStreamUrl"].as_str().unwrap();

    for url in [transcoding, direct] {
        assert!(url.starts_with("https://proxy.example.com"), "{url}");
        assert!(!url.contains("BACKENDSECRET"), "{url}");
        assert!(url.contains(&format!("ApiKey={token}")), "{url}");
        assert!(url.contains("s1_abcd1234abcd1234abcd1234abcd1234"), "{url}");
    }
}

#[tokio::test]
async fn hls_playlist_swaps_backend_key_for_caller_token() {
    let backend = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/videos/abc123/master.m3u8"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(
                "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1000\nmain.m3u8?ApiKey=BACKENDSECRET&MediaSourceId=abc123\n",
            ),
        )
        .mount(&backend)
        .await;

    let (harness, addr) = TestHarness::with_server().await;
    let (user_id, _) = harness.create_user("streamer", "password123", false);
    let token = harness.create_session(user_id);
    harness.create_backend("s1", "Server", &backend.uri());

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{addr}/videos/s1_abc123/master.m3u8?ApiKey={token}"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(!body.contains("BACKENDSECRET"));
    assert!(body.contains(&format!("ApiKey={token}")));
    assert!(body.contains("#EXTM3U"));
}
