mod common;

use common::TestHarness;
use serde_json::json;

#[tokio::test]
async fn changing_password_revokes_other_sessions_but_keeps_caller() {
    let (harness, addr) = TestHarness::with_server().await;
    let (user_id, user_id_str) = harness.create_user("multi", "oldpassword1", false);
    let session_a = harness.create_session(user_id);
    let session_b = harness.create_session(user_id);

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/Users/{user_id_str}/Password"))
        .header("X-Emby-Token", &session_a)
        .json(&json!({"CurrentPw": "oldpassword1", "NewPw": "newpassword2"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let still_works = client
        .get(format!("http://{addr}/Users/Me"))
        .header("X-Emby-Token", &session_a)
        .send()
        .await
        .unwrap();
    assert_eq!(still_works.status(), 200);

    let revoked = client
        .get(format!("http://{addr}/Users/Me"))
        .header("X-Emby-Token", &session_b)
        .send()
        .await
        .unwrap();
    assert_eq!(revoked.status(), 401);
}

#[tokio::test]
async fn changing_password_with_wrong_current_password_is_rejected() {
    let (harness, addr) = TestHarness::with_server().await;
    let (user_id, user_id_str) = harness.create_user("single", "oldpassword1", false);
    let session = harness.create_session(user_id);

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/Users/{user_id_str}/Password"))
        .header("X-Emby-Token", &session)
        .json(&json!({"CurrentPw": "wrongpassword", "NewPw": "whatever123"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}
