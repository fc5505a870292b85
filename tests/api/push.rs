use crate::helpers::spawn_app;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn push_returns_a_400_for_invalid_requests() {
    // arrange
    let app = spawn_app().await;
    let user_id = Uuid::new_v4();
    let test_cases = vec![
        (json!({ "body": "Ali paid 250.00", "userId": user_id }), "missing title"),
        (json!({ "title": "Payment made", "userId": user_id }), "missing body"),
        (json!({ "title": " ", "body": "Ali paid 250.00", "userId": user_id }), "blank title"),
        (json!({ "title": "Payment made", "body": "Ali paid 250.00" }), "no target"),
        (
            json!({ "title": "Payment made", "body": "Ali paid 250.00", "userId": user_id, "userIds": [user_id] }),
            "both targets",
        ),
        (
            json!({ "title": "Payment made", "body": "Ali paid 250.00", "userIds": [] }),
            "empty target list",
        ),
        (
            json!({ "title": "Payment made", "body": "Ali paid 250.00", "userId": "not-a-uuid" }),
            "malformed user id",
        ),
    ];

    for (body, description) in test_cases {
        // act
        let response = app.post_push(&body).await;

        // assert
        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 Bad Request when the payload had {}.",
            description
        );
        let body: serde_json::Value = response.json().await.unwrap();
        assert!(body["error"].is_string(), "No error message for {}.", description);
    }
    assert!(app.transport.delivered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn push_to_users_without_devices_reports_nothing_sent() {
    // arrange
    let app = spawn_app().await;

    // act
    let response = app
        .post_push(&json!({
            "title": "Payment made",
            "body": "Ali paid 250.00 to Acme Ltd",
            "userIds": [Uuid::new_v4(), Uuid::new_v4()]
        }))
        .await;

    // assert
    assert_eq!(200, response.status().as_u16());
    let report: serde_json::Value = response.json().await.unwrap();
    assert_eq!(report["message"], "No subscriptions found");
    assert_eq!(report["successful"], 0);
    assert_eq!(report["failed"], 0);
    assert_eq!(report["total"], 0);
}

#[tokio::test]
async fn push_reports_per_device_outcomes() {
    // arrange
    let app = spawn_app().await;
    let valid = app.register_device("https://push.example.com/valid").await;
    let expired = app.register_device("https://push.example.com/expired").await;
    app.transport.expire("https://push.example.com/expired");

    // act
    let response = app
        .post_push(&json!({
            "title": "Transaction deleted",
            "body": "A loan entry was removed",
            "userIds": [valid, expired],
            "url": "/loans",
            "tag": "loan"
        }))
        .await;

    // assert
    assert_eq!(200, response.status().as_u16());
    let report: serde_json::Value = response.json().await.unwrap();
    assert_eq!(report["message"], "Sent 1 of 2 push notifications");
    assert_eq!(report["successful"], 1);
    assert_eq!(report["failed"], 1);
    assert_eq!(report["total"], 2);

    let delivered = app.transport.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    let (endpoint, payload) = &delivered[0];
    assert_eq!(endpoint, "https://push.example.com/valid");
    assert_eq!(payload["title"], "Transaction deleted");
    assert_eq!(payload["tag"], "loan");
    assert_eq!(payload["url"], "/loans");
}

#[tokio::test]
async fn push_to_a_single_user_uses_default_url_and_tag() {
    // arrange
    let app = spawn_app().await;
    let user_id = app.register_device("https://push.example.com/phone").await;

    // act
    let response = app
        .post_push(&json!({
            "title": "Payment made",
            "body": "Ali paid 250.00 to Acme Ltd",
            "userId": user_id
        }))
        .await;

    // assert
    assert_eq!(200, response.status().as_u16());
    let delivered = app.transport.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].1["tag"], "notification");
    assert_eq!(delivered[0].1["url"], "/");
}

#[tokio::test]
async fn push_returns_a_500_when_subscriptions_cannot_be_read() {
    // arrange
    let app = spawn_app().await;
    app.store.set_offline(true);

    // act
    let response = app
        .post_push(&json!({
            "title": "Payment made",
            "body": "Ali paid 250.00 to Acme Ltd",
            "userId": Uuid::new_v4()
        }))
        .await;

    // assert
    assert_eq!(500, response.status().as_u16());
}

#[tokio::test]
async fn preflight_requests_are_answered_with_cors_headers() {
    // arrange
    let app = spawn_app().await;

    // act
    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, format!("{}/push", app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    // assert
    assert_eq!(200, response.status().as_u16());
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert!(headers["access-control-allow-headers"]
        .to_str()
        .unwrap()
        .contains("content-type"));
}

#[tokio::test]
async fn the_vapid_public_key_is_published() {
    // arrange
    let app = spawn_app().await;

    // act
    let response = reqwest::Client::new()
        .get(format!("{}/push/public_key", app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    // assert
    assert_eq!(200, response.status().as_u16());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["publicKey"], app.vapid_public_key.as_str());
}

#[tokio::test]
async fn a_user_listed_twice_receives_one_push() {
    // arrange
    let app = spawn_app().await;
    let user_id = app.register_device("https://push.example.com/phone").await;

    // act
    let response = app
        .post_push(&json!({
            "title": "Payment made",
            "body": "Ali paid 250.00 to Acme Ltd",
            "userIds": [user_id, user_id]
        }))
        .await;

    // assert
    assert_eq!(200, response.status().as_u16());
    let report: serde_json::Value = response.json().await.unwrap();
    assert_eq!(report["total"], 1);
    assert_eq!(report["successful"], 1);
    assert_eq!(app.transport.delivered.lock().unwrap().len(), 1);
}
