use crate::helpers::spawn_app;
use serde_json::json;
use uuid::Uuid;

fn subscription_body(user_id: Uuid, endpoint: &str) -> serde_json::Value {
    json!({
        "userId": user_id,
        "endpoint": endpoint,
        "keys": {
            "p256dh": "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA_0QTpQtUbVlUls0VJXg7A8u-Ts1XbjhazAkj7I99e8QcYP7DkM",
            "auth": "tBHItJI5svbpez7KI4CCXg"
        },
        "userAgent": "Mozilla/5.0 (Android 14)"
    })
}

#[tokio::test]
async fn subscribing_stores_the_device() {
    // arrange
    let app = spawn_app().await;
    let user_id = Uuid::new_v4();

    // act
    let response = app
        .post_push_subscription(&subscription_body(user_id, "https://push.example.com/phone"))
        .await;

    // assert
    assert_eq!(200, response.status().as_u16());
    let saved = app.store.push_subscriptions().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].user_id, user_id);
    assert_eq!(saved[0].endpoint, "https://push.example.com/phone");
    assert_eq!(saved[0].user_agent.as_deref(), Some("Mozilla/5.0 (Android 14)"));
}

#[tokio::test]
async fn subscribing_again_replaces_the_previous_device() {
    // arrange
    let app = spawn_app().await;
    let user_id = Uuid::new_v4();
    app.post_push_subscription(&subscription_body(user_id, "https://push.example.com/old"))
        .await
        .error_for_status()
        .unwrap();

    // act
    app.post_push_subscription(&subscription_body(user_id, "https://push.example.com/new"))
        .await
        .error_for_status()
        .unwrap();

    // assert
    let saved = app.store.push_subscriptions().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].endpoint, "https://push.example.com/new");
}

#[tokio::test]
async fn subscribing_returns_a_400_for_invalid_devices() {
    // arrange
    let app = spawn_app().await;
    let user_id = Uuid::new_v4();
    let mut blank_key = subscription_body(user_id, "https://push.example.com/phone");
    blank_key["keys"]["auth"] = json!("");
    let test_cases = vec![
        (subscription_body(user_id, ""), "an empty endpoint"),
        (blank_key, "a blank auth secret"),
        (json!({ "userId": user_id, "endpoint": "https://push.example.com/phone" }), "no keys"),
    ];

    for (body, description) in test_cases {
        // act
        let response = app.post_push_subscription(&body).await;

        // assert
        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 Bad Request when the payload had {}.",
            description
        );
    }
    assert!(app.store.push_subscriptions().unwrap().is_empty());
}

#[tokio::test]
async fn unsubscribing_removes_the_device() {
    // arrange
    let app = spawn_app().await;
    let user_id = app.register_device("https://push.example.com/phone").await;

    // act
    let response = reqwest::Client::new()
        .delete(format!("{}/push_subscriptions/{}", app.address, user_id))
        .send()
        .await
        .expect("Failed to execute request.");

    // assert
    assert_eq!(200, response.status().as_u16());
    assert!(app.store.push_subscriptions().unwrap().is_empty());
}

#[tokio::test]
async fn unsubscribing_without_a_device_still_succeeds() {
    // arrange
    let app = spawn_app().await;

    // act
    let response = reqwest::Client::new()
        .delete(format!("{}/push_subscriptions/{}", app.address, Uuid::new_v4()))
        .send()
        .await
        .expect("Failed to execute request.");

    // assert
    assert_eq!(200, response.status().as_u16());
}
