use crate::helpers::{spawn_app, TestApp};
use chrono::{Duration, Utc};
use ledger_notify::domain::{NewNotification, Notification, NotificationKind};
use ledger_notify::store::NotificationStore;
use uuid::Uuid;

fn aged(user_id: Uuid, days: i64, read: bool) -> Notification {
    let at = Utc::now() - Duration::days(days);
    Notification {
        id: Uuid::new_v4(),
        user_id,
        kind: NotificationKind::PaymentMade,
        title: "Payment made".into(),
        message: "Ali paid 250.00 to Acme Ltd".into(),
        data: None,
        read,
        created_at: at,
        updated_at: at,
    }
}

async fn get_stats(app: &TestApp, query: &str) -> reqwest::Response {
    reqwest::Client::new()
        .get(format!("{}/notifications/stats{}", app.address, query))
        .basic_auth(&app.admin_username, Some(&app.admin_password))
        .send()
        .await
        .expect("Failed to execute request.")
}

#[tokio::test]
async fn maintenance_endpoints_reject_requests_without_credentials() {
    // arrange
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    for request in [
        client.post(format!("{}/notifications/cleanup", app.address)),
        client.get(format!("{}/notifications/stats", app.address)),
    ] {
        // act
        let response = request.send().await.expect("Failed to execute request.");

        // assert
        assert_eq!(401, response.status().as_u16());
        assert_eq!(
            r#"Basic realm="admin""#,
            response.headers()["WWW-Authenticate"]
        );
    }
}

#[tokio::test]
async fn maintenance_endpoints_reject_a_wrong_password() {
    // arrange
    let app = spawn_app().await;

    // act
    let response = reqwest::Client::new()
        .post(format!("{}/notifications/cleanup", app.address))
        .basic_auth(&app.admin_username, Some(Uuid::new_v4().to_string()))
        .send()
        .await
        .expect("Failed to execute request.");

    // assert
    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn cleanup_applies_every_retention_rule() {
    // arrange
    let app = spawn_app().await;
    let user_id = Uuid::new_v4();
    app.store.seed(aged(user_id, 10, false)).unwrap();
    app.store.seed(aged(user_id, 4, true)).unwrap();
    let fresh = aged(user_id, 1, false);
    app.store.seed(fresh.clone()).unwrap();

    // act
    let response = app.post_cleanup().await;

    // assert
    assert_eq!(200, response.status().as_u16());
    let report: serde_json::Value = response.json().await.unwrap();
    assert_eq!(report["old"]["deleted"], 1);
    assert_eq!(report["read"]["deleted"], 1);
    assert_eq!(report["capped"]["deleted"], 0);
    let remaining = app.store.notifications().unwrap();
    assert_eq!(remaining, vec![fresh]);
}

#[tokio::test]
async fn cleanup_reports_failures_instead_of_erroring() {
    // arrange
    let app = spawn_app().await;
    app.store.set_offline(true);

    // act
    let response = app.post_cleanup().await;

    // assert
    assert_eq!(200, response.status().as_u16());
    let report: serde_json::Value = response.json().await.unwrap();
    assert_eq!(report["old"]["failures"], 1);
    assert_eq!(report["read"]["failures"], 1);
}

#[tokio::test]
async fn stats_count_read_and_unread_notifications() {
    // arrange
    let app = spawn_app().await;
    let user_id = Uuid::new_v4();
    let first = app
        .store
        .insert_notification(NewNotification::new(
            user_id,
            NotificationKind::TransactionCreated,
            "Transaction added",
            "A new spend was recorded",
        ))
        .await
        .unwrap();
    app.store
        .insert_notification(NewNotification::new(
            user_id,
            NotificationKind::TransactionCreated,
            "Transaction added",
            "A new loan was recorded",
        ))
        .await
        .unwrap();
    app.store
        .mark_read(user_id, first.id, Utc::now())
        .await
        .unwrap();
    app.store
        .insert_notification(NewNotification::new(
            Uuid::new_v4(),
            NotificationKind::PaymentMade,
            "Payment made",
            "Someone else paid",
        ))
        .await
        .unwrap();

    // act
    let everyone: serde_json::Value = get_stats(&app, "").await.json().await.unwrap();
    let one_user: serde_json::Value = get_stats(&app, &format!("?user_id={}", user_id))
        .await
        .json()
        .await
        .unwrap();

    // assert
    assert_eq!(everyone["total"], 3);
    assert_eq!(everyone["read"], 1);
    assert_eq!(everyone["unread"], 2);
    assert_eq!(everyone["readPercentage"], 33);
    assert_eq!(one_user["total"], 2);
    assert_eq!(one_user["read"], 1);
    assert_eq!(one_user["readPercentage"], 50);
}

#[tokio::test]
async fn stats_reject_a_malformed_user_id() {
    // arrange
    let app = spawn_app().await;

    // act
    let response = get_stats(&app, "?user_id=not-a-uuid").await;

    // assert
    assert_eq!(400, response.status().as_u16());
}
