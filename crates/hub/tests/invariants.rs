#![allow(clippy::unwrap_used, clippy::expect_used)]

use moltis_hub::{Hub, OutboundFrame};
use uuid::Uuid;

#[tokio::test]
async fn register_and_fan_out_to_same_user() {
    let hub = Hub::spawn(5);
    let user = Uuid::new_v4();

    let a = hub
        .register(user, "device-a".into(), "ios".into(), serde_json::json!({}))
        .await
        .unwrap();
    let _b = hub
        .register(user, "device-b".into(), "web".into(), serde_json::json!({}))
        .await
        .unwrap();

    assert_eq!(hub.get_user_device_count(user).await, 2);
    assert!(hub.is_user_online(user).await);

    let delivered = hub
        .send_to_user(user, serde_json::json!({"type": "ping"}))
        .await;
    assert_eq!(delivered, 2);

    drop(a.outbox);
    // draining does not remove from the table until unregister is called
    assert_eq!(hub.get_user_device_count(user).await, 2);
}

#[tokio::test]
async fn unregister_is_idempotent() {
    let hub = Hub::spawn(5);
    let user = Uuid::new_v4();
    let client = hub
        .register(user, "device-a".into(), "ios".into(), serde_json::json!({}))
        .await
        .unwrap();

    hub.unregister(client.client_id).await;
    assert_eq!(hub.get_user_device_count(user).await, 0);
    assert!(!hub.is_user_online(user).await);

    // Second unregister of the same id is a no-op, not an error.
    hub.unregister(client.client_id).await;
    assert_eq!(hub.get_user_device_count(user).await, 0);
}

#[tokio::test]
async fn max_connections_per_user_is_enforced() {
    let hub = Hub::spawn(1);
    let user = Uuid::new_v4();
    let _first = hub
        .register(user, "device-a".into(), "ios".into(), serde_json::json!({}))
        .await
        .unwrap();

    let second = hub
        .register(user, "device-b".into(), "ios".into(), serde_json::json!({}))
        .await;
    assert!(second.is_err());
    assert_eq!(hub.get_user_device_count(user).await, 1);
}

#[tokio::test]
async fn overflow_drops_the_client_not_the_message_to_others() {
    let hub = Hub::spawn(10);
    let slow_user = Uuid::new_v4();
    let healthy_user = Uuid::new_v4();

    let slow = hub
        .register(slow_user, "slow".into(), "ios".into(), serde_json::json!({}))
        .await
        .unwrap();
    let healthy = hub
        .register(
            healthy_user,
            "healthy".into(),
            "ios".into(),
            serde_json::json!({}),
        )
        .await
        .unwrap();

    // Fill the slow client's 256-capacity queue without draining it.
    for _ in 0..300 {
        let _ = hub
            .send_to_user(slow_user, serde_json::json!({"type": "new_message"}))
            .await;
    }

    // The slow client should have been evicted; the healthy one is unaffected.
    assert!(!hub.is_user_online(slow_user).await);
    assert!(hub.is_user_online(healthy_user).await);

    let delivered = hub
        .send_to_user(healthy_user, serde_json::json!({"type": "new_message"}))
        .await;
    assert_eq!(delivered, 1);

    drop(slow.outbox);
    drop(healthy.outbox);
}

#[tokio::test]
async fn broadcast_all_excludes_by_client_send_to_users_excludes_by_user() {
    let hub = Hub::spawn(5);
    let user_a = Uuid::new_v4();
    let user_b = Uuid::new_v4();

    let a = hub
        .register(user_a, "a".into(), "ios".into(), serde_json::json!({}))
        .await
        .unwrap();
    let _b = hub
        .register(user_b, "b".into(), "ios".into(), serde_json::json!({}))
        .await
        .unwrap();

    let delivered = hub
        .broadcast_all(serde_json::json!({"type": "presence_update"}), Some(a.client_id))
        .await;
    assert_eq!(delivered, 1);

    let delivered = hub
        .send_to_users(vec![user_a], serde_json::json!({"type": "typing"}), vec![user_a])
        .await;
    assert_eq!(delivered, 0);
}

#[tokio::test]
async fn shutdown_is_idempotent_and_closes_clients() {
    let hub = Hub::spawn(5);
    let user = Uuid::new_v4();
    let mut client = hub
        .register(user, "device".into(), "ios".into(), serde_json::json!({}))
        .await
        .unwrap();

    hub.shutdown().await;
    let frame = client.outbox.recv().await;
    assert!(matches!(frame, Some(OutboundFrame::Close)));

    // Calling shutdown again on a hub whose actor already exited must not hang or panic.
    hub.shutdown().await;
}
