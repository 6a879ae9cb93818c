//! HTTP adapter: credential attachment, error classification and the
//! notifications published for each failure.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use serde_json::json;
use zdrink_client::error::{
    FORBIDDEN_MESSAGE, NETWORK_UNAVAILABLE_MESSAGE, NOT_FOUND_MESSAGE, SERVER_ERROR_MESSAGE,
};
use zdrink_client::{ApiError, ClientEvent, ShopQuery};
use zdrink_core::ShopId;
use zdrink_integration_tests::{
    ACCESS_TOKEN, FakeBackend, Failure, drain_events, endpoint, signed_in,
};

fn notifications(events: &[ClientEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|event| match event {
            ClientEvent::Notify(n) => Some(n.message.as_str()),
            ClientEvent::SessionInvalidated { .. } => None,
        })
        .collect()
}

#[tokio::test]
async fn test_bearer_attached_only_when_signed_in() {
    let (backend, app, _storage) = signed_in().await;

    app.catalog().shops(&ShopQuery::default()).await.unwrap();
    assert_eq!(
        backend.last_authorization(endpoint::SHOPS),
        Some(format!("Bearer {ACCESS_TOKEN}"))
    );

    app.logout();
    app.catalog().shop(ShopId::new(2)).await.unwrap();
    assert_eq!(backend.last_authorization(endpoint::SHOP), None);
}

#[tokio::test]
async fn test_status_notifications() {
    let (backend, app, _storage) = signed_in().await;
    let mut events = app.subscribe();

    for (status, expected) in [
        (403, FORBIDDEN_MESSAGE),
        (404, NOT_FOUND_MESSAGE),
        (500, SERVER_ERROR_MESSAGE),
    ] {
        backend.fail_next_with(endpoint::MY_ORDERS, status, None);
        let err = app.orders().my_orders(None).await.unwrap_err();
        assert_eq!(err.status(), Some(status));

        let drained = drain_events(&mut events);
        assert_eq!(notifications(&drained), vec![expected], "status {status}");
    }

    // None of these end the session
    assert!(app.session().is_authenticated());
}

#[tokio::test]
async fn test_server_message_is_surfaced() {
    let (backend, app, _storage) = signed_in().await;
    let mut events = app.subscribe();

    backend.fail_next_with(
        endpoint::CREATE_PAYMENT,
        400,
        Some(json!({"message": "Order status does not allow payment"})),
    );
    let err = app
        .orders()
        .create_payment(&zdrink_client::PaymentRequest {
            order_id: zdrink_core::OrderId::new(1),
            payment_method_id: zdrink_core::PaymentMethodId::new(1),
            openid: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(
        &err,
        ApiError::Http { status: 400, message: Some(m) } if m == "Order status does not allow payment"
    ));
    assert_eq!(
        notifications(&drain_events(&mut events)),
        vec!["Order status does not allow payment"]
    );
}

#[tokio::test]
async fn test_detail_field_is_used_when_message_missing() {
    let (backend, app, _storage) = signed_in().await;
    let mut events = app.subscribe();

    backend.fail_next_with(endpoint::CATEGORIES, 429, Some(json!({"detail": "Slow down"})));
    app.catalog().categories(ShopId::new(1)).await.unwrap_err();

    assert_eq!(notifications(&drain_events(&mut events)), vec!["Slow down"]);
}

#[tokio::test]
async fn test_timeout_is_a_network_failure() {
    let backend = FakeBackend::start().await;
    let config = backend
        .config()
        .with_request_timeout(Duration::from_millis(200));
    let (app, _storage) = backend.client_with(config, std::sync::Arc::default());
    let mut events = app.subscribe();

    backend.fail_next(endpoint::SHOPS, Failure::Hang(Duration::from_secs(2)));
    let err = app.catalog().shops(&ShopQuery::default()).await.unwrap_err();

    assert!(matches!(err, ApiError::NetworkUnavailable(_)));
    assert_eq!(err.status(), None);
    assert_eq!(
        notifications(&drain_events(&mut events)),
        vec![NETWORK_UNAVAILABLE_MESSAGE]
    );
}

#[tokio::test]
async fn test_unauthorized_has_no_notification() {
    let (backend, app, _storage) = signed_in().await;
    let mut events = app.subscribe();
    backend.fail_next_with(endpoint::MY_ORDERS, 401, Some(json!({"detail": "Token expired"})));

    app.orders().my_orders(None).await.unwrap_err();

    let drained = drain_events(&mut events);
    assert!(notifications(&drained).is_empty());
    assert_eq!(drained.len(), 1);
    assert!(!app.session().is_authenticated());
}

#[tokio::test]
async fn test_empty_success_body_is_accepted() {
    let (backend, app, _storage) = signed_in().await;
    let cart = app
        .cart()
        .add_item(&zdrink_client::AddItem::new(zdrink_core::ProductId::new(2)))
        .await
        .unwrap();
    let line = cart.items.first().unwrap().id;

    // DELETE answers 204 with no body
    app.cart().remove_item(line).await.unwrap();
    assert_eq!(backend.calls(endpoint::REMOVE_ITEM), 1);
}
