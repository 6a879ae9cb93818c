//! Server-synchronized cart behavior.
//!
//! Every successful mutation must be followed by exactly one cart fetch, a
//! failed mutation must leave the snapshot alone, and clearing never fetches.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use zdrink_client::{AddItem, ApiError, LoginCredentials};
use zdrink_core::{AttributeOptionId, CartLineId, Price, ProductId, SkuId};
use zdrink_integration_tests::{FakeBackend, Failure, PASSWORD, USERNAME, endpoint, signed_in};

fn milk_tea() -> AddItem {
    AddItem::new(ProductId::new(1))
        .sku(SkuId::new(10))
        .option(AttributeOptionId::new(30))
        .quantity(2)
}

#[tokio::test]
async fn test_add_then_zero_update_leaves_empty_cart() {
    let (backend, app, _storage) = signed_in().await;

    let cart = app.cart().add_item(&milk_tea()).await.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(app.cart().total_quantity(), 2);
    let line = cart.items.first().unwrap().id;

    let cart = app.cart().update_item(line, 0).await.unwrap();

    assert!(cart.items.is_empty());
    assert!(app.cart().is_empty());
    assert_eq!(app.cart().total_quantity(), 0);
    assert_eq!(backend.calls(endpoint::ADD_ITEM), 1);
    assert_eq!(backend.calls(endpoint::REMOVE_ITEM), 1);
    assert_eq!(backend.calls(endpoint::UPDATE_ITEM), 0);
    assert_eq!(backend.calls(endpoint::MY_CART), 2);
}

#[tokio::test]
async fn test_totals_follow_lines() {
    let (_backend, app, _storage) = signed_in().await;

    app.cart().add_item(&milk_tea()).await.unwrap();
    let cart = app
        .cart()
        .add_item(&AddItem::new(ProductId::new(2)).quantity(3))
        .await
        .unwrap();

    let summed: u64 = cart.items.iter().map(|line| u64::from(line.quantity)).sum();
    assert_eq!(cart.total_quantity(), summed);
    assert_eq!(app.cart().total_quantity(), 5);
    // 2 x 12.00 + 3 x 8.50
    assert_eq!(app.cart().total_price(), Price::from_fen(4950));
}

#[tokio::test]
async fn test_adding_same_selection_merges_lines() {
    let (_backend, app, _storage) = signed_in().await;

    app.cart().add_item(&milk_tea()).await.unwrap();
    let cart = app.cart().add_item(&milk_tea()).await.unwrap();

    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.total_quantity(), 4);
}

#[tokio::test]
async fn test_update_sets_quantity() {
    let (backend, app, _storage) = signed_in().await;
    let cart = app.cart().add_item(&milk_tea()).await.unwrap();
    let line = cart.items.first().unwrap().id;
    backend.reset_calls();

    let cart = app.cart().update_item(line, 5).await.unwrap();

    assert_eq!(cart.line(line).map(|l| l.quantity), Some(5));
    assert_eq!(backend.calls(endpoint::UPDATE_ITEM), 1);
    assert_eq!(backend.calls(endpoint::MY_CART), 1);
}

#[tokio::test]
async fn test_negative_update_is_a_removal() {
    let (backend, app, _storage) = signed_in().await;
    let cart = app.cart().add_item(&milk_tea()).await.unwrap();
    let line = cart.items.first().unwrap().id;
    backend.reset_calls();

    let via_update = app.cart().update_item(line, -3).await.unwrap();

    assert_eq!(backend.calls(endpoint::REMOVE_ITEM), 1);
    assert_eq!(backend.calls(endpoint::MY_CART), 1);
    assert!(via_update.line(line).is_none());
    assert!(backend.server_cart_lines().is_empty());
}

#[tokio::test]
async fn test_clear_drops_snapshot_without_fetch() {
    let (backend, app, _storage) = signed_in().await;
    app.cart().add_item(&milk_tea()).await.unwrap();
    assert!(app.cart().snapshot().is_some());
    backend.reset_calls();

    app.cart().clear().await.unwrap();

    assert!(app.cart().snapshot().is_none());
    assert_eq!(app.cart().total_quantity(), 0);
    assert_eq!(backend.calls(endpoint::CLEAR_CART), 1);
    assert_eq!(backend.calls(endpoint::MY_CART), 0);
    assert!(backend.server_cart_lines().is_empty());
}

#[tokio::test]
async fn test_failed_mutation_keeps_snapshot() {
    let (backend, app, _storage) = signed_in().await;
    let before = app.cart().add_item(&milk_tea()).await.unwrap();
    let line = before.items.first().unwrap().id;
    backend.reset_calls();

    backend.fail_next_with(
        endpoint::UPDATE_ITEM,
        400,
        Some(serde_json::json!({"message": "Out of stock"})),
    );
    let err = app.cart().update_item(line, 9).await.unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert_eq!(app.cart().snapshot(), Some(before));
    assert_eq!(backend.calls(endpoint::MY_CART), 0);
}

#[tokio::test]
async fn test_failed_add_keeps_snapshot() {
    let (backend, app, _storage) = signed_in().await;
    let before = app.cart().add_item(&milk_tea()).await.unwrap();
    backend.reset_calls();

    backend.fail_next_with(endpoint::ADD_ITEM, 500, None);
    let err = app
        .cart()
        .add_item(&AddItem::new(ProductId::new(2)))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::ServerError));
    assert_eq!(app.cart().snapshot(), Some(before));
    assert_eq!(backend.calls(endpoint::MY_CART), 0);
    assert_eq!(backend.server_cart_lines().len(), 1);
}

#[tokio::test]
async fn test_failed_remove_keeps_snapshot() {
    let (backend, app, _storage) = signed_in().await;
    let before = app.cart().add_item(&milk_tea()).await.unwrap();
    let line = before.items.first().unwrap().id;
    backend.reset_calls();

    backend.fail_next_with(endpoint::REMOVE_ITEM, 500, None);
    app.cart().remove_item(line).await.unwrap_err();

    assert_eq!(app.cart().snapshot(), Some(before));
    assert_eq!(backend.calls(endpoint::MY_CART), 0);
    assert_eq!(backend.server_cart_lines().len(), 1);
}

#[tokio::test]
async fn test_timed_out_mutation_keeps_snapshot() {
    let backend = FakeBackend::start().await;
    let config = backend
        .config()
        .with_request_timeout(Duration::from_millis(200));
    let (app, _storage) = backend.client_with(config, Arc::default());
    app.session()
        .login(&LoginCredentials::new(USERNAME, PASSWORD))
        .await
        .unwrap();
    let before = app.cart().add_item(&milk_tea()).await.unwrap();
    backend.reset_calls();

    backend.fail_next(endpoint::ADD_ITEM, Failure::Hang(Duration::from_secs(2)));
    let err = app
        .cart()
        .add_item(&AddItem::new(ProductId::new(2)))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::NetworkUnavailable(_)));
    assert_eq!(app.cart().snapshot(), Some(before));
    assert_eq!(backend.calls(endpoint::MY_CART), 0);
}

#[tokio::test]
async fn test_out_of_range_quantity_sends_nothing() {
    let (backend, app, _storage) = signed_in().await;
    let before = app.cart().add_item(&milk_tea()).await.unwrap();
    let line = before.items.first().unwrap().id;
    backend.reset_calls();

    let err = app.cart().update_item(line, 5_000_000_000).await.unwrap_err();

    assert!(matches!(err, ApiError::InvalidQuantity(5_000_000_000)));
    assert!(backend.all_calls().is_empty());
    assert_eq!(app.cart().snapshot(), Some(before));
    assert_eq!(
        backend.server_cart_lines().first().and_then(|l| l["quantity"].as_i64()),
        Some(2)
    );
}

#[tokio::test]
async fn test_failed_clear_keeps_snapshot() {
    let (backend, app, _storage) = signed_in().await;
    let before = app.cart().add_item(&milk_tea()).await.unwrap();
    backend.fail_next_with(endpoint::CLEAR_CART, 500, None);

    app.cart().clear().await.unwrap_err();

    assert_eq!(app.cart().snapshot(), Some(before));
}

#[tokio::test]
async fn test_removing_unknown_line_reports_not_found() {
    let (backend, app, _storage) = signed_in().await;
    app.cart().fetch().await.unwrap();
    backend.reset_calls();

    let err = app.cart().remove_item(CartLineId::new(9999)).await.unwrap_err();

    assert!(matches!(err, ApiError::NotFound));
    assert_eq!(backend.calls(endpoint::MY_CART), 0);
}

#[tokio::test]
async fn test_concurrent_mutations_each_refetch() {
    let (backend, app, _storage) = signed_in().await;
    backend.reset_calls();

    let first = app.cart().clone();
    let second = app.cart().clone();
    let tea = milk_tea();
    let coffee = AddItem::new(ProductId::new(2));
    let (a, b) = tokio::join!(first.add_item(&tea), second.add_item(&coffee));
    a.unwrap();
    b.unwrap();

    assert_eq!(backend.calls(endpoint::ADD_ITEM), 2);
    assert_eq!(backend.calls(endpoint::MY_CART), 2);
    // The snapshot reflects both adds, whichever finished last
    assert_eq!(app.cart().lines().len(), 2);
    assert_eq!(app.cart().total_quantity(), 3);
}

#[tokio::test]
async fn test_logout_resets_cart() {
    let (_backend, app, _storage) = signed_in().await;
    app.cart().add_item(&milk_tea()).await.unwrap();

    app.logout();

    assert!(app.cart().snapshot().is_none());
}

#[tokio::test]
async fn test_forced_logout_hides_cart() {
    let (backend, app, _storage) = signed_in().await;
    app.cart().add_item(&milk_tea()).await.unwrap();
    backend.revoke_tokens();

    app.orders().my_orders(None).await.unwrap_err();

    assert!(!app.session().is_authenticated());
    assert!(app.cart().snapshot().is_none());
    assert_eq!(app.cart().total_quantity(), 0);
}

#[tokio::test]
async fn test_failed_identity_refresh_hides_cart() {
    let (backend, app, _storage) = signed_in().await;
    app.cart().add_item(&milk_tea()).await.unwrap();
    backend.fail_next_with(endpoint::ME, 500, None);

    app.session().fetch_identity().await.unwrap_err();

    assert!(!app.session().is_authenticated());
    assert!(app.cart().is_empty());
}
