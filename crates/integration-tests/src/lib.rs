//! Integration tests for the Zdrink client.
//!
//! Tests run the real client against [`FakeBackend`], an in-process axum
//! server that speaks the ordering API on an ephemeral port. The fake counts
//! calls per endpoint, records the `Authorization` header it saw, and can be
//! told to fail the next call to an endpoint.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p zdrink-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use url::Url;
use zdrink_client::{ClientConfig, ClientEvent, LoginCredentials, MemoryStorage, TokenStorage, Zdrink};

/// Username the fake backend accepts.
pub const USERNAME: &str = "alice";
/// Password the fake backend accepts.
pub const PASSWORD: &str = "hunter2";
/// Access token issued on login.
pub const ACCESS_TOKEN: &str = "access-1";
/// Refresh token issued on login.
pub const REFRESH_TOKEN: &str = "refresh-1";
/// Access token issued on refresh.
pub const REFRESHED_ACCESS_TOKEN: &str = "access-2";

/// Endpoint names used for call counting and failure injection.
pub mod endpoint {
    pub const LOGIN: &str = "login";
    pub const REGISTER: &str = "register";
    pub const ME: &str = "me";
    pub const PROFILE_UPDATE: &str = "profile_update";
    pub const CHANGE_PASSWORD: &str = "change_password";
    pub const LOGOUT: &str = "logout";
    pub const TOKEN_REFRESH: &str = "token_refresh";
    pub const MY_CART: &str = "my_cart";
    pub const ADD_ITEM: &str = "add_item";
    pub const UPDATE_ITEM: &str = "update_item";
    pub const REMOVE_ITEM: &str = "remove_item";
    pub const CLEAR_CART: &str = "clear_cart";
    pub const SHOPS: &str = "shops";
    pub const SHOP: &str = "shop";
    pub const CURRENT_SHOPS: &str = "current_shops";
    pub const CATEGORIES: &str = "categories";
    pub const PRODUCTS: &str = "products";
    pub const PRODUCT: &str = "product";
    pub const CREATE_ORDER: &str = "create_order";
    pub const MY_ORDERS: &str = "my_orders";
    pub const ORDER: &str = "order";
    pub const CANCEL_ORDER: &str = "cancel_order";
    pub const CREATE_PAYMENT: &str = "create_payment";
}

/// How the fake should fail the next call to an endpoint.
#[derive(Debug, Clone)]
pub enum Failure {
    /// Respond with this status and optional JSON body.
    Status(StatusCode, Option<Value>),
    /// Never answer within the client's deadline.
    Hang(Duration),
}

#[derive(Default)]
struct Cart {
    lines: Vec<Value>,
    next_line_id: i64,
}

#[derive(Default)]
struct Orders {
    orders: Vec<Value>,
    next_id: i64,
}

/// Shared state behind the fake's handlers.
#[derive(Default)]
struct BackendState {
    calls: Mutex<BTreeMap<&'static str, usize>>,
    failures: Mutex<HashMap<&'static str, Failure>>,
    auth_headers: Mutex<Vec<(&'static str, Option<String>)>>,
    valid_tokens: Mutex<Vec<String>>,
    identity: Mutex<Value>,
    cart: Mutex<Cart>,
    orders: Mutex<Orders>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BackendState {
    fn new() -> Self {
        let state = Self::default();
        *lock(&state.identity) = json!({
            "id": 1,
            "username": USERNAME,
            "email": "alice@example.com",
            "phone": "13800000000",
            "user_type": "customer",
            "first_name": "",
            "last_name": "",
            "avatar": null,
            "points": 120,
            "is_active": true,
            "date_joined": "2024-01-01T00:00:00+08:00"
        });
        lock(&state.cart).next_line_id = 100;
        lock(&state.orders).next_id = 500;
        state
    }

    /// Count the call, apply any injected failure, then check the bearer
    /// token when `protected`.
    async fn enter(
        &self,
        name: &'static str,
        headers: &HeaderMap,
        protected: bool,
    ) -> Result<(), Response> {
        *lock(&self.calls).entry(name).or_default() += 1;

        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);
        lock(&self.auth_headers).push((name, authorization.clone()));

        let failure = lock(&self.failures).remove(name);
        match failure {
            Some(Failure::Status(status, body)) => {
                return Err(match body {
                    Some(body) => (status, Json(body)).into_response(),
                    None => status.into_response(),
                });
            }
            Some(Failure::Hang(duration)) => {
                tokio::time::sleep(duration).await;
                return Err(StatusCode::GATEWAY_TIMEOUT.into_response());
            }
            None => {}
        }

        if protected {
            let token = authorization
                .as_deref()
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(ToString::to_string);
            let valid = token.is_some_and(|t| lock(&self.valid_tokens).contains(&t));
            if !valid {
                return Err((
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"detail": "Authentication credentials were not provided."})),
                )
                    .into_response());
            }
        }
        Ok(())
    }

    fn cart_json(&self) -> Value {
        let cart = lock(&self.cart);
        let total_quantity: i64 = cart
            .lines
            .iter()
            .filter_map(|l| l["quantity"].as_i64())
            .sum();
        let total_fen: i64 = cart.lines.iter().map(line_total_fen).sum();
        json!({
            "id": 1,
            "items": cart.lines,
            "total_price": fen_to_string(total_fen),
            "total_quantity": total_quantity,
            "user": 1,
            "session_key": null,
            "created_at": "2024-05-01T09:00:00+08:00",
            "updated_at": "2024-05-01T09:00:00+08:00"
        })
    }
}

fn unit_price_fen(product_id: i64) -> i64 {
    match product_id {
        1 => 1200,
        2 => 850,
        _ => 1000,
    }
}

fn fen_to_string(fen: i64) -> String {
    format!("{}.{:02}", fen / 100, fen % 100)
}

fn line_total_fen(line: &Value) -> i64 {
    let product = line["product"].as_i64().unwrap_or_default();
    unit_price_fen(product) * line["quantity"].as_i64().unwrap_or_default()
}

fn cart_line(id: i64, product: i64, sku: Option<i64>, quantity: i64, options: &Value) -> Value {
    let unit = unit_price_fen(product);
    json!({
        "id": id,
        "cart": 1,
        "product": product,
        "sku": sku,
        "quantity": quantity,
        "attribute_options": options,
        "customization": "",
        "unit_price": fen_to_string(unit),
        "product_name": format!("Product {product}"),
        "product_image": format!("/media/products/{product}.png"),
        "sku_info": sku.map(|id| json!({"id": id, "specifications": [{"name": "Size", "value": "Large"}]})),
        "total_price": fen_to_string(unit * quantity),
        "created_at": "2024-05-01T09:00:00+08:00",
        "updated_at": "2024-05-01T09:00:00+08:00"
    })
}

type AppState = State<Arc<BackendState>>;

macro_rules! enter {
    ($state:expr, $name:expr, $headers:expr, $protected:expr) => {
        if let Err(response) = $state.enter($name, &$headers, $protected).await {
            return response;
        }
    };
}

// =============================================================================
// Auth handlers
// =============================================================================

async fn login(State(state): AppState, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    enter!(state, endpoint::LOGIN, headers, false);
    if body["username"] != USERNAME || body["password"] != PASSWORD {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"non_field_errors": ["Unable to log in with provided credentials."]})),
        )
            .into_response();
    }
    lock(&state.valid_tokens).push(ACCESS_TOKEN.to_string());
    let user = lock(&state.identity).clone();
    Json(json!({
        "user": user,
        "refresh": REFRESH_TOKEN,
        "access": ACCESS_TOKEN,
        "message": "Login successful"
    }))
    .into_response()
}

async fn register(State(state): AppState, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    enter!(state, endpoint::REGISTER, headers, false);
    if body["password"] != body["password2"] {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"password": ["Passwords do not match."]})),
        )
            .into_response();
    }
    (
        StatusCode::CREATED,
        Json(json!({
            "user": {"id": 2, "username": body["username"], "user_type": body["user_type"]},
            "refresh": "refresh-new",
            "access": "access-new",
            "message": "Registration successful"
        })),
    )
        .into_response()
}

async fn me(State(state): AppState, headers: HeaderMap) -> Response {
    enter!(state, endpoint::ME, headers, true);
    Json(lock(&state.identity).clone()).into_response()
}

async fn profile_update(
    State(state): AppState,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    enter!(state, endpoint::PROFILE_UPDATE, headers, true);
    let mut identity = lock(&state.identity);
    let mut returned = serde_json::Map::new();
    for field in ["first_name", "last_name", "email", "phone", "avatar"] {
        if let Some(value) = body.get(field) {
            identity[field] = value.clone();
        }
        returned.insert(field.to_string(), identity[field].clone());
    }
    Json(Value::Object(returned)).into_response()
}

async fn change_password(
    State(state): AppState,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    enter!(state, endpoint::CHANGE_PASSWORD, headers, true);
    if body["old_password"] != PASSWORD {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"old_password": ["Wrong password."]})),
        )
            .into_response();
    }
    Json(json!({"message": "Password changed"})).into_response()
}

async fn logout(State(state): AppState, headers: HeaderMap) -> Response {
    enter!(state, endpoint::LOGOUT, headers, true);
    Json(json!({"message": "Logged out"})).into_response()
}

async fn token_refresh(
    State(state): AppState,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    enter!(state, endpoint::TOKEN_REFRESH, headers, false);
    if body["refresh"] != REFRESH_TOKEN {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Token is invalid or expired"})),
        )
            .into_response();
    }
    lock(&state.valid_tokens).push(REFRESHED_ACCESS_TOKEN.to_string());
    Json(json!({"access": REFRESHED_ACCESS_TOKEN})).into_response()
}

// =============================================================================
// Cart handlers
// =============================================================================

async fn my_cart(State(state): AppState, headers: HeaderMap) -> Response {
    enter!(state, endpoint::MY_CART, headers, true);
    Json(state.cart_json()).into_response()
}

async fn add_item(State(state): AppState, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    enter!(state, endpoint::ADD_ITEM, headers, true);
    let Some(product) = body["product_id"].as_i64() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"product_id": ["This field is required."]})),
        )
            .into_response();
    };
    let sku = body["sku_id"].as_i64();
    let quantity = body["quantity"].as_i64().unwrap_or(1);
    let options = body
        .get("attribute_option_ids")
        .cloned()
        .unwrap_or_else(|| json!([]));

    let mut cart = lock(&state.cart);
    let existing = cart.lines.iter_mut().find(|line| {
        line["product"] == product && line["sku"] == json!(sku) && line["attribute_options"] == options
    });
    let line = if let Some(line) = existing {
        let quantity = line["quantity"].as_i64().unwrap_or_default() + quantity;
        *line = cart_line(line["id"].as_i64().unwrap_or_default(), product, sku, quantity, &options);
        line.clone()
    } else {
        let id = cart.next_line_id;
        cart.next_line_id += 1;
        let line = cart_line(id, product, sku, quantity, &options);
        cart.lines.push(line.clone());
        line
    };
    (StatusCode::CREATED, Json(line)).into_response()
}

async fn update_item(
    State(state): AppState,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    enter!(state, endpoint::UPDATE_ITEM, headers, true);
    let Some(quantity) = body["quantity"].as_i64().filter(|q| *q >= 1) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"quantity": ["Ensure this value is greater than or equal to 1."]})),
        )
            .into_response();
    };
    let mut cart = lock(&state.cart);
    let Some(line) = cart.lines.iter_mut().find(|line| line["id"] == id) else {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response();
    };
    let product = line["product"].as_i64().unwrap_or_default();
    let sku = line["sku"].as_i64();
    let options = line["attribute_options"].clone();
    *line = cart_line(id, product, sku, quantity, &options);
    Json(line.clone()).into_response()
}

async fn remove_item(State(state): AppState, Path(id): Path<i64>, headers: HeaderMap) -> Response {
    enter!(state, endpoint::REMOVE_ITEM, headers, true);
    let mut cart = lock(&state.cart);
    let before = cart.lines.len();
    cart.lines.retain(|line| line["id"] != id);
    if cart.lines.len() == before {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn clear_cart(State(state): AppState, headers: HeaderMap) -> Response {
    enter!(state, endpoint::CLEAR_CART, headers, true);
    lock(&state.cart).lines.clear();
    Json(json!({"message": "Cart cleared"})).into_response()
}

// =============================================================================
// Catalog handlers
// =============================================================================

fn shop_json(id: i64) -> Value {
    json!({
        "id": id,
        "name": format!("Shop {id}"),
        "description": "Tea and coffee",
        "address": format!("{id} Main Street"),
        "phone": "010-12345678",
        "shop_type": "cafe",
        "is_active": true,
        "allow_delivery": true,
        "allow_pickup": true,
        "allow_dine_in": true,
        "delivery_fee": "5.00",
        "minimum_order_amount": "20.00",
        "logo": null,
        "banner": null
    })
}

async fn shops(
    State(state): AppState,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    enter!(state, endpoint::SHOPS, headers, false);
    let all = vec![shop_json(1), shop_json(2)];
    let results: Vec<Value> = match query.get("search") {
        Some(search) => all
            .into_iter()
            .filter(|s| s["name"].as_str().is_some_and(|n| n.contains(search.as_str())))
            .collect(),
        None => all,
    };
    Json(json!({"count": results.len(), "next": null, "previous": null, "results": results}))
        .into_response()
}

async fn shop(State(state): AppState, Path(id): Path<i64>, headers: HeaderMap) -> Response {
    enter!(state, endpoint::SHOP, headers, false);
    if !(1..=2).contains(&id) {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response();
    }
    Json(shop_json(id)).into_response()
}

async fn current_shops(State(state): AppState, headers: HeaderMap) -> Response {
    enter!(state, endpoint::CURRENT_SHOPS, headers, true);
    Json(json!([shop_json(1)])).into_response()
}

async fn categories(
    State(state): AppState,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    enter!(state, endpoint::CATEGORIES, headers, false);
    if query.get("shop_id").is_none() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "shop_id is required"})),
        )
            .into_response();
    }
    Json(json!([
        {"id": 1, "name": "Tea", "sort_order": 1, "products_count": 1},
        {"id": 2, "name": "Coffee", "sort_order": 2, "products_count": 1}
    ]))
    .into_response()
}

async fn products(
    State(state): AppState,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    enter!(state, endpoint::PRODUCTS, headers, false);
    let all = vec![
        json!({"id": 1, "name": "Milk Tea", "category": 1, "category_name": "Tea",
               "base_price": "12.00", "min_price": "12.00", "max_price": "15.00",
               "main_image": null, "status": "active", "is_featured": true, "has_variants": true}),
        json!({"id": 2, "name": "Americano", "category": 2, "category_name": "Coffee",
               "base_price": "8.50", "min_price": null, "max_price": null,
               "main_image": null, "status": "active", "is_featured": false, "has_variants": false}),
    ];
    let results: Vec<Value> = match query.get("category").and_then(|c| c.parse::<i64>().ok()) {
        Some(category) => all.into_iter().filter(|p| p["category"] == category).collect(),
        None => all,
    };
    Json(json!({"count": results.len(), "next": null, "previous": null, "results": results}))
        .into_response()
}

async fn product(State(state): AppState, Path(id): Path<i64>, headers: HeaderMap) -> Response {
    enter!(state, endpoint::PRODUCT, headers, false);
    if id != 1 {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response();
    }
    Json(json!({
        "id": 1,
        "name": "Milk Tea",
        "description": "Black tea with milk",
        "category": {"id": 1, "name": "Tea"},
        "base_price": "12.00",
        "main_image": null,
        "skus": [
            {"id": 10, "sku_code": "MT-M", "price": "12.00", "stock_quantity": 50, "is_in_stock": true},
            {"id": 11, "sku_code": "MT-L", "price": "15.00", "stock_quantity": 0, "is_in_stock": false}
        ],
        "attributes": [{
            "id": 3,
            "name": "Sweetness",
            "attribute_type": "select",
            "is_required": true,
            "options": [
                {"id": 30, "value": "Full", "additional_price": "0.00"},
                {"id": 31, "value": "Half", "additional_price": "0.00"}
            ]
        }]
    }))
    .into_response()
}

// =============================================================================
// Order handlers
// =============================================================================

async fn create_order(
    State(state): AppState,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    enter!(state, endpoint::CREATE_ORDER, headers, true);
    let (total_fen, items_count) = {
        let mut cart = lock(&state.cart);
        let total: i64 = cart.lines.iter().map(line_total_fen).sum();
        let count = cart.lines.len();
        cart.lines.clear();
        (total, count)
    };

    let mut orders = lock(&state.orders);
    let id = orders.next_id;
    orders.next_id += 1;
    let order = json!({
        "id": id,
        "order_number": format!("ZD{id:08}"),
        "status": "pending",
        "order_type": body["order_type"],
        "subtotal": fen_to_string(total_fen),
        "delivery_fee": "0.00",
        "discount_amount": "0.00",
        "total_amount": fen_to_string(total_fen),
        "customer_name": body["customer_name"],
        "customer_phone": body["customer_phone"],
        "items_count": items_count,
        "items": [],
        "created_at": "2024-05-01T12:00:00+08:00"
    });
    orders.orders.push(order.clone());
    (StatusCode::CREATED, Json(order)).into_response()
}

async fn my_orders(State(state): AppState, headers: HeaderMap) -> Response {
    enter!(state, endpoint::MY_ORDERS, headers, true);
    let orders = lock(&state.orders).orders.clone();
    Json(json!({"count": orders.len(), "next": null, "previous": null, "results": orders}))
        .into_response()
}

async fn order(State(state): AppState, Path(id): Path<i64>, headers: HeaderMap) -> Response {
    enter!(state, endpoint::ORDER, headers, true);
    let orders = lock(&state.orders);
    match orders.orders.iter().find(|o| o["id"] == id) {
        Some(order) => Json(order.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response(),
    }
}

async fn cancel_order(State(state): AppState, Path(id): Path<i64>, headers: HeaderMap) -> Response {
    enter!(state, endpoint::CANCEL_ORDER, headers, true);
    let mut orders = lock(&state.orders);
    let Some(order) = orders.orders.iter_mut().find(|o| o["id"] == id) else {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response();
    };
    if !matches!(order["status"].as_str(), Some("pending" | "paid" | "confirmed")) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Order can no longer be cancelled"})),
        )
            .into_response();
    }
    order["status"] = json!("cancelled");
    Json(order.clone()).into_response()
}

async fn create_payment(
    State(state): AppState,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    enter!(state, endpoint::CREATE_PAYMENT, headers, true);
    let orders = lock(&state.orders);
    let Some(order) = orders.orders.iter().find(|o| o["id"] == body["order_id"]) else {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "Not found."}))).into_response();
    };
    if order["status"] != "pending" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Order status does not allow payment"})),
        )
            .into_response();
    }
    Json(json!({
        "transaction_id": 9001,
        "transaction_no": format!("PAY{}", order["order_number"].as_str().unwrap_or_default()),
        "payment_data": {"appId": "wx-test", "package": "prepay_id=wx123", "signType": "RSA"}
    }))
    .into_response()
}

fn router(state: Arc<BackendState>) -> Router {
    let api = Router::new()
        .route("/auth/login/", post(login))
        .route("/auth/register/", post(register))
        .route("/auth/me/", get(me))
        .route("/auth/profile/update/", patch(profile_update))
        .route("/auth/change-password/", post(change_password))
        .route("/auth/logout/", post(logout))
        .route("/auth/token/refresh/", post(token_refresh))
        .route("/orders/carts/my_cart/", get(my_cart))
        .route("/orders/carts/add_item/", post(add_item))
        .route(
            "/orders/carts/items/{id}/",
            patch(update_item).delete(remove_item),
        )
        .route("/orders/carts/clear/", post(clear_cart))
        .route("/shops/", get(shops))
        .route("/shops/current/", get(current_shops))
        .route("/shops/{id}/", get(shop))
        .route("/products/categories/", get(categories))
        .route("/products/public/products/", get(products))
        .route("/products/products/{id}/", get(product))
        .route("/orders/orders/", post(create_order))
        .route("/orders/orders/my_orders/", get(my_orders))
        .route("/orders/orders/{id}/", get(order))
        .route("/orders/orders/{id}/cancel/", post(cancel_order))
        .route("/payments/transactions/create_payment/", post(create_payment));

    Router::new().nest("/api", api).with_state(state)
}

// =============================================================================
// FakeBackend
// =============================================================================

/// An ordering API served from the test process.
pub struct FakeBackend {
    addr: SocketAddr,
    state: Arc<BackendState>,
    server: JoinHandle<()>,
}

impl FakeBackend {
    /// Start serving on an ephemeral port.
    pub async fn start() -> Self {
        let state = Arc::new(BackendState::new());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(Arc::clone(&state));
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            addr,
            state,
            server,
        }
    }

    /// Base URL of the API, e.g. `http://127.0.0.1:41234/api`.
    #[must_use]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}/api", self.addr)).unwrap()
    }

    /// Client configuration pointed at this backend.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(self.base_url())
    }

    /// A client with fresh in-memory storage.
    #[must_use]
    pub fn client(&self) -> (Zdrink, Arc<MemoryStorage>) {
        self.client_with(self.config(), Arc::new(MemoryStorage::new()))
    }

    /// A client over `storage`.
    #[must_use]
    pub fn client_with(
        &self,
        config: ClientConfig,
        storage: Arc<MemoryStorage>,
    ) -> (Zdrink, Arc<MemoryStorage>) {
        let shared: Arc<dyn TokenStorage> = Arc::clone(&storage) as Arc<dyn TokenStorage>;
        let app = Zdrink::new(config, shared).unwrap();
        (app, storage)
    }

    /// Number of calls made to `endpoint`.
    #[must_use]
    pub fn calls(&self, endpoint: &str) -> usize {
        lock(&self.state.calls).get(endpoint).copied().unwrap_or(0)
    }

    /// Calls per endpoint so far.
    #[must_use]
    pub fn all_calls(&self) -> BTreeMap<&'static str, usize> {
        lock(&self.state.calls).clone()
    }

    /// Forget recorded calls and headers.
    pub fn reset_calls(&self) {
        lock(&self.state.calls).clear();
        lock(&self.state.auth_headers).clear();
    }

    /// `Authorization` header sent with the most recent call to `endpoint`.
    #[must_use]
    pub fn last_authorization(&self, endpoint: &str) -> Option<String> {
        lock(&self.state.auth_headers)
            .iter()
            .rev()
            .find(|(name, _)| *name == endpoint)
            .and_then(|(_, value)| value.clone())
    }

    /// Fail the next call to `endpoint`.
    pub fn fail_next(&self, endpoint: &'static str, failure: Failure) {
        lock(&self.state.failures).insert(endpoint, failure);
    }

    /// Fail the next call to `endpoint` with `status` and `body`.
    pub fn fail_next_with(&self, endpoint: &'static str, status: u16, body: Option<Value>) {
        let status = StatusCode::from_u16(status).unwrap();
        self.fail_next(endpoint, Failure::Status(status, body));
    }

    /// Make every access token issued so far invalid.
    pub fn revoke_tokens(&self) {
        lock(&self.state.valid_tokens).clear();
    }

    /// Server-side cart lines.
    #[must_use]
    pub fn server_cart_lines(&self) -> Vec<Value> {
        lock(&self.state.cart).lines.clone()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Start a backend and a client signed in as [`USERNAME`], with call
/// counters reset after the login.
pub async fn signed_in() -> (FakeBackend, Zdrink, Arc<MemoryStorage>) {
    let backend = FakeBackend::start().await;
    let (app, storage) = backend.client();
    app.session()
        .login(&LoginCredentials::new(USERNAME, PASSWORD))
        .await
        .unwrap();
    backend.reset_calls();
    (backend, app, storage)
}

/// Events published so far, without waiting.
pub fn drain_events(events: &mut broadcast::Receiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}
