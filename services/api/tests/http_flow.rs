//! Drives the full router against the in-memory store.

use std::sync::Arc;

use api_lib::{
    adapters::LogNotifier,
    config::Config,
    web::{router, state::AppState},
};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use storefront_core::domain::Role;
use storefront_core::{select_gateway, InMemoryStore};
use tower::ServiceExt;

fn test_app() -> (Router, Arc<AppState>) {
    let config = Config::from_vars(|key| match key {
        "STORAGE_BACKEND" => Some("memory".to_string()),
        "SIMULATED_GATEWAY_DELAY_MS" => Some("0".to_string()),
        _ => None,
    })
    .unwrap();
    let config = Arc::new(config);
    let gateway = select_gateway(None, config.simulated_gateway_delay);
    let state = Arc::new(AppState::new(
        Arc::new(InMemoryStore::new()),
        gateway,
        Arc::new(LogNotifier),
        config,
    ));
    (router(state.clone()).unwrap(), state)
}

struct Reply {
    status: StatusCode,
    cookie: Option<String>,
    body: Value,
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    Reply {
        status,
        cookie,
        body,
    }
}

async fn signup(app: &Router, name: &str, email: &str) -> String {
    let reply = send(
        app,
        Method::POST,
        "/auth/signup",
        None,
        Some(json!({ "name": name, "email": email, "password": "secret123" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    reply.cookie.expect("signup sets the session cookie")
}

/// Signs up an admin and stocks one category with `tee-001` at 29.00, 10 in stock.
async fn stocked_store(app: &Router, state: &AppState) -> String {
    let admin = signup(app, "Store Admin", "admin@example.com").await;
    state
        .users
        .set_role("admin@example.com", Role::Admin)
        .await
        .unwrap();

    let category = send(
        app,
        Method::POST,
        "/admin/categories",
        Some(&admin),
        Some(json!({ "name": "Tees" })),
    )
    .await;
    assert_eq!(category.status, StatusCode::CREATED, "{}", category.body);

    let product = send(
        app,
        Method::POST,
        "/admin/products",
        Some(&admin),
        Some(json!({
            "name": "Tee 001",
            "price": 29,
            "stock": 10,
            "images": ["tee-001.jpg"],
            "categoryId": category.body["category"]["id"],
        })),
    )
    .await;
    assert_eq!(product.status, StatusCode::CREATED, "{}", product.body);
    assert_eq!(product.body["product"]["slug"], "tee-001");
    admin
}

async fn saved_address(app: &Router, cookie: &str) -> Value {
    let reply = send(
        app,
        Method::POST,
        "/address",
        Some(cookie),
        Some(json!({
            "name": "Alice",
            "phone": "9876543210",
            "addressLine": "12 Market Street",
            "city": "Bengaluru",
            "state": "KA",
            "pincode": "560001",
            "isDefault": true,
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
    reply.body["address"]["id"].clone()
}

#[tokio::test]
async fn signup_login_and_me() {
    let (app, _) = test_app();
    let cookie = signup(&app, "Alice", "Alice@Example.com").await;

    let me = send(&app, Method::GET, "/auth/me", Some(&cookie), None).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["user"]["email"], "alice@example.com");
    assert_eq!(me.body["user"]["role"], "user");

    let duplicate = send(
        &app,
        Method::POST,
        "/auth/signup",
        None,
        Some(json!({ "name": "Alice", "email": "alice@example.com", "password": "secret123" })),
    )
    .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let wrong = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "nope-nope" })),
    )
    .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let login = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": " ALICE@example.com ", "password": "secret123" })),
    )
    .await;
    assert_eq!(login.status, StatusCode::OK);
    let fresh = login.cookie.unwrap();

    let logout = send(&app, Method::POST, "/auth/logout", Some(&fresh), None).await;
    assert_eq!(logout.status, StatusCode::OK);
    let after = send(&app, Method::GET, "/auth/me", Some(&fresh), None).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let (app, _) = test_app();
    let reply = send(&app, Method::GET, "/cart", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["success"], false);

    let forged = send(&app, Method::GET, "/cart", Some("session=forged"), None).await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_reject_regular_users() {
    let (app, _) = test_app();
    let cookie = signup(&app, "Alice", "alice@example.com").await;
    let reply = send(
        &app,
        Method::POST,
        "/admin/categories",
        Some(&cookie),
        Some(json!({ "name": "Tees" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.body["success"], false);

    let all = send(&app, Method::GET, "/orders/admin/all", Some(&cookie), None).await;
    assert_eq!(all.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn malformed_bodies_get_the_error_envelope() {
    let (app, _) = test_app();
    let cookie = signup(&app, "Alice", "alice@example.com").await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/cart/add")
        .header(header::COOKIE, &cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"productId\":"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn cash_on_delivery_checkout_end_to_end() {
    let (app, state) = test_app();
    let admin = stocked_store(&app, &state).await;
    let alice = signup(&app, "Alice", "alice@example.com").await;

    let cart = send(
        &app,
        Method::POST,
        "/cart/add",
        Some(&alice),
        Some(json!({ "productId": "tee-001", "quantity": 2, "selectedSize": "M" })),
    )
    .await;
    assert_eq!(cart.status, StatusCode::OK);
    assert_eq!(cart.body["total"].as_f64(), Some(58.0));

    let address_id = saved_address(&app, &alice).await;
    let placed = send(
        &app,
        Method::POST,
        "/orders",
        Some(&alice),
        Some(json!({
            "items": [{ "product": "tee-001", "quantity": 2, "selectedSize": "M" }],
            "shippingAddress": address_id,
            "paymentMethod": "COD",
        })),
    )
    .await;
    assert_eq!(placed.status, StatusCode::CREATED, "{}", placed.body);
    let order = &placed.body["order"];
    assert_eq!(order["totalAmount"].as_f64(), Some(63.0));
    assert_eq!(order["paymentStatus"], "pending");
    assert_eq!(order["orderStatus"], "placed");
    assert_eq!(order["shippingAddress"]["city"], "Bengaluru");
    let order_id = order["id"].as_str().unwrap().to_string();

    let product = send(&app, Method::GET, "/products/tee-001", None, None).await;
    assert_eq!(product.body["product"]["stock"], 8);

    // The cart is not emptied by placing an order.
    let cart = send(&app, Method::GET, "/cart", Some(&alice), None).await;
    assert_eq!(cart.body["cart"].as_array().unwrap().len(), 1);

    let status_uri = format!("/orders/admin/{}/status", order_id);
    let by_owner = send(
        &app,
        Method::PUT,
        &status_uri,
        Some(&alice),
        Some(json!({ "status": "shipped" })),
    )
    .await;
    assert_eq!(by_owner.status, StatusCode::FORBIDDEN);

    let shipped = send(
        &app,
        Method::PUT,
        &status_uri,
        Some(&admin),
        Some(json!({ "status": "shipped" })),
    )
    .await;
    assert_eq!(shipped.status, StatusCode::OK);
    assert_eq!(shipped.body["order"]["orderStatus"], "shipped");

    let backwards = send(
        &app,
        Method::PUT,
        &status_uri,
        Some(&admin),
        Some(json!({ "status": "processing" })),
    )
    .await;
    assert_eq!(backwards.status, StatusCode::CONFLICT);

    let mine = send(&app, Method::GET, "/orders/myorders", Some(&alice), None).await;
    assert_eq!(mine.body["orders"].as_array().unwrap().len(), 1);

    let stranger = signup(&app, "Mallory", "mallory@example.com").await;
    let peek = send(
        &app,
        Method::GET,
        &format!("/orders/{}", order_id),
        Some(&stranger),
        None,
    )
    .await;
    assert_eq!(peek.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn short_stock_rejects_the_order() {
    let (app, state) = test_app();
    stocked_store(&app, &state).await;
    let alice = signup(&app, "Alice", "alice@example.com").await;
    let address_id = saved_address(&app, &alice).await;

    let reply = send(
        &app,
        Method::POST,
        "/orders",
        Some(&alice),
        Some(json!({
            "items": [{ "product": "tee-001", "quantity": 11 }],
            "shippingAddress": address_id,
        })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.body["success"], false);

    let product = send(&app, Method::GET, "/products/tee-001", None, None).await;
    assert_eq!(product.body["product"]["stock"], 10);
}

#[tokio::test]
async fn simulated_payment_marks_the_order_paid() {
    let (app, state) = test_app();
    stocked_store(&app, &state).await;
    let alice = signup(&app, "Alice", "alice@example.com").await;
    let address_id = saved_address(&app, &alice).await;
    let items = json!([{ "product": "tee-001", "quantity": 1 }]);

    let intent = send(
        &app,
        Method::POST,
        "/payments/create-payment-intent",
        Some(&alice),
        Some(json!({ "items": items.clone() })),
    )
    .await;
    assert_eq!(intent.status, StatusCode::OK, "{}", intent.body);
    assert_eq!(intent.body["mode"], "simulated");
    assert_eq!(intent.body["amount"].as_f64(), Some(34.0));

    let placed = send(
        &app,
        Method::POST,
        "/orders",
        Some(&alice),
        Some(json!({
            "items": items,
            "shippingAddress": address_id,
            "paymentMethod": "Card",
            "paymentInfo": { "id": intent.body["handleId"], "status": "succeeded" },
        })),
    )
    .await;
    assert_eq!(placed.status, StatusCode::CREATED, "{}", placed.body);
    assert_eq!(placed.body["order"]["paymentStatus"], "paid");
    assert_eq!(placed.body["order"]["paymentMethod"], "Card");
}

#[tokio::test]
async fn one_payment_cannot_settle_two_orders() {
    let (app, state) = test_app();
    stocked_store(&app, &state).await;
    let alice = signup(&app, "Alice", "alice@example.com").await;
    let address_id = saved_address(&app, &alice).await;

    let intent = send(
        &app,
        Method::POST,
        "/payments/create-payment-intent",
        Some(&alice),
        Some(json!({ "items": [{ "product": "tee-001", "quantity": 1 }] })),
    )
    .await;
    assert_eq!(intent.status, StatusCode::OK, "{}", intent.body);

    let order = |quantity: u32| {
        json!({
            "items": [{ "product": "tee-001", "quantity": quantity }],
            "shippingAddress": address_id,
            "paymentMethod": "Card",
            "paymentInfo": { "id": intent.body["handleId"], "status": "succeeded" },
        })
    };

    let bigger = send(&app, Method::POST, "/orders", Some(&alice), Some(order(5))).await;
    assert_eq!(bigger.status, StatusCode::BAD_REQUEST, "{}", bigger.body);

    let placed = send(&app, Method::POST, "/orders", Some(&alice), Some(order(1))).await;
    assert_eq!(placed.status, StatusCode::CREATED, "{}", placed.body);
    assert_eq!(placed.body["order"]["paymentStatus"], "paid");

    let reused = send(&app, Method::POST, "/orders", Some(&alice), Some(order(1))).await;
    assert_eq!(reused.status, StatusCode::CONFLICT, "{}", reused.body);

    let product = send(&app, Method::GET, "/products/tee-001", None, None).await;
    assert_eq!(product.body["product"]["stock"], 9);
}

#[tokio::test]
async fn profile_edits_respect_unique_emails() {
    let (app, _) = test_app();
    let alice = signup(&app, "Alice", "alice@example.com").await;
    signup(&app, "Bob", "bob@example.com").await;

    let taken = send(
        &app,
        Method::PUT,
        "/users/update",
        Some(&alice),
        Some(json!({ "name": "Alice", "email": "BOB@example.com" })),
    )
    .await;
    assert_eq!(taken.status, StatusCode::CONFLICT, "{}", taken.body);

    let updated = send(
        &app,
        Method::PUT,
        "/users/update",
        Some(&alice),
        Some(json!({ "name": "Alice Liddell", "email": " Alice.L@Example.com " })),
    )
    .await;
    assert_eq!(updated.status, StatusCode::OK, "{}", updated.body);
    assert_eq!(updated.body["user"]["name"], "Alice Liddell");
    assert_eq!(updated.body["user"]["email"], "alice.l@example.com");

    let me = send(&app, Method::GET, "/auth/me", Some(&alice), None).await;
    assert_eq!(me.body["user"]["email"], "alice.l@example.com");

    let login = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "alice.l@example.com", "password": "secret123" })),
    )
    .await;
    assert_eq!(login.status, StatusCode::OK, "{}", login.body);

    let anonymous = send(
        &app,
        Method::PUT,
        "/users/update",
        None,
        Some(json!({ "name": "Mallory", "email": "m@example.com" })),
    )
    .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_change_requires_the_current_password() {
    let (app, _) = test_app();
    let alice = signup(&app, "Alice", "alice@example.com").await;
    let change = |old: &str, new: &str| json!({ "oldPassword": old, "newPassword": new });

    let wrong = send(
        &app,
        Method::PUT,
        "/users/update-password",
        Some(&alice),
        Some(change("not-my-password", "fresh-secret")),
    )
    .await;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST, "{}", wrong.body);
    assert_eq!(wrong.body["success"], false);

    let short = send(
        &app,
        Method::PUT,
        "/users/update-password",
        Some(&alice),
        Some(change("secret123", "abc")),
    )
    .await;
    assert_eq!(short.status, StatusCode::BAD_REQUEST, "{}", short.body);

    let changed = send(
        &app,
        Method::PUT,
        "/users/update-password",
        Some(&alice),
        Some(change("secret123", "fresh-secret")),
    )
    .await;
    assert_eq!(changed.status, StatusCode::OK, "{}", changed.body);

    let login = |password: &str| {
        json!({ "email": "alice@example.com", "password": password })
    };
    let old = send(&app, Method::POST, "/auth/login", None, Some(login("secret123"))).await;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);
    let new = send(&app, Method::POST, "/auth/login", None, Some(login("fresh-secret"))).await;
    assert_eq!(new.status, StatusCode::OK, "{}", new.body);
}
