use std::net::TcpListener;

use bistro_config::AppConfig;
use bistro_gateway::GatewayServer;
use serde_json::{Value, json};

/// Pick a random available port.
fn random_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind to random port");
    listener.local_addr().unwrap().port()
}

/// A config serving on `port` over a fresh in-memory store.
fn test_config(port: u16) -> AppConfig {
    let mut config = AppConfig::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = port;
    config.database.url = "sqlite::memory:".to_string();
    config.auth.admin_secret = "test-secret".to_string();
    config
}

/// Start the gateway in the background and return its base URL.
async fn start_test_gateway(config: AppConfig) -> String {
    let port = config.server.port;
    tokio::spawn(async move {
        let server = GatewayServer::new(config);
        let _ = server.run().await;
    });

    // Wait for the server to be ready
    for _ in 0..50 {
        if TcpListener::bind(format!("127.0.0.1:{port}")).is_err() {
            break; // port is in use = server is up
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    format!("http://127.0.0.1:{port}")
}

async fn post(client: &reqwest::Client, url: String, body: Value) -> (u16, Value) {
    let resp = client.post(url).json(&body).send().await.expect("post failed");
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn health_endpoint_reports_connected_store() {
    let base = start_test_gateway(test_config(random_port())).await;

    let resp = reqwest::get(format!("{base}/health"))
        .await
        .expect("health request failed");
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "OK");
    assert_eq!(body["database"], "connected");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn api_catalogue_lists_endpoints() {
    let base = start_test_gateway(test_config(random_port())).await;

    let body: Value = reqwest::get(format!("{base}/api"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["endpoints"]["auth"]["login"], "POST /api/auth/login");
}

#[tokio::test]
async fn cart_to_order_flow() {
    let base = start_test_gateway(test_config(random_port())).await;
    let client = reqwest::Client::new();

    let (status, login) = post(
        &client,
        format!("{base}/api/auth/login"),
        json!({"name": "Jane Roe", "cellphone": "+15550100"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(login["success"], true);
    assert_eq!(login["user"]["name"], "jane roe");
    let user_id = login["user"]["id"].as_str().unwrap().to_string();

    let products: Value = client
        .get(format!("{base}/api/products?search=beef"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let burger = &products["products"][0];
    assert_eq!(burger["name"], "Beef Burger");
    let product_id = burger["id"].as_str().unwrap();

    let (status, added) = post(
        &client,
        format!("{base}/api/cart/add"),
        json!({"userId": user_id, "productId": product_id, "quantity": 2}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(added["cart"]["totalAmount"], 25.98);

    let (status, created) = post(
        &client,
        format!("{base}/api/orders/create"),
        json!({"userId": user_id, "notes": "extra pickles"}),
    )
    .await;
    assert_eq!(status, 201);
    assert_eq!(created["order"]["status"], "pending");
    assert_eq!(created["order"]["totalAmount"], 25.98);

    let cart: Value = client
        .get(format!("{base}/api/cart/{user_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cart["cart"]["items"], json!([]));
    assert_eq!(cart["cart"]["totalAmount"], 0.0);

    let orders: Value = client
        .get(format!("{base}/api/orders/user/{user_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(orders["orders"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn add_to_cart_rejects_non_positive_quantity() {
    let base = start_test_gateway(test_config(random_port())).await;
    let client = reqwest::Client::new();

    let (status, body) = post(
        &client,
        format!("{base}/api/cart/add"),
        json!({"userId": "a", "productId": "b", "quantity": 0}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn create_admin_requires_secret_and_unlocks_admin_routes() {
    let base = start_test_gateway(test_config(random_port())).await;
    let client = reqwest::Client::new();

    let (status, _) = post(
        &client,
        format!("{base}/api/auth/create-admin"),
        json!({"name": "Chef", "cellphone": "+15550111", "adminSecret": "wrong"}),
    )
    .await;
    assert_eq!(status, 403);

    let (status, created) = post(
        &client,
        format!("{base}/api/auth/create-admin"),
        json!({"name": "Chef", "cellphone": "+15550111", "adminSecret": "test-secret"}),
    )
    .await;
    assert_eq!(status, 201);
    assert_eq!(created["user"]["type"], "admin");
    let admin_id = created["user"]["id"].as_str().unwrap().to_string();

    let (status, product) = post(
        &client,
        format!("{base}/api/admin/{admin_id}/products"),
        json!({"name": "Soup of the Day", "description": "Ask your server", "price": 5.5, "category": "Starters"}),
    )
    .await;
    assert_eq!(status, 201);
    assert_eq!(product["product"]["available"], true);

    let dashboard: Value = client
        .get(format!("{base}/api/admin/{admin_id}/dashboard"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(dashboard["stats"]["totalProducts"], 16);
}

#[tokio::test]
async fn admin_routes_reject_unknown_user() {
    let base = start_test_gateway(test_config(random_port())).await;

    let resp = reqwest::get(format!(
        "{base}/api/admin/{}/orders",
        "0123456789abcdef0123456789abcdef"
    ))
    .await
    .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}
