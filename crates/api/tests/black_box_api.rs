use reqwest::StatusCode;
use serde_json::{json, Value as JsonValue};

use storefront_infra::Engine;

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory store, ephemeral port.
        let app = storefront_api::app::build_app(Engine::in_memory());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    async fn post(&self, path: &str, body: JsonValue) -> (StatusCode, JsonValue) {
        let res = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        read(res).await
    }

    async fn get(&self, path: &str) -> (StatusCode, JsonValue) {
        let res = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap();
        read(res).await
    }

    async fn delete(&self, path: &str) -> (StatusCode, JsonValue) {
        let res = self
            .client
            .delete(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap();
        read(res).await
    }

    async fn create_product(&self, slug: &str, price: u64, stock: i64) -> String {
        let (status, body) = self
            .post(
                "/products",
                json!({ "slug": slug, "name": slug, "price": price, "initialStock": stock }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create product failed: {body}");
        body["id"].as_str().unwrap().to_string()
    }

    async fn order(&self, customer_id: Option<&str>, product_id: &str, quantity: i64) -> (StatusCode, JsonValue) {
        self.post(
            "/orders",
            json!({
                "customerId": customer_id,
                "lines": [{ "productId": product_id, "quantity": quantity }],
                "shipping": { "city": "Karachi" },
            }),
        )
        .await
    }

    async fn stock(&self, product_id: &str) -> JsonValue {
        let (status, body) = self.get(&format!("/products/{product_id}/stock")).await;
        assert_eq!(status, StatusCode::OK);
        body
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn read(res: reqwest::Response) -> (StatusCode, JsonValue) {
    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    let body = if text.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_str(&text).unwrap_or(JsonValue::String(text))
    };
    (status, body)
}

#[tokio::test]
async fn health_endpoint_is_public() {
    let srv = TestServer::spawn().await;
    let (status, _) = srv.get("/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn checkout_restock_checkout_over_http() {
    let srv = TestServer::spawn().await;
    let id = srv.create_product("esp32-cam", 1299, 5).await;

    let (status, order) = srv.order(None, &id, 5).await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["total"], 5 * 1299);
    assert_eq!(order["status"], "pending");
    assert_eq!(srv.stock(&id).await, json!({ "productId": id, "quantity": 0, "inStock": false }));

    let (status, err) = srv.order(None, &id, 1).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["kind"], "insufficient_stock");
    assert_eq!(err["productId"], json!(id));

    let (status, snap) = srv
        .post("/admin/stock/restock", json!({ "productId": id, "delta": 10 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snap["quantity"], 10);
    assert_eq!(snap["inStock"], true);

    let (status, _) = srv.order(None, &id, 3).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(srv.stock(&id).await["quantity"], 7);
}

#[tokio::test]
async fn order_status_and_admin_delete() {
    let srv = TestServer::spawn().await;
    let id = srv.create_product("servo-mg90", 450, 3).await;

    let (_, order) = srv.order(None, &id, 2).await;
    let order_id = order["id"].as_str().unwrap().to_string();

    let (status, updated) = srv
        .post(&format!("/orders/{order_id}/status"), json!({ "status": "shipped" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "shipped");

    let (status, err) = srv
        .post(&format!("/orders/{order_id}/status"), json!({ "status": "pending" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(err["kind"], "invalid_transition");

    let (status, err) = srv.delete(&format!("/products/{id}")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["kind"], "product_in_use");

    let (status, _) = srv.delete(&format!("/admin/orders/{order_id}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = srv.get(&format!("/orders/{order_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Deletion does not give the stock back.
    assert_eq!(srv.stock(&id).await["quantity"], 1);
}

#[tokio::test]
async fn admin_correction_and_forced_availability() {
    let srv = TestServer::spawn().await;
    let id = srv.create_product("lipo-battery", 2100, 4).await;

    let (status, snap) = srv
        .post("/admin/stock/correct", json!({ "productId": id, "quantity": 0 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snap["inStock"], false);

    let (status, snap) = srv
        .post(
            "/admin/stock/set",
            json!({ "productId": id, "quantity": 0, "inStock": true }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snap["inStock"], true);

    let (status, err) = srv
        .post("/admin/stock/correct", json!({ "productId": id, "quantity": -1 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["kind"], "validation_error");
}

#[tokio::test]
async fn reviews_are_unique_and_verified_from_history() {
    let srv = TestServer::spawn().await;
    let id = srv.create_product("logic-analyzer", 3900, 2).await;
    let buyer = "0190e1b2-7c3a-7000-8000-00000000beef";

    let (status, _) = srv.order(Some(buyer), &id, 1).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, review) = srv
        .post(
            "/reviews/logic-analyzer",
            json!({ "customerEmail": "Buyer@Example.com", "rating": 5, "comment": "Works", "customerId": buyer }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{review}");
    assert_eq!(review["verifiedPurchase"], true);
    assert_eq!(review["customerEmail"], "buyer@example.com");

    let (status, err) = srv
        .post(
            "/reviews/logic-analyzer",
            json!({ "customerEmail": "buyer@example.com", "rating": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["kind"], "duplicate_review");

    let (status, review) = srv
        .post(
            "/reviews/logic-analyzer",
            json!({ "customerEmail": "someone@example.com", "rating": 3 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(review["verifiedPurchase"], false);

    let (status, list) = srv.get("/reviews/logic-analyzer").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 2);

    let (status, err) = srv
        .post("/reviews/logic-analyzer", json!({ "customerEmail": "x@example.com", "rating": 9 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["kind"], "validation_error");
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let srv = TestServer::spawn().await;
    let missing = "0190e1b2-7c3a-7000-8000-000000000000";

    let (status, err) = srv.get(&format!("/products/{missing}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["kind"], "not_found");

    let (status, err) = srv.order(None, missing, 1).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["kind"], "not_found");

    let (status, _) = srv.get("/reviews/no-such-product").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
