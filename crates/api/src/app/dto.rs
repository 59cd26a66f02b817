//! Request/response DTOs (camelCase JSON) and mapping to/from engine types.

use std::str::FromStr;

use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use storefront_core::{CustomerId, DomainError, OrderId, ProductId, ReviewId};
use storefront_infra::PlaceOrder;
use storefront_products::{NewProduct, Product};
use storefront_reviews::{NewReview, Review};
use storefront_sales::{Cart, CartLine, Order, OrderItem, OrderStatus};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub slug: String,
    pub name: String,
    pub price: u64,
    #[serde(default)]
    pub discount_price: Option<u64>,
    #[serde(default)]
    pub initial_stock: i64,
}

impl From<CreateProductRequest> for NewProduct {
    fn from(req: CreateProductRequest) -> Self {
        NewProduct {
            slug: req.slug,
            name: req.name,
            price: req.price,
            discount_price: req.discount_price,
            initial_stock: req.initial_stock,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub customer_id: Option<String>,
    pub lines: Vec<OrderLineRequest>,
    #[serde(default)]
    pub shipping: Option<JsonValue>,
    #[serde(default)]
    pub billing: Option<JsonValue>,
}

impl PlaceOrderRequest {
    pub fn into_command(self) -> Result<PlaceOrder, Response> {
        let customer_id = parse_optional_id::<CustomerId>(self.customer_id.as_deref())?;

        let lines = self
            .lines
            .into_iter()
            .map(|line| -> Result<CartLine, Response> {
                Ok(CartLine {
                    product_id: parse_id(&line.product_id)?,
                    quantity: line.quantity,
                })
            })
            .collect::<Result<Vec<_>, Response>>()?;
        let cart = Cart::new(lines).map_err(domain_to_response)?;

        Ok(PlaceOrder {
            customer_id,
            cart,
            shipping: self.shipping.unwrap_or(JsonValue::Null),
            billing: self.billing.unwrap_or(JsonValue::Null),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

impl UpdateStatusRequest {
    pub fn status(&self) -> Result<OrderStatus, Response> {
        self.status.parse().map_err(domain_to_response)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockRequest {
    pub product_id: String,
    pub delta: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectStockRequest {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetStockRequest {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub in_stock: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReviewRequest {
    pub customer_email: String,
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub customer_id: Option<String>,
}

impl SubmitReviewRequest {
    pub fn into_new_review(self, product_slug: String) -> Result<NewReview, Response> {
        Ok(NewReview {
            product_slug,
            customer_email: self.customer_email,
            rating: self.rating,
            comment: self.comment,
            customer_id: parse_optional_id(self.customer_id.as_deref())?,
        })
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    pub id: ProductId,
    pub slug: String,
    pub name: String,
    pub price: u64,
    pub discount_price: Option<u64>,
    pub effective_price: u64,
    pub stock_quantity: i64,
    pub in_stock: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.id_typed(),
            effective_price: p.effective_price(),
            stock_quantity: p.stock().quantity(),
            in_stock: p.stock().in_stock(),
            slug: p.slug().to_string(),
            name: p.name().to_string(),
            price: p.price(),
            discount_price: p.discount_price(),
            created_at: p.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub product_id: ProductId,
    pub product_slug: String,
    pub quantity: i64,
    pub unit_price: u64,
}

impl From<&OrderItem> for OrderItemResponse {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id,
            product_slug: item.product_slug.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: OrderId,
    pub order_number: String,
    pub customer_id: Option<CustomerId>,
    pub status: OrderStatus,
    pub total: u64,
    pub items: Vec<OrderItemResponse>,
    pub shipping: JsonValue,
    pub billing: JsonValue,
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        Self {
            id: o.id_typed(),
            order_number: o.order_number().to_string(),
            customer_id: o.customer_id(),
            status: o.status(),
            total: o.total(),
            items: o.items().iter().map(OrderItemResponse::from).collect(),
            shipping: o.shipping().clone(),
            billing: o.billing().clone(),
            created_at: o.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub id: ReviewId,
    pub product_slug: String,
    pub customer_email: String,
    pub rating: u8,
    pub comment: String,
    pub verified_purchase: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Review> for ReviewResponse {
    fn from(r: Review) -> Self {
        Self {
            id: r.id_typed(),
            product_slug: r.product_slug().to_string(),
            customer_email: r.customer_email().to_string(),
            rating: r.rating().value(),
            comment: r.comment().to_string(),
            verified_purchase: r.verified_purchase(),
            created_at: r.created_at(),
        }
    }
}

// -------------------------
// Parsing helpers
// -------------------------

pub fn parse_id<T>(raw: &str) -> Result<T, Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.trim().parse::<T>().map_err(domain_to_response)
}

fn parse_optional_id<T>(raw: Option<&str>) -> Result<Option<T>, Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.map(parse_id::<T>).transpose()
}

fn domain_to_response(err: DomainError) -> Response {
    errors::engine_error_to_response(err.into())
}
