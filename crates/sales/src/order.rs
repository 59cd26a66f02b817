use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use storefront_core::{CustomerId, DomainError, DomainResult, Entity, OrderId, ProductId};
use storefront_products::Product;

/// Order status lifecycle.
///
/// Forward-only `pending → processing → shipped → delivered`; `cancelled` is
/// reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    fn rank(self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Processing => 1,
            OrderStatus::Shipped => 2,
            OrderStatus::Delivered => 3,
            OrderStatus::Cancelled => u8::MAX,
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            OrderStatus::Cancelled => true,
            _ => next.rank() > self.rank(),
        }
    }

    pub fn transition(self, next: OrderStatus) -> DomainResult<OrderStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::invalid_transition(format!(
                "{} -> {}",
                self.as_str(),
                next.as_str()
            )))
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| DomainError::validation(format!("unknown order status '{s}'")))
    }
}

/// Order line with the unit price captured at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_slug: String,
    pub quantity: i64,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
}

impl OrderItem {
    /// Capture the product's current effective price.
    pub fn capture(product: &Product, quantity: i64) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        Ok(Self {
            product_id: product.id_typed(),
            product_slug: product.slug().to_string(),
            quantity,
            unit_price: product.effective_price(),
        })
    }

    pub fn line_total(&self) -> DomainResult<u64> {
        u64::try_from(self.quantity)
            .ok()
            .and_then(|q| q.checked_mul(self.unit_price))
            .ok_or_else(|| DomainError::validation("line total overflow"))
    }
}

/// Placed order with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    order_number: String,
    customer_id: Option<CustomerId>,
    status: OrderStatus,
    total: u64,
    items: Vec<OrderItem>,
    shipping: JsonValue,
    billing: JsonValue,
    created_at: DateTime<Utc>,
}

impl Order {
    /// Build a new pending order; the total is computed from the captured prices.
    pub fn place(
        id: OrderId,
        customer_id: Option<CustomerId>,
        items: Vec<OrderItem>,
        shipping: JsonValue,
        billing: JsonValue,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if items.is_empty() {
            return Err(DomainError::validation("order must contain at least one item"));
        }

        let mut total: u64 = 0;
        for item in &items {
            total = total
                .checked_add(item.line_total()?)
                .ok_or_else(|| DomainError::validation("order total overflow"))?;
        }

        Ok(Self {
            id,
            order_number: order_number(id, now),
            customer_id,
            status: OrderStatus::Pending,
            total,
            items,
            shipping,
            billing,
            created_at: now,
        })
    }

    /// Rebuild an order from persisted rows.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: OrderId,
        order_number: String,
        customer_id: Option<CustomerId>,
        status: OrderStatus,
        total: u64,
        items: Vec<OrderItem>,
        shipping: JsonValue,
        billing: JsonValue,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            order_number,
            customer_id,
            status,
            total,
            items,
            shipping,
            billing,
            created_at,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn order_number(&self) -> &str {
        &self.order_number
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn shipping(&self) -> &JsonValue {
        &self.shipping
    }

    pub fn billing(&self) -> &JsonValue {
        &self.billing
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn contains_product(&self, product_id: ProductId) -> bool {
        self.items.iter().any(|i| i.product_id == product_id)
    }

    /// Move to `next`, enforcing the lifecycle rules.
    pub fn transition_to(&mut self, next: OrderStatus) -> DomainResult<()> {
        self.status = self.status.transition(next)?;
        Ok(())
    }
}

impl Entity for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Display identifier: `ORD-<yyyymmdd>-<8 hex>` taken from the random tail of the id.
fn order_number(id: OrderId, now: DateTime<Utc>) -> String {
    let hex = id.as_uuid().simple().to_string();
    let tail = &hex[hex.len() - 8..];
    format!("ORD-{}-{}", now.format("%Y%m%d"), tail.to_ascii_uppercase())
}
