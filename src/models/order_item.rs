use crate::models::product::Product;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Immutable line item. `price` is captured at order time and does not
/// follow later product price changes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
  pub id: i64,
  pub order_id: i64,
  pub product_id: i64,
  pub quantity: i32,
  pub price: f64,
  pub created_at: DateTime<Utc>,
}

/// Line item left-joined with the current product snapshot; product is null
/// when the product has been deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemWithProduct {
  #[serde(flatten)]
  pub item: OrderItem,
  pub product: Option<Product>,
}
