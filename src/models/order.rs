use crate::models::order_item::OrderItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: i64,
  pub user_id: String,
  pub total_amount: f64,
  pub shipping_address: String,
  pub status: String,
  pub payment_status: String,
  pub created_at: DateTime<Utc>,
}

/// Order merged with its line items, as returned by order creation and the
/// single-order fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithItems {
  #[serde(flatten)]
  pub order: Order,
  pub items: Vec<OrderItem>,
}
