use crate::models::product::Product;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
  pub id: i64,
  /// Authenticated user id or a locally generated guest id.
  pub user_id: String,
  pub product_id: i64,
  pub quantity: i32,
  pub created_at: DateTime<Utc>,
}

/// Cart row joined with its product. The product is null when it has been
/// deleted since the row was added.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItemWithProduct {
  #[serde(flatten)]
  pub item: CartItem,
  pub product: Option<Product>,
}
