use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
  pub id: i64,
  pub name: String,
  pub description: String,
  pub price: f64,
  pub sale_price: Option<f64>,
  /// Ordered list of image URLs, stored as JSONB.
  pub images: Option<Json<Vec<String>>>,
  pub category_id: Option<i64>,
  pub age_range: Option<String>,
  pub stock_quantity: i32,
  pub vendor: String,
  pub is_combo: bool,
  pub save_amount: Option<f64>,
  pub created_at: DateTime<Utc>,
}

impl Product {
  /// Price a cart line is charged at: sale price when one is set (a zero
  /// sale price falls back to the list price).
  pub fn effective_price(&self) -> f64 {
    match self.sale_price {
      Some(sale) if sale != 0.0 => sale,
      _ => self.price,
    }
  }
}
