use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures_util::future::try_join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::models::{CartItem, CartItemWithProduct};
use crate::state::AppState;
use crate::web::handlers::product_handlers::find_product;
use crate::web::inputs;

const CART_ITEM_COLUMNS: &str = "id, user_id, product_id, quantity, created_at";

#[derive(Debug, Deserialize)]
pub struct CartQuery {
  pub id: Option<String>,
  pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItemBody {
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub user_id: Option<Value>,
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub product_id: Option<Value>,
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub quantity: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartItemBody {
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub quantity: Option<Value>,
}

async fn find_cart_item(pool: &PgPool, id: i64) -> Result<Option<CartItem>, AppError> {
  let sql = format!("SELECT {} FROM cart_items WHERE id = $1", CART_ITEM_COLUMNS);
  let item = sqlx::query_as::<_, CartItem>(&sql)
    .bind(id)
    .fetch_optional(pool)
    .await?;
  Ok(item)
}

/// Quantity for add-to-cart: a JSON integer greater than zero. No string
/// coercion here.
fn require_positive_quantity(value: Option<&Value>) -> Result<i64, AppError> {
  value
    .and_then(inputs::strict_i64)
    .filter(|q| *q > 0)
    .ok_or_else(|| AppError::validation("INVALID_QUANTITY", "Quantity must be a positive integer"))
}

/// Quantity for cart updates: required, and a non-negative JSON integer
/// (zero means "remove the row").
fn require_non_negative_quantity(value: Option<&Value>) -> Result<i64, AppError> {
  let value = match value {
    None | Some(Value::Null) => {
      return Err(AppError::validation("MISSING_QUANTITY", "Quantity is required"));
    }
    Some(value) => value,
  };
  inputs::strict_i64(value)
    .filter(|q| *q >= 0)
    .ok_or_else(|| AppError::validation("INVALID_QUANTITY", "Quantity must be a non-negative integer"))
}

#[instrument(name = "handler::get_cart", skip(app_state, query))]
pub async fn get_cart_handler(
  app_state: web::Data<AppState>,
  query: web::Query<CartQuery>,
) -> Result<HttpResponse, AppError> {
  let user_id = query
    .user_id
    .as_deref()
    .ok_or_else(|| AppError::validation("MISSING_USER_ID", "User ID is required"))?;

  let sql = format!("SELECT {} FROM cart_items WHERE user_id = $1", CART_ITEM_COLUMNS);
  let rows: Vec<CartItem> = sqlx::query_as(&sql)
    .bind(user_id)
    .fetch_all(&app_state.db_pool)
    .await?;

  if rows.is_empty() {
    return Ok(HttpResponse::Ok().json(Vec::<CartItemWithProduct>::new()));
  }

  // Attach product details concurrently; results are recombined by row.
  // A deleted product leaves the row with a null product.
  let products = try_join_all(rows.iter().map(|item| find_product(&app_state.db_pool, item.product_id))).await?;
  let cart: Vec<CartItemWithProduct> = rows
    .into_iter()
    .zip(products)
    .map(|(item, product)| CartItemWithProduct { item, product })
    .collect();

  Ok(HttpResponse::Ok().json(cart))
}

#[instrument(name = "handler::add_to_cart", skip(app_state, body))]
pub async fn add_to_cart_handler(
  app_state: web::Data<AppState>,
  body: web::Json<AddCartItemBody>,
) -> Result<HttpResponse, AppError> {
  let user_id = inputs::non_empty_string(body.user_id.as_ref())
    .ok_or_else(|| AppError::validation("MISSING_USER_ID", "User ID is required"))?;

  let product_id_value = body
    .product_id
    .as_ref()
    .filter(|v| inputs::is_truthy(v))
    .ok_or_else(|| AppError::validation("MISSING_PRODUCT_ID", "Product ID is required"))?;

  let quantity = require_positive_quantity(body.quantity.as_ref())? as i32;

  // An unresolvable product id reads as "product not found"
  let product_id = inputs::coerce_i64(product_id_value)
    .ok_or_else(|| AppError::not_found("PRODUCT_NOT_FOUND", "Product not found"))?;
  find_product(&app_state.db_pool, product_id)
    .await?
    .ok_or_else(|| AppError::not_found("PRODUCT_NOT_FOUND", "Product not found"))?;

  // One row per (user, product): an existing pair gets its quantity
  // incremented instead of a duplicate row.
  let sql = format!(
    "SELECT {} FROM cart_items WHERE user_id = $1 AND product_id = $2",
    CART_ITEM_COLUMNS
  );
  let existing: Option<CartItem> = sqlx::query_as(&sql)
    .bind(&user_id)
    .bind(product_id)
    .fetch_optional(&app_state.db_pool)
    .await?;

  if let Some(item) = existing {
    let sql = format!(
      "UPDATE cart_items SET quantity = $1 WHERE id = $2 RETURNING {}",
      CART_ITEM_COLUMNS
    );
    let updated: CartItem = sqlx::query_as(&sql)
      .bind(item.quantity + quantity)
      .bind(item.id)
      .fetch_one(&app_state.db_pool)
      .await?;

    info!(cart_item_id = updated.id, quantity = updated.quantity, "Cart item quantity incremented.");
    return Ok(HttpResponse::Ok().json(updated));
  }

  let sql = format!(
    "INSERT INTO cart_items (user_id, product_id, quantity, created_at) VALUES ($1, $2, $3, $4) RETURNING {}",
    CART_ITEM_COLUMNS
  );
  let created: CartItem = sqlx::query_as(&sql)
    .bind(user_id.trim())
    .bind(product_id)
    .bind(quantity)
    .bind(Utc::now())
    .fetch_one(&app_state.db_pool)
    .await?;

  info!(cart_item_id = created.id, product_id, "Cart item created.");
  Ok(HttpResponse::Created().json(created))
}

#[instrument(name = "handler::update_cart_item", skip(app_state, query, body))]
pub async fn update_cart_item_handler(
  app_state: web::Data<AppState>,
  query: web::Query<CartQuery>,
  body: web::Json<UpdateCartItemBody>,
) -> Result<HttpResponse, AppError> {
  let id = query
    .id
    .as_deref()
    .and_then(inputs::parse_id_param)
    .ok_or_else(|| AppError::validation("INVALID_ID", "Valid cart item ID is required"))?;

  let quantity = require_non_negative_quantity(body.quantity.as_ref())? as i32;

  find_cart_item(&app_state.db_pool, id)
    .await?
    .ok_or_else(|| AppError::not_found("CART_ITEM_NOT_FOUND", "Cart item not found"))?;

  // Quantity zero removes the row
  if quantity == 0 {
    let sql = format!("DELETE FROM cart_items WHERE id = $1 RETURNING {}", CART_ITEM_COLUMNS);
    let removed: CartItem = sqlx::query_as(&sql)
      .bind(id)
      .fetch_one(&app_state.db_pool)
      .await?;

    info!(cart_item_id = id, "Cart item removed via zero-quantity update.");
    return Ok(HttpResponse::Ok().json(json!({
      "message": "Cart item removed successfully",
      "item": removed,
    })));
  }

  let sql = format!(
    "UPDATE cart_items SET quantity = $1 WHERE id = $2 RETURNING {}",
    CART_ITEM_COLUMNS
  );
  let updated: CartItem = sqlx::query_as(&sql)
    .bind(quantity)
    .bind(id)
    .fetch_one(&app_state.db_pool)
    .await?;

  info!(cart_item_id = id, quantity, "Cart item quantity updated.");
  Ok(HttpResponse::Ok().json(updated))
}

#[instrument(name = "handler::delete_cart_items", skip(app_state, query))]
pub async fn delete_cart_items_handler(
  app_state: web::Data<AppState>,
  query: web::Query<CartQuery>,
) -> Result<HttpResponse, AppError> {
  if query.id.is_none() && query.user_id.is_none() {
    return Err(AppError::validation(
      "MISSING_PARAMETERS",
      "Either cart item ID or user ID is required",
    ));
  }

  // Delete one row by id
  if let Some(raw_id) = query.id.as_deref() {
    let id = inputs::parse_id_param(raw_id)
      .ok_or_else(|| AppError::validation("INVALID_ID", "Valid cart item ID is required"))?;

    find_cart_item(&app_state.db_pool, id)
      .await?
      .ok_or_else(|| AppError::not_found("CART_ITEM_NOT_FOUND", "Cart item not found"))?;

    let sql = format!("DELETE FROM cart_items WHERE id = $1 RETURNING {}", CART_ITEM_COLUMNS);
    let deleted: CartItem = sqlx::query_as(&sql)
      .bind(id)
      .fetch_one(&app_state.db_pool)
      .await?;

    info!(cart_item_id = id, "Cart item deleted.");
    return Ok(HttpResponse::Ok().json(json!({
      "message": "Cart item deleted successfully",
      "item": deleted,
    })));
  }

  // Clear the whole cart for a user
  let user_id = query.user_id.as_deref().unwrap();
  let deleted_count = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
    .bind(user_id)
    .execute(&app_state.db_pool)
    .await?
    .rows_affected();

  info!(user_id, deleted_count, "Cart cleared.");
  Ok(HttpResponse::Ok().json(json!({
    "message": "Cart cleared successfully",
    "deletedCount": deleted_count,
  })))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn positive_quantity_rejects_zero_negative_and_strings() {
    for value in [json!(0), json!(-2), json!("3"), json!(2.5), Value::Null] {
      let err = require_positive_quantity(Some(&value)).unwrap_err();
      assert!(matches!(err, AppError::Validation { code: "INVALID_QUANTITY", .. }));
    }
    assert!(require_positive_quantity(None).is_err());
    assert_eq!(require_positive_quantity(Some(&json!(2))).unwrap(), 2);
  }

  #[test]
  fn non_negative_quantity_distinguishes_missing_from_invalid() {
    let err = require_non_negative_quantity(None).unwrap_err();
    assert!(matches!(err, AppError::Validation { code: "MISSING_QUANTITY", .. }));

    let err = require_non_negative_quantity(Some(&Value::Null)).unwrap_err();
    assert!(matches!(err, AppError::Validation { code: "MISSING_QUANTITY", .. }));

    let err = require_non_negative_quantity(Some(&json!(-1))).unwrap_err();
    assert!(matches!(err, AppError::Validation { code: "INVALID_QUANTITY", .. }));

    let err = require_non_negative_quantity(Some(&json!("4"))).unwrap_err();
    assert!(matches!(err, AppError::Validation { code: "INVALID_QUANTITY", .. }));

    // Zero is valid here: it means "remove the row"
    assert_eq!(require_non_negative_quantity(Some(&json!(0))).unwrap(), 0);
    assert_eq!(require_non_negative_quantity(Some(&json!(4))).unwrap(), 4);
  }
}
