use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{info, instrument, warn};

use crate::errors::AppError;
use crate::models::{Order, OrderItem, OrderWithItems};
use crate::state::AppState;
use crate::web::inputs;

const ORDER_COLUMNS: &str = "id, user_id, total_amount, shipping_address, status, payment_status, created_at";
const ORDER_ITEM_COLUMNS: &str = "id, order_id, product_id, quantity, price, created_at";

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
  pub id: Option<String>,
  pub user_id: Option<String>,
  pub limit: Option<String>,
  pub offset: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderBody {
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub user_id: Option<Value>,
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub total_amount: Option<Value>,
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub shipping_address: Option<Value>,
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub items: Option<Value>,
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub status: Option<Value>,
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub payment_status: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderBody {
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub status: Option<Value>,
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub payment_status: Option<Value>,
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub shipping_address: Option<Value>,
}

async fn find_order(pool: &PgPool, id: i64) -> Result<Option<Order>, AppError> {
  let sql = format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS);
  let order = sqlx::query_as::<_, Order>(&sql)
    .bind(id)
    .fetch_optional(pool)
    .await?;
  Ok(order)
}

#[instrument(name = "handler::get_orders", skip(app_state, query))]
pub async fn get_orders_handler(
  app_state: web::Data<AppState>,
  query: web::Query<OrderQuery>,
) -> Result<HttpResponse, AppError> {
  // Single order by id, with its line items attached
  if let Some(raw_id) = query.id.as_deref() {
    let id =
      inputs::parse_id_param(raw_id).ok_or_else(|| AppError::validation("INVALID_ID", "Valid ID is required"))?;
    let order = find_order(&app_state.db_pool, id)
      .await?
      .ok_or_else(|| AppError::not_found("ORDER_NOT_FOUND", "Order not found"))?;

    let sql = format!("SELECT {} FROM order_items WHERE order_id = $1", ORDER_ITEM_COLUMNS);
    let items: Vec<OrderItem> = sqlx::query_as(&sql)
      .bind(id)
      .fetch_all(&app_state.db_pool)
      .await?;

    return Ok(HttpResponse::Ok().json(OrderWithItems { order, items }));
  }

  // Paginated order history for a user, no items attached
  if let Some(user_id) = query.user_id.as_deref() {
    let limit = inputs::parse_limit(query.limit.as_deref(), 20);
    let offset = inputs::parse_offset(query.offset.as_deref());

    let sql = format!(
      "SELECT {} FROM orders WHERE user_id = $1 LIMIT $2 OFFSET $3",
      ORDER_COLUMNS
    );
    let orders: Vec<Order> = sqlx::query_as(&sql)
      .bind(user_id)
      .bind(limit)
      .bind(offset)
      .fetch_all(&app_state.db_pool)
      .await?;

    return Ok(HttpResponse::Ok().json(orders));
  }

  Err(AppError::validation(
    "MISSING_REQUIRED_PARAMETER",
    "Either id or user_id parameter is required",
  ))
}

#[derive(Debug, PartialEq)]
struct OrderItemInput {
  product_id: i64,
  quantity: i32,
  price: f64,
}

#[derive(Debug, PartialEq)]
struct NewOrder {
  user_id: String,
  total_amount: f64,
  shipping_address: String,
  status: String,
  payment_status: String,
  items: Vec<OrderItemInput>,
}

fn parse_order_items(value: Option<&Value>) -> Result<Vec<OrderItemInput>, AppError> {
  let items = value
    .and_then(Value::as_array)
    .filter(|items| !items.is_empty())
    .ok_or_else(|| AppError::validation("MISSING_ITEMS", "items array is required and cannot be empty"))?;

  items
    .iter()
    .map(|item| {
      let product_id = item
        .get("productId")
        .filter(|v| inputs::is_truthy(v))
        .and_then(inputs::strict_i64)
        .ok_or_else(|| AppError::validation("INVALID_ITEM_PRODUCT_ID", "Each item must have a valid productId"))?;
      let quantity = item
        .get("quantity")
        .and_then(inputs::strict_i64)
        .filter(|q| *q > 0)
        .ok_or_else(|| {
          AppError::validation("INVALID_ITEM_QUANTITY", "Each item must have a valid quantity greater than 0")
        })?;
      let price = item
        .get("price")
        .and_then(inputs::strict_f64)
        .filter(|p| *p >= 0.0)
        .ok_or_else(|| AppError::validation("INVALID_ITEM_PRICE", "Each item must have a valid price"))?;

      Ok(OrderItemInput {
        product_id,
        quantity: quantity as i32,
        price,
      })
    })
    .collect()
}

fn build_new_order(body: &CreateOrderBody) -> Result<NewOrder, AppError> {
  let user_id = inputs::non_empty_string(body.user_id.as_ref())
    .ok_or_else(|| AppError::validation("MISSING_USER_ID", "userId is required"))?;

  // totalAmount must arrive as a JSON number
  let total_amount = body
    .total_amount
    .as_ref()
    .filter(|v| inputs::is_truthy(v))
    .and_then(inputs::strict_f64)
    .ok_or_else(|| AppError::validation("MISSING_TOTAL_AMOUNT", "Valid totalAmount is required"))?;

  let shipping_address = inputs::non_empty_string(body.shipping_address.as_ref())
    .ok_or_else(|| AppError::validation("MISSING_SHIPPING_ADDRESS", "shippingAddress is required"))?;

  let items = parse_order_items(body.items.as_ref())?;

  let status = body
    .status
    .as_ref()
    .and_then(inputs::nullable_trimmed)
    .unwrap_or_else(|| "pending".to_string());
  let payment_status = body
    .payment_status
    .as_ref()
    .and_then(inputs::nullable_trimmed)
    .unwrap_or_else(|| "pending".to_string());

  Ok(NewOrder {
    user_id,
    total_amount,
    shipping_address,
    status,
    payment_status,
    items,
  })
}

#[instrument(name = "handler::create_order", skip(app_state, body))]
pub async fn create_order_handler(
  app_state: web::Data<AppState>,
  body: web::Json<CreateOrderBody>,
) -> Result<HttpResponse, AppError> {
  let new_order = build_new_order(&body)?;

  // Order and line items commit or roll back together; a crash between the
  // two inserts cannot leave an order without items.
  let mut tx = app_state.db_pool.begin().await?;

  let sql = format!(
    "INSERT INTO orders (user_id, total_amount, shipping_address, status, payment_status, created_at) \
     VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
    ORDER_COLUMNS
  );
  let order: Order = sqlx::query_as(&sql)
    .bind(&new_order.user_id)
    .bind(new_order.total_amount)
    .bind(&new_order.shipping_address)
    .bind(&new_order.status)
    .bind(&new_order.payment_status)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

  let sql = format!(
    "INSERT INTO order_items (order_id, product_id, quantity, price, created_at) \
     VALUES ($1, $2, $3, $4, $5) RETURNING {}",
    ORDER_ITEM_COLUMNS
  );
  let mut items = Vec::with_capacity(new_order.items.len());
  for input in &new_order.items {
    let item: OrderItem = sqlx::query_as(&sql)
      .bind(order.id)
      .bind(input.product_id)
      .bind(input.quantity)
      .bind(input.price)
      .bind(order.created_at)
      .fetch_one(&mut *tx)
      .await?;
    items.push(item);
  }

  tx.commit().await?;

  info!(order_id = order.id, item_count = items.len(), "Order created.");

  // Clearing the cart is a non-critical follow-up: a failure here is logged
  // and never affects the created order or the response.
  if let Err(e) = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
    .bind(&new_order.user_id)
    .execute(&app_state.db_pool)
    .await
  {
    warn!(error = %e, user_id = %new_order.user_id, "Failed to clear cart after order creation.");
  }

  Ok(HttpResponse::Created().json(OrderWithItems { order, items }))
}

#[derive(Debug, Default, PartialEq)]
struct OrderPatch {
  status: Option<String>,
  payment_status: Option<String>,
  shipping_address: Option<String>,
}

impl OrderPatch {
  fn is_empty(&self) -> bool {
    self.status.is_none() && self.payment_status.is_none() && self.shipping_address.is_none()
  }
}

fn build_order_patch(body: &UpdateOrderBody) -> Result<OrderPatch, AppError> {
  let mut patch = OrderPatch::default();

  if let Some(value) = &body.status {
    patch.status = Some(
      inputs::nullable_trimmed(value)
        .ok_or_else(|| AppError::validation("INVALID_STATUS", "Status must be a non-empty string"))?,
    );
  }
  if let Some(value) = &body.payment_status {
    patch.payment_status = Some(
      inputs::nullable_trimmed(value)
        .ok_or_else(|| AppError::validation("INVALID_PAYMENT_STATUS", "Payment status must be a non-empty string"))?,
    );
  }
  if let Some(value) = &body.shipping_address {
    patch.shipping_address = Some(inputs::nullable_trimmed(value).ok_or_else(|| {
      AppError::validation("INVALID_SHIPPING_ADDRESS", "Shipping address must be a non-empty string")
    })?);
  }

  Ok(patch)
}

fn order_update_query(patch: &OrderPatch, id: i64) -> QueryBuilder<'static, Postgres> {
  let mut qb = QueryBuilder::new("UPDATE orders SET ");
  {
    let mut fields = qb.separated(", ");
    if let Some(status) = &patch.status {
      fields.push("status = ").push_bind_unseparated(status.clone());
    }
    if let Some(payment_status) = &patch.payment_status {
      fields.push("payment_status = ").push_bind_unseparated(payment_status.clone());
    }
    if let Some(shipping_address) = &patch.shipping_address {
      fields
        .push("shipping_address = ")
        .push_bind_unseparated(shipping_address.clone());
    }
  }
  qb.push(" WHERE id = ").push_bind(id);
  qb.push(format!(" RETURNING {}", ORDER_COLUMNS));
  qb
}

#[instrument(name = "handler::update_order", skip(app_state, query, body))]
pub async fn update_order_handler(
  app_state: web::Data<AppState>,
  query: web::Query<OrderQuery>,
  body: web::Json<UpdateOrderBody>,
) -> Result<HttpResponse, AppError> {
  let id = query
    .id
    .as_deref()
    .and_then(inputs::parse_id_param)
    .ok_or_else(|| AppError::validation("INVALID_ID", "Valid ID is required"))?;

  find_order(&app_state.db_pool, id)
    .await?
    .ok_or_else(|| AppError::not_found("ORDER_NOT_FOUND", "Order not found"))?;

  let patch = build_order_patch(&body)?;
  if patch.is_empty() {
    return Err(AppError::validation("NO_UPDATES", "No valid fields to update"));
  }

  let updated: Order = order_update_query(&patch, id)
    .build_query_as()
    .fetch_one(&app_state.db_pool)
    .await?;

  info!(order_id = updated.id, status = %updated.status, "Order updated.");
  Ok(HttpResponse::Ok().json(updated))
}
