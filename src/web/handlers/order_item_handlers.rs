use actix_web::{web, HttpResponse};
use serde::Deserialize;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::Row;
use tracing::instrument;

use crate::errors::AppError;
use crate::models::{OrderItem, OrderItemWithProduct, Product};
use crate::state::AppState;
use crate::web::inputs;

#[derive(Debug, Deserialize)]
pub struct OrderItemQuery {
  pub order_id: Option<String>,
}

const ORDER_ITEMS_WITH_PRODUCT_SQL: &str = "\
SELECT oi.id, oi.order_id, oi.product_id, oi.quantity, oi.price, oi.created_at, \
       p.id AS p_id, p.name AS p_name, p.description AS p_description, p.price AS p_price, \
       p.sale_price AS p_sale_price, p.images AS p_images, p.category_id AS p_category_id, \
       p.age_range AS p_age_range, p.stock_quantity AS p_stock_quantity, p.vendor AS p_vendor, \
       p.is_combo AS p_is_combo, p.save_amount AS p_save_amount, p.created_at AS p_created_at \
FROM order_items oi LEFT JOIN products p ON oi.product_id = p.id \
WHERE oi.order_id = $1";

fn row_to_order_item_with_product(row: &PgRow) -> Result<OrderItemWithProduct, sqlx::Error> {
  let item = OrderItem {
    id: row.try_get("id")?,
    order_id: row.try_get("order_id")?,
    product_id: row.try_get("product_id")?,
    quantity: row.try_get("quantity")?,
    price: row.try_get("price")?,
    created_at: row.try_get("created_at")?,
  };

  // A null joined id means the product has been deleted; the line item
  // survives with a null product snapshot.
  let product = match row.try_get::<Option<i64>, _>("p_id")? {
    Some(product_id) => Some(Product {
      id: product_id,
      name: row.try_get("p_name")?,
      description: row.try_get("p_description")?,
      price: row.try_get("p_price")?,
      sale_price: row.try_get("p_sale_price")?,
      images: row.try_get::<Option<Json<Vec<String>>>, _>("p_images")?,
      category_id: row.try_get("p_category_id")?,
      age_range: row.try_get("p_age_range")?,
      stock_quantity: row.try_get("p_stock_quantity")?,
      vendor: row.try_get("p_vendor")?,
      is_combo: row.try_get("p_is_combo")?,
      save_amount: row.try_get("p_save_amount")?,
      created_at: row.try_get("p_created_at")?,
    }),
    None => None,
  };

  Ok(OrderItemWithProduct { item, product })
}

#[instrument(name = "handler::get_order_items", skip(app_state, query))]
pub async fn get_order_items_handler(
  app_state: web::Data<AppState>,
  query: web::Query<OrderItemQuery>,
) -> Result<HttpResponse, AppError> {
  let raw_order_id = query
    .order_id
    .as_deref()
    .ok_or_else(|| AppError::validation("MISSING_ORDER_ID", "order_id query parameter is required"))?;
  let order_id = inputs::parse_id_param(raw_order_id)
    .ok_or_else(|| AppError::validation("INVALID_ORDER_ID", "order_id must be a valid integer"))?;

  let rows = sqlx::query(ORDER_ITEMS_WITH_PRODUCT_SQL)
    .bind(order_id)
    .fetch_all(&app_state.db_pool)
    .await?;

  let items = rows
    .iter()
    .map(row_to_order_item_with_product)
    .collect::<Result<Vec<_>, _>>()?;

  Ok(HttpResponse::Ok().json(items))
}
