use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::models::Product;
use crate::state::AppState;
use crate::web::inputs;

const PRODUCT_COLUMNS: &str =
  "id, name, description, price, sale_price, images, category_id, age_range, stock_quantity, vendor, is_combo, save_amount, created_at";

const DEFAULT_VENDOR: &str = "Kuviyal";

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
  pub id: Option<String>,
  pub category_id: Option<String>,
  pub age_range: Option<String>,
  pub price_max: Option<String>,
  pub search: Option<String>,
  pub q: Option<String>,
  pub limit: Option<String>,
  pub offset: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductBody {
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub name: Option<Value>,
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub description: Option<Value>,
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub price: Option<Value>,
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub sale_price: Option<Value>,
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub images: Option<Value>,
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub category_id: Option<Value>,
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub age_range: Option<Value>,
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub stock_quantity: Option<Value>,
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub vendor: Option<Value>,
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub is_combo: Option<Value>,
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub save_amount: Option<Value>,
}

pub(crate) async fn find_product(pool: &PgPool, id: i64) -> Result<Option<Product>, AppError> {
  let sql = format!("SELECT {} FROM products WHERE id = $1", PRODUCT_COLUMNS);
  let product = sqlx::query_as::<_, Product>(&sql)
    .bind(id)
    .fetch_optional(pool)
    .await?;
  Ok(product)
}

#[derive(Debug, Default)]
struct ProductFilters {
  category_id: Option<i64>,
  age_range: Option<String>,
  price_max: Option<f64>,
  search: Option<String>,
}

impl ProductFilters {
  fn from_query(query: &ProductQuery) -> Self {
    ProductFilters {
      // Non-numeric values for numeric filters are silently ignored
      category_id: query.category_id.as_deref().and_then(inputs::parse_id_param),
      age_range: query.age_range.clone().filter(|s| !s.is_empty()),
      price_max: query.price_max.as_deref().and_then(|s| s.trim().parse::<f64>().ok()),
      search: query
        .search
        .clone()
        .filter(|s| !s.is_empty())
        .or_else(|| query.q.clone().filter(|s| !s.is_empty())),
    }
  }
}

fn push_condition(qb: &mut QueryBuilder<'static, Postgres>, started: &mut bool) {
  if *started {
    qb.push(" AND ");
  } else {
    qb.push(" WHERE ");
    *started = true;
  }
}

// All supplied filters compose with AND; search is an OR over name and
// description substrings.
fn product_list_query(filters: &ProductFilters, limit: i64, offset: i64) -> QueryBuilder<'static, Postgres> {
  let mut qb = QueryBuilder::new(format!("SELECT {} FROM products", PRODUCT_COLUMNS));
  let mut started = false;

  if let Some(category_id) = filters.category_id {
    push_condition(&mut qb, &mut started);
    qb.push("category_id = ").push_bind(category_id);
  }
  if let Some(age_range) = &filters.age_range {
    push_condition(&mut qb, &mut started);
    qb.push("age_range = ").push_bind(age_range.clone());
  }
  if let Some(price_max) = filters.price_max {
    push_condition(&mut qb, &mut started);
    qb.push("price <= ").push_bind(price_max);
  }
  if let Some(search) = &filters.search {
    let pattern = format!("%{}%", search);
    push_condition(&mut qb, &mut started);
    qb.push("(name ILIKE ")
      .push_bind(pattern.clone())
      .push(" OR description ILIKE ")
      .push_bind(pattern)
      .push(")");
  }

  qb.push(" LIMIT ").push_bind(limit);
  qb.push(" OFFSET ").push_bind(offset);
  qb
}

#[instrument(name = "handler::get_products", skip(app_state, query))]
pub async fn get_products_handler(
  app_state: web::Data<AppState>,
  query: web::Query<ProductQuery>,
) -> Result<HttpResponse, AppError> {
  // Single product by id
  if let Some(raw_id) = query.id.as_deref() {
    let id =
      inputs::parse_id_param(raw_id).ok_or_else(|| AppError::validation("INVALID_ID", "Valid ID is required"))?;
    let product = find_product(&app_state.db_pool, id)
      .await?
      .ok_or_else(|| AppError::not_found("NOT_FOUND", "Product not found"))?;
    return Ok(HttpResponse::Ok().json(product));
  }

  let filters = ProductFilters::from_query(&query);
  let limit = inputs::parse_limit(query.limit.as_deref(), 50);
  let offset = inputs::parse_offset(query.offset.as_deref());

  let products: Vec<Product> = product_list_query(&filters, limit, offset)
    .build_query_as()
    .fetch_all(&app_state.db_pool)
    .await?;

  Ok(HttpResponse::Ok().json(products))
}

#[derive(Debug, PartialEq)]
struct NewProduct {
  name: String,
  description: String,
  price: f64,
  sale_price: Option<f64>,
  images: Option<Vec<String>>,
  category_id: Option<i64>,
  age_range: Option<String>,
  stock_quantity: i32,
  vendor: String,
  is_combo: bool,
  save_amount: Option<f64>,
}

fn build_new_product(body: &ProductBody) -> Result<NewProduct, AppError> {
  let name = inputs::non_empty_string(body.name.as_ref())
    .ok_or_else(|| AppError::validation("MISSING_NAME", "Product name is required"))?;

  let price_value = body
    .price
    .as_ref()
    .filter(|v| inputs::is_truthy(v))
    .ok_or_else(|| AppError::validation("MISSING_PRICE", "Product price is required"))?;

  let description = inputs::non_empty_string(body.description.as_ref())
    .ok_or_else(|| AppError::validation("MISSING_DESCRIPTION", "Product description is required"))?;

  let price = inputs::coerce_f64(price_value)
    .filter(|p| *p > 0.0)
    .ok_or_else(|| AppError::validation("INVALID_PRICE", "Price must be a positive number"))?;

  Ok(NewProduct {
    name,
    description,
    price,
    sale_price: optional_number(&body.sale_price),
    images: optional_images(&body.images),
    category_id: body
      .category_id
      .as_ref()
      .filter(|v| inputs::is_truthy(v))
      .and_then(inputs::coerce_i64),
    age_range: body.age_range.as_ref().and_then(inputs::nullable_trimmed),
    stock_quantity: body
      .stock_quantity
      .as_ref()
      .and_then(inputs::coerce_i64)
      .unwrap_or(0) as i32,
    vendor: body
      .vendor
      .as_ref()
      .and_then(inputs::nullable_trimmed)
      .unwrap_or_else(|| DEFAULT_VENDOR.to_string()),
    is_combo: body.is_combo.as_ref().map(inputs::is_truthy).unwrap_or(false),
    save_amount: optional_number(&body.save_amount),
  })
}

/// Falsy (absent, null, 0, "") collapses to NULL; anything else is coerced.
fn optional_number(value: &Option<Value>) -> Option<f64> {
  value
    .as_ref()
    .filter(|v| inputs::is_truthy(v))
    .and_then(inputs::coerce_f64)
}

fn optional_images(value: &Option<Value>) -> Option<Vec<String>> {
  value
    .as_ref()
    .filter(|v| inputs::is_truthy(v))
    .and_then(|v| serde_json::from_value::<Vec<String>>(v.clone()).ok())
}

#[instrument(name = "handler::create_product", skip(app_state, body))]
pub async fn create_product_handler(
  app_state: web::Data<AppState>,
  body: web::Json<ProductBody>,
) -> Result<HttpResponse, AppError> {
  let new_product = build_new_product(&body)?;

  let sql = format!(
    "INSERT INTO products (name, description, price, sale_price, images, category_id, age_range, stock_quantity, vendor, is_combo, save_amount, created_at) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING {}",
    PRODUCT_COLUMNS
  );
  let product = sqlx::query_as::<_, Product>(&sql)
    .bind(&new_product.name)
    .bind(&new_product.description)
    .bind(new_product.price)
    .bind(new_product.sale_price)
    .bind(new_product.images.clone().map(Json))
    .bind(new_product.category_id)
    .bind(&new_product.age_range)
    .bind(new_product.stock_quantity)
    .bind(&new_product.vendor)
    .bind(new_product.is_combo)
    .bind(new_product.save_amount)
    .bind(Utc::now())
    .fetch_one(&app_state.db_pool)
    .await?;

  info!(product_id = product.id, name = %product.name, "Product created.");
  Ok(HttpResponse::Created().json(product))
}

#[derive(Debug, Default)]
struct ProductPatch {
  name: Option<String>,
  description: Option<String>,
  price: Option<f64>,
  sale_price: Option<Option<f64>>,
  images: Option<Option<Vec<String>>>,
  category_id: Option<Option<i64>>,
  age_range: Option<Option<String>>,
  stock_quantity: Option<i32>,
  vendor: Option<String>,
  is_combo: Option<bool>,
  save_amount: Option<Option<f64>>,
}

impl ProductPatch {
  fn is_empty(&self) -> bool {
    self.name.is_none()
      && self.description.is_none()
      && self.price.is_none()
      && self.sale_price.is_none()
      && self.images.is_none()
      && self.category_id.is_none()
      && self.age_range.is_none()
      && self.stock_quantity.is_none()
      && self.vendor.is_none()
      && self.is_combo.is_none()
      && self.save_amount.is_none()
  }
}

fn build_product_patch(body: &ProductBody) -> Result<ProductPatch, AppError> {
  // Price positivity is re-validated whenever a price is supplied
  let price = match &body.price {
    Some(value) => Some(
      inputs::coerce_f64(value)
        .filter(|p| *p > 0.0)
        .ok_or_else(|| AppError::validation("INVALID_PRICE", "Price must be a positive number"))?,
    ),
    None => None,
  };

  let mut patch = ProductPatch {
    price,
    ..Default::default()
  };

  if let Some(value) = &body.name {
    patch.name = value.as_str().map(|s| s.trim().to_string());
  }
  if let Some(value) = &body.description {
    patch.description = value.as_str().map(|s| s.trim().to_string());
  }
  if let Some(value) = &body.sale_price {
    patch.sale_price = Some(Some(value).filter(|v| inputs::is_truthy(v)).and_then(inputs::coerce_f64));
  }
  if body.images.is_some() {
    patch.images = Some(optional_images(&body.images));
  }
  if let Some(value) = &body.category_id {
    patch.category_id = Some(Some(value).filter(|v| inputs::is_truthy(v)).and_then(inputs::coerce_i64));
  }
  if let Some(value) = &body.age_range {
    patch.age_range = Some(value.as_str().map(|s| s.to_string()));
  }
  if let Some(value) = &body.stock_quantity {
    patch.stock_quantity = inputs::coerce_i64(value).map(|n| n as i32);
  }
  if let Some(value) = &body.vendor {
    patch.vendor = value.as_str().map(|s| s.to_string());
  }
  if let Some(value) = &body.is_combo {
    patch.is_combo = Some(inputs::is_truthy(value));
  }
  if let Some(value) = &body.save_amount {
    patch.save_amount = Some(Some(value).filter(|v| inputs::is_truthy(v)).and_then(inputs::coerce_f64));
  }

  Ok(patch)
}

fn product_update_query(patch: &ProductPatch, id: i64) -> QueryBuilder<'static, Postgres> {
  let mut qb = QueryBuilder::new("UPDATE products SET ");
  {
    let mut fields = qb.separated(", ");
    if let Some(name) = &patch.name {
      fields.push("name = ").push_bind_unseparated(name.clone());
    }
    if let Some(description) = &patch.description {
      fields.push("description = ").push_bind_unseparated(description.clone());
    }
    if let Some(price) = patch.price {
      fields.push("price = ").push_bind_unseparated(price);
    }
    if let Some(sale_price) = &patch.sale_price {
      fields.push("sale_price = ").push_bind_unseparated(*sale_price);
    }
    if let Some(images) = &patch.images {
      fields.push("images = ").push_bind_unseparated(images.clone().map(Json));
    }
    if let Some(category_id) = &patch.category_id {
      fields.push("category_id = ").push_bind_unseparated(*category_id);
    }
    if let Some(age_range) = &patch.age_range {
      fields.push("age_range = ").push_bind_unseparated(age_range.clone());
    }
    if let Some(stock_quantity) = patch.stock_quantity {
      fields.push("stock_quantity = ").push_bind_unseparated(stock_quantity);
    }
    if let Some(vendor) = &patch.vendor {
      fields.push("vendor = ").push_bind_unseparated(vendor.clone());
    }
    if let Some(is_combo) = patch.is_combo {
      fields.push("is_combo = ").push_bind_unseparated(is_combo);
    }
    if let Some(save_amount) = &patch.save_amount {
      fields.push("save_amount = ").push_bind_unseparated(*save_amount);
    }
  }
  qb.push(" WHERE id = ").push_bind(id);
  qb.push(format!(" RETURNING {}", PRODUCT_COLUMNS));
  qb
}

#[instrument(name = "handler::update_product", skip(app_state, query, body))]
pub async fn update_product_handler(
  app_state: web::Data<AppState>,
  query: web::Query<ProductQuery>,
  body: web::Json<ProductBody>,
) -> Result<HttpResponse, AppError> {
  let id = query
    .id
    .as_deref()
    .and_then(inputs::parse_id_param)
    .ok_or_else(|| AppError::validation("INVALID_ID", "Valid ID is required"))?;

  find_product(&app_state.db_pool, id)
    .await?
    .ok_or_else(|| AppError::not_found("NOT_FOUND", "Product not found"))?;

  let patch = build_product_patch(&body)?;
  if patch.is_empty() {
    return Err(AppError::Internal("No values to set".to_string()));
  }

  let updated: Product = product_update_query(&patch, id)
    .build_query_as()
    .fetch_one(&app_state.db_pool)
    .await?;

  info!(product_id = updated.id, "Product updated.");
  Ok(HttpResponse::Ok().json(updated))
}

#[instrument(name = "handler::delete_product", skip(app_state, query))]
pub async fn delete_product_handler(
  app_state: web::Data<AppState>,
  query: web::Query<ProductQuery>,
) -> Result<HttpResponse, AppError> {
  let id = query
    .id
    .as_deref()
    .and_then(inputs::parse_id_param)
    .ok_or_else(|| AppError::validation("INVALID_ID", "Valid ID is required"))?;

  find_product(&app_state.db_pool, id)
    .await?
    .ok_or_else(|| AppError::not_found("NOT_FOUND", "Product not found"))?;

  // No cascade: cart and order rows referencing this product stay behind
  // and resolve to a null product in reads.
  let sql = format!("DELETE FROM products WHERE id = $1 RETURNING {}", PRODUCT_COLUMNS);
  let deleted = sqlx::query_as::<_, Product>(&sql)
    .bind(id)
    .fetch_one(&app_state.db_pool)
    .await?;

  info!(product_id = id, "Product deleted.");
  Ok(HttpResponse::Ok().json(json!({
    "message": "Product deleted successfully",
    "product": deleted,
  })))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn body(raw: serde_json::Value) -> ProductBody {
    serde_json::from_value(raw).unwrap()
  }

  #[test]
  fn create_applies_defaults() {
    let new_product =
      build_new_product(&body(json!({ "name": "Blocks", "price": 299, "description": "wooden blocks" }))).unwrap();
    assert_eq!(new_product.stock_quantity, 0);
    assert_eq!(new_product.vendor, "Kuviyal");
    assert!(!new_product.is_combo);
    assert_eq!(new_product.price, 299.0);
    assert_eq!(new_product.sale_price, None);
  }

  #[test]
  fn create_requires_name_price_description() {
    let err = build_new_product(&body(json!({}))).unwrap_err();
    assert!(matches!(err, AppError::Validation { code: "MISSING_NAME", .. }));

    let err = build_new_product(&body(json!({ "name": "Blocks" }))).unwrap_err();
    assert!(matches!(err, AppError::Validation { code: "MISSING_PRICE", .. }));

    let err = build_new_product(&body(json!({ "name": "Blocks", "price": 100 }))).unwrap_err();
    assert!(matches!(
      err,
      AppError::Validation {
        code: "MISSING_DESCRIPTION",
        ..
      }
    ));
  }

  #[test]
  fn create_rejects_non_positive_price() {
    for price in [json!("0"), json!(-5), json!("abc")] {
      let err = build_new_product(&body(json!({ "name": "X", "price": price, "description": "d" }))).unwrap_err();
      assert!(matches!(err, AppError::Validation { code: "INVALID_PRICE", .. }));
    }
  }

  #[test]
  fn create_coerces_numeric_strings() {
    let new_product = build_new_product(&body(json!({
      "name": "Train",
      "price": "499.5",
      "description": "d",
      "salePrice": "399",
      "categoryId": "2",
      "stockQuantity": "12"
    })))
    .unwrap();
    assert_eq!(new_product.price, 499.5);
    assert_eq!(new_product.sale_price, Some(399.0));
    assert_eq!(new_product.category_id, Some(2));
    assert_eq!(new_product.stock_quantity, 12);
  }

  #[test]
  fn create_treats_falsy_optionals_as_null() {
    let new_product = build_new_product(&body(json!({
      "name": "X",
      "price": 10,
      "description": "d",
      "salePrice": 0,
      "saveAmount": "",
      "categoryId": null
    })))
    .unwrap();
    assert_eq!(new_product.sale_price, None);
    assert_eq!(new_product.save_amount, None);
    assert_eq!(new_product.category_id, None);
  }

  #[test]
  fn patch_revalidates_price_when_supplied() {
    let err = build_product_patch(&body(json!({ "price": 0 }))).unwrap_err();
    assert!(matches!(err, AppError::Validation { code: "INVALID_PRICE", .. }));

    let patch = build_product_patch(&body(json!({ "price": "150" }))).unwrap();
    assert_eq!(patch.price, Some(150.0));
  }

  #[test]
  fn empty_patch_is_detected() {
    let patch = build_product_patch(&body(json!({}))).unwrap();
    assert!(patch.is_empty());

    let patch = build_product_patch(&body(json!({ "isCombo": true }))).unwrap();
    assert!(!patch.is_empty());
    assert_eq!(patch.is_combo, Some(true));
  }

  #[test]
  fn patch_null_clears_nullable_fields() {
    let patch = build_product_patch(&body(json!({ "salePrice": null, "categoryId": null }))).unwrap();
    assert_eq!(patch.sale_price, Some(None));
    assert_eq!(patch.category_id, Some(None));
  }

  #[test]
  fn list_query_composes_filters_with_and() {
    let filters = ProductFilters {
      category_id: Some(3),
      price_max: Some(500.0),
      ..Default::default()
    };
    let sql = product_list_query(&filters, 50, 0).into_sql();
    assert!(sql.contains("WHERE category_id = "));
    assert!(sql.contains(" AND price <= "));

    let filters = ProductFilters {
      search: Some("train".to_string()),
      ..Default::default()
    };
    let sql = product_list_query(&filters, 50, 0).into_sql();
    assert!(sql.contains("(name ILIKE "));
    assert!(sql.contains(" OR description ILIKE "));
  }

  #[test]
  fn list_query_without_filters_has_no_where() {
    let sql = product_list_query(&ProductFilters::default(), 50, 0).into_sql();
    assert!(!sql.contains("WHERE"));
  }

  #[test]
  fn non_numeric_filter_params_are_ignored() {
    let query: ProductQuery = serde_json::from_value(json!({
      "category_id": "abc",
      "price_max": "oops",
      "q": "ball"
    }))
    .unwrap();
    let filters = ProductFilters::from_query(&query);
    assert_eq!(filters.category_id, None);
    assert_eq!(filters.price_max, None);
    assert_eq!(filters.search.as_deref(), Some("ball"));
  }
}
