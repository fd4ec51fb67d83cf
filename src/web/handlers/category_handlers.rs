use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{info, instrument};

use crate::errors::AppError;
use crate::models::Category;
use crate::state::AppState;
use crate::web::inputs;

const CATEGORY_COLUMNS: &str = "id, name, slug, description, image, created_at";

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
  pub id: Option<String>,
  pub slug: Option<String>,
  pub search: Option<String>,
  pub limit: Option<String>,
  pub offset: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryBody {
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub name: Option<Value>,
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub slug: Option<Value>,
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub description: Option<Value>,
  #[serde(default, deserialize_with = "crate::web::inputs::present_option")]
  pub image: Option<Value>,
}

async fn find_category(pool: &PgPool, id: i64) -> Result<Option<Category>, AppError> {
  let sql = format!("SELECT {} FROM categories WHERE id = $1", CATEGORY_COLUMNS);
  let category = sqlx::query_as::<_, Category>(&sql)
    .bind(id)
    .fetch_optional(pool)
    .await?;
  Ok(category)
}

async fn find_category_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Category>, AppError> {
  let sql = format!("SELECT {} FROM categories WHERE slug = $1", CATEGORY_COLUMNS);
  let category = sqlx::query_as::<_, Category>(&sql)
    .bind(slug)
    .fetch_optional(pool)
    .await?;
  Ok(category)
}

fn category_list_query(search: Option<&str>, limit: i64, offset: i64) -> QueryBuilder<'static, Postgres> {
  let mut qb = QueryBuilder::new(format!("SELECT {} FROM categories", CATEGORY_COLUMNS));
  if let Some(search) = search {
    qb.push(" WHERE name ILIKE ").push_bind(format!("%{}%", search));
  }
  qb.push(" LIMIT ").push_bind(limit);
  qb.push(" OFFSET ").push_bind(offset);
  qb
}

#[instrument(name = "handler::get_categories", skip(app_state, query))]
pub async fn get_categories_handler(
  app_state: web::Data<AppState>,
  query: web::Query<CategoryQuery>,
) -> Result<HttpResponse, AppError> {
  // Single category by id
  if let Some(raw_id) = query.id.as_deref() {
    let id =
      inputs::parse_id_param(raw_id).ok_or_else(|| AppError::validation("INVALID_ID", "Valid ID is required"))?;
    let category = find_category(&app_state.db_pool, id)
      .await?
      .ok_or_else(|| AppError::not_found("CATEGORY_NOT_FOUND", "Category not found"))?;
    return Ok(HttpResponse::Ok().json(category));
  }

  // Single category by slug
  if let Some(slug) = query.slug.as_deref() {
    let category = find_category_by_slug(&app_state.db_pool, slug)
      .await?
      .ok_or_else(|| AppError::not_found("CATEGORY_NOT_FOUND", "Category not found"))?;
    return Ok(HttpResponse::Ok().json(category));
  }

  // List with optional name search and pagination
  let limit = inputs::parse_limit(query.limit.as_deref(), 50);
  let offset = inputs::parse_offset(query.offset.as_deref());
  let categories: Vec<Category> = category_list_query(query.search.as_deref(), limit, offset)
    .build_query_as()
    .fetch_all(&app_state.db_pool)
    .await?;

  Ok(HttpResponse::Ok().json(categories))
}

#[instrument(name = "handler::create_category", skip(app_state, body))]
pub async fn create_category_handler(
  app_state: web::Data<AppState>,
  body: web::Json<CategoryBody>,
) -> Result<HttpResponse, AppError> {
  let name = inputs::non_empty_string(body.name.as_ref())
    .ok_or_else(|| AppError::validation("MISSING_NAME", "Name is required"))?;
  let slug = inputs::non_empty_string(body.slug.as_ref())
    .ok_or_else(|| AppError::validation("MISSING_SLUG", "Slug is required"))?;

  if find_category_by_slug(&app_state.db_pool, &slug).await?.is_some() {
    return Err(AppError::validation("DUPLICATE_SLUG", "Slug already exists"));
  }

  // Present-but-blank description/image stores NULL
  let description = body.description.as_ref().and_then(inputs::nullable_trimmed);
  let image = body.image.as_ref().and_then(inputs::nullable_trimmed);

  let sql = format!(
    "INSERT INTO categories (name, slug, description, image, created_at) VALUES ($1, $2, $3, $4, $5) RETURNING {}",
    CATEGORY_COLUMNS
  );
  let category = sqlx::query_as::<_, Category>(&sql)
    .bind(&name)
    .bind(&slug)
    .bind(&description)
    .bind(&image)
    .bind(Utc::now())
    .fetch_one(&app_state.db_pool)
    .await?;

  info!(category_id = category.id, slug = %category.slug, "Category created.");
  Ok(HttpResponse::Created().json(category))
}

#[derive(Debug, Default, PartialEq)]
struct CategoryPatch {
  name: Option<String>,
  slug: Option<String>,
  description: Option<Option<String>>,
  image: Option<Option<String>>,
}

impl CategoryPatch {
  fn is_empty(&self) -> bool {
    self.name.is_none() && self.slug.is_none() && self.description.is_none() && self.image.is_none()
  }
}

fn build_category_patch(body: &CategoryBody) -> Result<CategoryPatch, AppError> {
  let mut patch = CategoryPatch::default();

  if let Some(value) = &body.name {
    patch.name = Some(
      inputs::nullable_trimmed(value).ok_or_else(|| AppError::validation("INVALID_NAME", "Name cannot be empty"))?,
    );
  }
  if let Some(value) = &body.slug {
    patch.slug = Some(
      inputs::nullable_trimmed(value).ok_or_else(|| AppError::validation("INVALID_SLUG", "Slug cannot be empty"))?,
    );
  }
  if let Some(value) = &body.description {
    patch.description = Some(inputs::nullable_trimmed(value));
  }
  if let Some(value) = &body.image {
    patch.image = Some(inputs::nullable_trimmed(value));
  }

  Ok(patch)
}

fn category_update_query(patch: &CategoryPatch, id: i64) -> QueryBuilder<'static, Postgres> {
  let mut qb = QueryBuilder::new("UPDATE categories SET ");
  {
    let mut fields = qb.separated(", ");
    if let Some(name) = &patch.name {
      fields.push("name = ").push_bind_unseparated(name.clone());
    }
    if let Some(slug) = &patch.slug {
      fields.push("slug = ").push_bind_unseparated(slug.clone());
    }
    if let Some(description) = &patch.description {
      fields.push("description = ").push_bind_unseparated(description.clone());
    }
    if let Some(image) = &patch.image {
      fields.push("image = ").push_bind_unseparated(image.clone());
    }
  }
  qb.push(" WHERE id = ").push_bind(id);
  qb.push(format!(" RETURNING {}", CATEGORY_COLUMNS));
  qb
}

#[instrument(name = "handler::update_category", skip(app_state, query, body))]
pub async fn update_category_handler(
  app_state: web::Data<AppState>,
  query: web::Query<CategoryQuery>,
  body: web::Json<CategoryBody>,
) -> Result<HttpResponse, AppError> {
  let id = query
    .id
    .as_deref()
    .and_then(inputs::parse_id_param)
    .ok_or_else(|| AppError::validation("INVALID_ID", "Valid ID is required"))?;

  let existing = find_category(&app_state.db_pool, id)
    .await?
    .ok_or_else(|| AppError::not_found("CATEGORY_NOT_FOUND", "Category not found"))?;

  let patch = build_category_patch(&body)?;

  // Re-check slug uniqueness, excluding this record
  if let Some(slug) = &patch.slug {
    if let Some(taken) = find_category_by_slug(&app_state.db_pool, slug).await? {
      if taken.id != id {
        return Err(AppError::validation("DUPLICATE_SLUG", "Slug already exists"));
      }
    }
  }

  // Nothing to change: answer with the record as-is
  if patch.is_empty() {
    return Ok(HttpResponse::Ok().json(existing));
  }

  let updated: Category = category_update_query(&patch, id)
    .build_query_as()
    .fetch_one(&app_state.db_pool)
    .await?;

  info!(category_id = updated.id, "Category updated.");
  Ok(HttpResponse::Ok().json(updated))
}

#[instrument(name = "handler::delete_category", skip(app_state, query))]
pub async fn delete_category_handler(
  app_state: web::Data<AppState>,
  query: web::Query<CategoryQuery>,
) -> Result<HttpResponse, AppError> {
  let id = query
    .id
    .as_deref()
    .and_then(inputs::parse_id_param)
    .ok_or_else(|| AppError::validation("INVALID_ID", "Valid ID is required"))?;

  find_category(&app_state.db_pool, id)
    .await?
    .ok_or_else(|| AppError::not_found("CATEGORY_NOT_FOUND", "Category not found"))?;

  let sql = format!("DELETE FROM categories WHERE id = $1 RETURNING {}", CATEGORY_COLUMNS);
  let deleted = sqlx::query_as::<_, Category>(&sql)
    .bind(id)
    .fetch_one(&app_state.db_pool)
    .await?;

  info!(category_id = id, "Category deleted.");
  Ok(HttpResponse::Ok().json(json!({
    "message": "Category deleted successfully",
    "category": deleted,
  })))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn body(raw: serde_json::Value) -> CategoryBody {
    serde_json::from_value(raw).unwrap()
  }

  #[test]
  fn patch_distinguishes_absent_null_and_blank() {
    let patch = build_category_patch(&body(json!({}))).unwrap();
    assert!(patch.is_empty());

    // Explicit null clears the field; absent leaves it untouched
    let patch = build_category_patch(&body(json!({ "description": null }))).unwrap();
    assert_eq!(patch.description, Some(None));
    assert_eq!(patch.image, None);

    // Blank collapses to NULL as well
    let patch = build_category_patch(&body(json!({ "image": "  " }))).unwrap();
    assert_eq!(patch.image, Some(None));
  }

  #[test]
  fn patch_rejects_empty_name_and_slug() {
    let err = build_category_patch(&body(json!({ "name": "  " }))).unwrap_err();
    assert!(matches!(err, AppError::Validation { code: "INVALID_NAME", .. }));

    let err = build_category_patch(&body(json!({ "slug": "" }))).unwrap_err();
    assert!(matches!(err, AppError::Validation { code: "INVALID_SLUG", .. }));
  }

  #[test]
  fn patch_trims_values() {
    let patch = build_category_patch(&body(json!({ "name": " Puzzles ", "slug": " puzzles " }))).unwrap();
    assert_eq!(patch.name.as_deref(), Some("Puzzles"));
    assert_eq!(patch.slug.as_deref(), Some("puzzles"));
  }

  #[test]
  fn list_query_adds_search_clause_only_when_present() {
    let sql = category_list_query(None, 50, 0).into_sql();
    assert!(!sql.contains("WHERE"));
    assert!(sql.contains("LIMIT"));

    let sql = category_list_query(Some("toys"), 50, 0).into_sql();
    assert!(sql.contains("WHERE name ILIKE"));
  }

  #[test]
  fn update_query_sets_only_patched_fields() {
    let patch = CategoryPatch {
      slug: Some("new-slug".to_string()),
      description: Some(None),
      ..Default::default()
    };
    let sql = category_update_query(&patch, 3).into_sql();
    assert!(sql.contains("slug = "));
    assert!(sql.contains("description = "));
    assert!(!sql.contains("name = "));
    assert!(sql.contains("WHERE id = "));
    assert!(sql.contains("RETURNING"));
  }
}
