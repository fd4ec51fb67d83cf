use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
  pub id: i64,
  pub name: String,
  pub slug: String,
  pub description: Option<String>,
  pub image: Option<String>,
  pub created_at: DateTime<Utc>,
}
