//! Database seeding. The schema itself ships as `schema.sql` at the
//! repository root and is applied out of band.

use sqlx::PgPool;
use tracing::info;

use crate::errors::Result;

/// Sample categories inserted on startup when `SEED_DB=true` and the table
/// is empty.
const SAMPLE_CATEGORIES: &[(&str, &str, &str)] = &[
  ("Puzzles", "puzzles", "Educational puzzles for cognitive development"),
  ("Musical Toys", "musical-toys", "Musical instruments and sound toys"),
  ("Books", "books", "Children's books and educational reading materials"),
  ("Flash Cards", "flash-cards", "Learning flash cards for early education"),
  ("Bags", "bags", "School bags and backpacks for kids"),
  (
    "Sorting & Stacking",
    "sorting-stacking",
    "Toys for learning shapes, colors, and coordination",
  ),
  ("Montessori Toys", "montessori-toys", "Montessori-inspired educational toys"),
  ("Arts & Crafts", "arts-crafts", "Creative art supplies and craft kits"),
];

pub async fn seed_db(pool: &PgPool) -> Result<()> {
  let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories").fetch_one(pool).await?;
  if existing > 0 {
    info!(existing, "Categories already present; skipping seed.");
    return Ok(());
  }

  for (name, slug, description) in SAMPLE_CATEGORIES {
    sqlx::query("INSERT INTO categories (name, slug, description, image) VALUES ($1, $2, $3, $4)")
      .bind(name)
      .bind(slug)
      .bind(description)
      .bind("")
      .execute(pool)
      .await?;
  }

  info!(count = SAMPLE_CATEGORIES.len(), "Sample categories seeded.");
  Ok(())
}
