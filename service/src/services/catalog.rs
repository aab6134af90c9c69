// tokencart_service/src/services/catalog.rs

//! Read access to the product catalog for token grants and scheduled-access details.

use crate::errors::Result as AppResult;
use crate::models::{LineItem, Product};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

#[derive(Clone)]
pub struct Catalog {
  pool: SqlitePool,
}

impl Catalog {
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// The products behind `items`. Items naming unknown products are simply absent.
  pub async fn products_for(&self, items: &[LineItem]) -> AppResult<Vec<Product>> {
    if items.is_empty() {
      return Ok(Vec::new());
    }
    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM products WHERE id IN (");
    let mut ids = builder.separated(", ");
    for item in items {
      ids.push_bind(item.id.clone());
    }
    ids.push_unseparated(")");
    Ok(builder.build_query_as::<Product>().fetch_all(&self.pool).await?)
  }

  pub async fn upsert_product(&self, product: &Product) -> AppResult<()> {
    sqlx::query(
      r#"
        INSERT INTO products (
          id, name, active, provides_tokens, token_quantity, access_starts_at, access_ends_at, access_details
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO UPDATE SET
          name = excluded.name,
          active = excluded.active,
          provides_tokens = excluded.provides_tokens,
          token_quantity = excluded.token_quantity,
          access_starts_at = excluded.access_starts_at,
          access_ends_at = excluded.access_ends_at,
          access_details = excluded.access_details
      "#,
    )
    .bind(&product.id)
    .bind(&product.name)
    .bind(product.active)
    .bind(product.provides_tokens)
    .bind(product.token_quantity)
    .bind(product.access_starts_at)
    .bind(product.access_ends_at)
    .bind(&product.access_details)
    .execute(&self.pool)
    .await?;
    Ok(())
  }
}

/// Sum of `tokens per unit × quantity` over the token-granting lines, or `None` on overflow.
pub fn tokens_for_items(items: &[LineItem], products: &[Product]) -> Option<i64> {
  items
    .iter()
    .filter_map(|item| {
      products
        .iter()
        .find(|p| p.id == item.id)
        .map(|p| p.tokens_per_unit().checked_mul(item.quantity.max(0)))
    })
    .try_fold(0i64, |sum, line| line.and_then(|tokens| sum.checked_add(tokens)))
}
