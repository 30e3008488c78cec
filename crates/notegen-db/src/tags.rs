//! Tag repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use notegen_core::{Error, Result, Tag, TagRepository};

/// PostgreSQL implementation of TagRepository.
pub struct PgTagRepository {
    pool: Pool<Postgres>,
}

impl PgTagRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Create a tag for `owner_id`, returning the existing ID when a tag with
    /// the same name (case-insensitive) already exists.
    pub async fn create(&self, owner_id: Uuid, name: &str) -> Result<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO tags (id, owner_id, name) VALUES ($1, $2, $3)
             ON CONFLICT (owner_id, lower(name)) DO UPDATE SET name = tags.name
             RETURNING id",
        )
        .bind(Uuid::now_v7())
        .bind(owner_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(id)
    }
}

#[async_trait]
impl TagRepository for PgTagRepository {
    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<Tag>> {
        let rows = sqlx::query("SELECT id, owner_id, name FROM tags WHERE owner_id = $1 ORDER BY name")
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| Tag {
                id: row.get("id"),
                owner_id: row.get("owner_id"),
                name: row.get("name"),
            })
            .collect())
    }
}
