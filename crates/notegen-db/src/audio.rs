//! Audio blob storage implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use notegen_core::{AudioBlob, AudioStore, Error, Result};

/// PostgreSQL implementation of AudioStore (inline BYTEA storage).
pub struct PgAudioRepository {
    pool: Pool<Postgres>,
}

impl PgAudioRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AudioStore for PgAudioRepository {
    async fn load_audio(&self, owner_id: Uuid, audio_id: Uuid) -> Result<Option<AudioBlob>> {
        let row = sqlx::query(
            "SELECT id, owner_id, filename, content_type, data
             FROM audio_blobs WHERE id = $1 AND owner_id = $2",
        )
        .bind(audio_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|row| AudioBlob {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            filename: row.get("filename"),
            content_type: row.get("content_type"),
            data: row.get("data"),
        }))
    }

    async fn store_audio(
        &self,
        owner_id: Uuid,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let size = data.len();
        sqlx::query(
            "INSERT INTO audio_blobs (id, owner_id, filename, content_type, data)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(owner_id)
        .bind(filename)
        .bind(content_type)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "audio",
            audio_id = %id,
            size_bytes = size,
            "Stored audio blob"
        );
        Ok(id)
    }
}
