//! Note source implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use notegen_core::{Error, Note, NoteSource, Result};

/// PostgreSQL implementation of NoteSource.
pub struct PgNoteRepository {
    pool: Pool<Postgres>,
}

impl PgNoteRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert a note. Used by seeding tools and tests; note CRUD itself lives
    /// outside the generation pipeline.
    pub async fn insert(&self, note: &Note) -> Result<()> {
        sqlx::query("INSERT INTO notes (id, owner_id, title, content) VALUES ($1, $2, $3, $4)")
            .bind(note.id)
            .bind(note.owner_id)
            .bind(&note.title)
            .bind(&note.content)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}

#[async_trait]
impl NoteSource for PgNoteRepository {
    async fn get_note(&self, owner_id: Uuid, note_id: Uuid) -> Result<Option<Note>> {
        let row = sqlx::query(
            "SELECT id, owner_id, title, content FROM notes WHERE id = $1 AND owner_id = $2",
        )
        .bind(note_id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|row| Note {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            title: row.get("title"),
            content: row.get("content"),
        }))
    }
}
