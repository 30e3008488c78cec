//! # notegen-db
//!
//! PostgreSQL persistence layer for notegen.
//!
//! This crate provides:
//! - Connection pool management
//! - The `generation_jobs` repository with an atomic compare-and-swap claim
//! - Read-side note, tag, and audio collaborators
//! - An in-memory store implementing the same traits, for tests and local runs
//!
//! ## Example
//!
//! ```rust,ignore
//! use notegen_db::{Database, JobRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/notegen").await?;
//!     let job = db.jobs.load(job_id).await?;
//!     println!("{} is {}", job.id, job.status);
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod jobs;
pub mod memory;
pub mod notes;
pub mod pool;
pub mod tags;
pub mod test_fixtures;

// Re-export core types
pub use notegen_core::*;

pub use audio::PgAudioRepository;
pub use jobs::PgJobRepository;
pub use memory::InMemoryStore;
pub use notes::PgNoteRepository;
pub use pool::PoolConfig;
pub use tags::PgTagRepository;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Generation job repository.
    pub jobs: PgJobRepository,
    /// Source note reader.
    pub notes: PgNoteRepository,
    /// Owner tag lookup.
    pub tags: PgTagRepository,
    /// Uploaded and synthesized audio.
    pub audio: PgAudioRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            jobs: PgJobRepository::new(pool.clone()),
            notes: PgNoteRepository::new(pool.clone()),
            tags: PgTagRepository::new(pool.clone()),
            audio: PgAudioRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_config(url, PoolConfig::default()).await
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = pool::connect(url, &config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}
