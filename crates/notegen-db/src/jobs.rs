//! Generation job repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use notegen_core::{
    Error, ErrorMessage, GenerationJob, JobKind, JobRepository, JobStatus, Result,
};

const JOB_COLUMNS: &str = "id, owner_id, kind, source_reference_id, config, status, \
                           intermediate, result, error_message, created_at, updated_at";

/// PostgreSQL implementation of JobRepository.
pub struct PgJobRepository {
    pool: Pool<Postgres>,
}

impl PgJobRepository {
    /// Create a new PgJobRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Convert string from database to JobKind.
    fn str_to_job_kind(s: &str) -> Result<JobKind> {
        JobKind::parse(s).ok_or_else(|| Error::Internal(format!("unknown job kind '{}'", s)))
    }

    /// Convert string from database to JobStatus.
    fn str_to_job_status(s: &str) -> Result<JobStatus> {
        JobStatus::parse(s).ok_or_else(|| Error::Internal(format!("unknown job status '{}'", s)))
    }

    fn to_json<T: serde::Serialize>(value: &T) -> Result<JsonValue> {
        Ok(serde_json::to_value(value)?)
    }

    fn from_optional_json<T: serde::de::DeserializeOwned>(value: Option<JsonValue>) -> Result<Option<T>> {
        value.map(serde_json::from_value).transpose().map_err(Error::from)
    }

    /// Parse a job row into a GenerationJob.
    fn parse_job_row(row: sqlx::postgres::PgRow) -> Result<GenerationJob> {
        let kind: String = row.get("kind");
        let status: String = row.get("status");
        let config: JsonValue = row.get("config");
        let error_message: Option<String> = row.get("error_message");
        Ok(GenerationJob {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            kind: Self::str_to_job_kind(&kind)?,
            source_reference_id: row.get("source_reference_id"),
            config: serde_json::from_value(config)?,
            status: Self::str_to_job_status(&status)?,
            intermediate: Self::from_optional_json(row.get("intermediate"))?,
            result: Self::from_optional_json(row.get("result"))?,
            error_message: error_message.map(ErrorMessage::new),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn insert(&self, job: &GenerationJob) -> Result<()> {
        sqlx::query(
            "INSERT INTO generation_jobs
                 (id, owner_id, kind, source_reference_id, config, status,
                  intermediate, result, error_message, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(job.id)
        .bind(job.owner_id)
        .bind(job.kind.as_str())
        .bind(job.source_reference_id)
        .bind(Self::to_json(&job.config)?)
        .bind(job.status.as_str())
        .bind(job.intermediate.as_ref().map(Self::to_json).transpose()?)
        .bind(job.result.as_ref().map(Self::to_json).transpose()?)
        .bind(job.error_message.as_ref().map(|m| m.as_str()))
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<GenerationJob>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM generation_jobs WHERE id = $1",
            JOB_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_job_row).transpose()
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: JobStatus,
        next: JobStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE generation_jobs
             SET status = $3, updated_at = $4
             WHERE id = $1 AND status = $2",
        )
        .bind(id)
        .bind(expected.as_str())
        .bind(next.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() == 1)
    }

    async fn save(&self, job: &GenerationJob) -> Result<()> {
        // Terminal rows are never rewritten.
        let result = sqlx::query(
            "UPDATE generation_jobs
             SET status = $2, intermediate = $3, result = $4, error_message = $5, updated_at = $6
             WHERE id = $1 AND status NOT IN ('PROCESSED', 'FAILED')",
        )
        .bind(job.id)
        .bind(job.status.as_str())
        .bind(job.intermediate.as_ref().map(Self::to_json).transpose()?)
        .bind(job.result.as_ref().map(Self::to_json).transpose()?)
        .bind(job.error_message.as_ref().map(|m| m.as_str()))
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return match self.get(job.id).await? {
                None => Err(Error::JobNotFound(job.id)),
                Some(current) => Err(Error::InvalidTransition {
                    job_id: job.id,
                    from: current.status,
                    to: job.status,
                }),
            };
        }
        Ok(())
    }

    async fn list_for_owner(&self, owner_id: Uuid, limit: i64) -> Result<Vec<GenerationJob>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM generation_jobs
             WHERE owner_id = $1
             ORDER BY created_at DESC
             LIMIT $2",
            JOB_COLUMNS
        ))
        .bind(owner_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_job_row).collect()
    }

    async fn list_in_statuses(
        &self,
        kind: JobKind,
        statuses: &[JobStatus],
    ) -> Result<Vec<GenerationJob>> {
        let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {} FROM generation_jobs
             WHERE kind = $1 AND status = ANY($2)
             ORDER BY created_at ASC",
            JOB_COLUMNS
        ))
        .bind(kind.as_str())
        .bind(&statuses)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_job_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_to_job_kind_all_variants() {
        for kind in JobKind::ALL {
            assert_eq!(PgJobRepository::str_to_job_kind(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn test_str_to_job_kind_unknown_is_error() {
        assert!(PgJobRepository::str_to_job_kind("quiz").is_err());
        assert!(PgJobRepository::str_to_job_kind("").is_err());
    }

    #[test]
    fn test_str_to_job_status_round_trip() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::WaitingForScript,
            JobStatus::ProcessingScript,
            JobStatus::WaitingForSpeech,
            JobStatus::ProcessingSpeech,
            JobStatus::Processed,
            JobStatus::Failed,
        ] {
            assert_eq!(
                PgJobRepository::str_to_job_status(status.as_str()).unwrap(),
                status
            );
        }
    }

    #[test]
    fn test_str_to_job_status_case_sensitive() {
        assert!(PgJobRepository::str_to_job_status("processed").is_err());
    }

    #[test]
    fn test_from_optional_json_none() {
        let parsed: Option<notegen_core::JobOutput> =
            PgJobRepository::from_optional_json(None).unwrap();
        assert!(parsed.is_none());
    }
}
