//! Database query operations for `EchoLens`

use crate::models::{AnalysisDb, CallDb, CompletedCallDb, TranscriptDb};
use chrono::{DateTime, Utc};
use echolens_core::types::CompletedCall;
use echolens_core::{AnalysisOutcome, Call, CallStatus, Error, Result};
use sqlx::PgPool;
use uuid::Uuid;

/// Call record operations
pub struct CallQueries;

impl CallQueries {
    /// Insert a new call
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn insert(pool: &PgPool, call: &Call) -> Result<Uuid> {
        let query = r"
            INSERT INTO calls (id, status, audio_key, duration_sec, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
        ";

        let row: (Uuid,) = sqlx::query_as(query)
            .bind(call.id)
            .bind(call.status.to_string())
            .bind(&call.audio_key)
            .bind(call.duration_sec)
            .bind(call.created_at)
            .fetch_one(pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(row.0)
    }

    /// Find a call by id
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id is unknown, or a database error.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<CallDb> {
        let query = "SELECT * FROM calls WHERE id = $1";

        sqlx::query_as::<_, CallDb>(query)
            .bind(id)
            .fetch_one(pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => Error::NotFound {
                    resource: format!("Call with ID {id}"),
                },
                _ => Error::Database(e.to_string()),
            })
    }

    /// Update a call's lifecycle status
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the id is unknown, or a database error.
    pub async fn update_status(pool: &PgPool, id: Uuid, status: CallStatus) -> Result<()> {
        let query = "UPDATE calls SET status = $1 WHERE id = $2";

        let result = sqlx::query(query)
            .bind(status.to_string())
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound {
                resource: format!("Call with ID {id}"),
            });
        }

        Ok(())
    }

    /// Find calls the recovery sweeper should look at: anything PENDING or
    /// stuck in PROCESSING from a crashed worker
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_recoverable(pool: &PgPool) -> Result<Vec<CallDb>> {
        let query = r"
            SELECT * FROM calls
            WHERE status IN ('PENDING', 'PROCESSING')
            ORDER BY created_at ASC
        ";

        sqlx::query_as::<_, CallDb>(query)
            .fetch_all(pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }
}

/// Transcript operations
pub struct TranscriptQueries;

impl TranscriptQueries {
    /// Upsert the transcript for a call
    ///
    /// Keyed by call id: a retried attempt overwrites the previous row
    /// instead of duplicating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn upsert(
        pool: &PgPool,
        call_id: Uuid,
        text: &str,
        model: Option<&str>,
    ) -> Result<()> {
        let query = r"
            INSERT INTO transcripts (call_id, text, model, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (call_id) DO UPDATE
            SET text = EXCLUDED.text,
                model = EXCLUDED.model,
                created_at = EXCLUDED.created_at
        ";

        sqlx::query(query)
            .bind(call_id)
            .bind(text)
            .bind(model)
            .execute(pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    /// Fetch the transcript for a call, if one exists
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_call(pool: &PgPool, call_id: Uuid) -> Result<Option<TranscriptDb>> {
        let query = "SELECT * FROM transcripts WHERE call_id = $1";

        sqlx::query_as::<_, TranscriptDb>(query)
            .bind(call_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }
}

/// Analysis operations
pub struct AnalysisQueries;

impl AnalysisQueries {
    /// Upsert the analysis for a call, same convergent semantics as the
    /// transcript upsert
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn upsert(pool: &PgPool, call_id: Uuid, outcome: &AnalysisOutcome) -> Result<()> {
        let query = r"
            INSERT INTO analyses (
                call_id, sentiment, topic, problem_resolved, summary, confidence, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (call_id) DO UPDATE
            SET sentiment = EXCLUDED.sentiment,
                topic = EXCLUDED.topic,
                problem_resolved = EXCLUDED.problem_resolved,
                summary = EXCLUDED.summary,
                confidence = EXCLUDED.confidence,
                created_at = EXCLUDED.created_at
        ";

        sqlx::query(query)
            .bind(call_id)
            .bind(outcome.sentiment.to_string())
            .bind(outcome.topic.to_string())
            .bind(outcome.problem_resolved)
            .bind(&outcome.summary)
            .bind(outcome.confidence)
            .execute(pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    /// Fetch the analysis for a call, if one exists
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_call(pool: &PgPool, call_id: Uuid) -> Result<Option<AnalysisDb>> {
        let query = "SELECT * FROM analyses WHERE call_id = $1";

        sqlx::query_as::<_, AnalysisDb>(query)
            .bind(call_id)
            .fetch_optional(pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }
}

/// Read-side queries backing the analytics engine
pub struct AnalyticsQueries;

impl AnalyticsQueries {
    /// Fetch analyses joined to their DONE parent calls, optionally limited
    /// to calls created on or after `since`
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or a stored enum value
    /// cannot be parsed.
    pub async fn completed_since(
        pool: &PgPool,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<CompletedCall>> {
        let query = r"
            SELECT a.call_id, a.topic, a.sentiment, a.problem_resolved,
                   a.confidence, c.created_at
            FROM analyses a
            JOIN calls c ON c.id = a.call_id
            WHERE c.status = 'DONE'
              AND ($1::timestamptz IS NULL OR c.created_at >= $1)
            ORDER BY c.created_at ASC
        ";

        let rows = sqlx::query_as::<_, CompletedCallDb>(query)
            .bind(since)
            .fetch_all(pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        rows.into_iter().map(CompletedCallDb::into_completed).collect()
    }

    /// Most recent creation timestamp among DONE calls, the cache watermark
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn latest_completed_at(pool: &PgPool) -> Result<Option<DateTime<Utc>>> {
        let query = "SELECT MAX(created_at) FROM calls WHERE status = 'DONE'";

        let row: (Option<DateTime<Utc>>,) = sqlx::query_as(query)
            .fetch_one(pool)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(row.0)
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;

    async fn test_pool() -> PgPool {
        let url = std::env::var("ECHOLENS_TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/echolens_test".to_string());
        PgPool::connect(&url).await.unwrap()
    }

    #[tokio::test]
    #[ignore = "Requires database connection"]
    async fn test_insert_and_find_call() {
        let pool = test_pool().await;
        let call = Call::new("uploads/test.wav");

        let id = CallQueries::insert(&pool, &call).await.unwrap();
        assert_eq!(id, call.id);

        let found = CallQueries::find_by_id(&pool, id).await.unwrap();
        assert_eq!(found.status, "PENDING");
        assert_eq!(found.audio_key, "uploads/test.wav");
    }

    #[tokio::test]
    #[ignore = "Requires database connection"]
    async fn test_find_missing_call_is_not_found() {
        let pool = test_pool().await;
        let result = CallQueries::find_by_id(&pool, Uuid::new_v4()).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[tokio::test]
    #[ignore = "Requires database connection"]
    async fn test_analysis_upsert_is_idempotent() {
        let pool = test_pool().await;
        let call = Call::new("uploads/idem.wav");
        CallQueries::insert(&pool, &call).await.unwrap();

        let outcome = AnalysisOutcome {
            sentiment: echolens_core::Sentiment::Neutral,
            topic: echolens_core::Topic::Shipping,
            problem_resolved: true,
            summary: "Reshipped.".to_string(),
            confidence: Some(0.9),
        };

        AnalysisQueries::upsert(&pool, call.id, &outcome).await.unwrap();
        AnalysisQueries::upsert(&pool, call.id, &outcome).await.unwrap();

        let stored = AnalysisQueries::find_by_call(&pool, call.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.topic, "shipping");

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM analyses WHERE call_id = $1")
            .bind(call.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }
}
