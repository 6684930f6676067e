//! Call record store abstraction
//!
//! The processor and sweeper talk to persistence through this trait so the
//! pipeline can be exercised against an in-memory store in tests.

use async_trait::async_trait;
use echolens_core::{AnalysisOutcome, Call, CallStatus, Error, Result};
use echolens_database::{AnalysisQueries, CallQueries, Database, TranscriptQueries};
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// Persistence operations the pipeline needs
#[async_trait]
pub trait CallStore: Send + Sync {
    /// Register a new call for processing
    async fn insert_call(&self, call: &Call) -> Result<Uuid>;

    /// Load a call by id
    async fn find_call(&self, id: Uuid) -> Result<Call>;

    /// Persist a status transition
    async fn update_status(&self, id: Uuid, status: CallStatus) -> Result<()>;

    /// Idempotently persist a transcript
    async fn upsert_transcript(&self, call_id: Uuid, text: &str, model: &str) -> Result<()>;

    /// Idempotently persist an analysis
    async fn upsert_analysis(&self, call_id: Uuid, outcome: &AnalysisOutcome) -> Result<()>;

    /// Calls the recovery sweeper should reconcile
    async fn recoverable_calls(&self) -> Result<Vec<Call>>;
}

/// Postgres-backed call store
#[derive(Debug, Clone)]
pub struct PgCallStore {
    db: Database,
}

impl PgCallStore {
    /// Create a store over a database pool
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CallStore for PgCallStore {
    async fn insert_call(&self, call: &Call) -> Result<Uuid> {
        CallQueries::insert(self.db.pool(), call).await
    }

    async fn find_call(&self, id: Uuid) -> Result<Call> {
        CallQueries::find_by_id(self.db.pool(), id)
            .await?
            .into_call()
    }

    async fn update_status(&self, id: Uuid, status: CallStatus) -> Result<()> {
        CallQueries::update_status(self.db.pool(), id, status).await
    }

    async fn upsert_transcript(&self, call_id: Uuid, text: &str, model: &str) -> Result<()> {
        TranscriptQueries::upsert(self.db.pool(), call_id, text, Some(model)).await
    }

    async fn upsert_analysis(&self, call_id: Uuid, outcome: &AnalysisOutcome) -> Result<()> {
        AnalysisQueries::upsert(self.db.pool(), call_id, outcome).await
    }

    async fn recoverable_calls(&self) -> Result<Vec<Call>> {
        CallQueries::find_recoverable(self.db.pool())
            .await?
            .into_iter()
            .map(echolens_database::CallDb::into_call)
            .collect()
    }
}

/// In-memory call store for tests
#[derive(Debug, Default)]
pub struct MemoryCallStore {
    calls: RwLock<HashMap<Uuid, Call>>,
    transcripts: RwLock<HashMap<Uuid, (String, String)>>,
    analyses: RwLock<HashMap<Uuid, AnalysisOutcome>>,
    fail_writes: RwLock<bool>,
    fail_status: RwLock<Option<CallStatus>>,
}

impl MemoryCallStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail, to exercise failure paths
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.write() = fail;
    }

    /// Make writes of one specific status fail while others succeed
    pub fn set_fail_status(&self, status: Option<CallStatus>) {
        *self.fail_status.write() = status;
    }

    /// Current status of a call, if known
    #[must_use]
    pub fn status_of(&self, id: Uuid) -> Option<CallStatus> {
        self.calls.read().get(&id).map(|c| c.status)
    }

    /// Stored transcript text and model, if any
    #[must_use]
    pub fn transcript_of(&self, id: Uuid) -> Option<(String, String)> {
        self.transcripts.read().get(&id).cloned()
    }

    /// Stored analysis, if any
    #[must_use]
    pub fn analysis_of(&self, id: Uuid) -> Option<AnalysisOutcome> {
        self.analyses.read().get(&id).cloned()
    }

    fn check_writes(&self) -> Result<()> {
        if *self.fail_writes.read() {
            return Err(Error::Persistence("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CallStore for MemoryCallStore {
    async fn insert_call(&self, call: &Call) -> Result<Uuid> {
        self.check_writes()?;
        self.calls.write().insert(call.id, call.clone());
        Ok(call.id)
    }

    async fn find_call(&self, id: Uuid) -> Result<Call> {
        self.calls.read().get(&id).cloned().ok_or_else(|| Error::NotFound {
            resource: format!("Call with ID {id}"),
        })
    }

    async fn update_status(&self, id: Uuid, status: CallStatus) -> Result<()> {
        self.check_writes()?;
        if *self.fail_status.read() == Some(status) {
            return Err(Error::Persistence("status write rejected".to_string()));
        }
        let mut calls = self.calls.write();
        let call = calls.get_mut(&id).ok_or_else(|| Error::NotFound {
            resource: format!("Call with ID {id}"),
        })?;
        call.status = status;
        Ok(())
    }

    async fn upsert_transcript(&self, call_id: Uuid, text: &str, model: &str) -> Result<()> {
        self.check_writes()?;
        self.transcripts
            .write()
            .insert(call_id, (text.to_string(), model.to_string()));
        Ok(())
    }

    async fn upsert_analysis(&self, call_id: Uuid, outcome: &AnalysisOutcome) -> Result<()> {
        self.check_writes()?;
        self.analyses.write().insert(call_id, outcome.clone());
        Ok(())
    }

    async fn recoverable_calls(&self) -> Result<Vec<Call>> {
        let mut calls: Vec<Call> = self
            .calls
            .read()
            .values()
            .filter(|c| matches!(c.status, CallStatus::Pending | CallStatus::Processing))
            .cloned()
            .collect();
        calls.sort_by_key(|c| c.created_at);
        Ok(calls)
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_lifecycle() {
        let store = MemoryCallStore::new();
        let call = Call::new("uploads/a.wav");
        store.insert_call(&call).await.unwrap();

        store
            .update_status(call.id, CallStatus::Processing)
            .await
            .unwrap();
        assert_eq!(store.status_of(call.id), Some(CallStatus::Processing));

        let found = store.find_call(call.id).await.unwrap();
        assert_eq!(found.audio_key, "uploads/a.wav");
    }

    #[tokio::test]
    async fn test_memory_store_missing_call() {
        let store = MemoryCallStore::new();
        let result = store.find_call(Uuid::new_v4()).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_recoverable_excludes_terminal_states() {
        let store = MemoryCallStore::new();
        for status in [
            CallStatus::Pending,
            CallStatus::Processing,
            CallStatus::Done,
            CallStatus::Failed,
        ] {
            let mut call = Call::new("k");
            call.status = status;
            store.insert_call(&call).await.unwrap();
        }

        let recoverable = store.recoverable_calls().await.unwrap();
        assert_eq!(recoverable.len(), 2);
    }

    #[tokio::test]
    async fn test_upserts_are_convergent() {
        let store = MemoryCallStore::new();
        let call = Call::new("k");
        store.insert_call(&call).await.unwrap();

        store
            .upsert_transcript(call.id, "first", "whisper-1")
            .await
            .unwrap();
        store
            .upsert_transcript(call.id, "second", "whisper-1")
            .await
            .unwrap();

        let (text, _) = store.transcript_of(call.id).unwrap();
        assert_eq!(text, "second");
    }
}
