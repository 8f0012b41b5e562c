use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::Utc;

use super::domain::{
    DecisionRecord, Submission, SubmissionId, SubmissionKind, SubmissionPayload, SubmissionStatus,
};

/// Storage abstraction so the engine can be exercised against in-memory or
/// durable backends.
///
/// `compare_and_set_status` is the single concurrency primitive the pipeline
/// relies on: it must be linearizable per id, so at most one caller can ever
/// move a record out of `Pending`.
pub trait SubmissionStore: Send + Sync {
    fn create(&self, payload: SubmissionPayload) -> Result<Submission, StoreError>;
    fn get(&self, id: &SubmissionId) -> Result<Option<Submission>, StoreError>;
    /// Snapshot of records of one kind in one status, ordered by `created_at`
    /// ascending (ties broken by id). Recomputed on every call.
    fn list_by_status(
        &self,
        kind: SubmissionKind,
        status: SubmissionStatus,
    ) -> Result<Vec<Submission>, StoreError>;
    /// Atomically transition a record, but only if its stored version still
    /// equals `expected_version`. On success the status and decision are set
    /// and the version is incremented; on mismatch nothing is mutated.
    fn compare_and_set_status(
        &self,
        id: &SubmissionId,
        expected_version: u64,
        new_status: SubmissionStatus,
        decision: DecisionRecord,
    ) -> Result<Submission, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("submission not found")]
    NotFound,
    #[error("submission version does not match")]
    VersionConflict,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

static SUBMISSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_submission_id() -> SubmissionId {
    let id = SUBMISSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SubmissionId(format!("sub-{id:06}"))
}

/// Reference store backed by a mutex-guarded map.
///
/// The mutex serializes every `compare_and_set_status`, which satisfies the
/// per-id linearizability contract.
#[derive(Default)]
pub struct MemorySubmissionStore {
    records: Mutex<BTreeMap<SubmissionId, Submission>>,
}

impl SubmissionStore for MemorySubmissionStore {
    fn create(&self, payload: SubmissionPayload) -> Result<Submission, StoreError> {
        let submission = Submission {
            id: next_submission_id(),
            payload,
            status: SubmissionStatus::Pending,
            created_at: Utc::now(),
            decision: None,
            version: 0,
        };

        let mut guard = self.records.lock().expect("store mutex poisoned");
        guard.insert(submission.id.clone(), submission.clone());
        Ok(submission)
    }

    fn get(&self, id: &SubmissionId) -> Result<Option<Submission>, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list_by_status(
        &self,
        kind: SubmissionKind,
        status: SubmissionStatus,
    ) -> Result<Vec<Submission>, StoreError> {
        let guard = self.records.lock().expect("store mutex poisoned");
        let mut matches: Vec<Submission> = guard
            .values()
            .filter(|record| record.kind() == kind && record.status == status)
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(matches)
    }

    fn compare_and_set_status(
        &self,
        id: &SubmissionId,
        expected_version: u64,
        new_status: SubmissionStatus,
        decision: DecisionRecord,
    ) -> Result<Submission, StoreError> {
        let mut guard = self.records.lock().expect("store mutex poisoned");
        let record = guard.get_mut(id).ok_or(StoreError::NotFound)?;

        // A record never leaves a terminal state, whatever version the caller
        // read.
        if record.status.is_terminal() || record.version != expected_version {
            return Err(StoreError::VersionConflict);
        }

        record.status = new_status;
        record.decision = Some(decision);
        record.version += 1;
        Ok(record.clone())
    }
}
