use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::moderation::domain::{
    DecisionRecord, Submission, SubmissionId, SubmissionKind, SubmissionPayload, SubmissionStatus,
};
use crate::moderation::engine::{
    ApprovalEngine, DecisionNotice, NotificationError, NotificationSink,
};
use crate::moderation::registry::{
    require_email, require_field, IntakeError, KindHandler, KindRegistry, SideEffectError,
};
use crate::moderation::store::{MemorySubmissionStore, StoreError, SubmissionStore};

pub(super) fn user_payload() -> SubmissionPayload {
    SubmissionPayload::UserRegistration {
        name: "Dana Whitfield".to_string(),
        email: "dana@example.org".to_string(),
    }
}

pub(super) fn credential_payload() -> SubmissionPayload {
    SubmissionPayload::UploadedCredential {
        document_name: "Forklift certificate".to_string(),
        storage_key: "uploads/creds/forklift-7731.pdf".to_string(),
        uploaded_by: "dana@example.org".to_string(),
    }
}

pub(super) fn admin_payload() -> SubmissionPayload {
    SubmissionPayload::AdminRegistration {
        name: "Moderation Lead".to_string(),
        email: "lead@example.org".to_string(),
    }
}

/// Handler double registered for every kind: validates with the shared rules
/// and records each decision hook invocation.
#[derive(Default)]
pub(super) struct RecordingHandler {
    approvals: Mutex<Vec<SubmissionId>>,
    rejections: Mutex<Vec<SubmissionId>>,
    failure: Mutex<Option<String>>,
}

impl RecordingHandler {
    pub(super) fn approvals(&self) -> Vec<SubmissionId> {
        self.approvals.lock().expect("handler mutex poisoned").clone()
    }

    pub(super) fn rejections(&self) -> Vec<SubmissionId> {
        self.rejections
            .lock()
            .expect("handler mutex poisoned")
            .clone()
    }

    pub(super) fn set_failure(&self, reason: Option<&str>) {
        *self.failure.lock().expect("handler mutex poisoned") = reason.map(str::to_string);
    }

    fn check_failure(&self) -> Result<(), SideEffectError> {
        match self.failure.lock().expect("handler mutex poisoned").clone() {
            Some(reason) => Err(SideEffectError(reason)),
            None => Ok(()),
        }
    }
}

impl KindHandler for RecordingHandler {
    fn validate_intake(&self, payload: &SubmissionPayload) -> Result<(), IntakeError> {
        match payload {
            SubmissionPayload::UserRegistration { name, email }
            | SubmissionPayload::AdminRegistration { name, email } => {
                require_field("name", name)?;
                require_email(email)
            }
            SubmissionPayload::UploadedCredential {
                document_name,
                storage_key,
                uploaded_by,
            } => {
                require_field("document_name", document_name)?;
                require_field("storage_key", storage_key)?;
                require_field("uploaded_by", uploaded_by)
            }
        }
    }

    fn on_approve(&self, submission: &Submission) -> Result<(), SideEffectError> {
        self.check_failure()?;
        self.approvals
            .lock()
            .expect("handler mutex poisoned")
            .push(submission.id.clone());
        Ok(())
    }

    fn on_reject(&self, submission: &Submission) -> Result<(), SideEffectError> {
        self.check_failure()?;
        self.rejections
            .lock()
            .expect("handler mutex poisoned")
            .push(submission.id.clone());
        Ok(())
    }
}

pub(super) fn recording_registry() -> (Arc<KindRegistry>, Arc<RecordingHandler>) {
    let handler = Arc::new(RecordingHandler::default());
    let registry = KindRegistry::builder()
        .register(SubmissionKind::UserRegistration, handler.clone())
        .register(SubmissionKind::UploadedCredential, handler.clone())
        .register(SubmissionKind::AdminRegistration, handler.clone())
        .build()
        .expect("all kinds registered");
    (Arc::new(registry), handler)
}

#[derive(Default)]
pub(super) struct MemorySink {
    notices: Mutex<Vec<DecisionNotice>>,
}

impl MemorySink {
    pub(super) fn notices(&self) -> Vec<DecisionNotice> {
        self.notices.lock().expect("sink mutex poisoned").clone()
    }
}

impl NotificationSink for MemorySink {
    fn publish(&self, notice: DecisionNotice) -> Result<(), NotificationError> {
        self.notices.lock().expect("sink mutex poisoned").push(notice);
        Ok(())
    }
}

pub(super) struct FailingSink;

impl NotificationSink for FailingSink {
    fn publish(&self, _notice: DecisionNotice) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("sink offline".to_string()))
    }
}

pub(super) fn build_engine() -> (
    Arc<ApprovalEngine<MemorySubmissionStore, MemorySink>>,
    Arc<MemorySubmissionStore>,
    Arc<RecordingHandler>,
    Arc<MemorySink>,
) {
    let store = Arc::new(MemorySubmissionStore::default());
    let (registry, handler) = recording_registry();
    let sink = Arc::new(MemorySink::default());
    let engine = Arc::new(ApprovalEngine::new(store.clone(), registry, sink.clone()));
    (engine, store, handler, sink)
}

/// Store whose next `forced` compare-and-set calls report a version conflict
/// while leaving the record pending, as if a racing writer had bumped and
/// released the version.
pub(super) struct FlakyStore {
    inner: MemorySubmissionStore,
    forced: AtomicUsize,
}

impl FlakyStore {
    pub(super) fn conflicting(times: usize) -> Self {
        Self {
            inner: MemorySubmissionStore::default(),
            forced: AtomicUsize::new(times),
        }
    }
}

impl SubmissionStore for FlakyStore {
    fn create(&self, payload: SubmissionPayload) -> Result<Submission, StoreError> {
        self.inner.create(payload)
    }

    fn get(&self, id: &SubmissionId) -> Result<Option<Submission>, StoreError> {
        self.inner.get(id)
    }

    fn list_by_status(
        &self,
        kind: SubmissionKind,
        status: SubmissionStatus,
    ) -> Result<Vec<Submission>, StoreError> {
        self.inner.list_by_status(kind, status)
    }

    fn compare_and_set_status(
        &self,
        id: &SubmissionId,
        expected_version: u64,
        new_status: SubmissionStatus,
        decision: DecisionRecord,
    ) -> Result<Submission, StoreError> {
        if self
            .forced
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok()
        {
            return Err(StoreError::VersionConflict);
        }
        self.inner
            .compare_and_set_status(id, expected_version, new_status, decision)
    }
}

/// Store that lets a rival decision win the first compare-and-set race: the
/// rival's transition is applied and the caller observes the conflict.
pub(super) struct RacingStore {
    inner: MemorySubmissionStore,
    raced: AtomicBool,
}

impl RacingStore {
    pub(super) fn new() -> Self {
        Self {
            inner: MemorySubmissionStore::default(),
            raced: AtomicBool::new(false),
        }
    }
}

impl SubmissionStore for RacingStore {
    fn create(&self, payload: SubmissionPayload) -> Result<Submission, StoreError> {
        self.inner.create(payload)
    }

    fn get(&self, id: &SubmissionId) -> Result<Option<Submission>, StoreError> {
        self.inner.get(id)
    }

    fn list_by_status(
        &self,
        kind: SubmissionKind,
        status: SubmissionStatus,
    ) -> Result<Vec<Submission>, StoreError> {
        self.inner.list_by_status(kind, status)
    }

    fn compare_and_set_status(
        &self,
        id: &SubmissionId,
        expected_version: u64,
        new_status: SubmissionStatus,
        decision: DecisionRecord,
    ) -> Result<Submission, StoreError> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            let rival = DecisionRecord {
                decided_by: "rival-admin".to_string(),
                decided_at: chrono::Utc::now(),
                reason: None,
            };
            self.inner
                .compare_and_set_status(id, expected_version, SubmissionStatus::Rejected, rival)?;
            return Err(StoreError::VersionConflict);
        }
        self.inner
            .compare_and_set_status(id, expected_version, new_status, decision)
    }
}

pub(super) struct UnavailableStore;

impl SubmissionStore for UnavailableStore {
    fn create(&self, _payload: SubmissionPayload) -> Result<Submission, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn get(&self, _id: &SubmissionId) -> Result<Option<Submission>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn list_by_status(
        &self,
        _kind: SubmissionKind,
        _status: SubmissionStatus,
    ) -> Result<Vec<Submission>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn compare_and_set_status(
        &self,
        _id: &SubmissionId,
        _expected_version: u64,
        _new_status: SubmissionStatus,
        _decision: DecisionRecord,
    ) -> Result<Submission, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
