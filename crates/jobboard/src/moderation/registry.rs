use std::collections::BTreeMap;
use std::sync::Arc;

use super::domain::{Submission, SubmissionKind, SubmissionPayload};

/// Per-kind hooks invoked at intake time and after a decision lands.
///
/// Decision hooks must be idempotent: the engine (or a caller retrying a
/// failed side effect) may invoke them again for an already-decided
/// submission.
pub trait KindHandler: Send + Sync {
    /// Intake validation shared between the intake paths and this pipeline.
    fn validate_intake(&self, payload: &SubmissionPayload) -> Result<(), IntakeError>;
    /// Promotion side effect (activate the account, publish the file).
    fn on_approve(&self, submission: &Submission) -> Result<(), SideEffectError>;
    /// Cleanup side effect; typically a no-op.
    fn on_reject(&self, submission: &Submission) -> Result<(), SideEffectError>;
}

/// Validation errors raised at the intake boundary.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("malformed email address: {0}")]
    MalformedEmail(String),
    #[error("payload kind {} does not match intake kind {}", .found.label(), .expected.label())]
    KindMismatch {
        expected: SubmissionKind,
        found: SubmissionKind,
    },
}

/// Failure of a promotion/cleanup side effect. The status transition that
/// triggered it is already committed and is never rolled back.
#[derive(Debug, thiserror::Error)]
#[error("side effect failed: {0}")]
pub struct SideEffectError(pub String);

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no handler registered for kind {}", .0.label())]
    MissingKind(SubmissionKind),
}

/// Immutable table mapping each submission kind to its handler.
///
/// Built once at process start; read-only afterwards, so lookups are
/// infallible.
pub struct KindRegistry {
    handlers: BTreeMap<SubmissionKind, Arc<dyn KindHandler>>,
}

impl KindRegistry {
    pub fn builder() -> KindRegistryBuilder {
        KindRegistryBuilder::default()
    }

    pub fn handler_for(&self, kind: SubmissionKind) -> &Arc<dyn KindHandler> {
        self.handlers
            .get(&kind)
            .expect("builder guarantees a handler per kind")
    }

    pub fn validate_intake(&self, payload: &SubmissionPayload) -> Result<(), IntakeError> {
        self.handler_for(payload.kind()).validate_intake(payload)
    }
}

#[derive(Default)]
pub struct KindRegistryBuilder {
    handlers: BTreeMap<SubmissionKind, Arc<dyn KindHandler>>,
}

impl KindRegistryBuilder {
    pub fn register(mut self, kind: SubmissionKind, handler: Arc<dyn KindHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// Fails unless every kind in the closed set has a handler.
    pub fn build(self) -> Result<KindRegistry, RegistryError> {
        for kind in SubmissionKind::ALL {
            if !self.handlers.contains_key(&kind) {
                return Err(RegistryError::MissingKind(kind));
            }
        }
        Ok(KindRegistry {
            handlers: self.handlers,
        })
    }
}

/// Shared intake rules so handlers across kinds validate uniformly.
pub fn require_field(name: &'static str, value: &str) -> Result<(), IntakeError> {
    if value.trim().is_empty() {
        return Err(IntakeError::MissingField(name));
    }
    Ok(())
}

pub fn require_email(value: &str) -> Result<(), IntakeError> {
    let malformed = || IntakeError::MalformedEmail(value.to_string());

    let (local, domain) = value.split_once('@').ok_or_else(malformed)?;
    if local.is_empty() || domain.is_empty() {
        return Err(malformed());
    }
    if !domain.contains('.') || value.chars().any(char::is_whitespace) {
        return Err(malformed());
    }
    Ok(())
}
