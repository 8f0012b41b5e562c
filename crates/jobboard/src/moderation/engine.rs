use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{
    DecisionRecord, Submission, SubmissionId, SubmissionKind, SubmissionStatus,
};
use super::registry::KindRegistry;
use super::store::{StoreError, SubmissionStore};

/// Terminal outcome an administrator may request for a pending submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    Approved,
    Rejected,
}

impl DecisionOutcome {
    pub const fn status(self) -> SubmissionStatus {
        match self {
            DecisionOutcome::Approved => SubmissionStatus::Approved,
            DecisionOutcome::Rejected => SubmissionStatus::Rejected,
        }
    }
}

/// Event handed to the notification sink after a decision lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionNotice {
    pub submission_id: SubmissionId,
    pub kind: SubmissionKind,
    pub final_status: SubmissionStatus,
    pub decided_by: String,
    pub decided_at: DateTime<Utc>,
}

/// Trait describing the outbound, best-effort decision event hook.
pub trait NotificationSink: Send + Sync {
    fn publish(&self, notice: DecisionNotice) -> Result<(), NotificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Whether the kind-specific side effect ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffectOutcome {
    Completed,
    Failed(String),
}

impl SideEffectOutcome {
    pub const fn label(&self) -> &'static str {
        match self {
            SideEffectOutcome::Completed => "completed",
            SideEffectOutcome::Failed(_) => "failed",
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            SideEffectOutcome::Completed => None,
            SideEffectOutcome::Failed(reason) => Some(reason),
        }
    }
}

/// Successful decision: the transitioned record plus the side-effect outcome.
///
/// A failed side effect still yields `Ok` — the status change is the
/// authoritative record and is never rolled back; callers retry only the side
/// effect.
#[derive(Debug, Clone)]
pub struct DecisionResult {
    pub submission: Submission,
    pub side_effect: SideEffectOutcome,
}

/// Error raised by `decide` and `retry_side_effect`.
#[derive(Debug, thiserror::Error)]
pub enum DecisionError {
    #[error("submission not found")]
    NotFound,
    #[error("submission already decided as {}", .status.label())]
    AlreadyDecided { status: SubmissionStatus },
    #[error("another administrator already acted on this item")]
    Conflict,
    #[error("invalid decision request: {0}")]
    InvalidRequest(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Orchestrates listing, validation, the atomic transition, side effects, and
/// notification.
///
/// The engine is stateless and reentrant; all mutual exclusion is delegated
/// to the store's compare-and-set.
pub struct ApprovalEngine<S, N> {
    store: Arc<S>,
    registry: Arc<KindRegistry>,
    notifications: Arc<N>,
}

impl<S, N> ApprovalEngine<S, N>
where
    S: SubmissionStore + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(store: Arc<S>, registry: Arc<KindRegistry>, notifications: Arc<N>) -> Self {
        Self {
            store,
            registry,
            notifications,
        }
    }

    /// Pending queue for one kind, oldest first.
    pub fn list_pending(&self, kind: SubmissionKind) -> Result<Vec<Submission>, StoreError> {
        self.store.list_by_status(kind, SubmissionStatus::Pending)
    }

    /// Decide a pending submission exactly once.
    ///
    /// Safe to retry wholesale: once a decision has landed, a repeat call
    /// short-circuits with `AlreadyDecided` before reaching the store's
    /// compare-and-set or the side-effect handler.
    pub fn decide(
        &self,
        id: &SubmissionId,
        outcome: DecisionOutcome,
        actor: &str,
        reason: Option<String>,
    ) -> Result<DecisionResult, DecisionError> {
        let current = self.fetch(id)?;
        if current.status.is_terminal() {
            return Err(DecisionError::AlreadyDecided {
                status: current.status,
            });
        }
        if actor.trim().is_empty() {
            return Err(DecisionError::InvalidRequest(
                "actor identity must not be empty".to_string(),
            ));
        }

        let decision = DecisionRecord {
            decided_by: actor.to_string(),
            decided_at: Utc::now(),
            reason,
        };

        let updated = match self.store.compare_and_set_status(
            id,
            current.version,
            outcome.status(),
            decision.clone(),
        ) {
            Ok(updated) => updated,
            Err(StoreError::VersionConflict) => {
                // A racing writer got there first. Re-read once; if the item
                // is still pending, try the compare-and-set one more time.
                let fresh = self.fetch(id)?;
                if fresh.status.is_terminal() {
                    return Err(DecisionError::Conflict);
                }
                match self.store.compare_and_set_status(
                    id,
                    fresh.version,
                    outcome.status(),
                    decision,
                ) {
                    Ok(updated) => updated,
                    Err(StoreError::VersionConflict) => return Err(DecisionError::Conflict),
                    Err(other) => return Err(Self::map_store_error(other)),
                }
            }
            Err(other) => return Err(Self::map_store_error(other)),
        };

        let side_effect = self.run_side_effect(&updated);
        self.notify(&updated);

        Ok(DecisionResult {
            submission: updated,
            side_effect,
        })
    }

    /// Re-run only the side effect of an already-decided submission.
    ///
    /// The decision itself is untouched: no status change, no version bump,
    /// no notification.
    pub fn retry_side_effect(&self, id: &SubmissionId) -> Result<DecisionResult, DecisionError> {
        let submission = self.fetch(id)?;
        if submission.status.is_pending() {
            return Err(DecisionError::InvalidRequest(
                "submission has not been decided yet".to_string(),
            ));
        }

        let side_effect = self.run_side_effect(&submission);
        Ok(DecisionResult {
            submission,
            side_effect,
        })
    }

    fn fetch(&self, id: &SubmissionId) -> Result<Submission, DecisionError> {
        match self.store.get(id) {
            Ok(Some(submission)) => Ok(submission),
            Ok(None) => Err(DecisionError::NotFound),
            Err(err) => Err(Self::map_store_error(err)),
        }
    }

    /// Only called with terminal submissions.
    fn run_side_effect(&self, submission: &Submission) -> SideEffectOutcome {
        let handler = self.registry.handler_for(submission.kind());
        let result = if submission.status == SubmissionStatus::Approved {
            handler.on_approve(submission)
        } else {
            handler.on_reject(submission)
        };

        match result {
            Ok(()) => SideEffectOutcome::Completed,
            Err(err) => SideEffectOutcome::Failed(err.to_string()),
        }
    }

    /// Best-effort, out of band; a sink failure never affects the result.
    fn notify(&self, submission: &Submission) {
        let Some(decision) = submission.decision.as_ref() else {
            return;
        };

        let notice = DecisionNotice {
            submission_id: submission.id.clone(),
            kind: submission.kind(),
            final_status: submission.status,
            decided_by: decision.decided_by.clone(),
            decided_at: decision.decided_at,
        };

        if let Err(err) = self.notifications.publish(notice) {
            warn!(
                submission_id = %submission.id.0,
                error = %err,
                "decision notification dropped"
            );
        }
    }

    fn map_store_error(err: StoreError) -> DecisionError {
        match err {
            StoreError::NotFound => DecisionError::NotFound,
            StoreError::VersionConflict => DecisionError::Conflict,
            StoreError::Unavailable(reason) => DecisionError::Unavailable(reason),
        }
    }
}
