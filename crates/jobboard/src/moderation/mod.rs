//! Moderation/approval pipeline for pending job-board submissions.
//!
//! Heterogeneous pending items (user registrations, uploaded credentials,
//! admin-registration requests) flow through one generic pipeline: the
//! [`store::SubmissionStore`] owns the records and the single atomic
//! compare-and-set transition, the [`registry::KindRegistry`] maps each kind
//! to its intake rules and decision side effects, and the
//! [`engine::ApprovalEngine`] orchestrates a decision exactly once per
//! submission.

pub mod domain;
pub mod engine;
pub mod registry;
pub mod router;
pub mod store;

#[cfg(test)]
mod tests;

pub use domain::{
    DecisionRecord, PendingSubmissionView, Submission, SubmissionId, SubmissionKind,
    SubmissionPayload, SubmissionStatus,
};
pub use engine::{
    ApprovalEngine, DecisionError, DecisionNotice, DecisionOutcome, DecisionResult,
    NotificationError, NotificationSink, SideEffectOutcome,
};
pub use registry::{
    require_email, require_field, IntakeError, KindHandler, KindRegistry, KindRegistryBuilder,
    RegistryError, SideEffectError,
};
pub use router::{moderation_router, DecisionRequest, DecisionView};
pub use store::{MemorySubmissionStore, StoreError, SubmissionStore};
