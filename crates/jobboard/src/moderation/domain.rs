use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for items sitting in the moderation queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubmissionId(pub String);

/// Closed set of submission categories the moderation queue accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    UserRegistration,
    UploadedCredential,
    AdminRegistration,
}

impl SubmissionKind {
    pub const ALL: [SubmissionKind; 3] = [
        SubmissionKind::UserRegistration,
        SubmissionKind::UploadedCredential,
        SubmissionKind::AdminRegistration,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            SubmissionKind::UserRegistration => "user_registration",
            SubmissionKind::UploadedCredential => "uploaded_credential",
            SubmissionKind::AdminRegistration => "admin_registration",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.label() == value.trim())
    }
}

/// Kind-specific data captured by the intake paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmissionPayload {
    UserRegistration {
        name: String,
        email: String,
    },
    UploadedCredential {
        document_name: String,
        storage_key: String,
        uploaded_by: String,
    },
    AdminRegistration {
        name: String,
        email: String,
    },
}

impl SubmissionPayload {
    pub const fn kind(&self) -> SubmissionKind {
        match self {
            SubmissionPayload::UserRegistration { .. } => SubmissionKind::UserRegistration,
            SubmissionPayload::UploadedCredential { .. } => SubmissionKind::UploadedCredential,
            SubmissionPayload::AdminRegistration { .. } => SubmissionKind::AdminRegistration,
        }
    }
}

/// Lifecycle status of a submission: pending until exactly one decision lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        }
    }

    pub const fn is_pending(self) -> bool {
        matches!(self, SubmissionStatus::Pending)
    }

    pub const fn is_terminal(self) -> bool {
        !self.is_pending()
    }
}

/// Record of who decided a submission, when, and why.
///
/// Present on a submission if and only if its status has left `Pending`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decided_by: String,
    pub decided_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// The unit under review.
///
/// `id`, `payload`, and `created_at` are immutable after creation; `status`,
/// `decision`, and `version` change together through the store's
/// compare-and-set, at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub payload: SubmissionPayload,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<DecisionRecord>,
    pub version: u64,
}

impl Submission {
    pub fn kind(&self) -> SubmissionKind {
        self.payload.kind()
    }

    pub fn decision_summary(&self) -> String {
        match &self.decision {
            Some(decision) => match &decision.reason {
                Some(reason) => format!(
                    "{} by {} ({reason})",
                    self.status.label(),
                    decision.decided_by
                ),
                None => format!("{} by {}", self.status.label(), decision.decided_by),
            },
            None => "awaiting review".to_string(),
        }
    }

    /// Listing view for pending items; decision fields are omitted since they
    /// are always empty while a submission is pending.
    pub fn pending_view(&self) -> PendingSubmissionView {
        PendingSubmissionView {
            id: self.id.clone(),
            kind: self.kind(),
            payload: self.payload.clone(),
            created_at: self.created_at,
        }
    }
}

/// Sanitized representation of a pending submission for admin listings.
#[derive(Debug, Clone, Serialize)]
pub struct PendingSubmissionView {
    pub id: SubmissionId,
    pub kind: SubmissionKind,
    pub payload: SubmissionPayload,
    pub created_at: DateTime<Utc>,
}
