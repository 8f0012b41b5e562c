use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use jobboard::moderation::{
    require_email, require_field, DecisionNotice, IntakeError, KindHandler, KindRegistry,
    NotificationError, NotificationSink, RegistryError, SideEffectError, Submission,
    SubmissionKind, SubmissionPayload,
};
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-memory stand-in for the account system the promotion side effects
/// target. Inserts are idempotent, so a retried side effect is harmless.
#[derive(Default)]
pub(crate) struct AccountDirectory {
    active_users: Mutex<BTreeSet<String>>,
    active_admins: Mutex<BTreeSet<String>>,
}

impl AccountDirectory {
    pub(crate) fn activate_user(&self, email: &str) {
        self.active_users
            .lock()
            .expect("directory mutex poisoned")
            .insert(email.to_string());
    }

    pub(crate) fn activate_admin(&self, email: &str) {
        self.active_admins
            .lock()
            .expect("directory mutex poisoned")
            .insert(email.to_string());
    }

    pub(crate) fn active_users(&self) -> Vec<String> {
        self.active_users
            .lock()
            .expect("directory mutex poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub(crate) fn active_admins(&self) -> Vec<String> {
        self.active_admins
            .lock()
            .expect("directory mutex poisoned")
            .iter()
            .cloned()
            .collect()
    }
}

/// In-memory stand-in for uploaded-credential storage: approval publishes the
/// file, rejection marks it for deletion.
#[derive(Default)]
pub(crate) struct CredentialVault {
    published: Mutex<BTreeSet<String>>,
    marked_for_deletion: Mutex<BTreeSet<String>>,
}

impl CredentialVault {
    pub(crate) fn publish(&self, storage_key: &str) {
        self.published
            .lock()
            .expect("vault mutex poisoned")
            .insert(storage_key.to_string());
    }

    pub(crate) fn mark_for_deletion(&self, storage_key: &str) {
        self.marked_for_deletion
            .lock()
            .expect("vault mutex poisoned")
            .insert(storage_key.to_string());
    }

    pub(crate) fn published(&self) -> Vec<String> {
        self.published
            .lock()
            .expect("vault mutex poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub(crate) fn marked_for_deletion(&self) -> Vec<String> {
        self.marked_for_deletion
            .lock()
            .expect("vault mutex poisoned")
            .iter()
            .cloned()
            .collect()
    }
}

pub(crate) struct UserRegistrationHandler {
    pub(crate) accounts: Arc<AccountDirectory>,
}

impl KindHandler for UserRegistrationHandler {
    fn validate_intake(&self, payload: &SubmissionPayload) -> Result<(), IntakeError> {
        match payload {
            SubmissionPayload::UserRegistration { name, email } => {
                require_field("name", name)?;
                require_email(email)
            }
            other => Err(IntakeError::KindMismatch {
                expected: SubmissionKind::UserRegistration,
                found: other.kind(),
            }),
        }
    }

    fn on_approve(&self, submission: &Submission) -> Result<(), SideEffectError> {
        match &submission.payload {
            SubmissionPayload::UserRegistration { email, .. } => {
                self.accounts.activate_user(email);
                Ok(())
            }
            other => Err(unexpected_payload(other)),
        }
    }

    fn on_reject(&self, _submission: &Submission) -> Result<(), SideEffectError> {
        Ok(())
    }
}

pub(crate) struct UploadedCredentialHandler {
    pub(crate) vault: Arc<CredentialVault>,
}

impl KindHandler for UploadedCredentialHandler {
    fn validate_intake(&self, payload: &SubmissionPayload) -> Result<(), IntakeError> {
        match payload {
            SubmissionPayload::UploadedCredential {
                document_name,
                storage_key,
                uploaded_by,
            } => {
                require_field("document_name", document_name)?;
                require_field("storage_key", storage_key)?;
                require_field("uploaded_by", uploaded_by)
            }
            other => Err(IntakeError::KindMismatch {
                expected: SubmissionKind::UploadedCredential,
                found: other.kind(),
            }),
        }
    }

    fn on_approve(&self, submission: &Submission) -> Result<(), SideEffectError> {
        match &submission.payload {
            SubmissionPayload::UploadedCredential { storage_key, .. } => {
                self.vault.publish(storage_key);
                Ok(())
            }
            other => Err(unexpected_payload(other)),
        }
    }

    fn on_reject(&self, submission: &Submission) -> Result<(), SideEffectError> {
        match &submission.payload {
            SubmissionPayload::UploadedCredential { storage_key, .. } => {
                self.vault.mark_for_deletion(storage_key);
                Ok(())
            }
            other => Err(unexpected_payload(other)),
        }
    }
}

pub(crate) struct AdminRegistrationHandler {
    pub(crate) accounts: Arc<AccountDirectory>,
}

impl KindHandler for AdminRegistrationHandler {
    fn validate_intake(&self, payload: &SubmissionPayload) -> Result<(), IntakeError> {
        match payload {
            SubmissionPayload::AdminRegistration { name, email } => {
                require_field("name", name)?;
                require_email(email)
            }
            other => Err(IntakeError::KindMismatch {
                expected: SubmissionKind::AdminRegistration,
                found: other.kind(),
            }),
        }
    }

    fn on_approve(&self, submission: &Submission) -> Result<(), SideEffectError> {
        match &submission.payload {
            SubmissionPayload::AdminRegistration { email, .. } => {
                self.accounts.activate_admin(email);
                Ok(())
            }
            other => Err(unexpected_payload(other)),
        }
    }

    fn on_reject(&self, _submission: &Submission) -> Result<(), SideEffectError> {
        Ok(())
    }
}

fn unexpected_payload(payload: &SubmissionPayload) -> SideEffectError {
    SideEffectError(format!(
        "unexpected payload kind {}",
        payload.kind().label()
    ))
}

pub(crate) fn default_registry(
    accounts: Arc<AccountDirectory>,
    vault: Arc<CredentialVault>,
) -> Result<KindRegistry, RegistryError> {
    KindRegistry::builder()
        .register(
            SubmissionKind::UserRegistration,
            Arc::new(UserRegistrationHandler {
                accounts: accounts.clone(),
            }),
        )
        .register(
            SubmissionKind::UploadedCredential,
            Arc::new(UploadedCredentialHandler { vault }),
        )
        .register(
            SubmissionKind::AdminRegistration,
            Arc::new(AdminRegistrationHandler { accounts }),
        )
        .build()
}

/// Best-effort sink: decision events only reach the logs here; a real
/// deployment would forward them to e-mail or chat.
#[derive(Default, Clone)]
pub(crate) struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn publish(&self, notice: DecisionNotice) -> Result<(), NotificationError> {
        tracing::info!(
            submission = %notice.submission_id.0,
            kind = notice.kind.label(),
            status = notice.final_status.label(),
            decided_by = %notice.decided_by,
            "moderation decision"
        );
        Ok(())
    }
}
