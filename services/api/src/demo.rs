use crate::infra::{
    default_registry, AccountDirectory, CredentialVault, TracingNotificationSink,
};
use clap::Args;
use jobboard::error::AppError;
use jobboard::moderation::{
    ApprovalEngine, DecisionError, DecisionOutcome, MemorySubmissionStore, StoreError, Submission,
    SubmissionKind, SubmissionPayload, SubmissionStore,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Actor identity recorded on the demo decisions
    #[arg(long, default_value = "root")]
    pub(crate) actor: String,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = Arc::new(MemorySubmissionStore::default());
    let accounts = Arc::new(AccountDirectory::default());
    let vault = Arc::new(CredentialVault::default());
    let registry = Arc::new(default_registry(accounts.clone(), vault.clone())?);
    let engine = ApprovalEngine::new(store.clone(), registry.clone(), Arc::new(TracingNotificationSink));

    println!("Moderation pipeline demo (in-memory store)\n");

    let user = intake(
        &*store,
        &registry,
        SubmissionPayload::UserRegistration {
            name: "Dana Whitfield".to_string(),
            email: "dana@example.org".to_string(),
        },
    )?;
    let credential = intake(
        &*store,
        &registry,
        SubmissionPayload::UploadedCredential {
            document_name: "Forklift certificate".to_string(),
            storage_key: "uploads/creds/forklift-7731.pdf".to_string(),
            uploaded_by: "dana@example.org".to_string(),
        },
    )?;
    let admin = intake(
        &*store,
        &registry,
        SubmissionPayload::AdminRegistration {
            name: "Moderation Lead".to_string(),
            email: "lead@example.org".to_string(),
        },
    )?;

    for kind in SubmissionKind::ALL {
        let pending = engine.list_pending(kind).map_err(store_error)?;
        println!("Pending {}: {}", kind.label(), pending.len());
        for submission in &pending {
            println!("  - {} (created {})", submission.id.0, submission.created_at);
        }
    }

    println!("\nApproving {} as '{}'", user.id.0, args.actor);
    report_decision(engine.decide(&user.id, DecisionOutcome::Approved, &args.actor, None));

    println!("Rejecting {} as '{}'", credential.id.0, args.actor);
    report_decision(engine.decide(
        &credential.id,
        DecisionOutcome::Rejected,
        &args.actor,
        Some("unreadable scan".to_string()),
    ));

    println!("Approving {} as '{}'", admin.id.0, args.actor);
    report_decision(engine.decide(&admin.id, DecisionOutcome::Approved, &args.actor, None));

    println!("\nA second administrator repeats the admin approval:");
    report_decision(engine.decide(&admin.id, DecisionOutcome::Rejected, "root2", None));

    println!("\nActive users:  {:?}", accounts.active_users());
    println!("Active admins: {:?}", accounts.active_admins());
    println!("Published credentials: {:?}", vault.published());
    println!("Credentials marked for deletion: {:?}", vault.marked_for_deletion());

    Ok(())
}

fn intake(
    store: &dyn SubmissionStore,
    registry: &jobboard::moderation::KindRegistry,
    payload: SubmissionPayload,
) -> Result<Submission, AppError> {
    registry
        .validate_intake(&payload)
        .map_err(|err| AppError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string())))?;
    let submission = store.create(payload).map_err(store_error)?;
    println!(
        "Intake accepted {} ({})",
        submission.id.0,
        submission.kind().label()
    );
    Ok(submission)
}

fn report_decision(result: Result<jobboard::moderation::DecisionResult, DecisionError>) {
    match result {
        Ok(result) => println!(
            "  -> {} (version {}, side effect {})",
            result.submission.decision_summary(),
            result.submission.version,
            result.side_effect.label()
        ),
        Err(err) => println!("  -> refused: {err}"),
    }
}

fn store_error(err: StoreError) -> AppError {
    AppError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        err.to_string(),
    ))
}
