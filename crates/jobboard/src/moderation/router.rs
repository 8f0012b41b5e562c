use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{SubmissionId, SubmissionKind};
use super::engine::{
    ApprovalEngine, DecisionError, DecisionOutcome, DecisionResult, NotificationSink,
};
use super::store::{StoreError, SubmissionStore};

/// Router builder exposing the administrative moderation endpoints.
pub fn moderation_router<S, N>(engine: Arc<ApprovalEngine<S, N>>) -> Router
where
    S: SubmissionStore + 'static,
    N: NotificationSink + 'static,
{
    Router::new()
        .route(
            "/api/v1/moderation/:kind/pending",
            get(pending_handler::<S, N>),
        )
        .route(
            "/api/v1/moderation/submissions/:id/decision",
            post(decision_handler::<S, N>),
        )
        .route(
            "/api/v1/moderation/submissions/:id/side-effect/retry",
            post(retry_handler::<S, N>),
        )
        .with_state(engine)
}

/// Decision request body. The actor would be overwritten from the verified
/// admin session by the authentication layer in front of this router.
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub outcome: DecisionOutcome,
    pub actor: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DecisionView {
    pub id: SubmissionId,
    pub kind: SubmissionKind,
    pub status: &'static str,
    pub decided_by: String,
    pub side_effect: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_effect_error: Option<String>,
}

impl DecisionView {
    fn from_result(result: &DecisionResult) -> Self {
        let submission = &result.submission;
        Self {
            id: submission.id.clone(),
            kind: submission.kind(),
            status: submission.status.label(),
            decided_by: submission
                .decision
                .as_ref()
                .map(|decision| decision.decided_by.clone())
                .unwrap_or_default(),
            side_effect: result.side_effect.label(),
            side_effect_error: result.side_effect.failure().map(str::to_string),
        }
    }
}

pub(crate) async fn pending_handler<S, N>(
    State(engine): State<Arc<ApprovalEngine<S, N>>>,
    Path(kind): Path<String>,
) -> Response
where
    S: SubmissionStore + 'static,
    N: NotificationSink + 'static,
{
    let Some(kind) = SubmissionKind::parse(&kind) else {
        let payload = json!({
            "code": "unknown_kind",
            "error": format!("'{kind}' is not a moderated submission kind"),
        });
        return (StatusCode::NOT_FOUND, axum::Json(payload)).into_response();
    };

    match engine.list_pending(kind) {
        Ok(pending) => {
            let views: Vec<_> = pending
                .iter()
                .map(|submission| submission.pending_view())
                .collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(StoreError::Unavailable(reason)) => {
            let payload = json!({ "code": "unavailable", "error": reason });
            (StatusCode::SERVICE_UNAVAILABLE, axum::Json(payload)).into_response()
        }
        Err(other) => {
            let payload = json!({ "code": "internal", "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn decision_handler<S, N>(
    State(engine): State<Arc<ApprovalEngine<S, N>>>,
    Path(id): Path<String>,
    axum::Json(request): axum::Json<DecisionRequest>,
) -> Response
where
    S: SubmissionStore + 'static,
    N: NotificationSink + 'static,
{
    let id = SubmissionId(id);
    match engine.decide(&id, request.outcome, &request.actor, request.reason) {
        Ok(result) => (StatusCode::OK, axum::Json(DecisionView::from_result(&result))).into_response(),
        Err(error) => decision_error_response(error),
    }
}

pub(crate) async fn retry_handler<S, N>(
    State(engine): State<Arc<ApprovalEngine<S, N>>>,
    Path(id): Path<String>,
) -> Response
where
    S: SubmissionStore + 'static,
    N: NotificationSink + 'static,
{
    let id = SubmissionId(id);
    match engine.retry_side_effect(&id) {
        Ok(result) => (StatusCode::OK, axum::Json(DecisionView::from_result(&result))).into_response(),
        Err(error) => decision_error_response(error),
    }
}

/// One distinct caller-visible code per error kind, so administrators can tell
/// "already decided by someone else" apart from "temporarily unavailable".
fn decision_error_response(error: DecisionError) -> Response {
    let (status, code) = match &error {
        DecisionError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        DecisionError::AlreadyDecided { .. } => (StatusCode::CONFLICT, "already_decided"),
        DecisionError::Conflict => (StatusCode::CONFLICT, "conflict"),
        DecisionError::InvalidRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_request"),
        DecisionError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
    };

    let mut payload = json!({
        "code": code,
        "error": error.to_string(),
    });
    if let DecisionError::AlreadyDecided { status: final_status } = &error {
        payload["status"] = json!(final_status.label());
    }

    (status, axum::Json(payload)).into_response()
}
