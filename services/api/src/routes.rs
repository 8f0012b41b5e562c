use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use jobboard::moderation::{
    moderation_router, ApprovalEngine, KindRegistry, NotificationSink, StoreError, SubmissionKind,
    SubmissionPayload, SubmissionStore,
};
use serde_json::json;
use std::sync::Arc;

use crate::infra::AppState;

/// Shared state for the intake boundary: the intake path validates with the
/// same registry rules the engine's handlers carry, then creates the pending
/// record. It never touches the status.
pub(crate) struct IntakeState<S> {
    pub(crate) store: Arc<S>,
    pub(crate) registry: Arc<KindRegistry>,
}

impl<S> Clone for IntakeState<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            registry: self.registry.clone(),
        }
    }
}

pub(crate) fn with_moderation_routes<S, N>(
    engine: Arc<ApprovalEngine<S, N>>,
    intake: IntakeState<S>,
) -> axum::Router
where
    S: SubmissionStore + 'static,
    N: NotificationSink + 'static,
{
    moderation_router(engine)
        .route(
            "/api/v1/moderation/:kind/submissions",
            axum::routing::post(intake_handler::<S>),
        )
        .layer(Extension(intake))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn intake_handler<S>(
    Extension(state): Extension<IntakeState<S>>,
    Path(kind): Path<String>,
    Json(payload): Json<SubmissionPayload>,
) -> Response
where
    S: SubmissionStore + 'static,
{
    let Some(kind) = SubmissionKind::parse(&kind) else {
        let body = json!({
            "code": "unknown_kind",
            "error": format!("'{kind}' is not a moderated submission kind"),
        });
        return (StatusCode::NOT_FOUND, Json(body)).into_response();
    };

    if payload.kind() != kind {
        let body = json!({
            "code": "kind_mismatch",
            "error": format!(
                "payload kind {} does not match intake kind {}",
                payload.kind().label(),
                kind.label()
            ),
        });
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response();
    }

    if let Err(error) = state.registry.validate_intake(&payload) {
        let body = json!({ "code": "invalid_payload", "error": error.to_string() });
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response();
    }

    match state.store.create(payload) {
        Ok(submission) => {
            (StatusCode::ACCEPTED, Json(submission.pending_view())).into_response()
        }
        Err(StoreError::Unavailable(reason)) => {
            let body = json!({ "code": "unavailable", "error": reason });
            (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
        }
        Err(other) => {
            let body = json!({ "code": "internal", "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}
