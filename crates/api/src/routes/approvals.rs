//! Split-payment approval endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use domain::{Decision, SplitPaymentApproval};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::auth::OPERATOR_HEADER;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub split_payment_id: Option<String>,
    pub deadline_seconds: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRequest {
    pub split_payment_id: Option<String>,
    pub approved: Option<bool>,
    pub comment: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalStartedResponse {
    pub split_payment_id: String,
    pub token: String,
    pub replayed: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResponse {
    pub split_payment_id: String,
    pub token: String,
    pub state: String,
    pub decision: Option<Decision>,
    pub created_at: String,
    pub resolved_at: Option<String>,
}

impl From<SplitPaymentApproval> for ApprovalResponse {
    fn from(record: SplitPaymentApproval) -> Self {
        Self {
            split_payment_id: record.split_payment_id().unwrap_or_default().to_string(),
            token: record.token.to_string(),
            state: record.state.to_string(),
            decision: record.decision,
            created_at: record.created_at.to_rfc3339(),
            resolved_at: record.resolved_at.map(|t| t.to_rfc3339()),
        }
    }
}

fn required_split_payment_id(id: Option<String>) -> Result<String, ApiError> {
    id.map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("splitPaymentId is required".to_string()))
}

// -- Handlers --

/// POST /approvals/split-payments: start a workflow that waits for an operator decision.
#[tracing::instrument(skip(state, payload))]
pub async fn request(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ApprovalRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApprovalStartedResponse>), ApiError> {
    let Json(req) = payload?;
    let split_payment_id = required_split_payment_id(req.split_payment_id)?;
    let deadline = req.deadline_seconds.map(Duration::from_secs);

    let run = state
        .workflow
        .request_approval(&split_payment_id, deadline)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApprovalStartedResponse {
            split_payment_id,
            token: run.token.to_string(),
            replayed: run.replayed,
        }),
    ))
}

/// POST /approvals/split-payments/resume: deliver an operator's decision.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn resume(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<ResumeRequest>, JsonRejection>,
) -> Result<Json<ApprovalResponse>, ApiError> {
    let operator = headers
        .get(OPERATOR_HEADER)
        .and_then(|v| v.to_str().ok());
    if !state.policy.allows(operator) {
        tracing::warn!(operator = ?operator, "approval decision rejected by access policy");
        return Err(ApiError::Forbidden(
            "Operator is not allowed to decide approvals".to_string(),
        ));
    }

    let Json(req) = payload?;
    let split_payment_id = required_split_payment_id(req.split_payment_id)?;
    let approved = req
        .approved
        .ok_or_else(|| ApiError::BadRequest("approved must be a boolean".to_string()))?;

    let decision = Decision {
        approved,
        comment: req.comment.filter(|c| !c.trim().is_empty()),
    };
    let record = state.workflow.resume(&split_payment_id, decision).await?;

    tracing::info!(operator = ?operator, approved, "approval decision delivered");
    Ok(Json(record.into()))
}

/// GET /approvals/split-payments/{id}: current state of an approval.
#[tracing::instrument(skip(state))]
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(split_payment_id): Path<String>,
) -> Result<Json<ApprovalResponse>, ApiError> {
    let record = state
        .workflow
        .status(&split_payment_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No approval for {split_payment_id}")))?;
    Ok(Json(record.into()))
}
