//! The approval callback receiver.
//!
//! `GET /v1/approve?action={approve|reject}&taskToken={token}` translates a
//! human's click into a resume signal. Validation order is fixed: empty
//! parameter set, then missing token, then missing or unrecognized action.
//! Only a fully validated request touches the engine; a re-clicked link gets
//! a deterministic error, never a silent success.

use crate::error::ApiError;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, State};
use greenlight_workflow::{ApprovalDecision, ResumeError, ResumeToken};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

/// Handles the approval callback.
pub async fn approve(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<JsonValue>, ApiError> {
    let (token, decision) = validate(&params)?;

    match state.engine.resume(&token, decision.payload()).await {
        Ok(instance) => {
            tracing::info!(
                run_id = %instance.id,
                state = %instance.state,
                "resume signal delivered"
            );
            Ok(Json(decision.payload()))
        }
        Err(ResumeError::Store(e)) => {
            tracing::error!(error = %e, "substrate failure during resume");
            Err(ApiError::Internal {
                event: serde_json::to_value(&params).unwrap_or(JsonValue::Null),
            })
        }
        Err(e) => {
            tracing::info!(error = %e, "resume signal rejected");
            Err(ApiError::ResumeRejected {
                reason: e.to_string(),
            })
        }
    }
}

/// Validates the callback parameters in their fixed order.
fn validate(
    params: &HashMap<String, String>,
) -> Result<(ResumeToken, ApprovalDecision), ApiError> {
    if params.is_empty() {
        return Err(ApiError::InvalidRequest);
    }
    let token = params.get("taskToken").ok_or(ApiError::MissingToken)?;
    let decision = params
        .get("action")
        .and_then(|action| ApprovalDecision::from_action(action))
        .ok_or(ApiError::InvalidAction)?;
    let token = token
        .parse::<ResumeToken>()
        .map_err(|e| ApiError::ResumeRejected {
            reason: e.to_string(),
        })?;
    Ok((token, decision))
}
