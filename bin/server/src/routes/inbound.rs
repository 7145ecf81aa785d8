//! The inbound receipt adapter.
//!
//! `POST /v1/inbound` turns a stored inbound email into a new approval run:
//! exactly the first record of the batch is resolved against the mail store,
//! parsed, and submitted to the engine. The adapter always reports success
//! to its transport; the receiving tier treats anything else as retryable,
//! and a receipt that failed to process will not do better on a retry.

use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use greenlight_mail::{InboundReceipt, MailParseError, MailStoreError, parse_message};
use greenlight_workflow::{ApprovalInstance, ApprovalRequest, EngineError};
use std::fmt;
use std::sync::Arc;

/// Failures while turning a receipt into an approval run.
#[derive(Debug)]
enum InboundError {
    /// The request body is not a receipt batch.
    Decode { message: String },
    /// The batch carries no records.
    EmptyBatch,
    /// The referenced raw message could not be fetched.
    Mail(MailStoreError),
    /// The raw message could not be parsed.
    Parse(MailParseError),
    /// The engine could not start the run.
    Engine(EngineError),
}

impl fmt::Display for InboundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode { message } => write!(f, "receipt decode failed: {message}"),
            Self::EmptyBatch => write!(f, "receipt batch carries no records"),
            Self::Mail(e) => write!(f, "raw message fetch failed: {e}"),
            Self::Parse(e) => write!(f, "message parse failed: {e}"),
            Self::Engine(e) => write!(f, "run submit failed: {e}"),
        }
    }
}

impl From<MailStoreError> for InboundError {
    fn from(e: MailStoreError) -> Self {
        Self::Mail(e)
    }
}

impl From<MailParseError> for InboundError {
    fn from(e: MailParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<EngineError> for InboundError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

/// Handles an inbound receipt batch.
pub async fn inbound(State(state): State<Arc<AppState>>, body: Bytes) -> StatusCode {
    match process_receipt(&state, &body).await {
        Ok(instance) => {
            tracing::info!(
                run_id = %instance.id,
                from = %instance.request.from,
                "approval run started from inbound mail"
            );
        }
        Err(e) => {
            tracing::warn!(error = %e, "dropping inbound receipt");
        }
    }
    StatusCode::OK
}

/// Resolves and submits the first record of a receipt batch.
async fn process_receipt(
    state: &AppState,
    body: &[u8],
) -> Result<ApprovalInstance, InboundError> {
    let receipt: InboundReceipt =
        serde_json::from_slice(body).map_err(|e| InboundError::Decode {
            message: e.to_string(),
        })?;
    let record = receipt.records.first().ok_or(InboundError::EmptyBatch)?;

    let raw = state.mail_store.get(record.mail.message_id).await?;
    let mail = parse_message(&raw)?;

    let instance = state
        .engine
        .submit(ApprovalRequest {
            from: mail.from,
            subject: mail.subject,
            message: mail.body,
        })
        .await?;

    Ok(instance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::router;
    use crate::state::test_support::memory_state;
    use axum::body::Body;
    use axum::http::Request;
    use greenlight_core::MailMessageId;
    use greenlight_workflow::ApprovalState;
    use tower::ServiceExt;

    async fn post(state: Arc<AppState>, body: &str) -> StatusCode {
        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/inbound")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        response.status()
    }

    fn receipt_body(id: MailMessageId) -> String {
        format!(
            r#"{{"records":[{{"mail":{{"message_id":"{}"}}}}]}}"#,
            id.as_ulid()
        )
    }

    #[tokio::test]
    async fn receipt_starts_an_approval_run() {
        let state = memory_state();
        let id = MailMessageId::new();
        state
            .mail_store
            .put(id, b"From: a@x.com\r\nSubject: S\r\n\r\nM")
            .await
            .expect("seed mail");

        let instance = process_receipt(&state, receipt_body(id).as_bytes())
            .await
            .expect("receipt processes");

        assert_eq!(instance.state, ApprovalState::AwaitingApproval);
        assert_eq!(instance.request.from, "a@x.com");
        assert_eq!(instance.request.subject, "S");
        assert_eq!(instance.request.message, "M");

        // The run is durable and resumable.
        let persisted = state
            .engine
            .get(instance.id)
            .await
            .expect("get")
            .expect("record");
        assert_eq!(persisted.state, ApprovalState::AwaitingApproval);
    }

    #[tokio::test]
    async fn only_the_first_record_is_processed() {
        let state = memory_state();
        let first = MailMessageId::new();
        let second = MailMessageId::new();
        state
            .mail_store
            .put(first, b"From: first@x.com\r\n\r\nM")
            .await
            .expect("seed mail");
        state
            .mail_store
            .put(second, b"From: second@x.com\r\n\r\nM")
            .await
            .expect("seed mail");

        let body = format!(
            r#"{{"records":[{{"mail":{{"message_id":"{}"}}}},{{"mail":{{"message_id":"{}"}}}}]}}"#,
            first.as_ulid(),
            second.as_ulid()
        );
        let instance = process_receipt(&state, body.as_bytes())
            .await
            .expect("receipt processes");

        assert_eq!(instance.request.from, "first@x.com");
    }

    #[tokio::test]
    async fn empty_batch_is_dropped() {
        let state = memory_state();
        let err = process_receipt(&state, br#"{"records":[]}"#)
            .await
            .expect_err("empty batch");
        assert!(matches!(err, InboundError::EmptyBatch));
    }

    #[tokio::test]
    async fn missing_message_is_dropped() {
        let state = memory_state();
        let err = process_receipt(&state, receipt_body(MailMessageId::new()).as_bytes())
            .await
            .expect_err("missing message");
        assert!(matches!(err, InboundError::Mail(_)));
    }

    #[tokio::test]
    async fn unparseable_message_is_dropped() {
        let state = memory_state();
        let id = MailMessageId::new();
        state
            .mail_store
            .put(id, b"Subject: no sender\r\n\r\nM")
            .await
            .expect("seed mail");

        let err = process_receipt(&state, receipt_body(id).as_bytes())
            .await
            .expect_err("unparseable message");
        assert!(matches!(err, InboundError::Parse(_)));
    }

    #[tokio::test]
    async fn transport_always_sees_success() {
        // Malformed body, empty batch, and missing message all still
        // acknowledge the receipt.
        assert_eq!(post(memory_state(), "not json").await, StatusCode::OK);
        assert_eq!(post(memory_state(), r#"{"records":[]}"#).await, StatusCode::OK);
        assert_eq!(
            post(
                memory_state(),
                &receipt_body(MailMessageId::new())
            )
            .await,
            StatusCode::OK
        );
    }

    #[tokio::test]
    async fn valid_receipt_over_http_acknowledges() {
        let state = memory_state();
        let id = MailMessageId::new();
        state
            .mail_store
            .put(id, b"From: a@x.com\r\n\r\nM")
            .await
            .expect("seed mail");

        assert_eq!(post(state, &receipt_body(id)).await, StatusCode::OK);
    }
}
