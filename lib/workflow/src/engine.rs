//! The approval engine.
//!
//! One engine instance serves every in-flight run: it holds no per-run state,
//! and every operation loads the record from the substrate and writes it
//! back. Submit is the only point that makes an external call (the notifier
//! dispatch); the engine never retries it, and a synchronous failure fails
//! the run with the `NotifierDispatchError` kind. Resume and expiry ride on
//! the substrate's at-most-once semantics.

use crate::error::{EngineError, ResumeError, StoreError};
use crate::instance::{ApprovalInstance, ApprovalRequest};
use crate::store::InstanceStore;
use crate::token::ResumeToken;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use greenlight_core::ApprovalRunId;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::Arc;

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a run may stay suspended before timing out.
    pub approval_timeout: Duration,
    /// Liveness expectation for the notification leg. The engine does not
    /// retry dispatch; transports that support heartbeating should use this
    /// as their interval.
    pub heartbeat_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            approval_timeout: Duration::minutes(10),
            heartbeat_interval: Duration::minutes(5),
        }
    }
}

/// Errors from notification dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The delivery channel could not be reached.
    ConnectionFailed { message: String },
    /// The rendered message could not be produced.
    RenderFailed { message: String },
    /// Publishing to a delivery channel failed.
    PublishFailed { message: String },
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { message } => {
                write!(f, "notification channel unavailable: {message}")
            }
            Self::RenderFailed { message } => write!(f, "notification render failed: {message}"),
            Self::PublishFailed { message } => write!(f, "notification publish failed: {message}"),
        }
    }
}

impl std::error::Error for NotifyError {}

/// Trait for delivering approval notifications.
///
/// Delivery is fire-and-forget from the engine's viewpoint: the notifier
/// either accepts the dispatch or fails synchronously; nothing is awaited
/// beyond handoff to the transport.
#[async_trait]
pub trait ApprovalNotifier: Send + Sync {
    /// Sends a notification for the given request, embedding the token in
    /// the approve/reject callback links.
    async fn notify(
        &self,
        request: &ApprovalRequest,
        token: &ResumeToken,
    ) -> Result<(), NotifyError>;
}

/// The approval engine.
pub struct ApprovalEngine {
    store: Arc<dyn InstanceStore>,
    notifier: Arc<dyn ApprovalNotifier>,
    config: EngineConfig,
}

impl ApprovalEngine {
    /// Creates an engine over the given substrate and notifier.
    pub fn new(
        store: Arc<dyn InstanceStore>,
        notifier: Arc<dyn ApprovalNotifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Starts a new approval run for the given request.
    ///
    /// The run is persisted in `AwaitingApproval` (deadline armed) before
    /// the notification goes out, so a resume call can never race an
    /// unpersisted token. On synchronous dispatch failure the run is failed
    /// terminally and the error is surfaced to the caller.
    ///
    /// # Errors
    ///
    /// Returns `Dispatch` if the notifier call failed, or `Store` if the
    /// substrate did.
    pub async fn submit(&self, request: ApprovalRequest) -> Result<ApprovalInstance, EngineError> {
        let mut instance = ApprovalInstance::new(request);
        let now = Utc::now();
        instance.await_approval(now + self.config.approval_timeout);
        self.store.put(&instance).await?;

        if let Err(e) = self
            .notifier
            .notify(&instance.request, &instance.token)
            .await
        {
            instance.fail_dispatch(e.to_string(), Utc::now());
            self.store.put(&instance).await?;
            return Err(EngineError::Dispatch {
                run_id: instance.id,
                message: e.to_string(),
            });
        }

        Ok(instance)
    }

    /// Delivers a resume signal, deciding the run the token belongs to.
    ///
    /// # Errors
    ///
    /// Returns a [`ResumeError`] if the token is unknown, already consumed,
    /// expired, or lost a concurrent race.
    pub async fn resume(
        &self,
        token: &ResumeToken,
        payload: JsonValue,
    ) -> Result<ApprovalInstance, ResumeError> {
        self.store.resume(token, payload, Utc::now()).await
    }

    /// Times out every run suspended past its deadline as of `now`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the sweep could not run.
    pub async fn expire_due(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ApprovalInstance>, StoreError> {
        self.store.expire_due(now).await
    }

    /// Loads a run record by id.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the load failed.
    pub async fn get(&self, id: ApprovalRunId) -> Result<Option<ApprovalInstance>, StoreError> {
        self.store.get(id).await
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{ApprovalDecision, ApprovalState, FailureKind, RunOutcome};
    use crate::store::MemoryInstanceStore;
    use std::sync::Mutex;

    /// Notifier that records dispatches for assertions.
    #[derive(Default)]
    struct RecordingNotifier {
        dispatched: Mutex<Vec<(ApprovalRequest, ResumeToken)>>,
        fail_with: Option<NotifyError>,
    }

    impl RecordingNotifier {
        fn failing(err: NotifyError) -> Self {
            Self {
                dispatched: Mutex::new(Vec::new()),
                fail_with: Some(err),
            }
        }

        fn dispatched(&self) -> Vec<(ApprovalRequest, ResumeToken)> {
            self.dispatched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ApprovalNotifier for RecordingNotifier {
        async fn notify(
            &self,
            request: &ApprovalRequest,
            token: &ResumeToken,
        ) -> Result<(), NotifyError> {
            self.dispatched
                .lock()
                .unwrap()
                .push((request.clone(), token.clone()));
            match &self.fail_with {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }
    }

    fn request() -> ApprovalRequest {
        ApprovalRequest {
            from: "a@x.com".to_string(),
            subject: "S".to_string(),
            message: "M".to_string(),
        }
    }

    fn engine_with(notifier: RecordingNotifier) -> (ApprovalEngine, Arc<MemoryInstanceStore>) {
        let store = Arc::new(MemoryInstanceStore::new());
        let engine = ApprovalEngine::new(
            store.clone(),
            Arc::new(notifier),
            EngineConfig::default(),
        );
        (engine, store)
    }

    #[tokio::test]
    async fn submit_suspends_and_dispatches_once() {
        let notifier = Arc::new(RecordingNotifier::default());
        let store = Arc::new(MemoryInstanceStore::new());
        let engine = ApprovalEngine::new(
            store.clone(),
            notifier.clone(),
            EngineConfig::default(),
        );

        let instance = engine.submit(request()).await.expect("submit");

        assert_eq!(instance.state, ApprovalState::AwaitingApproval);
        assert!(instance.deadline.is_some());

        let dispatched = notifier.dispatched();
        assert_eq!(dispatched.len(), 1);
        assert_eq!(dispatched[0].1, instance.token);

        // The suspended record is durable before anyone can click.
        let persisted = store.get(instance.id).await.expect("get").expect("record");
        assert_eq!(persisted.state, ApprovalState::AwaitingApproval);
    }

    #[tokio::test]
    async fn approve_resume_reaches_succeeded() {
        let (engine, _store) = engine_with(RecordingNotifier::default());
        let instance = engine.submit(request()).await.expect("submit");

        let decided = engine
            .resume(&instance.token, ApprovalDecision::Approve.payload())
            .await
            .expect("resume");

        assert_eq!(decided.state, ApprovalState::Approved);
        assert_eq!(decided.outcome, Some(RunOutcome::Succeeded));
        assert_eq!(
            decided.resume_payload,
            Some(serde_json::json!({"status": "OK"}))
        );
    }

    #[tokio::test]
    async fn reject_resume_reaches_failed() {
        let (engine, _store) = engine_with(RecordingNotifier::default());
        let instance = engine.submit(request()).await.expect("submit");

        let decided = engine
            .resume(&instance.token, ApprovalDecision::Reject.payload())
            .await
            .expect("resume");

        assert_eq!(decided.state, ApprovalState::Rejected);
        match decided.outcome {
            Some(RunOutcome::Failed { kind, .. }) => {
                assert_eq!(kind, FailureKind::WorkflowFailure);
            }
            ref other => panic!("expected failed outcome, got {other:?}"),
        }
        assert_eq!(
            decided.resume_payload,
            Some(serde_json::json!({"status": "FAIL"}))
        );
    }

    #[tokio::test]
    async fn second_resume_fails() {
        let (engine, _store) = engine_with(RecordingNotifier::default());
        let instance = engine.submit(request()).await.expect("submit");

        engine
            .resume(&instance.token, ApprovalDecision::Approve.payload())
            .await
            .expect("first resume");

        let err = engine
            .resume(&instance.token, ApprovalDecision::Reject.payload())
            .await
            .expect_err("second resume must fail");
        assert!(matches!(err, ResumeError::NotResumable { .. }));
    }

    #[tokio::test]
    async fn dispatch_failure_fails_run_terminally() {
        let (engine, store) = engine_with(RecordingNotifier::failing(
            NotifyError::PublishFailed {
                message: "broker unavailable".to_string(),
            },
        ));

        let err = engine.submit(request()).await.expect_err("submit fails");
        let EngineError::Dispatch { run_id, .. } = &err else {
            panic!("expected dispatch error, got {err:?}");
        };

        let persisted = store.get(*run_id).await.expect("get").expect("record");
        assert_eq!(persisted.state, ApprovalState::Failed);
        match persisted.outcome {
            Some(RunOutcome::Failed { kind, .. }) => {
                assert_eq!(kind, FailureKind::NotifierDispatchError);
            }
            ref other => panic!("expected failed outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn deadline_expiry_times_out_run() {
        let (engine, _store) = engine_with(RecordingNotifier::default());
        let instance = engine.submit(request()).await.expect("submit");
        let deadline = instance.deadline.expect("deadline armed");

        // Simulated clock: sweep one second past the deadline.
        let expired = engine
            .expire_due(deadline + Duration::seconds(1))
            .await
            .expect("sweep");
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].state, ApprovalState::TimedOut);
        match expired[0].outcome {
            Some(RunOutcome::Failed { kind, .. }) => {
                assert_eq!(kind, FailureKind::ApprovalTimeout);
            }
            ref other => panic!("expected failed outcome, got {other:?}"),
        }

        let err = engine
            .resume(&instance.token, ApprovalDecision::Approve.payload())
            .await
            .expect_err("resume after timeout must fail");
        assert!(matches!(err, ResumeError::NotResumable { .. }));
    }

    #[test]
    fn default_config_matches_policy() {
        let config = EngineConfig::default();
        assert_eq!(config.approval_timeout, Duration::minutes(10));
        assert_eq!(config.heartbeat_interval, Duration::minutes(5));
    }
}
