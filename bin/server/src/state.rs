//! Shared application state.

use greenlight_mail::MailStore;
use greenlight_workflow::ApprovalEngine;
use std::sync::Arc;

/// State shared by every request handler.
pub struct AppState {
    /// The approval engine.
    pub engine: ApprovalEngine,
    /// Raw-message storage for the receipt adapter.
    pub mail_store: Arc<dyn MailStore>,
}

impl AppState {
    /// Creates the application state.
    pub fn new(engine: ApprovalEngine, mail_store: Arc<dyn MailStore>) -> Self {
        Self { engine, mail_store }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use greenlight_mail::MemoryMailStore;
    use greenlight_workflow::{
        ApprovalNotifier, ApprovalRequest, EngineConfig, MemoryInstanceStore, NotifyError,
        ResumeToken,
    };

    /// Notifier that accepts every dispatch.
    pub(crate) struct NullNotifier;

    #[async_trait]
    impl ApprovalNotifier for NullNotifier {
        async fn notify(
            &self,
            _request: &ApprovalRequest,
            _token: &ResumeToken,
        ) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    /// App state over in-memory stores, for handler tests.
    pub(crate) fn memory_state() -> Arc<AppState> {
        let engine = ApprovalEngine::new(
            Arc::new(MemoryInstanceStore::new()),
            Arc::new(NullNotifier),
            EngineConfig::default(),
        );
        Arc::new(AppState::new(engine, Arc::new(MemoryMailStore::new())))
    }

    /// The request used by handler tests.
    pub(crate) fn sample_request() -> ApprovalRequest {
        ApprovalRequest {
            from: "a@x.com".to_string(),
            subject: "S".to_string(),
            message: "M".to_string(),
        }
    }
}
