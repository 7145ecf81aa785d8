//! NATS-backed notification delivery.
//!
//! The notifier renders the approval message and publishes it to a broadcast
//! subject (and, when configured, a direct subject for the approver's own
//! channel). Delivery is fire-and-forget from the engine's viewpoint: the
//! publish either hands off to the transport or fails synchronously into the
//! engine's dispatch-failure path.

use crate::template::NotificationTemplate;
use crate::urls::CallbackUrls;
use async_trait::async_trait;
use greenlight_workflow::{ApprovalNotifier, ApprovalRequest, NotifyError, ResumeToken};

/// Default broadcast subject for pending approvals.
const TOPIC_SUBJECT: &str = "approval.requests";

/// Fixed subject line attached to every notification.
const NOTIFICATION_SUBJECT: &str = "Verification Required";

/// Header carrying the notification subject line.
const SUBJECT_HEADER: &str = "Subject";

/// Configuration for the NATS notifier.
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// NATS server URL.
    pub url: String,
    /// Base URL of the approval endpoint embedded in callback links.
    pub callback_base_url: String,
    /// Broadcast subject (defaults to approval.requests).
    pub topic_subject: Option<String>,
    /// Optional direct subject for the approver's own channel.
    pub direct_subject: Option<String>,
}

impl NotifierConfig {
    /// Creates a config with default subjects.
    #[must_use]
    pub fn new(url: impl Into<String>, callback_base_url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            callback_base_url: callback_base_url.into(),
            topic_subject: None,
            direct_subject: None,
        }
    }

    fn topic(&self) -> &str {
        self.topic_subject.as_deref().unwrap_or(TOPIC_SUBJECT)
    }
}

/// The rendered-notification inputs: request fields plus callback links.
///
/// Derived data; it exists only for the duration of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    /// Sender of the triggering message.
    pub from: String,
    /// Subject line of the triggering message.
    pub subject: String,
    /// Message body.
    pub message: String,
    /// Link that approves the request.
    pub approve_url: String,
    /// Link that rejects the request.
    pub reject_url: String,
}

impl NotificationPayload {
    /// Builds the payload for a request and its callback links.
    #[must_use]
    pub fn new(request: &ApprovalRequest, urls: CallbackUrls) -> Self {
        Self {
            from: request.from.clone(),
            subject: request.subject.clone(),
            message: request.message.clone(),
            approve_url: urls.approve,
            reject_url: urls.reject,
        }
    }
}

/// NATS-backed approval notifier.
pub struct NatsNotifier {
    client: async_nats::Client,
    template: NotificationTemplate,
    config: NotifierConfig,
}

impl NatsNotifier {
    /// Connects to NATS.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(
        config: NotifierConfig,
        template: NotificationTemplate,
    ) -> Result<Self, NotifyError> {
        let client =
            async_nats::connect(&config.url)
                .await
                .map_err(|e| NotifyError::ConnectionFailed {
                    message: e.to_string(),
                })?;

        Ok(Self {
            client,
            template,
            config,
        })
    }

    /// Returns the subjects a notification fans out to.
    fn subjects(&self) -> Vec<String> {
        let mut subjects = vec![self.config.topic().to_string()];
        if let Some(direct) = &self.config.direct_subject {
            subjects.push(direct.clone());
        }
        subjects
    }
}

#[async_trait]
impl ApprovalNotifier for NatsNotifier {
    async fn notify(
        &self,
        request: &ApprovalRequest,
        token: &ResumeToken,
    ) -> Result<(), NotifyError> {
        let urls = CallbackUrls::build(&self.config.callback_base_url, token);
        let payload = NotificationPayload::new(request, urls);
        let body = self.template.render(&payload);

        let mut headers = async_nats::HeaderMap::new();
        headers.insert(SUBJECT_HEADER, NOTIFICATION_SUBJECT);

        for subject in self.subjects() {
            self.client
                .publish_with_headers(subject, headers.clone(), body.clone().into())
                .await
                .map_err(|e| NotifyError::PublishFailed {
                    message: e.to_string(),
                })?;
        }

        // Publishes are buffered; flush so transport errors surface here.
        self.client
            .flush()
            .await
            .map_err(|e| NotifyError::PublishFailed {
                message: e.to_string(),
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ApprovalRequest {
        ApprovalRequest {
            from: "a@x.com".to_string(),
            subject: "S".to_string(),
            message: "M".to_string(),
        }
    }

    #[test]
    fn config_defaults_to_broadcast_topic() {
        let config = NotifierConfig::new("nats://localhost:4222", "https://example.com/v1/approve");
        assert_eq!(config.topic(), TOPIC_SUBJECT);
        assert!(config.direct_subject.is_none());
    }

    #[test]
    fn payload_carries_request_fields_and_links() {
        let token = ResumeToken::generate();
        let urls = CallbackUrls::build("https://example.com/v1/approve", &token);
        let payload = NotificationPayload::new(&request(), urls.clone());

        assert_eq!(payload.from, "a@x.com");
        assert_eq!(payload.subject, "S");
        assert_eq!(payload.message, "M");
        assert_eq!(payload.approve_url, urls.approve);
        assert_eq!(payload.reject_url, urls.reject);
    }
}
