//! Notification message template.
//!
//! The template is process-wide immutable state: it is built once at startup
//! (from the default text or an operator-provided file) and only read
//! afterwards. Rendering substitutes the five fixed placeholders.

use crate::notifier::NotificationPayload;
use std::fmt;
use std::path::Path;

/// The placeholders every template must carry.
const PLACEHOLDERS: [&str; 5] = ["FROM", "SUBJECT", "MESSAGE", "APPROVE_URL", "REJECT_URL"];

/// Default notification body.
const DEFAULT_TEMPLATE: &str = "\
A new request is awaiting your approval.

From:    ${FROM}
Subject: ${SUBJECT}

${MESSAGE}

Approve: ${APPROVE_URL}
Reject:  ${REJECT_URL}
";

/// Errors from building a template.
#[derive(Debug)]
pub enum TemplateError {
    /// The template file could not be read.
    ReadFailed { path: String, message: String },
    /// A required placeholder is absent from the template text.
    MissingPlaceholder { name: &'static str },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed { path, message } => {
                write!(f, "failed to read template '{path}': {message}")
            }
            Self::MissingPlaceholder { name } => {
                write!(f, "template is missing the ${{{name}}} placeholder")
            }
        }
    }
}

impl std::error::Error for TemplateError {}

/// A validated notification template.
#[derive(Debug, Clone)]
pub struct NotificationTemplate {
    body: String,
}

impl NotificationTemplate {
    /// Builds a template from the given text.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the five placeholders is absent.
    pub fn new(body: impl Into<String>) -> Result<Self, TemplateError> {
        let body = body.into();
        for name in PLACEHOLDERS {
            if !body.contains(&format!("${{{name}}}")) {
                return Err(TemplateError::MissingPlaceholder { name });
            }
        }
        Ok(Self { body })
    }

    /// Loads a template from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails validation.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let body = std::fs::read_to_string(path).map_err(|e| TemplateError::ReadFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::new(body)
    }

    /// Renders the notification body for the given payload.
    #[must_use]
    pub fn render(&self, payload: &NotificationPayload) -> String {
        self.body
            .replace("${FROM}", &payload.from)
            .replace("${SUBJECT}", &payload.subject)
            .replace("${MESSAGE}", &payload.message)
            .replace("${APPROVE_URL}", &payload.approve_url)
            .replace("${REJECT_URL}", &payload.reject_url)
    }
}

impl Default for NotificationTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE).expect("default template carries every placeholder")
    }
}
