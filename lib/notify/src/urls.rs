//! Callback URL construction.
//!
//! The approve/reject links embed the resume token as the `taskToken` query
//! parameter. Tokens are percent-encoded on the way in; the wire form uses
//! the padded base64 alphabet, so `+`, `/`, and `=` must survive the round
//! trip through the URL losslessly.

use greenlight_workflow::ResumeToken;

/// The pair of callback links delivered to the approver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackUrls {
    /// Link that approves the request.
    pub approve: String,
    /// Link that rejects the request.
    pub reject: String,
}

impl CallbackUrls {
    /// Builds the callback links for a token.
    ///
    /// `base_url` points at the approval endpoint itself (for example
    /// `https://host/v1/approve`); a trailing slash is tolerated.
    #[must_use]
    pub fn build(base_url: &str, token: &ResumeToken) -> Self {
        let base = base_url.trim_end_matches('/');
        let encoded = urlencoding::encode(token.as_str());
        Self {
            approve: format!("{base}?action=approve&taskToken={encoded}"),
            reject: format!("{base}?action=reject&taskToken={encoded}"),
        }
    }
}
