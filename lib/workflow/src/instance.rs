//! Approval run state machine.
//!
//! An approval run is a single persisted record that advances through a fixed
//! set of transitions:
//!
//! `Submitted -> AwaitingApproval -> {Approved | Rejected | TimedOut | Failed}`
//!
//! Every run ends with a terminal [`RunOutcome`]: `Succeeded` for an approved
//! run, `Failed` (with a [`FailureKind`]) for everything else. The transition
//! methods here are pure; atomicity across concurrent resume attempts is the
//! substrate's job (see [`crate::store::InstanceStore`]).

use crate::error::ResumeError;
use crate::token::ResumeToken;
use chrono::{DateTime, Utc};
use greenlight_core::ApprovalRunId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Status value carried by an approving resume payload.
pub const STATUS_APPROVED: &str = "OK";

/// Status value carried by a rejecting resume payload.
pub const STATUS_REJECTED: &str = "FAIL";

/// The state of an approval run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    /// Run has been created from a triggering request.
    Submitted,
    /// Notification is out; the run is suspended pending a resume call or
    /// deadline expiry.
    AwaitingApproval,
    /// A human approved the run.
    Approved,
    /// A human rejected the run.
    Rejected,
    /// The deadline elapsed with no resume call.
    TimedOut,
    /// The run failed operationally (dispatch error, malformed resume).
    Failed,
}

impl ApprovalState {
    /// Returns true if no further transition can occur.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Rejected | Self::TimedOut | Self::Failed
        )
    }

    /// Returns the snake_case name used in logs and error bodies.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::TimedOut => "timed_out",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run ended in the `Failed` outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The approver rejected the request.
    WorkflowFailure,
    /// The notifier call failed before suspension.
    NotifierDispatchError,
    /// The deadline elapsed with no resume.
    ApprovalTimeout,
    /// The resume payload was missing or carried an invalid status field.
    InvalidResumePayload,
}

impl FailureKind {
    /// Returns the fixed error-kind string recorded on the outcome.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkflowFailure => "WorkflowFailure",
            Self::NotifierDispatchError => "NotifierDispatchError",
            Self::ApprovalTimeout => "ApprovalTimeout",
            Self::InvalidResumePayload => "InvalidResumePayload",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The run succeeded.
    Succeeded,
    /// The run failed with a fixed error kind and a human-readable cause.
    Failed {
        /// Error kind recorded on the terminal failure record.
        kind: FailureKind,
        /// Cause text.
        cause: String,
    },
}

/// The triggering request an approval run is asked to decide on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Sender of the triggering message.
    pub from: String,
    /// Subject line of the triggering message.
    pub subject: String,
    /// Message body.
    pub message: String,
}

/// The decision carried by a callback request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    /// Approve the request.
    Approve,
    /// Reject the request.
    Reject,
}

impl ApprovalDecision {
    /// Parses the callback `action` parameter.
    #[must_use]
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "approve" => Some(Self::Approve),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }

    /// Returns the fixed status value for this decision.
    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            Self::Approve => STATUS_APPROVED,
            Self::Reject => STATUS_REJECTED,
        }
    }

    /// Returns the fixed resume payload for this decision.
    #[must_use]
    pub fn payload(&self) -> JsonValue {
        serde_json::json!({ "status": self.status() })
    }
}

/// A single approval run record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalInstance {
    /// Unique identifier for this run.
    pub id: ApprovalRunId,
    /// Current state.
    pub state: ApprovalState,
    /// The triggering request.
    pub request: ApprovalRequest,
    /// The outstanding resume token for this run's suspension point.
    pub token: ResumeToken,
    /// When the run was created.
    pub created_at: DateTime<Utc>,
    /// Resume deadline, set on entering `AwaitingApproval`.
    pub deadline: Option<DateTime<Utc>>,
    /// When the run reached a terminal state.
    pub decided_at: Option<DateTime<Utc>>,
    /// The resume payload that decided the run, if any.
    pub resume_payload: Option<JsonValue>,
    /// Terminal outcome.
    pub outcome: Option<RunOutcome>,
}

impl ApprovalInstance {
    /// Creates a new run in `Submitted` state with a fresh resume token.
    #[must_use]
    pub fn new(request: ApprovalRequest) -> Self {
        Self {
            id: ApprovalRunId::new(),
            state: ApprovalState::Submitted,
            request,
            token: ResumeToken::generate(),
            created_at: Utc::now(),
            deadline: None,
            decided_at: None,
            resume_payload: None,
            outcome: None,
        }
    }

    /// Enters `AwaitingApproval`, arming the resume deadline.
    pub fn await_approval(&mut self, deadline: DateTime<Utc>) {
        self.state = ApprovalState::AwaitingApproval;
        self.deadline = Some(deadline);
    }

    /// Applies a resume payload, deciding the run.
    ///
    /// A payload whose `status` field is `"OK"` approves the run; any other
    /// string value rejects it with the fixed `WorkflowFailure` kind; a
    /// missing or non-string `status` consumes the token and fails the run
    /// with `InvalidResumePayload`.
    ///
    /// # Errors
    ///
    /// Returns `NotResumable` if the run is not suspended, or `Expired` if
    /// the deadline has already elapsed.
    pub fn resume(&mut self, payload: JsonValue, now: DateTime<Utc>) -> Result<(), ResumeError> {
        if self.state != ApprovalState::AwaitingApproval {
            return Err(ResumeError::NotResumable {
                run_id: self.id,
                state: self.state,
            });
        }
        if let Some(deadline) = self.deadline
            && now >= deadline
        {
            return Err(ResumeError::Expired { run_id: self.id });
        }

        match payload.get("status").and_then(JsonValue::as_str) {
            Some(STATUS_APPROVED) => {
                self.state = ApprovalState::Approved;
                self.outcome = Some(RunOutcome::Succeeded);
            }
            Some(_) => {
                self.state = ApprovalState::Rejected;
                self.outcome = Some(RunOutcome::Failed {
                    kind: FailureKind::WorkflowFailure,
                    cause: "request was rejected by the approver".to_string(),
                });
            }
            None => {
                self.state = ApprovalState::Failed;
                self.outcome = Some(RunOutcome::Failed {
                    kind: FailureKind::InvalidResumePayload,
                    cause: "resume payload is missing a status field".to_string(),
                });
            }
        }
        self.decided_at = Some(now);
        self.resume_payload = Some(payload);
        Ok(())
    }

    /// Expires the run if it is suspended past its deadline.
    ///
    /// Returns true if the run transitioned to `TimedOut`.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if self.state != ApprovalState::AwaitingApproval {
            return false;
        }
        let Some(deadline) = self.deadline else {
            return false;
        };
        if now < deadline {
            return false;
        }
        self.state = ApprovalState::TimedOut;
        self.decided_at = Some(now);
        self.outcome = Some(RunOutcome::Failed {
            kind: FailureKind::ApprovalTimeout,
            cause: "no approval decision arrived before the deadline".to_string(),
        });
        true
    }

    /// Fails the run after a synchronous notifier dispatch failure.
    pub fn fail_dispatch(&mut self, cause: String, now: DateTime<Utc>) {
        self.state = ApprovalState::Failed;
        self.decided_at = Some(now);
        self.outcome = Some(RunOutcome::Failed {
            kind: FailureKind::NotifierDispatchError,
            cause,
        });
    }

    /// Returns true if the run has reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
