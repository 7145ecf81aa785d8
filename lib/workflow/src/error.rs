//! Error types for the workflow crate.
//!
//! Errors are layered the same way the crate is:
//! - `StoreError`: low-level substrate operations (connect, load, persist)
//! - `ResumeError`: resume-call failures, observable by the callback caller
//! - `EngineError`: high-level engine operations (wraps the lower layers)

use crate::instance::ApprovalState;
use greenlight_core::ApprovalRunId;
use std::fmt;

/// Errors from substrate operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Failed to connect to the substrate.
    ConnectionFailed { message: String },
    /// Failed to persist a record.
    PersistFailed { message: String },
    /// Failed to load a record.
    LoadFailed { message: String },
    /// A persisted record could not be decoded.
    DecodeFailed { message: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { message } => {
                write!(f, "substrate connection failed: {message}")
            }
            Self::PersistFailed { message } => write!(f, "record persist failed: {message}"),
            Self::LoadFailed { message } => write!(f, "record load failed: {message}"),
            Self::DecodeFailed { message } => write!(f, "record decode failed: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors from delivering a resume signal.
///
/// These are the failures a callback caller can observe: the token never
/// existed, the run already left its suspension point, the deadline elapsed,
/// or a concurrent resume won the race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeError {
    /// No run is associated with the presented token.
    UnknownToken,
    /// The run is not suspended (already decided, timed out, or failed).
    NotResumable {
        run_id: ApprovalRunId,
        state: ApprovalState,
    },
    /// The run's deadline elapsed before the resume call arrived.
    Expired { run_id: ApprovalRunId },
    /// A concurrent resume attempt won; this one was discarded.
    Conflict { run_id: ApprovalRunId },
    /// The substrate failed while delivering the signal.
    Store(StoreError),
}

impl fmt::Display for ResumeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownToken => write!(f, "unknown resume token"),
            Self::NotResumable { run_id, state } => {
                write!(f, "run {run_id} is not resumable (state: {state})")
            }
            Self::Expired { run_id } => {
                write!(f, "run {run_id} can no longer be resumed: deadline elapsed")
            }
            Self::Conflict { run_id } => {
                write!(f, "run {run_id} was resumed concurrently")
            }
            Self::Store(e) => write!(f, "substrate error during resume: {e}"),
        }
    }
}

impl std::error::Error for ResumeError {}

impl From<StoreError> for ResumeError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

/// High-level engine errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The notifier call failed before suspension; the run was failed with
    /// the `NotifierDispatchError` kind.
    Dispatch {
        run_id: ApprovalRunId,
        message: String,
    },
    /// Substrate error.
    Store(StoreError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dispatch { run_id, message } => {
                write!(f, "notifier dispatch failed for run {run_id}: {message}")
            }
            Self::Store(e) => write!(f, "substrate error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}
