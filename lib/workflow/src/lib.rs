//! Approval workflow engine for the greenlight platform.
//!
//! This crate provides the durable approval state machine, including:
//!
//! - **Instance Model**: The approval run record and its state transitions
//! - **Resume Tokens**: Single-use opaque credentials correlating a suspended
//!   run with its one authorized resume call
//! - **Substrate**: The `InstanceStore` trait over the durable store, with
//!   NATS JetStream KV and in-memory implementations
//! - **Engine**: Stateless submit/resume/expire coordination over the
//!   substrate and notifier seams

pub mod engine;
pub mod error;
pub mod instance;
pub mod nats;
pub mod store;
pub mod token;

pub use engine::{ApprovalEngine, ApprovalNotifier, EngineConfig, NotifyError};
pub use error::{EngineError, ResumeError, StoreError};
pub use instance::{
    ApprovalDecision, ApprovalInstance, ApprovalRequest, ApprovalState, FailureKind, RunOutcome,
};
pub use nats::{NatsConfig, NatsInstanceStore};
pub use store::{InstanceStore, MemoryInstanceStore};
pub use token::ResumeToken;
