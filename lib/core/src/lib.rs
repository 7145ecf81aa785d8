//! Core domain types and utilities for the greenlight platform.
//!
//! This crate provides the foundational types, error handling, and shared
//! utilities used throughout the greenlight approval workflow service.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ApprovalRunId, MailMessageId};
