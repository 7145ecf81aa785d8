//! Durable substrate for approval runs.
//!
//! The engine is stateless between invocations: every run lives as a
//! persisted record owned by an [`InstanceStore`], and the token-to-run
//! mapping is only ever touched through the store's resume API. The store is
//! also the source of truth for the single-use token invariant: at most one
//! resume call is accepted per token, concurrent attempts lose with a
//! [`ResumeError`].
//!
//! Two implementations ship: [`crate::nats::NatsInstanceStore`] (JetStream
//! KV, production) and [`MemoryInstanceStore`] (tests and local runs).

use crate::error::{ResumeError, StoreError};
use crate::instance::ApprovalInstance;
use crate::token::ResumeToken;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use greenlight_core::ApprovalRunId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Mutex;

/// The current envelope version.
pub const CURRENT_VERSION: u32 = 1;

/// A versioned envelope wrapping persisted records.
///
/// Everything written to the substrate is wrapped in this envelope so record
/// schemas can evolve across rolling deployments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// The version of the envelope format.
    pub version: u32,
    /// The wrapped payload.
    pub payload: T,
}

impl<T> Envelope<T> {
    /// Creates a new envelope with the current version.
    #[must_use]
    pub fn new(payload: T) -> Self {
        Self {
            version: CURRENT_VERSION,
            payload,
        }
    }

    /// Unwraps the envelope, returning the payload.
    #[must_use]
    pub fn into_payload(self) -> T {
        self.payload
    }

    /// Returns true if this envelope uses the current version.
    #[must_use]
    pub fn is_current_version(&self) -> bool {
        self.version == CURRENT_VERSION
    }
}

impl<T: Serialize> Envelope<T> {
    /// Serializes the envelope to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl<T: for<'de> Deserialize<'de>> Envelope<T> {
    /// Deserializes an envelope from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Trait for the durable run substrate.
///
/// This abstraction lets the engine and the callback receiver be tested
/// without NATS while the real JetStream KV implementation backs production.
#[async_trait]
pub trait InstanceStore: Send + Sync {
    /// Persists a run record, overwriting any previous version.
    ///
    /// Only the engine writes through this method, and only before the run's
    /// notification is out; every later mutation goes through [`resume`] or
    /// [`expire_due`], which are race-safe.
    ///
    /// [`resume`]: InstanceStore::resume
    /// [`expire_due`]: InstanceStore::expire_due
    async fn put(&self, instance: &ApprovalInstance) -> Result<(), StoreError>;

    /// Loads a run record by id.
    async fn get(&self, id: ApprovalRunId) -> Result<Option<ApprovalInstance>, StoreError>;

    /// Delivers a resume signal for the run associated with `token`.
    ///
    /// At most one resume call is accepted per token. The decided record is
    /// returned on success.
    async fn resume(
        &self,
        token: &ResumeToken,
        payload: JsonValue,
        now: DateTime<Utc>,
    ) -> Result<ApprovalInstance, ResumeError>;

    /// Times out every run still suspended past its deadline.
    ///
    /// Returns the records that transitioned.
    async fn expire_due(&self, now: DateTime<Utc>) -> Result<Vec<ApprovalInstance>, StoreError>;
}

/// In-memory substrate with the same at-most-once semantics as the KV store.
#[derive(Default)]
pub struct MemoryInstanceStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    runs: HashMap<ApprovalRunId, ApprovalInstance>,
    tokens: HashMap<String, ApprovalRunId>,
}

impl MemoryInstanceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl InstanceStore for MemoryInstanceStore {
    async fn put(&self, instance: &ApprovalInstance) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner
            .tokens
            .insert(instance.token.storage_key(), instance.id);
        inner.runs.insert(instance.id, instance.clone());
        Ok(())
    }

    async fn get(&self, id: ApprovalRunId) -> Result<Option<ApprovalInstance>, StoreError> {
        Ok(self.lock().runs.get(&id).cloned())
    }

    async fn resume(
        &self,
        token: &ResumeToken,
        payload: JsonValue,
        now: DateTime<Utc>,
    ) -> Result<ApprovalInstance, ResumeError> {
        let mut inner = self.lock();
        let run_id = *inner
            .tokens
            .get(&token.storage_key())
            .ok_or(ResumeError::UnknownToken)?;
        let instance = inner
            .runs
            .get_mut(&run_id)
            .ok_or(ResumeError::UnknownToken)?;
        instance.resume(payload, now)?;
        Ok(instance.clone())
    }

    async fn expire_due(&self, now: DateTime<Utc>) -> Result<Vec<ApprovalInstance>, StoreError> {
        let mut inner = self.lock();
        let mut expired = Vec::new();
        for instance in inner.runs.values_mut() {
            if instance.expire(now) {
                expired.push(instance.clone());
            }
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::{ApprovalDecision, ApprovalRequest, ApprovalState};
    use chrono::Duration;

    fn awaiting_instance(now: DateTime<Utc>) -> ApprovalInstance {
        let mut instance = ApprovalInstance::new(ApprovalRequest {
            from: "a@x.com".to_string(),
            subject: "S".to_string(),
            message: "M".to_string(),
        });
        instance.await_approval(now + Duration::minutes(10));
        instance
    }

    #[test]
    fn envelope_serde_roundtrip() {
        let envelope = Envelope::new(serde_json::json!({"status": "OK"}));
        assert!(envelope.is_current_version());

        let bytes = envelope.to_json_bytes().expect("serialize");
        let parsed: Envelope<JsonValue> = Envelope::from_json_bytes(&bytes).expect("deserialize");
        assert_eq!(envelope, parsed);
    }

    #[tokio::test]
    async fn put_then_get() {
        let store = MemoryInstanceStore::new();
        let now = Utc::now();
        let instance = awaiting_instance(now);

        store.put(&instance).await.expect("put");
        let loaded = store.get(instance.id).await.expect("get");
        assert_eq!(loaded, Some(instance));
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = MemoryInstanceStore::new();
        let loaded = store.get(ApprovalRunId::new()).await.expect("get");
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn resume_accepts_exactly_one_call() {
        let store = MemoryInstanceStore::new();
        let now = Utc::now();
        let instance = awaiting_instance(now);
        let token = instance.token.clone();
        store.put(&instance).await.expect("put");

        let resumed = store
            .resume(&token, ApprovalDecision::Approve.payload(), now)
            .await
            .expect("first resume succeeds");
        assert_eq!(resumed.state, ApprovalState::Approved);

        let err = store
            .resume(&token, ApprovalDecision::Approve.payload(), now)
            .await
            .expect_err("second resume must fail");
        assert!(matches!(err, ResumeError::NotResumable { .. }));
    }

    #[tokio::test]
    async fn resume_with_unknown_token_fails() {
        let store = MemoryInstanceStore::new();
        let err = store
            .resume(
                &ResumeToken::generate(),
                ApprovalDecision::Approve.payload(),
                Utc::now(),
            )
            .await
            .expect_err("unknown token");
        assert_eq!(err, ResumeError::UnknownToken);
    }

    #[tokio::test]
    async fn expire_due_times_out_suspended_runs() {
        let store = MemoryInstanceStore::new();
        let now = Utc::now();
        let instance = awaiting_instance(now);
        let token = instance.token.clone();
        store.put(&instance).await.expect("put");

        let expired = store
            .expire_due(now + Duration::minutes(11))
            .await
            .expect("expire");
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].state, ApprovalState::TimedOut);

        // No later resume is accepted for that token.
        let err = store
            .resume(
                &token,
                ApprovalDecision::Approve.payload(),
                now + Duration::minutes(12),
            )
            .await
            .expect_err("resume after timeout must fail");
        assert!(matches!(err, ResumeError::NotResumable { .. }));
    }

    #[tokio::test]
    async fn expire_due_skips_runs_inside_deadline() {
        let store = MemoryInstanceStore::new();
        let now = Utc::now();
        store.put(&awaiting_instance(now)).await.expect("put");

        let expired = store
            .expire_due(now + Duration::minutes(5))
            .await
            .expect("expire");
        assert!(expired.is_empty());
    }
}
