//! NATS-backed substrate for approval runs.
//!
//! Run records live in a JetStream KV bucket under `run.<id>`, with a
//! `token.<key>` entry mapping each resume token to its run. The single-use
//! token invariant rides on KV revision compare-and-swap: a resume loads the
//! record at some revision, applies the transition, and writes back with
//! `update`; whichever concurrent writer loses the revision race re-reads
//! and observes the run already decided.

use crate::error::{ResumeError, StoreError};
use crate::instance::ApprovalInstance;
use crate::store::{Envelope, InstanceStore};
use crate::token::ResumeToken;
use async_nats::jetstream;
use async_nats::jetstream::kv;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use greenlight_core::ApprovalRunId;
use serde_json::Value as JsonValue;

/// Default KV bucket name for run records.
const RUNS_BUCKET_NAME: &str = "greenlight-approvals";

/// Key prefix for run records.
const RUN_KEY_PREFIX: &str = "run";

/// Key prefix for token-to-run mappings.
const TOKEN_KEY_PREFIX: &str = "token";

/// How many revision races a resume or expiry rides out before giving up.
const CAS_ATTEMPTS: usize = 3;

/// Configuration for the NATS-backed substrate.
#[derive(Debug, Clone)]
pub struct NatsConfig {
    /// NATS server URL.
    pub url: String,
    /// KV bucket name (defaults to greenlight-approvals).
    pub bucket_name: Option<String>,
}

impl NatsConfig {
    /// Creates a new config with the given NATS URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bucket_name: None,
        }
    }

    fn bucket(&self) -> &str {
        self.bucket_name.as_deref().unwrap_or(RUNS_BUCKET_NAME)
    }
}

/// JetStream KV-backed run substrate.
pub struct NatsInstanceStore {
    store: kv::Store,
}

impl NatsInstanceStore {
    /// Connects to NATS and opens (or creates) the run bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or bucket setup fails.
    pub async fn new(config: &NatsConfig) -> Result<Self, StoreError> {
        let client = async_nats::connect(&config.url).await.map_err(|e| {
            StoreError::ConnectionFailed {
                message: e.to_string(),
            }
        })?;

        let jetstream = jetstream::new(client);
        let store = jetstream
            .create_key_value(kv::Config {
                bucket: config.bucket().to_string(),
                ..Default::default()
            })
            .await
            .map_err(|e| StoreError::ConnectionFailed {
                message: format!("failed to open run bucket: {e}"),
            })?;

        Ok(Self { store })
    }

    /// Returns the KV key for a run record.
    fn run_key(id: ApprovalRunId) -> String {
        format!("{RUN_KEY_PREFIX}.{id}")
    }

    /// Returns the KV key for a token mapping.
    fn token_key(token: &ResumeToken) -> String {
        format!("{TOKEN_KEY_PREFIX}.{}", token.storage_key())
    }

    /// Loads a run entry, returning the decoded record and its revision.
    async fn load(
        &self,
        key: &str,
    ) -> Result<Option<(ApprovalInstance, u64)>, StoreError> {
        let entry = self
            .store
            .entry(key)
            .await
            .map_err(|e| StoreError::LoadFailed {
                message: e.to_string(),
            })?;

        let Some(entry) = entry else {
            return Ok(None);
        };

        let envelope: Envelope<ApprovalInstance> = Envelope::from_json_bytes(&entry.value)
            .map_err(|e| StoreError::DecodeFailed {
                message: e.to_string(),
            })?;

        Ok(Some((envelope.into_payload(), entry.revision)))
    }

    /// Writes a record back only if it is still at `revision`.
    ///
    /// Returns false if a concurrent writer got there first.
    async fn compare_and_swap(
        &self,
        key: &str,
        instance: &ApprovalInstance,
        revision: u64,
    ) -> Result<bool, StoreError> {
        let bytes =
            Envelope::new(instance)
                .to_json_bytes()
                .map_err(|e| StoreError::PersistFailed {
                    message: e.to_string(),
                })?;

        Ok(self
            .store
            .update(key, bytes.into(), revision)
            .await
            .is_ok())
    }
}

#[async_trait]
impl InstanceStore for NatsInstanceStore {
    async fn put(&self, instance: &ApprovalInstance) -> Result<(), StoreError> {
        let bytes =
            Envelope::new(instance)
                .to_json_bytes()
                .map_err(|e| StoreError::PersistFailed {
                    message: e.to_string(),
                })?;

        self.store
            .put(Self::run_key(instance.id), bytes.into())
            .await
            .map_err(|e| StoreError::PersistFailed {
                message: e.to_string(),
            })?;

        self.store
            .put(
                Self::token_key(&instance.token),
                instance.id.to_string().into(),
            )
            .await
            .map_err(|e| StoreError::PersistFailed {
                message: e.to_string(),
            })?;

        Ok(())
    }

    async fn get(&self, id: ApprovalRunId) -> Result<Option<ApprovalInstance>, StoreError> {
        Ok(self
            .load(&Self::run_key(id))
            .await?
            .map(|(instance, _)| instance))
    }

    async fn resume(
        &self,
        token: &ResumeToken,
        payload: JsonValue,
        now: DateTime<Utc>,
    ) -> Result<ApprovalInstance, ResumeError> {
        let mapping = self
            .store
            .entry(Self::token_key(token))
            .await
            .map_err(|e| StoreError::LoadFailed {
                message: e.to_string(),
            })?
            .ok_or(ResumeError::UnknownToken)?;

        let run_id: ApprovalRunId = std::str::from_utf8(&mapping.value)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                ResumeError::Store(StoreError::DecodeFailed {
                    message: "token mapping does not hold a run id".to_string(),
                })
            })?;

        let run_key = Self::run_key(run_id);
        for _ in 0..CAS_ATTEMPTS {
            let (mut instance, revision) = self
                .load(&run_key)
                .await?
                .ok_or(ResumeError::UnknownToken)?;

            instance.resume(payload.clone(), now)?;

            if self.compare_and_swap(&run_key, &instance, revision).await? {
                return Ok(instance);
            }
            // Lost a revision race; reload and re-evaluate.
        }

        Err(ResumeError::Conflict { run_id })
    }

    async fn expire_due(&self, now: DateTime<Utc>) -> Result<Vec<ApprovalInstance>, StoreError> {
        let keys = self
            .store
            .keys()
            .await
            .map_err(|e| StoreError::LoadFailed {
                message: e.to_string(),
            })?;

        let run_prefix = format!("{RUN_KEY_PREFIX}.");
        let run_keys: Vec<String> = keys
            .try_filter(|key| futures::future::ready(key.starts_with(&run_prefix)))
            .try_collect()
            .await
            .map_err(|e| StoreError::LoadFailed {
                message: e.to_string(),
            })?;

        let mut expired = Vec::new();
        for key in run_keys {
            let Some((mut instance, revision)) = self.load(&key).await? else {
                continue;
            };
            if !instance.expire(now) {
                continue;
            }
            // A concurrent resume may win the revision race; the run is
            // then decided and no longer due.
            if self.compare_and_swap(&key, &instance, revision).await? {
                expired.push(instance);
            }
        }

        Ok(expired)
    }
}
