//! Raw-message storage.
//!
//! The mail receiving tier writes each raw message into an object store
//! keyed by [`MailMessageId`]; the receipt adapter reads it back through the
//! [`MailStore`] trait. NATS Object Store backs production;
//! [`MemoryMailStore`] backs tests and local runs.

use async_nats::jetstream;
use async_nats::jetstream::object_store;
use async_trait::async_trait;
use greenlight_core::MailMessageId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// Default object store bucket name for raw messages.
const MAIL_BUCKET_NAME: &str = "greenlight-mail";

/// Errors from raw-message storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailStoreError {
    /// Failed to connect to the store.
    ConnectionFailed { message: String },
    /// Failed to store a message.
    StoreFailed { message: String },
    /// No message is stored under the given id.
    NotFound { id: MailMessageId },
    /// Failed to retrieve a message.
    RetrieveFailed { message: String },
}

impl fmt::Display for MailStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { message } => {
                write!(f, "mail store connection failed: {message}")
            }
            Self::StoreFailed { message } => write!(f, "mail store put failed: {message}"),
            Self::NotFound { id } => write!(f, "message not found: {id}"),
            Self::RetrieveFailed { message } => write!(f, "mail store get failed: {message}"),
        }
    }
}

impl std::error::Error for MailStoreError {}

/// Trait for raw-message storage operations.
#[async_trait]
pub trait MailStore: Send + Sync {
    /// Stores a raw message under the given id.
    async fn put(&self, id: MailMessageId, raw: &[u8]) -> Result<(), MailStoreError>;

    /// Retrieves the raw message stored under the given id.
    async fn get(&self, id: MailMessageId) -> Result<Vec<u8>, MailStoreError>;
}

/// Configuration for the NATS-backed mail store.
#[derive(Debug, Clone)]
pub struct MailStoreConfig {
    /// NATS server URL.
    pub url: String,
    /// Object store bucket name (defaults to greenlight-mail).
    pub bucket_name: Option<String>,
}

impl MailStoreConfig {
    /// Creates a new config with the given NATS URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bucket_name: None,
        }
    }

    fn bucket(&self) -> &str {
        self.bucket_name.as_deref().unwrap_or(MAIL_BUCKET_NAME)
    }
}

/// NATS Object Store-backed raw-message storage.
pub struct NatsMailStore {
    store: object_store::ObjectStore,
}

impl NatsMailStore {
    /// Connects to NATS and opens (or creates) the mail bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or bucket setup fails.
    pub async fn new(config: &MailStoreConfig) -> Result<Self, MailStoreError> {
        let client = async_nats::connect(&config.url).await.map_err(|e| {
            MailStoreError::ConnectionFailed {
                message: e.to_string(),
            }
        })?;

        let jetstream = jetstream::new(client);
        let store = jetstream
            .create_object_store(object_store::Config {
                bucket: config.bucket().to_string(),
                ..Default::default()
            })
            .await
            .map_err(|e| MailStoreError::ConnectionFailed {
                message: format!("failed to open mail bucket: {e}"),
            })?;

        Ok(Self { store })
    }
}

#[async_trait]
impl MailStore for NatsMailStore {
    async fn put(&self, id: MailMessageId, raw: &[u8]) -> Result<(), MailStoreError> {
        self.store
            .put(id.to_string().as_str(), &mut std::io::Cursor::new(raw))
            .await
            .map_err(|e| MailStoreError::StoreFailed {
                message: e.to_string(),
            })?;

        Ok(())
    }

    async fn get(&self, id: MailMessageId) -> Result<Vec<u8>, MailStoreError> {
        let mut object = self.store.get(id.to_string()).await.map_err(|e| {
            if e.to_string().contains("not found") {
                MailStoreError::NotFound { id }
            } else {
                MailStoreError::RetrieveFailed {
                    message: e.to_string(),
                }
            }
        })?;

        use tokio::io::AsyncReadExt;
        let mut raw = Vec::new();
        object
            .read_to_end(&mut raw)
            .await
            .map_err(|e| MailStoreError::RetrieveFailed {
                message: e.to_string(),
            })?;

        Ok(raw)
    }
}

/// In-memory raw-message storage for tests and local runs.
#[derive(Default)]
pub struct MemoryMailStore {
    messages: Mutex<HashMap<MailMessageId, Vec<u8>>>,
}

impl MemoryMailStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MailStore for MemoryMailStore {
    async fn put(&self, id: MailMessageId, raw: &[u8]) -> Result<(), MailStoreError> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id, raw.to_vec());
        Ok(())
    }

    async fn get(&self, id: MailMessageId) -> Result<Vec<u8>, MailStoreError> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&id)
            .cloned()
            .ok_or(MailStoreError::NotFound { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mail_store_config_defaults() {
        let config = MailStoreConfig::new("nats://localhost:4222");
        assert_eq!(config.bucket(), MAIL_BUCKET_NAME);
    }

    #[test]
    fn mail_store_config_custom_bucket() {
        let config = MailStoreConfig {
            url: "nats://localhost:4222".to_string(),
            bucket_name: Some("custom-mail".to_string()),
        };
        assert_eq!(config.bucket(), "custom-mail");
    }

    #[tokio::test]
    async fn memory_store_roundtrip() {
        let store = MemoryMailStore::new();
        let id = MailMessageId::new();
        let raw = b"From: a@x.com\n\nbody";

        store.put(id, raw).await.expect("put");
        let loaded = store.get(id).await.expect("get");
        assert_eq!(loaded, raw);
    }

    #[tokio::test]
    async fn memory_store_missing_message() {
        let store = MemoryMailStore::new();
        let id = MailMessageId::new();

        let err = store.get(id).await.expect_err("missing message");
        assert_eq!(err, MailStoreError::NotFound { id });
    }
}
