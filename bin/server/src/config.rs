//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables.

use greenlight_workflow::EngineConfig;
use serde::Deserialize;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Base URL of the approval endpoint, embedded in callback links
    /// (for example `https://approvals.example.com/v1/approve`).
    pub callback_base_url: String,

    /// NATS configuration.
    #[serde(default)]
    pub nats: NatsSettings,

    /// Notification configuration.
    #[serde(default)]
    pub notify: NotifySettings,

    /// Approval policy configuration.
    #[serde(default)]
    pub approval: ApprovalSettings,
}

/// NATS-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NatsSettings {
    /// NATS server URL.
    #[serde(default = "default_nats_url")]
    pub url: String,

    /// KV bucket holding approval run records.
    pub instances_bucket: Option<String>,

    /// Object store bucket holding raw inbound messages.
    pub mail_bucket: Option<String>,
}

/// Notification-related configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifySettings {
    /// Broadcast subject for pending approvals.
    pub topic_subject: Option<String>,

    /// Optional direct subject for the approver's own channel.
    pub direct_subject: Option<String>,

    /// Optional path to a notification template file. The built-in template
    /// is used when absent.
    pub template_path: Option<String>,
}

/// Approval policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalSettings {
    /// How long an approver has to decide, in minutes.
    #[serde(default = "default_timeout_minutes")]
    pub timeout_minutes: i64,

    /// Liveness expectation for the notification leg, in minutes.
    #[serde(default = "default_heartbeat_minutes")]
    pub heartbeat_minutes: i64,

    /// Interval between deadline sweeps, in seconds.
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_nats_url() -> String {
    "nats://127.0.0.1:4222".to_string()
}

fn default_timeout_minutes() -> i64 {
    10
}

fn default_heartbeat_minutes() -> i64 {
    5
}

fn default_sweep_interval_seconds() -> u64 {
    30
}

impl Default for NatsSettings {
    fn default() -> Self {
        Self {
            url: default_nats_url(),
            instances_bucket: None,
            mail_bucket: None,
        }
    }
}

impl Default for ApprovalSettings {
    fn default() -> Self {
        Self {
            timeout_minutes: default_timeout_minutes(),
            heartbeat_minutes: default_heartbeat_minutes(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
        }
    }
}

impl ApprovalSettings {
    /// Returns the engine configuration for these settings.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            approval_timeout: chrono::Duration::minutes(self.timeout_minutes),
            heartbeat_interval: chrono::Duration::minutes(self.heartbeat_minutes),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
