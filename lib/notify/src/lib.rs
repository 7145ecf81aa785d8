//! Approval notification rendering and delivery for the greenlight platform.
//!
//! This crate implements the engine's notifier seam:
//!
//! - **Template**: fixed placeholder template for the human-readable message
//! - **Callback URLs**: approve/reject links embedding the resume token
//! - **Delivery**: NATS-backed publisher fanning out to a broadcast topic
//!   and an optional direct subject

pub mod notifier;
pub mod template;
pub mod urls;

pub use notifier::{NatsNotifier, NotificationPayload, NotifierConfig};
pub use template::{NotificationTemplate, TemplateError};
pub use urls::CallbackUrls;
