//! Inbound email support for the greenlight platform.
//!
//! This crate provides what the receipt adapter needs to turn a stored raw
//! email into workflow input:
//!
//! - **Receipt Events**: the inbound batch schema referencing stored messages
//! - **Parsing**: minimal RFC 5322 header and body extraction
//! - **Storage**: the `MailStore` trait over raw-message storage, with NATS
//!   Object Store and in-memory implementations

pub mod event;
pub mod message;
pub mod store;

pub use event::{InboundMail, InboundReceipt, InboundRecord};
pub use message::{MailParseError, ParsedMail, parse_message};
pub use store::{MailStore, MailStoreConfig, MailStoreError, MemoryMailStore, NatsMailStore};
