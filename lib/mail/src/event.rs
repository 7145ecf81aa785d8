//! Inbound receipt events.
//!
//! The mail receiving tier stores each raw message under a [`MailMessageId`]
//! and posts a receipt batch to the adapter. Records reference the stored
//! message by id; the adapter resolves the raw bytes through the
//! [`crate::store::MailStore`].

use greenlight_core::MailMessageId;
use serde::{Deserialize, Serialize};

/// A batch of inbound mail receipts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundReceipt {
    /// The received records, oldest first.
    #[serde(default)]
    pub records: Vec<InboundRecord>,
}

/// A single receipt record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundRecord {
    /// The mail portion of the record.
    pub mail: InboundMail,
}

/// Reference to a stored raw message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMail {
    /// Identifier of the stored raw message.
    pub message_id: MailMessageId,
}
