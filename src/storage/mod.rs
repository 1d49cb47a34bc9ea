//! Append-only audit log and dead-letter queue, backed by Azure Storage.
//!
//! The two sinks are separate capabilities: the audit table records every
//! request exactly once on receipt, the dead-letter queue receives only the
//! requests that need follow-up.

pub mod connection_string;
pub mod queue;
pub mod shared_key;
pub mod table;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::middleware::CapturedRequest;

pub use connection_string::StorageAccount;
pub use queue::QueueClient;
pub use table::TableClient;

/// Partition shared by every request log entry
pub const REQUEST_LOG_PARTITION: &str = "HttpRequestLog";

/// Longest request body kept on an entry, in characters. Keeps the entity
/// under the table's 32K-character string limit and the base64 queue message
/// under 64 KiB.
pub const MAX_LOGGED_BODY_CHARS: usize = 8 * 1024;

/// Longest request URL kept on an entry, in characters
pub const MAX_LOGGED_URL_CHARS: usize = 4 * 1024;

/// Errors from the queue and table adapters
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid storage connection string: {0}")]
    InvalidConnectionString(String),

    #[error("Storage request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Storage service rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Failed to encode storage payload: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Failed to sign storage request: {0}")]
    Signing(String),

    #[error("Queue message is {size} bytes encoded, limit is {limit}")]
    MessageTooLarge { size: usize, limit: usize },
}

impl StorageError {
    /// True when the storage endpoint could not be reached in time
    pub fn is_unavailable(&self) -> bool {
        match self {
            StorageError::Transport(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

/// Snapshot of one inbound request and the status it resolved to.
///
/// Written to the audit table and, for rejected requests, to the dead-letter
/// queue. The row key is a fresh UUID so concurrent requests never collide;
/// arrival time is kept as `RequestTimestamp`. Bodies longer than
/// [`MAX_LOGGED_BODY_CHARS`] are cut and flagged with `RequestBodyTruncated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestLogEntry {
    pub partition_key: String,
    pub row_key: String,
    pub request_method: String,
    #[serde(rename = "RequestURL")]
    pub request_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub request_body_truncated: bool,
    pub status: String,
    pub request_timestamp: DateTime<Utc>,
}

impl RequestLogEntry {
    pub fn new(
        request: &CapturedRequest,
        status: impl Into<String>,
        received_at: DateTime<Utc>,
    ) -> Self {
        let (request_url, _) = truncate_chars(&request.url, MAX_LOGGED_URL_CHARS);
        let (request_body, request_body_truncated) = match request.body_text() {
            Some(text) => {
                let (kept, truncated) = truncate_chars(&text, MAX_LOGGED_BODY_CHARS);
                (Some(kept.to_string()), truncated)
            }
            None => (None, false),
        };

        Self {
            partition_key: REQUEST_LOG_PARTITION.to_string(),
            row_key: Uuid::new_v4().to_string(),
            request_method: request.method.to_string(),
            request_url: request_url.to_string(),
            request_body,
            request_body_truncated,
            status: status.into(),
            request_timestamp: received_at,
        }
    }
}

/// At most `max` characters of `text`, cut on a char boundary
fn truncate_chars(text: &str, max: usize) -> (&str, bool) {
    match text.char_indices().nth(max) {
        Some((end, _)) => (&text[..end], true),
        None => (text, false),
    }
}

/// Append-only log of every request received
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, entry: &RequestLogEntry) -> Result<(), StorageError>;
}

/// Follow-up queue for requests that were rejected or could not be parsed
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn enqueue(&self, entry: &RequestLogEntry) -> Result<(), StorageError>;
}

/// Plain text message queue
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn send_message(&self, text: &str) -> Result<(), StorageError>;
}

/// Audit sink writing one table entity per request
pub struct TableAuditSink {
    client: TableClient,
}

impl TableAuditSink {
    pub fn new(client: TableClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuditSink for TableAuditSink {
    async fn append(&self, entry: &RequestLogEntry) -> Result<(), StorageError> {
        self.client.insert_entity(entry).await
    }
}

/// Dead-letter sink sending the entry as a JSON message
pub struct QueueDeadLetterSink {
    queue: Arc<dyn MessageQueue>,
}

impl QueueDeadLetterSink {
    pub fn new(queue: Arc<dyn MessageQueue>) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl DeadLetterSink for QueueDeadLetterSink {
    async fn enqueue(&self, entry: &RequestLogEntry) -> Result<(), StorageError> {
        let message = serde_json::to_string(entry)?;
        self.queue.send_message(&message).await
    }
}
