use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::connection_string::{Credentials, StorageAccount};
use super::shared_key;
use super::{MessageQueue, StorageError};

/// Largest message Azure Queue Storage accepts, measured after base64 encoding
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Azure Queue Storage client for a single queue (Put Message only)
#[derive(Clone)]
pub struct QueueClient {
    http: reqwest::Client,
    account: StorageAccount,
    queue_name: String,
}

impl QueueClient {
    pub fn new(
        http: reqwest::Client,
        account: StorageAccount,
        queue_name: impl Into<String>,
    ) -> Self {
        Self {
            http,
            account,
            queue_name: queue_name.into(),
        }
    }

    pub fn from_connection_string(
        connection_string: &str,
        queue_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let account = StorageAccount::from_connection_string(connection_string)?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::new(http, account, queue_name))
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    fn messages_url(&self) -> Result<Url, StorageError> {
        let mut url = self.account.queue_endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                StorageError::InvalidConnectionString("queue endpoint cannot be a base".to_string())
            })?
            .pop_if_empty()
            .push(&self.queue_name)
            .push("messages");
        if let Credentials::SharedAccessSignature(sas) = &self.account.credentials {
            url.set_query(Some(sas));
        }
        Ok(url)
    }

    /// Enqueue a message. The text is base64-encoded, the format queue
    /// triggered consumers decode by default.
    pub async fn send_message(&self, text: &str) -> Result<(), StorageError> {
        let encoded = STANDARD.encode(text);
        if encoded.len() > MAX_MESSAGE_BYTES {
            return Err(StorageError::MessageTooLarge {
                size: encoded.len(),
                limit: MAX_MESSAGE_BYTES,
            });
        }

        let url = self.messages_url()?;
        let body = format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?><QueueMessage><MessageText>{}</MessageText></QueueMessage>",
            encoded
        );
        let date = shared_key::ms_date(Utc::now());
        let content_type = "application/xml; charset=utf-8";

        let mut request = self
            .http
            .post(url.clone())
            .header("x-ms-date", &date)
            .header("x-ms-version", shared_key::MS_VERSION)
            .header(reqwest::header::CONTENT_TYPE, content_type);

        if let Credentials::SharedKey { account, key } = &self.account.credentials {
            let string_to_sign = shared_key::queue_string_to_sign(
                "POST",
                content_type,
                &[("x-ms-date", date.as_str()), ("x-ms-version", shared_key::MS_VERSION)],
                &shared_key::canonicalized_resource(account, &url),
            );
            request = request.header(
                reqwest::header::AUTHORIZATION,
                shared_key::authorization(account, key, &string_to_sign)?,
            );
        }

        let response = request.body(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Sent message to queue {}", self.queue_name);
        Ok(())
    }
}

#[async_trait]
impl MessageQueue for QueueClient {
    async fn send_message(&self, text: &str) -> Result<(), StorageError> {
        QueueClient::send_message(self, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn oversized_message_is_refused_before_sending() {
        // Nothing listens on the emulator port in tests; the size check must fire first
        let client = QueueClient::new(
            reqwest::Client::new(),
            StorageAccount::from_connection_string("UseDevelopmentStorage=true").unwrap(),
            "dead-letter",
        );

        let err = client.send_message(&"x".repeat(49_153)).await.unwrap_err();

        assert!(matches!(
            err,
            StorageError::MessageTooLarge { size: 65_540, limit: MAX_MESSAGE_BYTES }
        ));
    }

    #[test]
    fn builds_messages_url_for_emulator_and_sas() {
        let client = QueueClient::new(
            reqwest::Client::new(),
            StorageAccount::from_connection_string("UseDevelopmentStorage=true").unwrap(),
            "dead-letter",
        );
        assert_eq!(
            client.messages_url().unwrap().as_str(),
            "http://127.0.0.1:10001/devstoreaccount1/dead-letter/messages"
        );

        let client = QueueClient::new(
            reqwest::Client::new(),
            StorageAccount::from_connection_string(
                "QueueEndpoint=https://a.queue.core.windows.net/;TableEndpoint=https://a.table.core.windows.net;SharedAccessSignature=sv=1&sig=x",
            )
            .unwrap(),
            "dead-letter",
        );
        assert_eq!(
            client.messages_url().unwrap().as_str(),
            "https://a.queue.core.windows.net/dead-letter/messages?sv=1&sig=x"
        );
    }
}
