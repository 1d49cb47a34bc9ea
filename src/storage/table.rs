use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::connection_string::{Credentials, StorageAccount};
use super::shared_key;
use super::StorageError;

/// Azure Table Storage client for a single table (Insert Entity only)
#[derive(Clone)]
pub struct TableClient {
    http: reqwest::Client,
    account: StorageAccount,
    table_name: String,
}

impl TableClient {
    pub fn new(
        http: reqwest::Client,
        account: StorageAccount,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            http,
            account,
            table_name: table_name.into(),
        }
    }

    pub fn from_connection_string(
        connection_string: &str,
        table_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StorageError> {
        let account = StorageAccount::from_connection_string(connection_string)?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::new(http, account, table_name))
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn table_url(&self) -> Result<Url, StorageError> {
        let mut url = self.account.table_endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                StorageError::InvalidConnectionString("table endpoint cannot be a base".to_string())
            })?
            .pop_if_empty()
            .push(&self.table_name);
        if let Credentials::SharedAccessSignature(sas) = &self.account.credentials {
            url.set_query(Some(sas));
        }
        Ok(url)
    }

    /// Insert one entity. The entity must serialize to a JSON object carrying
    /// `PartitionKey` and `RowKey`; an existing key is a conflict, not an update.
    pub async fn insert_entity<E: Serialize + Sync>(&self, entity: &E) -> Result<(), StorageError> {
        let url = self.table_url()?;
        let date = shared_key::ms_date(Utc::now());

        let mut request = self
            .http
            .post(url.clone())
            .header("x-ms-date", &date)
            .header("x-ms-version", shared_key::MS_VERSION)
            .header("DataServiceVersion", "3.0;NetFx")
            .header("MaxDataServiceVersion", "3.0;NetFx")
            .header(reqwest::header::ACCEPT, "application/json;odata=nometadata")
            .header("Prefer", "return-no-content")
            .json(entity);

        if let Credentials::SharedKey { account, key } = &self.account.credentials {
            let string_to_sign = shared_key::table_string_to_sign(
                &date,
                &shared_key::canonicalized_resource(account, &url),
            );
            request = request.header(
                reqwest::header::AUTHORIZATION,
                shared_key::authorization(account, key, &string_to_sign)?,
            );
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Inserted entity into table {}", self.table_name);
        Ok(())
    }
}
