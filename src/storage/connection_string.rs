use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashMap;
use url::Url;

use super::StorageError;

const DEV_ACCOUNT_NAME: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_QUEUE_ENDPOINT: &str = "http://127.0.0.1:10001/devstoreaccount1";
const DEV_TABLE_ENDPOINT: &str = "http://127.0.0.1:10002/devstoreaccount1";

/// How requests to the account are authorized
#[derive(Clone)]
pub enum Credentials {
    /// Account key; requests are signed with SharedKeyLite
    SharedKey { account: String, key: Vec<u8> },
    /// Pre-issued SAS token appended to every request URL
    SharedAccessSignature(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::SharedKey { account, .. } => {
                f.debug_struct("SharedKey").field("account", account).finish_non_exhaustive()
            }
            Credentials::SharedAccessSignature(_) => f.write_str("SharedAccessSignature(..)"),
        }
    }
}

/// Storage account resolved from an Azure connection string
#[derive(Debug, Clone)]
pub struct StorageAccount {
    pub credentials: Credentials,
    pub queue_endpoint: Url,
    pub table_endpoint: Url,
}

impl StorageAccount {
    /// Parse `Key=Value;Key=Value` connection strings as issued by the Azure
    /// portal, including SAS-only strings and `UseDevelopmentStorage=true`.
    pub fn from_connection_string(connection_string: &str) -> Result<Self, StorageError> {
        let settings = Self::parse_settings(connection_string)?;

        if settings
            .get("UseDevelopmentStorage")
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
        {
            return Self::development();
        }

        let account_name = settings.get("AccountName").cloned();
        let protocol = settings
            .get("DefaultEndpointsProtocol")
            .map(String::as_str)
            .unwrap_or("https");
        let suffix = settings
            .get("EndpointSuffix")
            .map(String::as_str)
            .unwrap_or("core.windows.net");

        let endpoint = |explicit: &str, service: &str| -> Result<Url, StorageError> {
            match (settings.get(explicit), &account_name) {
                (Some(url), _) => parse_endpoint(url),
                (None, Some(account)) => {
                    parse_endpoint(&format!("{}://{}.{}.{}", protocol, account, service, suffix))
                }
                (None, None) => Err(StorageError::InvalidConnectionString(format!(
                    "{} or AccountName is required",
                    explicit
                ))),
            }
        };

        let queue_endpoint = endpoint("QueueEndpoint", "queue")?;
        let table_endpoint = endpoint("TableEndpoint", "table")?;

        let sas = settings.get("SharedAccessSignature");
        let credentials = match (sas, settings.get("AccountKey")) {
            (Some(sas), _) => {
                Credentials::SharedAccessSignature(sas.trim_start_matches('?').to_string())
            }
            (None, Some(key)) => {
                let account = account_name.ok_or_else(|| {
                    StorageError::InvalidConnectionString(
                        "AccountName is required with AccountKey".to_string(),
                    )
                })?;
                let key = STANDARD.decode(key).map_err(|_| {
                    StorageError::InvalidConnectionString(
                        "AccountKey is not valid base64".to_string(),
                    )
                })?;
                Credentials::SharedKey { account, key }
            }
            (None, None) => {
                return Err(StorageError::InvalidConnectionString(
                    "AccountKey or SharedAccessSignature is required".to_string(),
                ))
            }
        };

        Ok(Self {
            credentials,
            queue_endpoint,
            table_endpoint,
        })
    }

    /// Well-known Azurite emulator account
    fn development() -> Result<Self, StorageError> {
        let key = STANDARD
            .decode(DEV_ACCOUNT_KEY)
            .map_err(|_| StorageError::InvalidConnectionString("development key".to_string()))?;
        Ok(Self {
            credentials: Credentials::SharedKey {
                account: DEV_ACCOUNT_NAME.to_string(),
                key,
            },
            queue_endpoint: parse_endpoint(DEV_QUEUE_ENDPOINT)?,
            table_endpoint: parse_endpoint(DEV_TABLE_ENDPOINT)?,
        })
    }

    fn parse_settings(connection_string: &str) -> Result<HashMap<String, String>, StorageError> {
        let mut settings = HashMap::new();
        for part in connection_string.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            // Values (keys, SAS tokens) may themselves contain '='
            let (key, value) = part.split_once('=').ok_or_else(|| {
                StorageError::InvalidConnectionString(format!(
                    "malformed segment '{}'",
                    key_of(part)
                ))
            })?;
            settings.insert(key.trim().to_string(), value.trim().to_string());
        }
        if settings.is_empty() {
            return Err(StorageError::InvalidConnectionString("empty".to_string()));
        }
        Ok(settings)
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, StorageError> {
    Url::parse(raw.trim_end_matches('/'))
        .map_err(|e| {
            StorageError::InvalidConnectionString(format!("invalid endpoint '{}': {}", raw, e))
        })
}

// Never echo a full segment back; it may be a secret
fn key_of(segment: &str) -> String {
    segment.chars().take(16).collect()
}
