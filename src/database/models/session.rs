use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The rotating code's session and the instant the code was issued
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDetails {
    pub session_id: String,
    pub server_timestamp: DateTime<Utc>,
    pub session_date: NaiveDate,
}

/// Row from the `qr_code` ⨝ `session` lookup.
///
/// `server_timestamp` is a `TIMESTAMP` column holding UTC wall time, as the
/// code issuer writes it.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub session_id: String,
    pub server_timestamp: NaiveDateTime,
    pub session_date: NaiveDate,
}

impl From<SessionRow> for SessionDetails {
    fn from(row: SessionRow) -> Self {
        Self {
            session_id: row.session_id,
            server_timestamp: row.server_timestamp.and_utc(),
            session_date: row.session_date,
        }
    }
}
