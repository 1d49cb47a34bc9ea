use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One verification attempt. Every attempt is kept; repeats are not merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceAttempt {
    pub student_id: String,
    pub session_id: String,
    pub is_present: bool,
}

/// When a valid code was presented, and by whom.
///
/// `azure_timestamp` is written to a `TIMESTAMP` column as UTC wall time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfoRecord {
    pub azure_timestamp: DateTime<Utc>,
    pub session_id: String,
    pub student_id: String,
    pub random_code: String,
}
