use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::database::DatabaseError;
use crate::middleware::CapturedRequest;
use crate::storage::{AuditSink, DeadLetterSink, RequestLogEntry, StorageError};
use crate::verification::{AttendanceClaim, ValidityEngine, Verdict};

/// Status strings recorded on audit and dead-letter entries
pub mod status {
    pub const RECEIVED: &str = "Received";
    pub const INVALID_BODY: &str = "Invalid request body";
    pub const MISSING_PARAMETERS: &str = "Missing required parameters";
    pub const INVALID_CODE: &str = "Invalid or not yet valid attendance code";
}

const SESSION_ID: &str = "session_id";
const STUDENT_ID: &str = "student_id";
const RANDOM_CODE: &str = "random_code";

#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    #[error("Attendance store error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Storage sink error: {0}")]
    Storage(#[from] StorageError),
}

/// Plain text outcome of a verification request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceResponse {
    pub status: StatusCode,
    pub message: String,
}

impl AttendanceResponse {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for AttendanceResponse {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

/// Input that never reaches the validity engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedRequest {
    /// Query incomplete and the body is not a JSON object
    InvalidBody,
    MissingParameters(Vec<&'static str>),
}

impl MalformedRequest {
    fn status(&self) -> &'static str {
        match self {
            MalformedRequest::InvalidBody => status::INVALID_BODY,
            MalformedRequest::MissingParameters(_) => status::MISSING_PARAMETERS,
        }
    }

    fn message(&self) -> String {
        match self {
            MalformedRequest::InvalidBody => status::INVALID_BODY.to_string(),
            MalformedRequest::MissingParameters(names) => {
                format!("{}: {}", status::MISSING_PARAMETERS, names.join(", "))
            }
        }
    }
}

/// Read the claim from the query string, falling back to a JSON body when any
/// parameter is missing. Body values win; the query fills whatever the body
/// leaves out.
pub fn resolve_claim(request: &CapturedRequest) -> Result<AttendanceClaim, MalformedRequest> {
    let session_id = request.query_param(SESSION_ID);
    let student_id = request.query_param(STUDENT_ID);
    let random_code = request.query_param(RANDOM_CODE);

    if let (Some(session_id), Some(student_id), Some(random_code)) =
        (&session_id, &student_id, &random_code)
    {
        return Ok(AttendanceClaim {
            session_id: session_id.clone(),
            student_id: student_id.clone(),
            random_code: random_code.clone(),
        });
    }

    info!("Didn't find all required parameters in the query string, trying the request body");
    let body = match serde_json::from_slice::<Value>(&request.body) {
        Ok(Value::Object(body)) => body,
        _ => return Err(MalformedRequest::InvalidBody),
    };

    let session_id = body_field(&body, SESSION_ID).or(session_id);
    let student_id = body_field(&body, STUDENT_ID).or(student_id);
    let random_code = body_field(&body, RANDOM_CODE).or(random_code);

    match (session_id, student_id, random_code) {
        (Some(session_id), Some(student_id), Some(random_code)) => Ok(AttendanceClaim {
            session_id,
            student_id,
            random_code,
        }),
        (session_id, student_id, random_code) => {
            let missing = [
                (SESSION_ID, session_id.is_none()),
                (STUDENT_ID, student_id.is_none()),
                (RANDOM_CODE, random_code.is_none()),
            ]
            .into_iter()
            .filter_map(|(name, missing)| missing.then_some(name))
            .collect();
            Err(MalformedRequest::MissingParameters(missing))
        }
    }
}

/// Identifiers are opaque; numeric JSON values are accepted as their text
fn body_field(body: &Map<String, Value>, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Audit, decide, record, dead-letter: the whole life of one verification request
pub struct AttendanceService {
    engine: ValidityEngine,
    audit: Arc<dyn AuditSink>,
    dead_letter: Arc<dyn DeadLetterSink>,
    clock: Arc<dyn Clock>,
}

impl AttendanceService {
    pub fn new(
        engine: ValidityEngine,
        audit: Arc<dyn AuditSink>,
        dead_letter: Arc<dyn DeadLetterSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            engine,
            audit,
            dead_letter,
            clock,
        }
    }

    /// Handle one request.
    ///
    /// Exactly one `Received` audit entry is written before anything else.
    /// Malformed and rejected requests are dead-lettered once; valid ones never.
    /// Infrastructure failures are returned, not retried.
    pub async fn handle(
        &self,
        request: &CapturedRequest,
    ) -> Result<AttendanceResponse, AttendanceError> {
        let received_at = self.clock.now();
        self.audit
            .append(&RequestLogEntry::new(request, status::RECEIVED, received_at))
            .await?;

        let claim = match resolve_claim(request) {
            Ok(claim) => claim,
            Err(malformed) => {
                info!("{}", malformed.message());
                self.dead_letter(request, malformed.status(), received_at).await?;
                return Ok(AttendanceResponse::bad_request(malformed.message()));
            }
        };
        info!(
            "Session ID: {}, Student ID: {}, Random Code: {}",
            claim.session_id, claim.student_id, claim.random_code
        );

        match self.engine.verify(&claim, received_at).await? {
            Verdict::Present { session_id } => Ok(AttendanceResponse::ok(format!(
                "Student {} marked present for session {}.",
                claim.student_id, session_id
            ))),
            Verdict::Rejected(_) => {
                self.dead_letter(request, status::INVALID_CODE, received_at).await?;
                Ok(AttendanceResponse::bad_request(format!("{}.", status::INVALID_CODE)))
            }
        }
    }

    async fn dead_letter(
        &self,
        request: &CapturedRequest,
        status: &str,
        received_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), StorageError> {
        let entry = RequestLogEntry::new(request, status, received_at);
        if let Err(e) = self.dead_letter.enqueue(&entry).await {
            warn!("Failed to dead-letter request {}: {}", entry.row_key, e);
            return Err(e);
        }
        Ok(())
    }
}
