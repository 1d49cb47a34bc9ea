// handlers/attendance/verify.rs - GET|POST /api/attendance handler

use axum::extract::State;

use crate::error::ApiError;
use crate::middleware::CapturedRequest;
use crate::services::AttendanceResponse;
use crate::state::AppState;

/**
 * GET|POST /api/attendance - Verify a rotating attendance code
 *
 * Parameters are read from the query string first:
 *   /api/attendance?session_id=S1&student_id=u123&random_code=XKCD42
 *
 * If any is missing, the body is parsed as JSON with the same keys:
 * ```json
 * {
 *   "session_id": "S1",
 *   "student_id": "u123",
 *   "random_code": "XKCD42"
 * }
 * ```
 *
 * Responses are plain text:
 * - 200 `Student u123 marked present for session S1.`
 * - 400 `Invalid or not yet valid attendance code.`
 * - 400 `Invalid request body` / `Missing required parameters: ...`
 * - 5xx when the store, the audit table or the dead-letter queue fails
 *
 * Every request is audited on receipt; 400s are also dead-lettered.
 */
pub async fn verify(
    State(state): State<AppState>,
    request: CapturedRequest,
) -> Result<AttendanceResponse, ApiError> {
    tracing::info!("Attendance verification request: {} {}", request.method, request.url);
    Ok(state.attendance.handle(&request).await?)
}
