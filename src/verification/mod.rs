//! Rotating-code validity decision.
//!
//! A claim is valid when its code resolves to the claimed session and the
//! code's server timestamp falls inside the freshness window at `now`. Every
//! decision writes exactly one attendance attempt; a valid one writes the
//! client info first. Lookup and writes share one store transaction.

pub mod window;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::database::models::{AttendanceAttempt, ClientInfoRecord, SessionDetails};
use crate::database::{AttendanceStore, DatabaseError};

pub use window::FreshnessWindow;

/// What the client claims: "this student holds this session's current code"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceClaim {
    pub session_id: String,
    pub student_id: String,
    pub random_code: String,
}

/// Why a claim was turned down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No code matched the session (or the match was ambiguous)
    UnknownCode,
    Expired,
    NotYetValid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Present { session_id: String },
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_present(&self) -> bool {
        matches!(self, Verdict::Present { .. })
    }
}

pub struct ValidityEngine {
    store: Arc<dyn AttendanceStore>,
    window: FreshnessWindow,
}

impl ValidityEngine {
    pub fn new(store: Arc<dyn AttendanceStore>, window: FreshnessWindow) -> Self {
        Self { store, window }
    }

    pub fn window(&self) -> FreshnessWindow {
        self.window
    }

    /// Decide a claim at `now` and record the outcome.
    ///
    /// Store failures abort the unit of work (nothing is committed) and are
    /// returned as-is; there are no retries.
    pub async fn verify(
        &self,
        claim: &AttendanceClaim,
        now: DateTime<Utc>,
    ) -> Result<Verdict, DatabaseError> {
        let mut unit = self.store.begin().await?;

        let details = unit
            .find_session_details(&claim.session_id, &claim.random_code)
            .await?;
        match &details {
            Some(d) => info!("Session details: {} issued at {}", d.session_id, d.server_timestamp),
            None => info!("No session details for session {}", claim.session_id),
        }

        let verdict = self.decide(details.as_ref(), now);

        match &verdict {
            Verdict::Present { session_id } => {
                info!("Code is valid");
                unit.insert_client_info(&ClientInfoRecord {
                    azure_timestamp: now,
                    session_id: session_id.clone(),
                    student_id: claim.student_id.clone(),
                    random_code: claim.random_code.clone(),
                })
                .await?;
            }
            Verdict::Rejected(reason) => info!("Code is invalid ({:?})", reason),
        }

        unit.insert_attendance(&AttendanceAttempt {
            student_id: claim.student_id.clone(),
            session_id: claim.session_id.clone(),
            is_present: verdict.is_present(),
        })
        .await?;

        unit.commit().await?;
        Ok(verdict)
    }

    /// Pure decision over the looked-up code
    pub fn decide(&self, details: Option<&SessionDetails>, now: DateTime<Utc>) -> Verdict {
        let Some(details) = details else {
            return Verdict::Rejected(Rejection::UnknownCode);
        };

        if self.window.admits(now, details.server_timestamp) {
            Verdict::Present {
                session_id: details.session_id.clone(),
            }
        } else if details.server_timestamp > now {
            Verdict::Rejected(Rejection::NotYetValid)
        } else {
            Verdict::Rejected(Rejection::Expired)
        }
    }
}
