#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tower::ServiceExt;

use attendance_api::clock::FixedClock;
use attendance_api::database::models::{AttendanceAttempt, ClientInfoRecord, SessionDetails};
use attendance_api::database::{AttendanceStore, AttendanceUnit, DatabaseError};
use attendance_api::storage::{
    AuditSink, DeadLetterSink, MessageQueue, RequestLogEntry, StorageError,
};
use attendance_api::verification::FreshnessWindow;
use attendance_api::AppState;

pub const SESSION_ID: &str = "S1";
pub const STUDENT_ID: &str = "u123";
pub const RANDOM_CODE: &str = "XKCD42";

/// Everything that reached a store or sink, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Audit(String),
    Lookup,
    ClientInfo(ClientInfoRecord),
    Attendance(AttendanceAttempt),
    Commit,
    DeadLetter(String),
    Relay(String),
}

#[derive(Default)]
pub struct Journal {
    events: Mutex<Vec<Event>>,
    audit_entries: Mutex<Vec<RequestLogEntry>>,
    dead_letters: Mutex<Vec<RequestLogEntry>>,
}

impl Journal {
    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn audit_entries(&self) -> Vec<RequestLogEntry> {
        self.audit_entries.lock().unwrap().clone()
    }

    pub fn dead_letters(&self) -> Vec<RequestLogEntry> {
        self.dead_letters.lock().unwrap().clone()
    }

    pub fn attendance(&self) -> Vec<AttendanceAttempt> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Attendance(a) => Some(a),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }
}

/// Store double: codes are issued up front; writes reach the journal only on commit
pub struct RecordingStore {
    journal: Arc<Journal>,
    codes: Mutex<Vec<(String, SessionDetails)>>,
    pub unavailable: AtomicBool,
}

impl RecordingStore {
    pub fn new(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            codes: Mutex::new(Vec::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn issue_code(&self, session_id: &str, random_code: &str, server_timestamp: DateTime<Utc>) {
        self.codes.lock().unwrap().push((
            random_code.to_string(),
            SessionDetails {
                session_id: session_id.to_string(),
                server_timestamp,
                session_date: server_timestamp.date_naive(),
            },
        ));
    }
}

#[async_trait]
impl AttendanceStore for RecordingStore {
    async fn begin(&self) -> Result<Box<dyn AttendanceUnit>, DatabaseError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DatabaseError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        Ok(Box::new(RecordingUnit {
            journal: self.journal.clone(),
            codes: self.codes.lock().unwrap().clone(),
            pending: Vec::new(),
        }))
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DatabaseError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

struct RecordingUnit {
    journal: Arc<Journal>,
    codes: Vec<(String, SessionDetails)>,
    pending: Vec<Event>,
}

#[async_trait]
impl AttendanceUnit for RecordingUnit {
    async fn find_session_details(
        &mut self,
        session_id: &str,
        random_code: &str,
    ) -> Result<Option<SessionDetails>, DatabaseError> {
        self.journal.push(Event::Lookup);
        let matches: Vec<_> = self
            .codes
            .iter()
            .filter(|(code, d)| code == random_code && d.session_id == session_id)
            .collect();
        Ok(match matches.as_slice() {
            [(_, d)] => Some(d.clone()),
            _ => None,
        })
    }

    async fn insert_client_info(&mut self, record: &ClientInfoRecord) -> Result<(), DatabaseError> {
        self.pending.push(Event::ClientInfo(record.clone()));
        Ok(())
    }

    async fn insert_attendance(
        &mut self,
        attempt: &AttendanceAttempt,
    ) -> Result<(), DatabaseError> {
        self.pending.push(Event::Attendance(attempt.clone()));
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DatabaseError> {
        for event in self.pending.drain(..) {
            self.journal.push(event);
        }
        self.journal.push(Event::Commit);
        Ok(())
    }
}

pub struct RecordingAudit {
    journal: Arc<Journal>,
    pub failing: AtomicBool,
}

#[async_trait]
impl AuditSink for RecordingAudit {
    async fn append(&self, entry: &RequestLogEntry) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Rejected {
                status: 503,
                body: "ServerBusy".to_string(),
            });
        }
        self.journal.audit_entries.lock().unwrap().push(entry.clone());
        self.journal.push(Event::Audit(entry.status.clone()));
        Ok(())
    }
}

pub struct RecordingDeadLetter {
    journal: Arc<Journal>,
    pub failing: AtomicBool,
}

#[async_trait]
impl DeadLetterSink for RecordingDeadLetter {
    async fn enqueue(&self, entry: &RequestLogEntry) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Rejected {
                status: 403,
                body: "AuthenticationFailed".to_string(),
            });
        }
        self.journal.dead_letters.lock().unwrap().push(entry.clone());
        self.journal.push(Event::DeadLetter(entry.status.clone()));
        Ok(())
    }
}

pub struct RecordingQueue {
    journal: Arc<Journal>,
}

#[async_trait]
impl MessageQueue for RecordingQueue {
    async fn send_message(&self, text: &str) -> Result<(), StorageError> {
        self.journal.push(Event::Relay(text.to_string()));
        Ok(())
    }
}

/// Router wired to recording doubles and a pinned clock
pub struct Harness {
    pub journal: Arc<Journal>,
    pub clock: Arc<FixedClock>,
    pub store: Arc<RecordingStore>,
    pub audit: Arc<RecordingAudit>,
    pub dead_letter: Arc<RecordingDeadLetter>,
    pub router: Router,
}

pub fn issued_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

pub fn session_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

impl Harness {
    /// One code for session S1, issued at `issued_at()`; clock at issuance
    pub fn new() -> Self {
        let journal = Arc::new(Journal::default());
        let clock = Arc::new(FixedClock::new(issued_at()));
        let store = Arc::new(RecordingStore::new(journal.clone()));
        store.issue_code(SESSION_ID, RANDOM_CODE, issued_at());
        let audit = Arc::new(RecordingAudit {
            journal: journal.clone(),
            failing: AtomicBool::new(false),
        });
        let dead_letter = Arc::new(RecordingDeadLetter {
            journal: journal.clone(),
            failing: AtomicBool::new(false),
        });
        let relay = Arc::new(RecordingQueue {
            journal: journal.clone(),
        });

        let state = AppState::new(
            store.clone(),
            audit.clone(),
            dead_letter.clone(),
            relay,
            clock.clone(),
            FreshnessWindow::default(),
        );

        Self {
            journal,
            clock,
            store,
            audit,
            dead_letter,
            router: attendance_api::app::routes(state),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Result<(StatusCode, String)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, String::from_utf8(bytes.to_vec())?))
    }

    pub async fn get(&self, uri: &str) -> Result<(StatusCode, String)> {
        self.send(Request::builder().method("GET").uri(uri).body(Body::empty())?)
            .await
    }

    pub async fn post(&self, uri: &str, body: &str) -> Result<(StatusCode, String)> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
        )
        .await
    }
}

pub fn verify_uri(session_id: &str, student_id: &str, random_code: &str) -> String {
    format!(
        "/api/attendance?session_id={}&student_id={}&random_code={}",
        session_id, student_id, random_code
    )
}
