use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::database::models::{AttendanceAttempt, ClientInfoRecord, SessionDetails};
use crate::database::{AttendanceStore, AttendanceUnit, DatabaseError};

/// In-memory attendance store with commit/rollback semantics
#[derive(Default)]
pub struct MemoryAttendanceStore {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    codes: Vec<(String, SessionDetails)>,
    client_info: Vec<ClientInfoRecord>,
    attendance: Vec<AttendanceAttempt>,
    fail_attendance: bool,
}

impl MemoryAttendanceStore {
    pub fn issue_code(&self, details: SessionDetails, random_code: &str) {
        self.lock().codes.push((random_code.to_string(), details));
    }

    pub fn fail_attendance_writes(&self, fail: bool) {
        self.lock().fail_attendance = fail;
    }

    pub fn client_info(&self) -> Vec<ClientInfoRecord> {
        self.lock().client_info.clone()
    }

    pub fn attendance(&self) -> Vec<AttendanceAttempt> {
        self.lock().attendance.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl AttendanceStore for MemoryAttendanceStore {
    async fn begin(&self) -> Result<Box<dyn AttendanceUnit>, DatabaseError> {
        Ok(Box::new(MemoryUnit {
            state: self.state.clone(),
            client_info: Vec::new(),
            attendance: Vec::new(),
            committed: false,
        }))
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

struct MemoryUnit {
    state: Arc<Mutex<MemoryState>>,
    client_info: Vec<ClientInfoRecord>,
    attendance: Vec<AttendanceAttempt>,
    committed: bool,
}

#[async_trait]
impl AttendanceUnit for MemoryUnit {
    async fn find_session_details(
        &mut self,
        session_id: &str,
        random_code: &str,
    ) -> Result<Option<SessionDetails>, DatabaseError> {
        let state = self.state.lock().unwrap();
        let mut matches = state
            .codes
            .iter()
            .filter(|(code, d)| code == random_code && d.session_id == session_id);
        match (matches.next(), matches.next()) {
            (Some((_, d)), None) => Ok(Some(d.clone())),
            _ => Ok(None),
        }
    }

    async fn insert_client_info(&mut self, record: &ClientInfoRecord) -> Result<(), DatabaseError> {
        self.client_info.push(record.clone());
        Ok(())
    }

    async fn insert_attendance(
        &mut self,
        attempt: &AttendanceAttempt,
    ) -> Result<(), DatabaseError> {
        if self.state.lock().unwrap().fail_attendance {
            return Err(DatabaseError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        self.attendance.push(attempt.clone());
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DatabaseError> {
        if self.committed {
            return Err(DatabaseError::TransactionClosed);
        }
        let mut state = self.state.lock().unwrap();
        state.client_info.append(&mut self.client_info);
        state.attendance.append(&mut self.attendance);
        self.committed = true;
        Ok(())
    }
}
