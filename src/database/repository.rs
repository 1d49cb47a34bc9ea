use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, warn};

use crate::database::manager::DatabaseError;
use crate::database::models::{AttendanceAttempt, ClientInfoRecord, SessionDetails, SessionRow};

/// The relational store behind attendance verification.
///
/// All reads and writes for one request go through a single unit of work
/// from [`AttendanceStore::begin`]. Nothing is visible to other requests
/// until [`AttendanceUnit::commit`]; dropping an uncommitted unit rolls back.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn AttendanceUnit>, DatabaseError>;

    /// Cheap connectivity probe for health reporting
    async fn ping(&self) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait AttendanceUnit: Send {
    /// Resolve a rotating code to its session. `None` when no code matches,
    /// or when more than one does (codes are unique per session).
    async fn find_session_details(
        &mut self,
        session_id: &str,
        random_code: &str,
    ) -> Result<Option<SessionDetails>, DatabaseError>;

    async fn insert_client_info(&mut self, record: &ClientInfoRecord) -> Result<(), DatabaseError>;

    async fn insert_attendance(&mut self, attempt: &AttendanceAttempt) -> Result<(), DatabaseError>;

    async fn commit(&mut self) -> Result<(), DatabaseError>;
}

const SESSION_DETAILS_SQL: &str = r#"
    SELECT qr_code.session_id, qr_code.server_timestamp, session.session_date
    FROM qr_code
    JOIN session ON qr_code.session_id = session.session_id
    WHERE qr_code.random_code = $1 AND qr_code.session_id = $2
    LIMIT 2
"#;

const INSERT_CLIENT_INFO_SQL: &str = r#"
    INSERT INTO client_info (azure_timestamp, session_id, student_id, random_code)
    VALUES ($1, $2, $3, $4)
"#;

const INSERT_ATTENDANCE_SQL: &str = r#"
    INSERT INTO attendance (student_id, session_id, is_present)
    VALUES ($1, $2, $3)
"#;

/// Postgres-backed attendance store
#[derive(Clone)]
pub struct PgAttendanceStore {
    pool: PgPool,
}

impl PgAttendanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttendanceStore for PgAttendanceStore {
    async fn begin(&self) -> Result<Box<dyn AttendanceUnit>, DatabaseError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgAttendanceUnit { tx: Some(tx) }))
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        crate::database::manager::DatabaseManager::health_check(&self.pool).await
    }
}

/// One Postgres transaction. Rolled back by sqlx if dropped before commit.
pub struct PgAttendanceUnit {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgAttendanceUnit {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, DatabaseError> {
        self.tx.as_mut().ok_or(DatabaseError::TransactionClosed)
    }
}

#[async_trait]
impl AttendanceUnit for PgAttendanceUnit {
    async fn find_session_details(
        &mut self,
        session_id: &str,
        random_code: &str,
    ) -> Result<Option<SessionDetails>, DatabaseError> {
        let tx = self.tx()?;
        let mut rows: Vec<SessionRow> = sqlx::query_as(SESSION_DETAILS_SQL)
            .bind(random_code)
            .bind(session_id)
            .fetch_all(&mut **tx)
            .await?;

        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop().map(SessionDetails::from)),
            _ => {
                warn!(
                    "Rotating code {} matches more than one row for session {}; treating as absent",
                    random_code, session_id
                );
                Ok(None)
            }
        }
    }

    async fn insert_client_info(&mut self, record: &ClientInfoRecord) -> Result<(), DatabaseError> {
        let tx = self.tx()?;
        sqlx::query(INSERT_CLIENT_INFO_SQL)
            .bind(record.azure_timestamp.naive_utc())
            .bind(&record.session_id)
            .bind(&record.student_id)
            .bind(&record.random_code)
            .execute(&mut **tx)
            .await?;
        debug!("Inserted client info for student {}", record.student_id);
        Ok(())
    }

    async fn insert_attendance(
        &mut self,
        attempt: &AttendanceAttempt,
    ) -> Result<(), DatabaseError> {
        let tx = self.tx()?;
        sqlx::query(INSERT_ATTENDANCE_SQL)
            .bind(&attempt.student_id)
            .bind(&attempt.session_id)
            .bind(attempt.is_present)
            .execute(&mut **tx)
            .await?;
        debug!(
            "Inserted attendance for student {} (present={})",
            attempt.student_id, attempt.is_present
        );
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DatabaseError> {
        let tx = self.tx.take().ok_or(DatabaseError::TransactionClosed)?;
        tx.commit().await?;
        Ok(())
    }
}
