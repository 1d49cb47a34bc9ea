use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::database::{AttendanceStore, DatabaseManager, PgAttendanceStore};
use crate::services::AttendanceService;
use crate::storage::{
    AuditSink, DeadLetterSink, MessageQueue, QueueClient, QueueDeadLetterSink, TableAuditSink,
    TableClient,
};
use crate::verification::{FreshnessWindow, ValidityEngine};

/// Shared handler state. Cheap to clone; everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub attendance: Arc<AttendanceService>,
    pub store: Arc<dyn AttendanceStore>,
    pub relay: Arc<dyn MessageQueue>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        audit: Arc<dyn AuditSink>,
        dead_letter: Arc<dyn DeadLetterSink>,
        relay: Arc<dyn MessageQueue>,
        clock: Arc<dyn Clock>,
        window: FreshnessWindow,
    ) -> Self {
        let engine = ValidityEngine::new(store.clone(), window);
        Self {
            attendance: Arc::new(AttendanceService::new(engine, audit, dead_letter, clock)),
            store,
            relay,
        }
    }

    /// Wire the Postgres store and the Azure Storage sinks from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let pool = DatabaseManager::connect(&config.database).context("attendance database")?;
        let store: Arc<dyn AttendanceStore> = Arc::new(PgAttendanceStore::new(pool));

        let timeout = Duration::from_secs(config.storage.request_timeout_secs);

        let queue_connection = config
            .storage
            .queue_connection_string
            .as_deref()
            .context("QUEUE_CONNECTION_STRING or STORAGE_CONNECTION_STRING must be set")?;
        let dead_letter_queue = QueueClient::from_connection_string(
            queue_connection,
            &config.storage.queue_name,
            timeout,
        )
        .context("dead-letter queue")?;
        let relay_queue = QueueClient::from_connection_string(
            queue_connection,
            &config.storage.relay_queue_name,
            timeout,
        )
        .context("relay queue")?;

        let table_connection = config
            .storage
            .table_connection_string
            .as_deref()
            .context("TABLE_CONNECTION_STRING or STORAGE_CONNECTION_STRING must be set")?;
        let table = TableClient::from_connection_string(
            table_connection,
            &config.storage.table_name,
            timeout,
        )
        .context("audit table")?;

        tracing::info!(
            "Audit table '{}', dead-letter queue '{}', relay queue '{}'",
            table.table_name(),
            dead_letter_queue.queue_name(),
            relay_queue.queue_name()
        );

        Ok(Self::new(
            store,
            Arc::new(TableAuditSink::new(table)),
            Arc::new(QueueDeadLetterSink::new(Arc::new(dead_letter_queue))),
            Arc::new(relay_queue),
            Arc::new(SystemClock),
            FreshnessWindow::from_secs(config.validity.freshness_window_secs),
        ))
    }
}
