use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use async_trait::async_trait;
use loole::{Receiver, Sender, TrySendError};
use shared::model::{DiagnosticRecord, StoredDiagnostic};
use tracing::{debug, trace, warn};

use crate::error::DiagnosticsError;

/// Durable append-only store for diagnostic records
#[async_trait]
pub trait DiagnosticsStore: Send + Sync {
    /// Inserts the record and returns its auto-incremented id
    async fn insert(&self, record: DiagnosticRecord) -> Result<i64, DiagnosticsError>;
}

#[derive(Debug, Default)]
pub struct MemoryDiagnosticsStore {
    records: Mutex<Vec<StoredDiagnostic>>,
}

impl MemoryDiagnosticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<StoredDiagnostic> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DiagnosticsStore for MemoryDiagnosticsStore {
    async fn insert(&self, record: DiagnosticRecord) -> Result<i64, DiagnosticsError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let id = records.last().map_or(1, |r| r.id + 1);
        records.push(StoredDiagnostic { id, record });
        Ok(id)
    }
}

/// Non-blocking front of the diagnostics queue
///
/// Records are pushed onto a bounded channel and written by a
/// [`DiagnosticsDrain`] running elsewhere. A full or closed queue drops the
/// record
#[derive(Clone)]
pub struct DiagnosticsSink {
    sender: Sender<DiagnosticRecord>,
    dropped: Arc<AtomicU64>,
}

impl fmt::Debug for DiagnosticsSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticsSink")
            .field("dropped", &self.dropped())
            .finish_non_exhaustive()
    }
}

impl DiagnosticsSink {
    pub fn new(store: Arc<dyn DiagnosticsStore>, bound: usize) -> (Self, DiagnosticsDrain) {
        let (sender, receiver) = loole::bounded(bound.max(1));
        let sink = Self {
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (sink, DiagnosticsDrain { receiver, store })
    }

    pub fn record(&self, record: DiagnosticRecord) {
        match self.sender.try_send(record) {
            Ok(()) => trace!("diagnostic queued"),
            Err(TrySendError::Full(record)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(url = %record.url, kind = record.kind.name(), "diagnostics queue full, dropping record");
            },
            Err(TrySendError::Disconnected(record)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(url = %record.url, kind = record.kind.name(), "diagnostics drain gone, dropping record");
            },
        }
    }

    /// Number of records dropped since creation
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

pub struct DiagnosticsDrain {
    receiver: Receiver<DiagnosticRecord>,
    store: Arc<dyn DiagnosticsStore>,
}

impl DiagnosticsDrain {
    /// Writes records until every sink has been dropped
    pub async fn run(self) {
        while let Ok(record) = self.receiver.recv_async().await {
            self.write(record).await;
        }
        debug!("diagnostics drain finished");
    }

    /// Writes whatever is queued right now and returns how many were taken
    pub async fn flush(&self) -> usize {
        let mut taken = 0;
        while let Ok(record) = self.receiver.try_recv() {
            self.write(record).await;
            taken += 1;
        }
        taken
    }

    async fn write(&self, record: DiagnosticRecord) {
        let url = record.url.clone();
        match self.store.insert(record).await {
            Ok(id) => trace!(id, url = %url, "diagnostic stored"),
            // Best effort, the record is lost
            Err(e) => warn!(url = %url, "failed to store diagnostic: {e}"),
        }
    }
}
