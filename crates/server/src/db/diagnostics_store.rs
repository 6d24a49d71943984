use async_trait::async_trait;
use deadpool_sqlite::Pool;
use service_worker::{DiagnosticsError, DiagnosticsStore};
use shared::model::{DiagnosticRecord, StoredDiagnostic};

use super::model::Diagnostic;

#[derive(Debug, Clone)]
pub struct SqliteDiagnosticsStore {
    pool: Pool,
}

impl SqliteDiagnosticsStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Newest first, for external consumers. Malformed rows are skipped
    pub async fn fetch_recent(&self, limit: u64) -> Result<Vec<StoredDiagnostic>, anyhow::Error> {
        let conn = self.pool.get().await?;
        let rows = conn
            .interact(move |conn| Diagnostic::fetch_recent(conn, limit))
            .await
            .map_err(|e| anyhow::anyhow!("interact: {e}"))??;

        Ok(rows
            .into_iter()
            .filter_map(|row| match StoredDiagnostic::try_from(row) {
                Ok(stored) => Some(stored),
                Err(e) => {
                    tracing::warn!("Skipping diagnostic: {e}");
                    None
                },
            })
            .collect())
    }
}

#[async_trait]
impl DiagnosticsStore for SqliteDiagnosticsStore {
    async fn insert(&self, record: DiagnosticRecord) -> Result<i64, DiagnosticsError> {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| DiagnosticsError::Unavailable(e.to_string()))?;

        conn.interact(move |conn| Diagnostic::create(conn, record))
            .await
            .map_err(|e| DiagnosticsError::Unavailable(e.to_string()))?
            .map_err(|e| DiagnosticsError::Unavailable(format!("{e:#}")))
    }
}
