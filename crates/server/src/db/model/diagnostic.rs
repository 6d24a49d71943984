use anyhow::anyhow;
use chrono::{DateTime, Utc};
use exemplar::Model;
use rusqlite::Connection;
use sea_query::{enum_def, Expr, Order, Query, SqliteQueryBuilder};
use sea_query_rusqlite::RusqliteBinder;
use shared::model::{DiagnosticKind, DiagnosticRecord, StoredDiagnostic};

/// A row of the diagnostic table. The kind specific payload lives in the
/// nullable `duration_ms` / `error` columns
#[derive(Debug, Clone, PartialEq, Model)]
#[table("diagnostic")]
#[enum_def]
pub struct Diagnostic {
    pub id: i64,
    pub url: String,
    pub kind: String,
    pub duration_ms: Option<i64>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Model)]
#[table("diagnostic")]
pub struct NewDiagnostic {
    pub url: String,
    pub kind: String,
    pub duration_ms: Option<i64>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<DiagnosticRecord> for NewDiagnostic {
    fn from(record: DiagnosticRecord) -> Self {
        let kind = record.kind.name().to_string();
        let (duration_ms, error) = match record.kind {
            DiagnosticKind::SlowRequest { duration_ms } => (Some(duration_ms as i64), None),
            DiagnosticKind::NetworkError { error } => (None, Some(error)),
        };

        Self {
            url: record.url,
            kind,
            duration_ms,
            error,
            timestamp: record.timestamp,
        }
    }
}

impl TryFrom<Diagnostic> for StoredDiagnostic {
    type Error = anyhow::Error;

    fn try_from(row: Diagnostic) -> Result<Self, Self::Error> {
        let kind = match (row.kind.as_str(), row.duration_ms, row.error) {
            ("slow_request", Some(duration_ms), _) => DiagnosticKind::SlowRequest {
                duration_ms: duration_ms.max(0) as u64,
            },
            ("network_error", _, Some(error)) => DiagnosticKind::NetworkError { error },
            (kind, ..) => return Err(anyhow!("diagnostic {} has malformed kind {kind}", row.id)),
        };

        Ok(StoredDiagnostic {
            id: row.id,
            record: DiagnosticRecord {
                url: row.url,
                kind,
                timestamp: row.timestamp,
            },
        })
    }
}

impl Diagnostic {
    /// Inserts the record and returns its auto-incremented id
    pub fn create(conn: &Connection, record: DiagnosticRecord) -> Result<i64, anyhow::Error> {
        NewDiagnostic::from(record).insert(conn)?;
        Ok(conn.last_insert_rowid())
    }

    /// Newest first
    pub fn fetch_recent(conn: &Connection, limit: u64) -> Result<Vec<Diagnostic>, anyhow::Error> {
        let (sql, values) = Query::select()
            .columns([
                DiagnosticIden::Id,
                DiagnosticIden::Url,
                DiagnosticIden::Kind,
                DiagnosticIden::DurationMs,
                DiagnosticIden::Error,
                DiagnosticIden::Timestamp,
            ])
            .from(DiagnosticIden::Table)
            .order_by(DiagnosticIden::Id, Order::Desc)
            .limit(limit)
            .build_rusqlite(SqliteQueryBuilder);

        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt
            .query_map(&*values.as_params(), Diagnostic::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    pub fn prune_older_than(conn: &Connection, cutoff: DateTime<Utc>) -> Result<usize, anyhow::Error> {
        let (sql, values) = Query::delete()
            .from_table(DiagnosticIden::Table)
            .and_where(Expr::col(DiagnosticIden::Timestamp).lt(cutoff))
            .build_rusqlite(SqliteQueryBuilder);

        Ok(conn.execute(&sql, &*values.as_params())?)
    }
}
