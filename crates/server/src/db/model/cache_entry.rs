use anyhow::anyhow;
use chrono::{DateTime, Utc};
use exemplar::Model;
use http::{HeaderMap, StatusCode};
use rusqlite::{Connection, OptionalExtension};
use sea_query::{enum_def, Alias, Expr, Func, OnConflict, Order, Query, SimpleExpr, SqliteQueryBuilder};
use sea_query_rusqlite::RusqliteBinder;
use serde::{Deserialize, Serialize};
use service_worker::{CacheKey, CachedResponse};

#[derive(Debug, Clone, PartialEq)]
#[enum_def]
pub struct CacheNamespace {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Model)]
#[table("cache_entry")]
#[enum_def]
pub struct CacheEntry {
    pub namespace: String,
    pub request_key: String,
    pub status: i64,
    /// JSON encoded header map
    pub headers: String,
    pub body: Vec<u8>,
    pub stored_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct StoredHeaders(#[serde(with = "http_serde::header_map")] HeaderMap);

impl CacheEntry {
    pub fn new(namespace: &str, key: &CacheKey, response: CachedResponse) -> Result<Self, anyhow::Error> {
        Ok(Self {
            namespace: namespace.to_string(),
            request_key: key.as_str().to_string(),
            status: response.status.as_u16().into(),
            headers: serde_json::to_string(&StoredHeaders(response.headers))?,
            body: response.body.to_vec(),
            stored_at: response.stored_at,
        })
    }

    pub fn into_cached_response(self) -> Result<CachedResponse, anyhow::Error> {
        let status = u16::try_from(self.status)
            .ok()
            .and_then(|s| StatusCode::from_u16(s).ok())
            .ok_or_else(|| anyhow!("cache entry {} has bad status {}", self.request_key, self.status))?;
        let StoredHeaders(headers) = serde_json::from_str(&self.headers)?;

        Ok(CachedResponse {
            status,
            headers,
            body: self.body.into(),
            stored_at: self.stored_at,
        })
    }

    pub fn fetch(
        conn: &Connection,
        namespace: &str,
        key: &CacheKey,
    ) -> Result<Option<CacheEntry>, anyhow::Error> {
        let (sql, values) = Query::select()
            .columns([
                CacheEntryIden::Namespace,
                CacheEntryIden::RequestKey,
                CacheEntryIden::Status,
                CacheEntryIden::Headers,
                CacheEntryIden::Body,
                CacheEntryIden::StoredAt,
            ])
            .from(CacheEntryIden::Table)
            .and_where(Expr::col(CacheEntryIden::Namespace).eq(namespace))
            .and_where(Expr::col(CacheEntryIden::RequestKey).eq(key.as_str()))
            .limit(1)
            .build_rusqlite(SqliteQueryBuilder);

        let mut stmt = conn.prepare_cached(&sql)?;
        let entry = stmt
            .query_row(&*values.as_params(), CacheEntry::from_row)
            .optional()?;

        Ok(entry)
    }

    /// Inserts or replaces the entry. The namespace must already exist
    pub fn upsert(&self, conn: &Connection) -> Result<(), anyhow::Error> {
        let (sql, values) = Query::insert()
            .into_table(CacheEntryIden::Table)
            .columns([
                CacheEntryIden::Namespace,
                CacheEntryIden::RequestKey,
                CacheEntryIden::Status,
                CacheEntryIden::Headers,
                CacheEntryIden::Body,
                CacheEntryIden::StoredAt,
            ])
            .values([
                self.namespace.clone().into(),
                self.request_key.clone().into(),
                self.status.into(),
                self.headers.clone().into(),
                self.body.clone().into(),
                self.stored_at.into(),
            ])?
            .on_conflict(
                OnConflict::columns([CacheEntryIden::Namespace, CacheEntryIden::RequestKey])
                    .update_columns([
                        CacheEntryIden::Status,
                        CacheEntryIden::Headers,
                        CacheEntryIden::Body,
                        CacheEntryIden::StoredAt,
                    ])
                    .to_owned(),
            )
            .build_rusqlite(SqliteQueryBuilder);

        conn.execute(&sql, &*values.as_params())?;
        Ok(())
    }

    pub fn delete(conn: &Connection, namespace: &str, key: &CacheKey) -> Result<bool, anyhow::Error> {
        let (sql, values) = Query::delete()
            .from_table(CacheEntryIden::Table)
            .and_where(Expr::col(CacheEntryIden::Namespace).eq(namespace))
            .and_where(Expr::col(CacheEntryIden::RequestKey).eq(key.as_str()))
            .build_rusqlite(SqliteQueryBuilder);

        Ok(conn.execute(&sql, &*values.as_params())? > 0)
    }

    /// Sorted request keys of a namespace
    pub fn keys(conn: &Connection, namespace: &str) -> Result<Vec<String>, anyhow::Error> {
        let (sql, values) = Query::select()
            .column(CacheEntryIden::RequestKey)
            .from(CacheEntryIden::Table)
            .and_where(Expr::col(CacheEntryIden::Namespace).eq(namespace))
            .order_by(CacheEntryIden::RequestKey, Order::Asc)
            .build_rusqlite(SqliteQueryBuilder);

        let mut stmt = conn.prepare_cached(&sql)?;
        let keys = stmt
            .query_map(&*values.as_params(), |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(keys)
    }

    /// Total body bytes of a namespace, 0 when it's empty or missing
    pub fn namespace_size(conn: &Connection, namespace: &str) -> Result<u64, anyhow::Error> {
        let body_len = Func::cust(Alias::new("LENGTH")).arg(Expr::col(CacheEntryIden::Body));
        let total: [SimpleExpr; 2] = [Func::sum(body_len).into(), Expr::val(0i64).into()];

        let (sql, values) = Query::select()
            .expr(Func::coalesce(total))
            .from(CacheEntryIden::Table)
            .and_where(Expr::col(CacheEntryIden::Namespace).eq(namespace))
            .build_rusqlite(SqliteQueryBuilder);

        let size: i64 = conn.query_row(&sql, &*values.as_params(), |row| row.get(0))?;

        Ok(size.max(0) as u64)
    }
}

impl CacheNamespace {
    /// Creates the namespace unless it already exists
    pub fn ensure(conn: &Connection, name: &str) -> Result<(), anyhow::Error> {
        let (sql, values) = Query::insert()
            .into_table(CacheNamespaceIden::Table)
            .columns([CacheNamespaceIden::Name, CacheNamespaceIden::CreatedAt])
            .values([name.into(), Utc::now().into()])?
            .on_conflict(OnConflict::column(CacheNamespaceIden::Name).do_nothing().to_owned())
            .build_rusqlite(SqliteQueryBuilder);

        conn.execute(&sql, &*values.as_params())?;
        Ok(())
    }

    /// Sorted namespace names
    pub fn names(conn: &Connection) -> Result<Vec<String>, anyhow::Error> {
        let (sql, values) = Query::select()
            .column(CacheNamespaceIden::Name)
            .from(CacheNamespaceIden::Table)
            .order_by(CacheNamespaceIden::Name, Order::Asc)
            .build_rusqlite(SqliteQueryBuilder);

        let mut stmt = conn.prepare_cached(&sql)?;
        let names = stmt
            .query_map(&*values.as_params(), |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(names)
    }

    /// Deletes the namespace and, by cascade, its entries
    pub fn delete(conn: &Connection, name: &str) -> Result<bool, anyhow::Error> {
        let (sql, values) = Query::delete()
            .from_table(CacheNamespaceIden::Table)
            .and_where(Expr::col(CacheNamespaceIden::Name).eq(name))
            .build_rusqlite(SqliteQueryBuilder);

        Ok(conn.execute(&sql, &*values.as_params())? > 0)
    }
}
