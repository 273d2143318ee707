//! MySQL implementation of [`Database`] and [`Connector`] over an SQLx pool.
//!
//! Queries issued on behalf of the model go through `sqlx::raw_sql`, which
//! uses MySQL's text protocol: every cell arrives as text regardless of
//! column type, so results can be rendered without a per-type decode table.

use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column, Row, ValueRef};
use tracing::info;

use super::{ConnectionConfig, Connector, Database, DbError};

const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// Sample rows appended to each table's DDL.
pub const SAMPLE_ROWS_IN_TABLE_INFO: usize = 3;
/// Cell values longer than this are cut and suffixed with `...`.
pub const MAX_VALUE_CHARS: usize = 300;

fn db_max_connections() -> u32 {
    std::env::var("DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
}

fn db_acquire_timeout() -> Duration {
    let secs = std::env::var("DB_ACQUIRE_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_DB_ACQUIRE_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

// =============================================================================
// CONNECTOR
// =============================================================================

/// Opens a pooled MySQL handle; the first connection is established eagerly
/// so bad credentials surface at configure time.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlConnector;

#[async_trait::async_trait]
impl Connector for MySqlConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Database>, DbError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(db_max_connections())
            .acquire_timeout(db_acquire_timeout())
            .connect(&config.url())
            .await
            .map_err(|e| DbError::Connect(e.to_string()))?;

        info!(host = %config.host, port = %config.port, database = %config.database, "mysql: pool opened");
        Ok(Arc::new(MySqlDatabase { pool }))
    }
}

// =============================================================================
// DATABASE
// =============================================================================

pub struct MySqlDatabase {
    pool: MySqlPool,
}

impl MySqlDatabase {
    async fn fetch_text(&self, sql: &str) -> Result<(Vec<String>, Vec<Vec<Option<String>>>), DbError> {
        let rows = sqlx::raw_sql(sql).fetch_all(&self.pool).await?;
        let columns = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let cells = rows.iter().map(row_cells).collect::<Result<Vec<_>, _>>()?;
        Ok((columns, cells))
    }
}

fn row_cells(row: &MySqlRow) -> Result<Vec<Option<String>>, DbError> {
    (0..row.len())
        .map(|i| {
            if row.try_get_raw(i)?.is_null() {
                return Ok(None);
            }
            match row.try_get_unchecked::<String, _>(i) {
                Ok(text) => Ok(Some(text)),
                // Non-UTF-8 payloads (BLOB, BINARY) are rendered lossily.
                Err(_) => {
                    let bytes: Vec<u8> = row.try_get_unchecked(i)?;
                    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
                }
            }
        })
        .collect()
}

fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

#[async_trait::async_trait]
impl Database for MySqlDatabase {
    fn dialect(&self) -> &'static str {
        "mysql"
    }

    async fn list_tables(&self) -> Result<Vec<String>, DbError> {
        // CAST: MySQL 8 reports information_schema names as VARBINARY.
        let tables = sqlx::query_scalar::<_, String>(
            "SELECT CAST(TABLE_NAME AS CHAR) FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = DATABASE() ORDER BY TABLE_NAME",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(tables)
    }

    async fn table_info(&self, tables: &[String]) -> Result<String, DbError> {
        let known = self.list_tables().await?;
        let missing: Vec<&str> = tables
            .iter()
            .filter(|t| !known.contains(t))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(DbError::UnknownTables(format_name_set(&missing)));
        }

        let mut out = String::new();
        for table in tables {
            let (_, ddl_rows) = self
                .fetch_text(&format!("SHOW CREATE TABLE {}", quote_ident(table)))
                .await?;
            let ddl = ddl_rows
                .first()
                .and_then(|r| r.get(1).cloned().flatten())
                .unwrap_or_default();

            let (columns, sample) = self
                .fetch_text(&format!("SELECT * FROM {} LIMIT {SAMPLE_ROWS_IN_TABLE_INFO}", quote_ident(table)))
                .await?;

            let _ = write!(
                out,
                "\n{ddl}\n\n/*\n{SAMPLE_ROWS_IN_TABLE_INFO} rows from {table} table:\n{}*/\n",
                render_rows(&columns, &sample)
            );
        }
        Ok(out.trim().to_string())
    }

    async fn run(&self, sql: &str) -> Result<String, DbError> {
        let (columns, rows) = self.fetch_text(sql).await?;
        if rows.is_empty() {
            return Ok("Query returned no rows.".to_string());
        }
        Ok(render_rows(&columns, &rows))
    }
}

// =============================================================================
// RENDERING
// =============================================================================

/// `{'a', 'b'}` — the set notation used in unknown-table errors.
pub(crate) fn format_name_set(names: &[&str]) -> String {
    let inner: Vec<String> = names.iter().map(|n| format!("'{n}'")).collect();
    format!("{{{}}}", inner.join(", "))
}

/// Render a result set as a pipe-separated table, one line per row.
pub(crate) fn render_rows(columns: &[String], rows: &[Vec<Option<String>>]) -> String {
    let mut out = String::new();
    if !columns.is_empty() {
        out.push_str(&columns.join(" | "));
        out.push('\n');
    }
    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| cell.as_deref().map_or_else(|| "NULL".to_string(), truncate_value))
            .collect();
        out.push_str(&cells.join(" | "));
        out.push('\n');
    }
    out
}

fn truncate_value(value: &str) -> String {
    if value.chars().count() <= MAX_VALUE_CHARS {
        return value.to_string();
    }
    let cut: String = value.chars().take(MAX_VALUE_CHARS).collect();
    format!("{cut}...")
}

#[cfg(test)]
#[path = "mysql_test.rs"]
mod tests;
