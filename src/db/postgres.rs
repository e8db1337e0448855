//! PostgreSQL client backed by a sqlx connection pool.
//!
//! Introspection runs three set-based queries against information_schema
//! (columns, primary keys, foreign keys) and assembles the schema in memory,
//! so the round-trip count stays flat no matter how many tables exist.

use crate::config::ConnectionConfig;
use crate::db::{
    Column, ColumnInfo, DatabaseClient, ForeignKey, QueryResult, Row, Schema, Table, Value,
};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column as SqlxColumn, Row as SqlxRow, TypeInfo};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const QUERY_TIMEOUT: Duration = Duration::from_secs(30);
const POOL_SIZE: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Row cap applied to every agent-issued statement.
const MAX_ROWS: usize = 1000;

const CONNECT_ATTEMPTS: u32 = 3;
const CONNECT_BACKOFF: Duration = Duration::from_millis(500);

/// PostgreSQL database client backed by a shared connection pool.
#[derive(Debug)]
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Opens a pooled connection, retrying transient failures with
    /// exponential backoff.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;
        let mut backoff = CONNECT_BACKOFF;
        let mut last_error = None;

        for attempt in 1..=CONNECT_ATTEMPTS {
            match PgPoolOptions::new()
                .max_connections(POOL_SIZE)
                .acquire_timeout(ACQUIRE_TIMEOUT)
                .connect(&conn_str)
                .await
            {
                Ok(pool) => {
                    debug!(attempt, "database pool ready");
                    return Ok(Self { pool });
                }
                Err(e) if attempt < CONNECT_ATTEMPTS && is_transient(&e) => {
                    warn!(attempt, "transient connect failure, retrying in {:?}", backoff);
                    last_error = Some(e);
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => {
                    last_error = Some(e);
                    break;
                }
            }
        }

        Err(explain_connect_error(
            last_error.expect("at least one attempt was made"),
            config,
        ))
    }

    async fn load_tables(&self) -> Result<Vec<Table>> {
        let column_rows: Vec<(String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT c.table_name::text, c.column_name::text,
                   c.data_type::text, c.is_nullable::text
            FROM information_schema.columns c
            JOIN information_schema.tables t
                ON t.table_schema = c.table_schema AND t.table_name = c.table_name
            WHERE c.table_schema = 'public' AND t.table_type = 'BASE TABLE'
            ORDER BY c.table_name, c.ordinal_position
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::execution(format!("Failed to read table columns: {e}")))?;

        let pk_rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT tc.table_name::text, kcu.column_name::text
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            WHERE tc.table_schema = 'public' AND tc.constraint_type = 'PRIMARY KEY'
            ORDER BY tc.table_name, kcu.ordinal_position
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::execution(format!("Failed to read primary keys: {e}")))?;

        // BTreeMap keeps the table order stable for the prompt.
        let mut tables: BTreeMap<String, Table> = BTreeMap::new();
        for (table_name, column_name, data_type, is_nullable) in column_rows {
            tables
                .entry(table_name.clone())
                .or_insert_with(|| Table::new(table_name))
                .columns
                .push(Column::new(column_name, data_type).nullable(is_nullable == "YES"));
        }
        for (table_name, column_name) in pk_rows {
            if let Some(table) = tables.get_mut(&table_name) {
                table.primary_key.push(column_name);
            }
        }

        Ok(tables.into_values().collect())
    }

    async fn load_foreign_keys(&self) -> Result<Vec<ForeignKey>> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT kcu.table_name::text, kcu.column_name::text,
                   ccu.table_name::text, ccu.column_name::text
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage ccu
                ON tc.constraint_name = ccu.constraint_name
                AND tc.table_schema = ccu.table_schema
            WHERE tc.table_schema = 'public' AND tc.constraint_type = 'FOREIGN KEY'
            ORDER BY kcu.table_name, kcu.ordinal_position
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GatewayError::execution(format!("Failed to read foreign keys: {e}")))?;

        // One ForeignKey per (from, to) table pair; composite keys keep
        // their column order from the query.
        let mut grouped: BTreeMap<(String, String), ForeignKey> = BTreeMap::new();
        for (from_table, from_column, to_table, to_column) in rows {
            let fk = grouped
                .entry((from_table.clone(), to_table.clone()))
                .or_insert_with(|| ForeignKey::new(from_table, vec![], to_table, vec![]));
            fk.from_columns.push(from_column);
            fk.to_columns.push(to_column);
        }

        Ok(grouped.into_values().collect())
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    async fn introspect_schema(&self) -> Result<Schema> {
        let (tables, foreign_keys) =
            futures::future::try_join(self.load_tables(), self.load_foreign_keys()).await?;

        Ok(Schema {
            tables,
            foreign_keys,
        })
    }

    async fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        let started = Instant::now();

        let fetched = tokio::time::timeout(QUERY_TIMEOUT, sqlx::query(sql).fetch_all(&self.pool))
            .await
            .map_err(|_| {
                GatewayError::execution(format!(
                    "Query timed out after {} seconds",
                    QUERY_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| GatewayError::execution(describe_query_error(e)))?;

        let execution_time = started.elapsed();

        let columns = fetched
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|c| ColumnInfo::new(c.name(), c.type_info().name()))
                    .collect()
            })
            .unwrap_or_default();

        let was_truncated = fetched.len() > MAX_ROWS;
        if was_truncated {
            warn!(
                returned = fetched.len(),
                cap = MAX_ROWS,
                "truncating oversized result set"
            );
        }

        let rows: Vec<Row> = fetched.iter().take(MAX_ROWS).map(decode_row).collect();
        let row_count = rows.len();

        Ok(QueryResult {
            columns,
            rows,
            execution_time,
            row_count,
            was_truncated,
        })
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

fn decode_row(row: &PgRow) -> Row {
    (0..row.columns().len())
        .map(|i| decode_value(row, i))
        .collect()
}

/// Decodes one column position into the gateway's value model.
///
/// Uuids, dates, and timestamps are rendered as strings; numerics become
/// floats so chart series stay plottable. Types with no arm here must
/// decode as text, or the slot is logged and nulled.
fn decode_value(row: &PgRow, index: usize) -> Value {
    let type_name = row.columns()[index].type_info().name().to_uppercase();

    let decoded = match type_name.as_str() {
        "BOOL" | "BOOLEAN" => row.try_get::<Option<bool>, _>(index).map(Value::from),
        "INT2" | "SMALLINT" => row
            .try_get::<Option<i16>, _>(index)
            .map(|v| Value::from(v.map(i64::from))),
        "INT4" | "INT" | "INTEGER" => row
            .try_get::<Option<i32>, _>(index)
            .map(|v| Value::from(v.map(i64::from))),
        "INT8" | "BIGINT" => row.try_get::<Option<i64>, _>(index).map(Value::from),
        "FLOAT4" | "REAL" => row
            .try_get::<Option<f32>, _>(index)
            .map(|v| Value::from(v.map(f64::from))),
        "FLOAT8" | "DOUBLE PRECISION" => {
            row.try_get::<Option<f64>, _>(index).map(Value::from)
        }
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(index)
            .map(|v| v.map(|u| Value::String(u.to_string())).unwrap_or(Value::Null)),
        "NUMERIC" | "DECIMAL" => row
            .try_get::<Option<rust_decimal::Decimal>, _>(index)
            .map(|v| v.map(decimal_to_value).unwrap_or(Value::Null)),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)
            .map(|v| v.map(|d| Value::String(d.to_string())).unwrap_or(Value::Null)),
        "TIME" => row
            .try_get::<Option<chrono::NaiveTime>, _>(index)
            .map(|v| v.map(|t| Value::String(t.to_string())).unwrap_or(Value::Null)),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)
            .map(|v| v.map(|t| Value::String(t.to_string())).unwrap_or(Value::Null)),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .map(|v| v.map(|t| Value::String(t.to_rfc3339())).unwrap_or(Value::Null)),
        _ => row
            .try_get::<Option<String>, _>(index)
            .map(|v| v.map(Value::String).unwrap_or(Value::Null)),
    };

    decoded.unwrap_or_else(|e| {
        debug!(column = index, %type_name, "undecodable column value: {e}");
        Value::Null
    })
}

/// Numeric columns chart better as floats; values outside f64 range keep
/// their exact text form instead.
fn decimal_to_value(d: rust_decimal::Decimal) -> Value {
    use rust_decimal::prelude::ToPrimitive;

    d.to_f64()
        .map(Value::Float)
        .unwrap_or_else(|| Value::String(d.to_string()))
}

fn is_transient(error: &sqlx::Error) -> bool {
    if matches!(error, sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut) {
        return true;
    }
    let text = error.to_string().to_lowercase();
    ["connection refused", "connection reset", "broken pipe", "timed out"]
        .iter()
        .any(|needle| text.contains(needle))
}

/// Turns a connect failure into an actionable message.
fn explain_connect_error(error: sqlx::Error, config: &ConnectionConfig) -> GatewayError {
    let text = error.to_string().to_lowercase();
    let host = config.host.as_deref().unwrap_or("localhost");

    if text.contains("connection refused") || text.contains("could not connect") {
        GatewayError::connection(format!(
            "Cannot connect to {}:{}. Check that the server is running.",
            host, config.port
        ))
    } else if text.contains("authentication failed") {
        GatewayError::connection(format!(
            "Authentication failed for user '{}'. Check your credentials.",
            config.user.as_deref().unwrap_or("unknown")
        ))
    } else if text.contains("database") && text.contains("does not exist") {
        GatewayError::connection(format!(
            "Database '{}' does not exist.",
            config.database.as_deref().unwrap_or("unknown")
        ))
    } else if text.contains("timed out") || text.contains("timeout") {
        GatewayError::connection(format!(
            "Connection to {}:{} timed out.",
            host, config.port
        ))
    } else {
        GatewayError::connection(error.to_string())
    }
}

/// Renders a statement failure with Postgres detail/hint when present, so
/// the agent sees the same diagnostics psql would show.
fn describe_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut out = format!("ERROR: {}", db_error.message());
    if let Some(pg) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg.detail() {
            out.push_str("\n  DETAIL: ");
            out.push_str(detail);
        }
        if let Some(hint) = pg.hint() {
            out.push_str("\n  HINT: ");
            out.push_str(hint);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // Exercised only when DATABASE_URL points at a live database.
    async fn live_client() -> Option<PostgresClient> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let config = ConnectionConfig::from_connection_string(&url).ok()?;
        PostgresClient::connect(&config).await.ok()
    }

    #[tokio::test]
    async fn test_introspect_live_schema() {
        let Some(client) = live_client().await else {
            eprintln!("Skipping test: DATABASE_URL not set");
            return;
        };

        let schema = client.introspect_schema().await.unwrap();
        assert!(!schema.tables.is_empty());
        for table in &schema.tables {
            assert!(!table.columns.is_empty(), "table {} has no columns", table.name);
        }

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_scalar_select() {
        let Some(client) = live_client().await else {
            eprintln!("Skipping test: DATABASE_URL not set");
            return;
        };

        let result = client
            .execute_query("SELECT 1 AS num, 'hello' AS greeting")
            .await
            .unwrap();

        assert_eq!(result.columns.len(), 2);
        assert_eq!(result.columns[0].name, "num");
        assert_eq!(result.rows[0][0], Value::Int(1));
        assert_eq!(result.rows[0][1], Value::from("hello"));

        client.close().await.unwrap();
    }

    #[test]
    fn test_decimal_decodes_as_float() {
        let d: rust_decimal::Decimal = "19.99".parse().unwrap();
        assert_eq!(decimal_to_value(d), Value::Float(19.99));
    }

    #[tokio::test]
    async fn test_typed_columns_decode_to_values() {
        let Some(client) = live_client().await else {
            eprintln!("Skipping test: DATABASE_URL not set");
            return;
        };

        let result = client
            .execute_query(
                "SELECT 'a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11'::uuid AS id, \
                 19.99::numeric(10,2) AS price, \
                 '2024-01-15'::date AS joined, \
                 '2024-01-15 10:30:00'::timestamp AS seen",
            )
            .await
            .unwrap();

        let row = &result.rows[0];
        assert_eq!(
            row[0],
            Value::from("a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11")
        );
        assert_eq!(row[1], Value::Float(19.99));
        assert_eq!(row[2], Value::from("2024-01-15"));
        assert_eq!(row[3], Value::from("2024-01-15 10:30:00"));

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_query_error_carries_postgres_message() {
        let Some(client) = live_client().await else {
            eprintln!("Skipping test: DATABASE_URL not set");
            return;
        };

        let err = client
            .execute_query("SELECT * FROM nonexistent_table_xyz")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nonexistent_table_xyz"));

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_host_is_connection_error() {
        let config = ConnectionConfig {
            host: Some("nonexistent.invalid.host".to_string()),
            port: 5432,
            database: Some("testdb".to_string()),
            user: Some("testuser".to_string()),
            password: Some("testpass".to_string()),
        };

        let error = PostgresClient::connect(&config).await.unwrap_err();
        assert!(matches!(error, GatewayError::Connection(_)));
    }
}
