use crate::normalize::{Column, ColumnKind, ResultSet};
use crate::query::{Query, Value};
use anyhow::{Context, anyhow};
use duckdb::types::{ToSqlOutput, Value as DbValue};
use duckdb::{Connection, ToSql, params_from_iter};
use std::sync::{Arc, Mutex, MutexGuard};

/// Tables of the sales schema.
pub const TABLES: &[&str] = &[
    "genre",
    "game",
    "game_platform",
    "game_publisher",
    "platform",
    "publisher",
    "region",
    "region_sales",
];

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS genre (
         id         INTEGER,
         genre_name VARCHAR
     );
     CREATE TABLE IF NOT EXISTS game (
         id        INTEGER,
         genre_id  INTEGER,
         game_name VARCHAR
     );
     CREATE TABLE IF NOT EXISTS publisher (
         id             INTEGER,
         publisher_name VARCHAR
     );
     CREATE TABLE IF NOT EXISTS game_publisher (
         id           INTEGER,
         game_id      INTEGER,
         publisher_id INTEGER
     );
     CREATE TABLE IF NOT EXISTS platform (
         id            INTEGER,
         platform_name VARCHAR
     );
     CREATE TABLE IF NOT EXISTS game_platform (
         id                INTEGER,
         game_publisher_id INTEGER,
         platform_id       INTEGER,
         release_year      INTEGER
     );
     CREATE TABLE IF NOT EXISTS region (
         id          INTEGER,
         region_name VARCHAR
     );
     CREATE TABLE IF NOT EXISTS region_sales (
         region_id        INTEGER,
         game_platform_id INTEGER,
         num_sales        DOUBLE
     );";

/// Read access to the sales database. Created once by the host and shared
/// by every request; each query runs on the blocking pool.
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &str) -> Result<Self, anyhow::Error> {
        let conn = Connection::open(path).with_context(|| format!("open db {}", path))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, anyhow::Error> {
        let conn = Connection::open_in_memory().context("open in-memory db")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, anyhow::Error> {
        conn.execute_batch(SCHEMA).context("create schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn with_conn<T, F>(&self, func: F) -> Result<T, anyhow::Error>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, anyhow::Error> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = lock(&conn)?;
            func(&conn)
        })
        .await?
    }

    /// Executes `query` and reads each row according to `columns`.
    pub async fn fetch(&self, query: Query, columns: Vec<Column>) -> Result<ResultSet, anyhow::Error> {
        tracing::debug!(sql = %query.sql, params = query.params.len(), "executing report query");
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(&query.sql)
                .context("prepare report query")?;
            let mut rows = stmt
                .query(params_from_iter(query.params.iter()))
                .context("execute report query")?;
            let mut set = ResultSet::new(columns);
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(set.columns.len());
                for (idx, col) in set.columns.iter().enumerate() {
                    values.push(read_value(row, idx, col.kind)?);
                }
                set.push(values);
            }
            Ok(set)
        })
        .await
    }

    pub async fn ping(&self) -> Result<(), anyhow::Error> {
        self.with_conn(|conn| {
            let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
            if one != 1 {
                return Err(anyhow!("unexpected ping result {}", one));
            }
            Ok(())
        })
        .await
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, anyhow::Error> {
    conn.lock().map_err(|_| anyhow!("db lock poisoned"))
}

fn read_value(row: &duckdb::Row<'_>, idx: usize, kind: ColumnKind) -> Result<Value, anyhow::Error> {
    let value = match kind {
        ColumnKind::Text => row.get::<_, Option<String>>(idx)?.map(Value::Text),
        ColumnKind::Integer => row.get::<_, Option<i64>>(idx)?.map(Value::Integer),
        ColumnKind::Metric => row.get::<_, Option<f64>>(idx)?.map(Value::Float),
    };
    Ok(value.unwrap_or(Value::Null))
}

impl ToSql for Value {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        let value = match self {
            Value::Null => DbValue::Null,
            Value::Text(s) => DbValue::Text(s.clone()),
            Value::Integer(v) => DbValue::BigInt(*v),
            Value::Float(v) => DbValue::Double(*v),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryBuilder;

    async fn store_with_publishers() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .with_conn(|conn| {
                conn.execute_batch(
                    "INSERT INTO publisher VALUES (1, 'Nintendo'), (2, 'Sega'), (3, 'O''Reilly Games');",
                )?;
                Ok(())
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn schema_creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.duckdb");
        let path = path.to_str().unwrap();
        drop(Store::open(path).unwrap());
        let store = Store::open(path).unwrap();
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn fetch_binds_parameters() {
        let store = store_with_publishers().await;
        let query = QueryBuilder::new("SELECT publisher_name, id FROM publisher")
            .contains("publisher_name ILIKE ?", Some("o'reilly"))
            .build();
        let set = store
            .fetch(query, vec![Column::text("Publisher"), Column::integer("Id")])
            .await
            .unwrap();
        assert_eq!(
            set.rows,
            vec![vec![Value::Text("O'Reilly Games".into()), Value::Integer(3)]]
        );
    }

    #[tokio::test]
    async fn fetch_reads_nulls_and_metrics() {
        let store = store_with_publishers().await;
        let query = QueryBuilder::new("SELECT NULL::VARCHAR, CAST(1.25 AS DOUBLE) FROM publisher")
            .filter("id = ?", vec![1i64.into()])
            .build();
        let set = store
            .fetch(query, vec![Column::text("Empty"), Column::metric("Sales")])
            .await
            .unwrap();
        assert_eq!(set.rows, vec![vec![Value::Null, Value::Float(1.25)]]);
    }

    #[tokio::test]
    async fn bad_sql_is_an_error() {
        let store = store_with_publishers().await;
        let query = QueryBuilder::new("SELECT nope FROM missing_table").build();
        let err = store.fetch(query, vec![Column::text("x")]).await.unwrap_err();
        assert!(format!("{:#}", err).contains("prepare report query"));
    }
}
