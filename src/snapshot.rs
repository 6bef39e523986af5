//! Flat-file snapshots of the sales tables.
//!
//! Exports are written at startup on request and are never read back by the
//! reports; seeding fills empty tables of a fresh local database from CSV.

use crate::store::{Store, TABLES};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Serialize)]
pub struct Manifest {
    pub exported_at: DateTime<Utc>,
    pub tables: Vec<TableExport>,
}

#[derive(Debug, Serialize)]
pub struct TableExport {
    pub table: String,
    pub file: String,
    pub rows: i64,
    pub sha256: String,
}

/// Writes every table to `<dir>/<table>.csv` plus a manifest. A table that
/// fails is logged and left out; the rest are still exported.
pub async fn export_tables(store: &Store, dir: &Path) -> Result<Manifest, anyhow::Error> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;

    let mut tables = Vec::new();
    for table in TABLES {
        match export_table(store, table, dir.join(format!("{}.csv", table))).await {
            Ok(entry) => {
                tracing::info!(table, rows = entry.rows, file = %entry.file, "table exported");
                tables.push(entry);
            }
            Err(err) => tracing::warn!(table, error = %format!("{:#}", err), "table export failed"),
        }
    }

    let manifest = Manifest {
        exported_at: Utc::now(),
        tables,
    };
    let path = dir.join(MANIFEST_FILE);
    let body = serde_json::to_vec_pretty(&manifest)?;
    std::fs::write(&path, body).with_context(|| format!("write {}", path.display()))?;
    Ok(manifest)
}

async fn export_table(store: &Store, table: &'static str, path: PathBuf) -> Result<TableExport, anyhow::Error> {
    store
        .with_conn(move |conn| {
            let rows: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            conn.execute_batch(&format!(
                "COPY {} TO {} (HEADER, DELIMITER ',')",
                table,
                sql_literal(&path)?
            ))
            .with_context(|| format!("copy {} to {}", table, path.display()))?;
            let bytes = std::fs::read(&path).with_context(|| format!("read {}", path.display()))?;
            Ok(TableExport {
                table: table.to_string(),
                file: file_name(&path),
                rows,
                sha256: hex::encode(Sha256::digest(&bytes)),
            })
        })
        .await
}

/// Outcome of seeding one table.
#[derive(Debug, PartialEq, Eq)]
pub enum Seeded {
    Loaded(usize),
    AlreadyPopulated,
    MissingFile,
}

/// Loads `<dir>/<table>.csv` into each table that is still empty.
pub async fn seed_tables(store: &Store, dir: &Path) -> Result<Vec<(&'static str, Seeded)>, anyhow::Error> {
    let mut outcome = Vec::new();
    for table in TABLES {
        let path = dir.join(format!("{}.csv", table));
        let seeded = if path.exists() {
            seed_table(store, table, path).await?
        } else {
            tracing::warn!(table, file = %path.display(), "seed file not found");
            Seeded::MissingFile
        };
        if let Seeded::Loaded(rows) = seeded {
            tracing::info!(table, rows, "table seeded");
        }
        outcome.push((*table, seeded));
    }
    Ok(outcome)
}

async fn seed_table(store: &Store, table: &'static str, path: PathBuf) -> Result<Seeded, anyhow::Error> {
    store
        .with_conn(move |conn| {
            let rows: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            if rows > 0 {
                return Ok(Seeded::AlreadyPopulated);
            }
            if !has_data_rows(&path)? {
                return Ok(Seeded::Loaded(0));
            }
            let loaded = conn
                .execute(
                    &format!(
                        "INSERT INTO {} SELECT * FROM read_csv_auto({}, header = true)",
                        table,
                        sql_literal(&path)?
                    ),
                    [],
                )
                .with_context(|| format!("load {} from {}", table, path.display()))?;
            Ok(Seeded::Loaded(loaded))
        })
        .await
}

/// True when the CSV holds at least one line after its header.
fn has_data_rows(path: &Path) -> Result<bool, anyhow::Error> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    for line in BufReader::new(file).lines().skip(1) {
        if !line?.trim().is_empty() {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Operator-supplied paths go into COPY / read_csv_auto, which take no
/// parameters, so they are embedded as quoted literals.
fn sql_literal(path: &Path) -> Result<String, anyhow::Error> {
    let s = path
        .to_str()
        .with_context(|| format!("path {} is not valid UTF-8", path.display()))?;
    Ok(format!("'{}'", s.replace('\'', "''")))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
