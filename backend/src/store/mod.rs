//! Durable scan records in SQLite.
//!
//! The store opens a connection per operation from the configured path. The
//! `UNIQUE` constraint on `sn_bapp` is the only cross-request serialization
//! point: the lookup in [`RecordStore::create_record`] rejects the common
//! duplicate early, but two racing requests can both pass it and only the
//! insert decides which one wins.

use crate::error::{is_unique_violation, AssemblyError, CreateError};
use common::model::record::ScanRecord;
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fs;
use std::path::{Path, PathBuf};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS scan_records (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    doc_name    TEXT NOT NULL DEFAULT '',
    npsn        TEXT NOT NULL,
    sn_bapp     TEXT NOT NULL UNIQUE,
    hasil_cek   TEXT NOT NULL DEFAULT '',
    kode        TEXT,
    path        TEXT NOT NULL,
    created_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_scan_records_npsn ON scan_records(npsn);
";

const SELECT_COLUMNS: &str = "id, doc_name, npsn, sn_bapp, hasil_cek, kode, path, created_at";

/// Fields of a record that does not exist yet.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub doc_name: String,
    pub npsn: String,
    pub sn_bapp: String,
    pub hasil_cek: String,
    pub kode: Option<String>,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RecordStore {
    db_path: PathBuf,
}

impl RecordStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        Connection::open(&self.db_path)
    }

    /// Creates the table and index if missing. Safe to call on every start.
    pub fn init(&self) -> rusqlite::Result<()> {
        if let Some(parent) = self.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("Cannot create database directory {}: {}", parent.display(), e);
            }
        }
        self.connect()?.execute_batch(SCHEMA)
    }

    pub fn find_by_serial(&self, sn_bapp: &str) -> rusqlite::Result<Option<ScanRecord>> {
        let conn = self.connect()?;
        find_by_serial(&conn, sn_bapp)
    }

    /// Creates the document file and its row, or neither.
    ///
    /// Each step gates the next:
    /// 1. a row with this serial must not exist,
    /// 2. nothing may exist at `record.path`,
    /// 3. `write_document` renders the file,
    /// 4. the row is inserted; if that fails for any reason the file is
    ///    deleted again and the attempt is reported as a conflict.
    pub fn create_record<F>(
        &self,
        record: NewRecord,
        write_document: F,
    ) -> Result<ScanRecord, CreateError>
    where
        F: FnOnce(&Path) -> Result<(), AssemblyError>,
    {
        let conn = self.connect()?;

        if find_by_serial(&conn, &record.sn_bapp)?.is_some() {
            return Err(CreateError::DuplicateSerial(record.sn_bapp));
        }
        if record.path.exists() {
            return Err(CreateError::OutputExists(record.path));
        }

        write_document(&record.path)?;

        match insert(&conn, &record) {
            Ok(created) => {
                info!(
                    "Stored record {} for serial {} at {}",
                    created.id,
                    created.sn_bapp,
                    created.path
                );
                Ok(created)
            }
            Err(e) => {
                remove_orphan(&record.path);
                if is_unique_violation(&e) {
                    return Err(CreateError::DuplicateSerial(record.sn_bapp));
                }
                warn!("Insert for serial {} failed: {}", record.sn_bapp, e);
                Err(CreateError::InsertRejected {
                    sn_bapp: record.sn_bapp,
                    source: e,
                })
            }
        }
    }
}

fn insert(conn: &Connection, record: &NewRecord) -> rusqlite::Result<ScanRecord> {
    let path = record.path.to_string_lossy().into_owned();
    conn.execute(
        "INSERT INTO scan_records (doc_name, npsn, sn_bapp, hasil_cek, kode, path)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            &record.doc_name,
            &record.npsn,
            &record.sn_bapp,
            &record.hasil_cek,
            &record.kode,
            &path
        ],
    )?;
    let id = conn.last_insert_rowid();
    conn.query_row(
        &format!("SELECT {} FROM scan_records WHERE id = ?1", SELECT_COLUMNS),
        params![id],
        record_from_row,
    )
}

fn find_by_serial(conn: &Connection, sn_bapp: &str) -> rusqlite::Result<Option<ScanRecord>> {
    conn.query_row(
        &format!("SELECT {} FROM scan_records WHERE sn_bapp = ?1", SELECT_COLUMNS),
        params![sn_bapp],
        record_from_row,
    )
    .optional()
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<ScanRecord> {
    Ok(ScanRecord {
        id: row.get(0)?,
        doc_name: row.get(1)?,
        npsn: row.get(2)?,
        sn_bapp: row.get(3)?,
        hasil_cek: row.get(4)?,
        kode: row.get(5)?,
        path: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Best effort; a leftover file is logged rather than masking the real error.
fn remove_orphan(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("Failed to remove orphaned document {}: {}", path.display(), e);
    }
}
