use serde::{Deserialize, Serialize};

/// A persisted scan, one row per finished PDF.
///
/// `sn_bapp` is unique across all records and `path` points at the PDF in the
/// storage directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: i64,
    pub doc_name: String,
    pub npsn: String,
    pub sn_bapp: String,
    pub hasil_cek: String,
    pub kode: Option<String>,
    pub path: String,
    pub created_at: String,
}
