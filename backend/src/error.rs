//! Error types for every stage of the capture-to-document pipeline.
//!
//! Device and profile problems are recoverable and only ever logged. Capture,
//! assembly and persistence errors end the current request. Nothing here is
//! allowed to take the service down.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Failure to run the external scan tool at all.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to start {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while waiting for the scan tool: {0}")]
    Io(#[from] std::io::Error),

    #[error("scan tool did not finish within {0:?} and was killed")]
    TimedOut(Duration),
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no scanning device found (tried: {tried})")]
    NotFound { tried: String },

    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// Reasons a profile synchronization could not publish. Callers log these and
/// carry on with whatever configuration the scan tool already has.
#[derive(Debug, Error)]
pub enum SyncWarning {
    #[error("cannot read profile source {}: {source}", .path.display())]
    ReadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot determine the scan tool configuration directory")]
    NoConfigDir,

    #[error("cannot create {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", .path.display())]
    WriteDestination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to create scan session directory: {0}")]
    TempDir(#[source] std::io::Error),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("scan failed ({status}) | scan tool output: {output}")]
    Failed { status: ExitStatus, output: String },

    #[error("no pages were produced, check that paper is loaded and the scanner is connected")]
    NoPages,

    #[error("failed to list scanned pages: {0}")]
    ListPages(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("failed to load PDF font: {0}")]
    Font(String),

    #[error("failed to decode page image: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error during PDF assembly: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to render PDF: {0}")]
    Render(String),

    #[error("document has no pages")]
    NothingToRender,
}

/// Outcome of the ordered create-record sequence of the record store.
#[derive(Debug, Error)]
pub enum CreateError {
    #[error("serial {0} is already registered")]
    DuplicateSerial(String),

    #[error("output file {} already exists", .0.display())]
    OutputExists(PathBuf),

    /// The document was written but its row was refused; the file has been
    /// removed again.
    #[error("record for serial {sn_bapp} could not be registered: {source}")]
    InsertRejected {
        sn_bapp: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl CreateError {
    /// Conflicts are reported to clients separately from plain failures.
    pub fn is_conflict(&self) -> bool {
        match self {
            CreateError::DuplicateSerial(_)
            | CreateError::OutputExists(_)
            | CreateError::InsertRejected { .. } => true,
            CreateError::Database(err) => is_unique_violation(err),
            CreateError::Assembly(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("failed to prepare storage directory {}: {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Create(#[from] CreateError),
}

/// True when a statement failed on the `sn_bapp` uniqueness constraint.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
