use serde::{Deserialize, Serialize};

/// One scanned document as returned to the browser after a capture.
///
/// Both sides are `data:` URIs ready to be dropped into an `<img src>`.
/// `back` is absent when the feeder produced an odd trailing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanPair {
    pub front: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back: Option<String>,
}
