use serde::Deserialize;

/// Query string of the capture endpoint. An empty or missing profile falls
/// back to the configured default.
#[derive(Debug, Default, Deserialize)]
pub struct ScanQuery {
    pub profile: Option<String>,
}

/// Request payload for saving a reviewed scan as a PDF.
///
/// `image_front` and `image_back` are base64 images, optionally still wrapped
/// in a `data:image/...;base64,` envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveRequest {
    #[serde(default)]
    pub doc_name: String,
    pub npsn: String,
    pub sn_bapp: String,
    #[serde(default)]
    pub hasil_cek: String,
    #[serde(default)]
    pub kode: Option<String>,
    pub image_front: String,
    #[serde(default)]
    pub image_back: Option<String>,
}
