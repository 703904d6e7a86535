//! Driving the physical scanner: device discovery, profile publishing,
//! capture and front/back pairing.
//!
//! [`Scanner::scan`] is the whole capture request in one blocking call:
//!
//! 1. publish `profiles.xml` patched for the attached device (warnings only),
//! 2. run the scan tool inside a fresh [`capture::CaptureSession`],
//! 3. pair the produced pages into sheets,
//! 4. encode every page as a `data:` URI before the session directory goes away.

pub mod capture;
pub mod device;
pub mod pairing;
pub mod profile;
pub mod tool;

use crate::config::AppConfig;
use crate::error::CaptureError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use capture::CaptureSession;
use common::model::scan::ScanPair;
use device::{DeviceResolver, FirstAvailable};
use log::{info, warn};
use pairing::PagePair;
use profile::ProfileSynchronizer;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tool::ScanTool;

pub struct Scanner {
    tool: ScanTool,
    resolver: Box<dyn DeviceResolver>,
    profiles: ProfileSynchronizer,
    temp_root: PathBuf,
    scan_timeout: Duration,
    default_profile: String,
}

impl Scanner {
    pub fn from_config(config: &AppConfig) -> Self {
        let tool = ScanTool::new(&config.scan_tool_path);
        let resolver = FirstAvailable::naps2(&tool, &config.drivers, config.device_list_timeout);
        Self {
            resolver: Box::new(resolver),
            profiles: ProfileSynchronizer::new(
                &config.profiles_source,
                config.profiles_destination_dir.clone(),
            ),
            temp_root: config.temp_root.clone(),
            scan_timeout: config.scan_timeout,
            default_profile: config.default_profile.clone(),
            tool,
        }
    }

    /// Swaps the discovery strategy.
    pub fn with_resolver(mut self, resolver: Box<dyn DeviceResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn profiles(&self) -> &ProfileSynchronizer {
        &self.profiles
    }

    pub fn scan(&self, profile: Option<&str>) -> Result<Vec<ScanPair>, CaptureError> {
        if let Err(e) = self.profiles.sync(self.resolver.as_ref()) {
            warn!("Profile sync failed, scanning with the last published profiles: {}", e);
        }

        let profile = match profile.map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => self.default_profile.as_str(),
        };

        let session = CaptureSession::open(&self.temp_root)?;
        let pairs = session.capture(&self.tool, profile, self.scan_timeout)?;
        let encoded = encode_pairs(pairs);
        drop(session);

        info!("Scan finished with {} sheet(s)", encoded.len());
        Ok(encoded)
    }
}

/// Encodes sheets in parallel. A sheet whose front cannot be read is dropped;
/// an unreadable back leaves the sheet front-only.
pub fn encode_pairs(pairs: Vec<PagePair<PathBuf>>) -> Vec<ScanPair> {
    pairs
        .into_par_iter()
        .filter_map(|pair| {
            let front = match to_data_uri(&pair.front) {
                Ok(uri) => uri,
                Err(e) => {
                    warn!("Skipping sheet, cannot read {}: {}", pair.front.display(), e);
                    return None;
                }
            };
            let back = pair.back.as_deref().and_then(|path| match to_data_uri(path) {
                Ok(uri) => Some(uri),
                Err(e) => {
                    warn!("Keeping front only, cannot read {}: {}", path.display(), e);
                    None
                }
            });
            Some(ScanPair { front, back })
        })
        .collect()
}

fn to_data_uri(path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(path)?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Ok(format!("data:{};base64,{}", mime.essence_str(), BASE64.encode(bytes)))
}
