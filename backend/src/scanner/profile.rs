//! Keeps the scan tool's `profiles.xml` in line with the attached hardware.
//!
//! The shipped profile file is the authoritative copy. On every capture it is
//! patched to point at the scanner found on this machine and published to the
//! directory the scan tool reads its profiles from.
//!
//! Patching works on the raw text. The profile schema carries many fields this
//! service knows nothing about, and they must survive byte for byte, so the
//! document is never parsed into a model and written back. Only three element
//! kinds are ever rewritten:
//!
//! - every `<DriverName>` in the file (one scanner per machine, so all
//!   profiles are repointed at the discovered driver);
//! - `<ID>` and `<Name>` inside the first `<Device>…</Device>` block only, so
//!   identifier-like fields elsewhere are left alone.

use crate::error::SyncWarning;
use crate::scanner::device::{Device, DeviceResolver};
use log::{info, warn};
use regex::{NoExpand, Regex};
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const PROFILES_FILE: &str = "profiles.xml";
const TOOL_CONFIG_DIR: &str = "NAPS2";

const DEVICE_OPEN: &str = "<Device>";
const DEVICE_CLOSE: &str = "</Device>";

static DRIVER_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<DriverName>.*?</DriverName>").expect("valid regex"));
static DEVICE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<ID>.*?</ID>").expect("valid regex"));
static DEVICE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<Name>.*?</Name>").expect("valid regex"));
static SCAN_PROFILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<ScanProfile\b[^>]*>(.*?)</ScanProfile>").expect("valid regex"));
static DISPLAY_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<DisplayName>(.*?)</DisplayName>").expect("valid regex"));

/// What a successful synchronization did to the published copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Patched(Device),
    /// No device was found; the source was published unchanged.
    Unpatched,
}

pub struct ProfileSynchronizer {
    source: PathBuf,
    destination_dir: Option<PathBuf>,
}

impl ProfileSynchronizer {
    /// `destination_dir` overrides the per-user scan tool configuration
    /// directory.
    pub fn new(source: impl Into<PathBuf>, destination_dir: Option<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination_dir,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> Result<PathBuf, SyncWarning> {
        let dir = match &self.destination_dir {
            Some(dir) => dir.clone(),
            None => dirs::config_dir()
                .ok_or(SyncWarning::NoConfigDir)?
                .join(TOOL_CONFIG_DIR),
        };
        Ok(dir.join(PROFILES_FILE))
    }

    /// Reads, patches and publishes the profile document.
    ///
    /// Not finding a device is not an error: the unmodified document is
    /// published and the scan tool reports a missing device itself later.
    pub fn sync(&self, resolver: &dyn DeviceResolver) -> Result<SyncOutcome, SyncWarning> {
        let source = fs::read_to_string(&self.source).map_err(|source| SyncWarning::ReadSource {
            path: self.source.clone(),
            source,
        })?;

        let (content, outcome) = match resolver.resolve() {
            Ok(device) => {
                info!(
                    "Patching scan profiles for {} ({} via {})",
                    device.name, device.id, device.driver
                );
                (patch_profiles(&source, &device), SyncOutcome::Patched(device))
            }
            Err(e) => {
                warn!("{}; publishing profiles without patching", e);
                (source, SyncOutcome::Unpatched)
            }
        };

        let destination = self.destination()?;
        if let Some(dir) = destination.parent() {
            fs::create_dir_all(dir).map_err(|source| SyncWarning::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        fs::write(&destination, content).map_err(|source| SyncWarning::WriteDestination {
            path: destination.clone(),
            source,
        })?;

        info!("Published scan profiles to {}", destination.display());
        Ok(outcome)
    }

    /// Display names from the authoritative profile document.
    pub fn list_profiles(&self) -> Result<Vec<String>, SyncWarning> {
        let source = fs::read_to_string(&self.source).map_err(|source| SyncWarning::ReadSource {
            path: self.source.clone(),
            source,
        })?;
        Ok(list_profiles(&source))
    }
}

/// Points `profiles` at `device`, leaving every other byte untouched.
pub fn patch_profiles(profiles: &str, device: &Device) -> String {
    let driver = format!("<DriverName>{}</DriverName>", escape_xml(device.driver.as_str()));
    let patched = DRIVER_NAME_RE.replace_all(profiles, NoExpand(&driver));

    let Some((start, end)) = first_device_block(&patched) else {
        return patched.into_owned();
    };

    let id = format!("<ID>{}</ID>", escape_xml(&device.id));
    let name = format!("<Name>{}</Name>", escape_xml(&device.name));
    let block = &patched[start..end];
    let block = DEVICE_ID_RE.replace_all(block, NoExpand(&id));
    let block = DEVICE_NAME_RE.replace_all(&block, NoExpand(&name));

    let mut out = String::with_capacity(patched.len() + block.len());
    out.push_str(&patched[..start]);
    out.push_str(&block);
    out.push_str(&patched[end..]);
    out
}

/// Byte range of the first `<Device>…</Device>` span, end exclusive.
fn first_device_block(text: &str) -> Option<(usize, usize)> {
    let start = text.find(DEVICE_OPEN)?;
    let close = text[start..].find(DEVICE_CLOSE)?;
    Some((start, start + close + DEVICE_CLOSE.len()))
}

pub fn list_profiles(profiles: &str) -> Vec<String> {
    SCAN_PROFILE_RE
        .captures_iter(profiles)
        .filter_map(|caps| {
            let body = caps.get(1)?.as_str();
            let name = DISPLAY_NAME_RE.captures(body)?.get(1)?.as_str().trim();
            (!name.is_empty()).then(|| unescape_xml(name).into_owned())
        })
        .collect()
}

fn escape_xml(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn unescape_xml(value: &str) -> Cow<'_, str> {
    if !value.contains('&') {
        return Cow::Borrowed(value);
    }
    // `&amp;` last so that `&amp;lt;` stays `&lt;`.
    Cow::Owned(
        value
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&amp;", "&"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::device::test_support::FixedResolver;
    use crate::scanner::device::Driver;
    use tempfile::tempdir;

    const PROFILES: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<ArrayOfScanProfile xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <ScanProfile>
    <Version>5</Version>
    <Device>
      <ID>OLD</ID>
      <Name>OldCam</Name>
      <IconUri />
    </Device>
    <DriverName>twain</DriverName>
    <DisplayName>Duplex ADF Scanner(K76)</DisplayName>
    <IconID>3</IconID>
    <PaperSource>Duplex</PaperSource>
  </ScanProfile>
  <ScanProfile>
    <Version>5</Version>
    <Device>
      <ID>SECOND</ID>
      <Name>Second</Name>
    </Device>
    <DriverName>twain</DriverName>
    <DisplayName>Flatbed &amp; Photo</DisplayName>
    <ID>not-a-device</ID>
  </ScanProfile>
  <ScanProfile>
    <DisplayName>   </DisplayName>
  </ScanProfile>
</ArrayOfScanProfile>
"#;

    fn canon() -> Device {
        Device {
            id: "USB001".to_string(),
            name: "Canon X".to_string(),
            driver: Driver::Wia,
        }
    }

    #[test]
    fn patches_first_device_block_and_every_driver() {
        let patched = patch_profiles(PROFILES, &canon());

        assert!(patched.contains("<ID>USB001</ID>\n      <Name>Canon X</Name>"));
        assert_eq!(patched.matches("<DriverName>wia</DriverName>").count(), 2);
        assert!(!patched.contains("<DriverName>twain</DriverName>"));
        // Second profile's device and the stray <ID> are untouched.
        assert!(patched.contains("<ID>SECOND</ID>"));
        assert!(patched.contains("<Name>Second</Name>"));
        assert!(patched.contains("<ID>not-a-device</ID>"));
    }

    #[test]
    fn leaves_every_other_byte_alone() {
        let patched = patch_profiles(PROFILES, &canon());
        let expected = PROFILES
            .replacen("<ID>OLD</ID>", "<ID>USB001</ID>", 1)
            .replacen("<Name>OldCam</Name>", "<Name>Canon X</Name>", 1)
            .replace("<DriverName>twain</DriverName>", "<DriverName>wia</DriverName>");
        assert_eq!(patched, expected);
    }

    #[test]
    fn inline_device_block_scenario() {
        let doc = "<ScanProfile><Device><ID>OLD</ID><Name>OldCam</Name></Device>\
                   <DriverName>twain</DriverName><Resolution>Dpi300</Resolution></ScanProfile>";
        let patched = patch_profiles(doc, &canon());
        assert_eq!(
            patched,
            "<ScanProfile><Device><ID>USB001</ID><Name>Canon X</Name></Device>\
             <DriverName>wia</DriverName><Resolution>Dpi300</Resolution></ScanProfile>"
        );
    }

    #[test]
    fn device_values_are_inserted_literally_and_escaped() {
        let device = Device {
            id: r"\\?\usb#vid_04a9&pid_$1".to_string(),
            name: "Scan <Pro> & Co".to_string(),
            driver: Driver::Twain,
        };
        let patched = patch_profiles(PROFILES, &device);
        assert!(patched.contains(r"<ID>\\?\usb#vid_04a9&amp;pid_$1</ID>"));
        assert!(patched.contains("<Name>Scan &lt;Pro&gt; &amp; Co</Name>"));
    }

    #[test]
    fn document_without_device_block_only_gets_driver_patched() {
        let doc = "<ScanProfile><ID>7</ID><DriverName>twain</DriverName></ScanProfile>";
        assert_eq!(
            patch_profiles(doc, &canon()),
            "<ScanProfile><ID>7</ID><DriverName>wia</DriverName></ScanProfile>"
        );
    }

    #[test]
    fn lists_display_names_in_order() {
        assert_eq!(
            list_profiles(PROFILES),
            vec!["Duplex ADF Scanner(K76)", "Flatbed & Photo"]
        );
        assert!(list_profiles("<ArrayOfScanProfile />").is_empty());
    }

    #[test]
    fn sync_without_device_publishes_identical_copy() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("profiles.xml");
        fs::write(&source, PROFILES).unwrap();
        let dest_dir = dir.path().join("appdata").join("NAPS2");

        let sync = ProfileSynchronizer::new(&source, Some(dest_dir.clone()));
        let outcome = sync.sync(&FixedResolver(None)).unwrap();

        assert_eq!(outcome, SyncOutcome::Unpatched);
        assert_eq!(
            fs::read_to_string(dest_dir.join("profiles.xml")).unwrap(),
            PROFILES
        );
    }

    #[test]
    fn sync_overwrites_published_copy_but_not_source() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("profiles.xml");
        fs::write(&source, PROFILES).unwrap();
        let dest_dir = dir.path().join("naps2");
        fs::create_dir_all(&dest_dir).unwrap();
        fs::write(dest_dir.join("profiles.xml"), "stale").unwrap();

        let sync = ProfileSynchronizer::new(&source, Some(dest_dir.clone()));
        let outcome = sync.sync(&FixedResolver(Some(canon()))).unwrap();

        assert_eq!(outcome, SyncOutcome::Patched(canon()));
        let published = fs::read_to_string(dest_dir.join("profiles.xml")).unwrap();
        assert_eq!(published, patch_profiles(PROFILES, &canon()));
        assert_eq!(fs::read_to_string(&source).unwrap(), PROFILES);
    }

    #[test]
    fn missing_source_is_a_warning() {
        let dir = tempdir().unwrap();
        let sync = ProfileSynchronizer::new(dir.path().join("missing.xml"), Some(dir.path().into()));
        assert!(matches!(
            sync.sync(&FixedResolver(Some(canon()))),
            Err(SyncWarning::ReadSource { .. })
        ));
        assert!(!dir.path().join("profiles.xml").exists());
    }
}
