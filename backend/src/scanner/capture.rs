//! One isolated run of the scan tool.
//!
//! A [`CaptureSession`] owns a fresh temporary directory named after a
//! nanosecond timestamp, so concurrent requests never see each other's pages.
//! The directory is a [`TempDir`] and disappears when the session is dropped,
//! whichever way the request ends.

use crate::error::CaptureError;
use crate::scanner::pairing::{pair_pages, sort_pages, PagePair};
use crate::scanner::tool::ScanTool;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tempfile::{Builder, TempDir};

const PAGE_PREFIX: &str = "scan_";
const PAGE_EXTENSION: &str = "jpg";
/// `$(nnnn)` is the scan tool's zero padded page counter. Pairing relies on
/// the fixed width to recover page order from names.
const OUTPUT_PATTERN: &str = "scan_$(nnnn).jpg";

#[derive(Debug)]
pub struct CaptureSession {
    dir: TempDir,
}

impl CaptureSession {
    pub fn open(temp_root: &Path) -> Result<Self, CaptureError> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        fs::create_dir_all(temp_root).map_err(CaptureError::TempDir)?;
        let dir = Builder::new()
            .prefix(&format!("scan_session_{}_", nanos))
            .tempdir_in(temp_root)
            .map_err(CaptureError::TempDir)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Runs the scan tool and returns the produced pages grouped into sheets.
    ///
    /// The returned paths point into the session directory and are only valid
    /// while the session is alive.
    pub fn capture(
        &self,
        tool: &ScanTool,
        profile: &str,
        timeout: Duration,
    ) -> Result<Vec<PagePair<PathBuf>>, CaptureError> {
        info!("Scanning with profile {:?} into {}", profile, self.path().display());

        let output = tool.scan(&self.path().join(OUTPUT_PATTERN), profile, timeout)?;
        if !output.status.success() {
            return Err(CaptureError::Failed {
                status: output.status,
                output: output.combined,
            });
        }

        let pages = self.pages()?;
        if pages.is_empty() {
            return Err(CaptureError::NoPages);
        }
        info!("Scan produced {} page(s)", pages.len());
        Ok(pair_pages(pages))
    }

    /// Page files in the session directory, in scan order.
    pub fn pages(&self) -> Result<Vec<PathBuf>, CaptureError> {
        let mut pages = Vec::new();
        for entry in fs::read_dir(self.path()).map_err(CaptureError::ListPages)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry in {}: {}", self.path().display(), e);
                    continue;
                }
            };
            let path = entry.path();
            if is_page_file(&path) {
                pages.push(path);
            }
        }
        sort_pages(&mut pages);
        Ok(pages)
    }
}

fn is_page_file(path: &Path) -> bool {
    let name_matches = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(PAGE_PREFIX));
    let ext_matches = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(PAGE_EXTENSION));
    name_matches && ext_matches && path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn session_directory_is_removed_on_drop() {
        let root = tempdir().unwrap();
        let session = CaptureSession::open(root.path()).unwrap();
        let path = session.path().to_path_buf();
        fs::write(path.join("scan_0001.jpg"), b"x").unwrap();

        assert!(path.starts_with(root.path()));
        assert!(path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("scan_session_"));

        drop(session);
        assert!(!path.exists());
    }

    #[test]
    fn concurrent_sessions_get_distinct_directories() {
        let root = tempdir().unwrap();
        let a = CaptureSession::open(root.path()).unwrap();
        let b = CaptureSession::open(root.path()).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn only_page_files_are_collected_in_name_order() {
        let root = tempdir().unwrap();
        let session = CaptureSession::open(root.path()).unwrap();
        for name in ["scan_0002.jpg", "scan_0001.jpg", "notes.txt", "scan_0003.JPG", "preview.jpg"] {
            fs::write(session.path().join(name), b"x").unwrap();
        }
        fs::create_dir(session.path().join("scan_0004.jpg")).unwrap();

        let names: Vec<_> = session
            .pages()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, ["scan_0001.jpg", "scan_0002.jpg", "scan_0003.JPG"]);
    }

    #[cfg(unix)]
    mod with_tool {
        use super::super::*;
        use crate::scanner::tool::test_support::fake_tool;
        use tempfile::tempdir;

        /// Writes `count` pages by expanding the counter in the `-o` argument.
        fn feeder(dir: &Path, count: usize) -> ScanTool {
            ScanTool::new(fake_tool(
                dir,
                &format!(
                    r#"i=1
while [ $i -le {count} ]; do
  n=$(printf '%04d' $i)
  f=$(printf '%s' "$2" | sed "s/\$(nnnn)/$n/")
  printf 'page %s' $i > "$f"
  i=$((i + 1))
done
echo "profile=$4""#
                ),
            ))
        }

        #[test]
        fn three_pages_become_two_sheets() {
            let tools = tempdir().unwrap();
            let root = tempdir().unwrap();
            let session = CaptureSession::open(root.path()).unwrap();

            let pairs = session
                .capture(&feeder(tools.path(), 3), "Duplex", Duration::from_secs(10))
                .unwrap();

            assert_eq!(pairs.len(), 2);
            assert_eq!(fs::read_to_string(&pairs[0].front).unwrap(), "page 1");
            assert_eq!(
                fs::read_to_string(pairs[0].back.as_ref().unwrap()).unwrap(),
                "page 2"
            );
            assert_eq!(fs::read_to_string(&pairs[1].front).unwrap(), "page 3");
            assert!(pairs[1].back.is_none());
        }

        #[test]
        fn twelve_pages_pair_in_numeric_order() {
            let tools = tempdir().unwrap();
            let root = tempdir().unwrap();
            let session = CaptureSession::open(root.path()).unwrap();

            let pairs = session
                .capture(&feeder(tools.path(), 12), "Duplex", Duration::from_secs(10))
                .unwrap();

            assert_eq!(pairs.len(), 6);
            assert_eq!(fs::read_to_string(&pairs[4].front).unwrap(), "page 9");
            assert_eq!(
                fs::read_to_string(pairs[4].back.as_ref().unwrap()).unwrap(),
                "page 10"
            );
        }

        #[test]
        fn zero_pages_is_reported_distinctly() {
            let tools = tempdir().unwrap();
            let root = tempdir().unwrap();
            let session = CaptureSession::open(root.path()).unwrap();

            let err = session
                .capture(&feeder(tools.path(), 0), "Duplex", Duration::from_secs(10))
                .unwrap_err();

            assert!(matches!(err, CaptureError::NoPages));
        }

        #[test]
        fn failure_carries_tool_output_verbatim() {
            let tools = tempdir().unwrap();
            let root = tempdir().unwrap();
            let tool = ScanTool::new(fake_tool(
                tools.path(),
                "echo 'Error: Device not found (0x80210015)' >&2; exit 1",
            ));
            let session = CaptureSession::open(root.path()).unwrap();
            let path = session.path().to_path_buf();

            let err = session
                .capture(&tool, "Duplex", Duration::from_secs(10))
                .unwrap_err();
            drop(session);

            match err {
                CaptureError::Failed { output, .. } => {
                    assert!(output.contains("Error: Device not found (0x80210015)"))
                }
                other => panic!("unexpected: {:?}", other),
            }
            assert!(!path.exists());
        }
    }
}
