//! Artifact store -- screenshots and API payload captures on disk.
//!
//! Capture is best-effort. The public `capture_*` methods never fail: an
//! I/O error is logged and downgraded to an empty path so the outcome can
//! still be recorded without its artifact.

use crate::model::{now_seconds, FILE_STAMP_FORMAT};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const SCREENSHOT_DIR: &str = "screenshots";
pub const API_DIR: &str = "api";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to create artifact directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize API artifact: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Document written for every API test.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiCapture<'a> {
    test_name: &'a str,
    timestamp: &'a str,
    request: &'a str,
    response: &'a str,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.root.join(SCREENSHOT_DIR)
    }

    pub fn api_dir(&self) -> PathBuf {
        self.root.join(API_DIR)
    }

    /// Write a screenshot and return its path, or `""` if the write failed.
    pub fn capture_screenshot(&self, test_name: &str, image: &[u8]) -> String {
        match self.try_capture_screenshot(test_name, image) {
            Ok(path) => {
                info!(test = %test_name, path = %path.display(), "screenshot saved");
                path.to_string_lossy().into_owned()
            }
            Err(e) => {
                warn!(test = %test_name, error = %e, "screenshot capture failed, recording without artifact");
                String::new()
            }
        }
    }

    /// Write the request/response capture and return its path, or `""` if
    /// the write failed.
    pub fn capture_api_artifact(&self, test_name: &str, request: &str, response: &str) -> String {
        match self.try_capture_api_artifact(test_name, request, response) {
            Ok(path) => {
                info!(test = %test_name, path = %path.display(), "API artifact saved");
                path.to_string_lossy().into_owned()
            }
            Err(e) => {
                warn!(test = %test_name, error = %e, "API artifact capture failed, recording without artifact");
                String::new()
            }
        }
    }

    pub fn try_capture_screenshot(&self, test_name: &str, image: &[u8]) -> Result<PathBuf, ArtifactError> {
        let dir = ensure_dir(self.screenshot_dir())?;
        let stamp = file_stamp();
        let path = dir.join(artifact_file_name(test_name, &stamp, "png"));
        write_file(&path, image)?;
        Ok(path)
    }

    pub fn try_capture_api_artifact(
        &self,
        test_name: &str,
        request: &str,
        response: &str,
    ) -> Result<PathBuf, ArtifactError> {
        let dir = ensure_dir(self.api_dir())?;
        let stamp = file_stamp();
        let path = dir.join(artifact_file_name(test_name, &stamp, "json"));

        let doc = ApiCapture {
            test_name,
            timestamp: &stamp,
            request,
            response,
        };
        let body = serde_json::to_string_pretty(&doc)?;
        write_file(&path, body.as_bytes())?;
        Ok(path)
    }
}

/// `{testName}_{stamp}.{ext}` with the test name made safe for a file name.
///
/// Two captures for the same test inside one second share a name; the later
/// write wins.
pub fn artifact_file_name(test_name: &str, stamp: &str, ext: &str) -> String {
    format!("{}_{}.{}", sanitize_file_component(test_name), stamp, ext)
}

fn sanitize_file_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

fn file_stamp() -> String {
    now_seconds().format(FILE_STAMP_FORMAT).to_string()
}

fn ensure_dir(dir: PathBuf) -> Result<PathBuf, ArtifactError> {
    std::fs::create_dir_all(&dir).map_err(|source| ArtifactError::CreateDir {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    std::fs::write(path, bytes).map_err(|source| ArtifactError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screenshot_written_under_category_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());

        let path = store.capture_screenshot("login_test", b"\x89PNG fake");
        assert!(!path.is_empty());

        let p = Path::new(&path);
        assert!(p.starts_with(dir.path().join("screenshots")));
        let file = p.file_name().unwrap().to_string_lossy();
        assert!(file.starts_with("login_test_"));
        assert!(file.ends_with(".png"));
        assert_eq!(std::fs::read(p).unwrap(), b"\x89PNG fake");
    }

    #[test]
    fn test_api_artifact_escapes_quotes_and_stays_valid_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());

        let request = r#"{"user": "O"Brien", "path": "C:\tmp"}"#;
        let path = store.capture_api_artifact("create_user", request, "{}");
        assert!(path.ends_with(".json"));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains(r#"\"O\"Brien\""#));

        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["testName"], "create_user");
        assert_eq!(doc["request"], request);
        assert_eq!(doc["response"], "{}");
        assert_eq!(doc["timestamp"].as_str().unwrap().len(), "20240101_000000".len());
    }

    #[test]
    fn test_capture_failure_downgrades_to_empty_path() {
        let dir = tempfile::TempDir::new().unwrap();
        // A regular file where the root directory should be.
        let blocker = dir.path().join("artifacts");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let store = ArtifactStore::new(&blocker);

        assert_eq!(store.capture_screenshot("t", b"img"), "");
        assert_eq!(store.capture_api_artifact("t", "{}", "{}"), "");
        assert!(matches!(
            store.try_capture_screenshot("t", b"img"),
            Err(ArtifactError::CreateDir { .. })
        ));
    }

    #[test]
    fn test_file_name_sanitizes_separators() {
        assert_eq!(
            artifact_file_name("suite/login test", "20240101_120000", "png"),
            "suite_login_test_20240101_120000.png"
        );
        assert_eq!(artifact_file_name("..", "s", "json"), "unnamed_s.json");
        assert_eq!(artifact_file_name("a.b-c_d", "s", "png"), "a.b-c_d_s.png");
    }
}
