//! Source clip acquisition.
//!
//! The pipeline asks a `SourceFetcher` to place the clip named by the
//! request's locator into its scratch directory. `HttpFetcher` handles
//! http(s) with a blocking reqwest client and, when allowed, `file://` URLs
//! and bare local paths.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Errors from fetching a source clip.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Cannot download source: {0}")]
    Http(String),

    #[error("Cannot download source: server returned {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Cannot read source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Unsupported source locator: {0}")]
    Unsupported(String),

    #[error("Source is empty: {0}")]
    Empty(String),
}

/// Places a source clip at a destination path.
pub trait SourceFetcher: Send + Sync {
    /// Fetch `locator` into `dest`, returning the number of bytes written.
    fn fetch(&self, locator: &str, dest: &Path) -> Result<u64, FetchError>;
}

/// Fetcher for http(s) URLs and, optionally, local files.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    timeout: Duration,
    allow_local_files: bool,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            allow_local_files: false,
        }
    }

    /// Accept `file://` URLs and bare paths.
    pub fn allow_local_files(mut self, allow: bool) -> Self {
        self.allow_local_files = allow;
        self
    }

    fn fetch_http(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        // Built per call: the blocking client must not be created or dropped
        // on an async worker thread.
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| FetchError::Http(e.to_string()))?;

        let mut response = client
            .get(url)
            .send()
            .map_err(|e| FetchError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let mut file = File::create(dest).map_err(|e| FetchError::Io {
            path: dest.to_path_buf(),
            source: e,
        })?;

        response
            .copy_to(&mut file)
            .map_err(|e| FetchError::Http(e.to_string()))
    }

    fn fetch_local(&self, path: &Path, dest: &Path) -> Result<u64, FetchError> {
        fs::copy(path, dest).map_err(|e| FetchError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl SourceFetcher for HttpFetcher {
    fn fetch(&self, locator: &str, dest: &Path) -> Result<u64, FetchError> {
        let locator = locator.trim();

        let written = if locator.starts_with("http://") || locator.starts_with("https://") {
            tracing::debug!("Downloading {} -> {}", locator, dest.display());
            self.fetch_http(locator, dest)?
        } else if !self.allow_local_files {
            return Err(FetchError::Unsupported(locator.to_string()));
        } else if let Some(path) = locator.strip_prefix("file://") {
            self.fetch_local(Path::new(path), dest)?
        } else if locator.contains("://") {
            return Err(FetchError::Unsupported(locator.to_string()));
        } else {
            self.fetch_local(Path::new(locator), dest)?
        };

        if written == 0 {
            return Err(FetchError::Empty(locator.to_string()));
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn copies_file_url_when_allowed() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("clip.wav");
        let dest = dir.path().join("in");
        fs::write(&src, b"RIFF....").unwrap();

        let fetcher = HttpFetcher::default().allow_local_files(true);
        let locator = format!("file://{}", src.display());
        assert_eq!(fetcher.fetch(&locator, &dest).unwrap(), 8);
        assert_eq!(fs::read(&dest).unwrap(), b"RIFF....");
    }

    #[test]
    fn rejects_local_paths_by_default() {
        let dir = tempdir().unwrap();
        let fetcher = HttpFetcher::default();
        let err = fetcher
            .fetch("/etc/hostname", &dir.path().join("in"))
            .unwrap_err();
        assert!(matches!(err, FetchError::Unsupported(_)));
    }

    #[test]
    fn rejects_unknown_schemes() {
        let dir = tempdir().unwrap();
        let fetcher = HttpFetcher::default().allow_local_files(true);
        let err = fetcher
            .fetch("ftp://host/clip.wav", &dir.path().join("in"))
            .unwrap_err();
        assert!(matches!(err, FetchError::Unsupported(_)));
    }

    #[test]
    fn missing_local_file_is_io_error() {
        let dir = tempdir().unwrap();
        let fetcher = HttpFetcher::default().allow_local_files(true);
        let err = fetcher
            .fetch("/nonexistent/clip.wav", &dir.path().join("in"))
            .unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
    }

    #[test]
    fn empty_source_rejected() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("empty.wav");
        fs::write(&src, b"").unwrap();

        let fetcher = HttpFetcher::default().allow_local_files(true);
        let err = fetcher
            .fetch(src.to_str().unwrap(), &dir.path().join("in"))
            .unwrap_err();
        assert!(matches!(err, FetchError::Empty(_)));
    }
}
