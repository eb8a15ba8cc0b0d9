//! Source acquisition.
//!
//! Locations starting with `http://` or `https://` are downloaded with a
//! blocking HTTP client; anything else is read from the filesystem. Every
//! failure maps to [`Error::SourceUnavailable`].

use p2p_core::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Whether a location refers to a remote resource.
pub fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Fetches source text and files.
pub struct Fetcher {
    client: reqwest::blocking::Client,
}

impl Fetcher {
    /// Create a new fetcher.
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("p2p-series/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::source_unavailable(format!("http client: {e}")))?;
        Ok(Self { client })
    }

    /// Fetch a location as text.
    pub fn fetch_text(&self, location: &str) -> Result<String> {
        if is_remote(location) {
            debug!(url = location, "fetching");
            self.get(location)?
                .text()
                .map_err(|e| Error::source_unavailable(format!("{location}: {e}")))
        } else {
            fs::read_to_string(location)
                .map_err(|e| Error::source_unavailable(format!("{location}: {e}")))
        }
    }

    /// Resolve a location to a local file, downloading remote ones into `cache_dir`.
    pub fn fetch_to_file(&self, location: &str, cache_dir: &Path) -> Result<PathBuf> {
        if !is_remote(location) {
            let path = PathBuf::from(location);
            if !path.is_file() {
                return Err(Error::source_unavailable(format!("{location}: no such file")));
            }
            return Ok(path);
        }

        let bytes = self
            .get(location)?
            .bytes()
            .map_err(|e| Error::source_unavailable(format!("{location}: {e}")))?;

        fs::create_dir_all(cache_dir)
            .map_err(|e| Error::source_unavailable(format!("{}: {e}", cache_dir.display())))?;
        let path = cache_dir.join(cache_file_name(location));
        fs::write(&path, &bytes)
            .map_err(|e| Error::source_unavailable(format!("{}: {e}", path.display())))?;

        info!(url = location, path = %path.display(), bytes = bytes.len(), "downloaded");
        Ok(path)
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response> {
        self.client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| Error::source_unavailable(format!("{url}: {e}")))
    }
}

/// Last path segment of a URL, without query string.
fn cache_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("download")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://example.com/a.csv"));
        assert!(is_remote("http://localhost/a.csv"));
        assert!(!is_remote("/tmp/a.csv"));
        assert!(!is_remote("advice.parquet"));
    }

    #[test]
    fn test_cache_file_name() {
        assert_eq!(cache_file_name("https://host/x/advice.parquet"), "advice.parquet");
        assert_eq!(cache_file_name("https://host/x/advice.parquet?v=3"), "advice.parquet");
        assert_eq!(cache_file_name("https://host/x/"), "x");
    }

    #[test]
    fn test_missing_local_file_is_source_unavailable() {
        let fetcher = Fetcher::new().unwrap();
        let err = fetcher
            .fetch_text("/definitely/not/here.csv")
            .unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable(_)));

        let err = fetcher
            .fetch_to_file("/definitely/not/here.parquet", Path::new("/tmp"))
            .unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable(_)));
    }
}
