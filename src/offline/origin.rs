//! Where cache misses are fetched from

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use crate::{CareMapError, Result};

/// A response from the origin, before it is cached or served
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedAsset {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchedAsset {
    #[must_use]
    pub fn ok(body: Vec<u8>, content_type: Option<&str>) -> Self {
        Self {
            status: 200,
            content_type: content_type.map(str::to_string),
            body,
        }
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self {
            status: 404,
            content_type: Some("text/plain; charset=utf-8".to_string()),
            body: b"Not Found".to_vec(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[must_use]
    pub fn status_text(&self) -> String {
        StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("")
            .to_string()
    }
}

/// Source of truth for cacheable assets. An `Err` means the origin could
/// not be reached at all; an HTTP error status is still `Ok`.
#[async_trait]
pub trait AssetOrigin: Send + Sync {
    async fn fetch(&self, asset: &str) -> Result<FetchedAsset>;
}

/// Serves relative asset paths from a directory on disk. Absolute
/// `http(s)` URLs are fetched over the network only when remote assets are
/// enabled; otherwise they are answered `404`.
pub struct StaticOrigin {
    root: PathBuf,
    client: reqwest::Client,
    remote: bool,
}

impl StaticOrigin {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("CareMap/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CareMapError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            root: root.into(),
            client,
            remote: false,
        })
    }

    /// Also fetch absolute `http(s)` URLs, as the precache list needs.
    #[must_use]
    pub fn with_remote_assets(mut self) -> Self {
        self.remote = true;
        self
    }

    /// Map a relative asset path into the root, refusing anything that
    /// escapes it.
    fn resolve(&self, asset: &str) -> Option<PathBuf> {
        let relative = Path::new(asset);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }

        let path = self.root.join(relative);
        if asset.is_empty() || asset.ends_with('/') || path.is_dir() {
            Some(path.join("index.html"))
        } else {
            Some(path)
        }
    }

    async fn fetch_remote(&self, url: &str) -> Result<FetchedAsset> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CareMapError::upstream(format!("Failed to fetch {url}: {e}")))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| CareMapError::upstream(format!("Failed to read {url}: {e}")))?
            .to_vec();

        Ok(FetchedAsset {
            status,
            content_type,
            body,
        })
    }

    async fn fetch_local(&self, asset: &str) -> Result<FetchedAsset> {
        let Some(path) = self.resolve(asset) else {
            debug!("Refusing asset path outside the static root: {}", asset);
            return Ok(FetchedAsset::not_found());
        };

        match tokio::fs::read(&path).await {
            Ok(body) => Ok(FetchedAsset::ok(body, Some(content_type_for(&path)))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FetchedAsset::not_found()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl AssetOrigin for StaticOrigin {
    async fn fetch(&self, asset: &str) -> Result<FetchedAsset> {
        if is_remote(asset) {
            if !self.remote {
                debug!("Refusing remote asset on a local-only origin: {}", asset);
                return Ok(FetchedAsset::not_found());
            }
            self.fetch_remote(asset).await
        } else {
            self.fetch_local(asset).await
        }
    }
}

/// Whether `asset` names an absolute URL rather than a path
#[must_use]
pub fn is_remote(asset: &str) -> bool {
    let lower = asset.trim_start_matches('/').to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//")
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("js" | "mjs") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json") => "application/json",
        Some("webmanifest") => "application/manifest+json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("ico") => "image/x-icon",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn site() -> (TempDir, StaticOrigin) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>CareMap</h1>").unwrap();
        std::fs::write(dir.path().join("style.css"), "body{}").unwrap();
        let origin = StaticOrigin::new(dir.path()).unwrap();
        (dir, origin)
    }

    #[tokio::test]
    async fn test_local_file() {
        let (_dir, origin) = site();
        let fetched = origin.fetch("style.css").await.unwrap();
        assert_eq!(fetched.status, 200);
        assert_eq!(fetched.content_type.as_deref(), Some("text/css; charset=utf-8"));
        assert_eq!(fetched.body, b"body{}");
    }

    #[tokio::test]
    async fn test_root_serves_index() {
        let (_dir, origin) = site();
        let fetched = origin.fetch("").await.unwrap();
        assert_eq!(fetched.body, b"<h1>CareMap</h1>");
    }

    #[rstest]
    #[case("missing.js")]
    #[case("../secret.txt")]
    #[case("/etc/passwd")]
    #[tokio::test]
    async fn test_unservable_paths_are_not_found(#[case] asset: &str) {
        let (_dir, origin) = site();
        let fetched = origin.fetch(asset).await.unwrap();
        assert_eq!(fetched.status, 404);
        assert!(!fetched.is_success());
    }

    #[tokio::test]
    async fn test_remote_asset() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/leaflet.css");
            then.status(200)
                .header("content-type", "text/css")
                .body(".leaflet{}");
        });

        let (_dir, origin) = site();
        let origin = origin.with_remote_assets();
        let fetched = origin.fetch(&server.url("/leaflet.css")).await.unwrap();
        mock.assert();
        assert_eq!(fetched.status, 200);
        assert_eq!(fetched.content_type.as_deref(), Some("text/css"));
        assert_eq!(fetched.body, b".leaflet{}");
    }

    #[tokio::test]
    async fn test_local_origin_refuses_urls() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/secret");
            then.status(200).body("internal");
        });

        let (_dir, origin) = site();
        let fetched = origin.fetch(&server.url("/secret")).await.unwrap();
        assert_eq!(fetched.status, 404);
        mock.assert_hits(0);
    }

    #[rstest]
    #[case("http://example.com/a.js", true)]
    #[case("HTTPS://example.com/a.js", true)]
    #[case("/http://example.com/a.js", true)]
    #[case("//example.com/a.js", true)]
    #[case("app.js", false)]
    #[case("docs/http.js", false)]
    fn test_is_remote(#[case] asset: &str, #[case] expected: bool) {
        assert_eq!(is_remote(asset), expected);
    }

    #[tokio::test]
    async fn test_unreachable_remote_is_an_error() {
        let (_dir, origin) = site();
        let origin = origin.with_remote_assets();
        assert!(origin.fetch("http://127.0.0.1:9/app.js").await.is_err());
    }

    #[test]
    fn test_status_text() {
        assert_eq!(FetchedAsset::not_found().status_text(), "Not Found");
        assert_eq!(FetchedAsset::ok(Vec::new(), None).status_text(), "OK");
    }
}
