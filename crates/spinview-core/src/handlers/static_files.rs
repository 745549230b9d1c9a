//! Static file serving handler
//!
//! Serves the visualizer's page and its assets from disk with ETag,
//! Last-Modified and Cache-Control headers.

use crate::{Request, Response, ResponseBuilder, StatusCode};
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Static file configuration
#[derive(Debug, Clone)]
pub struct StaticFileConfig {
    /// Root directory
    pub root: PathBuf,
    /// File served for directory requests
    pub index: Option<String>,
    /// Cache max-age in seconds
    pub max_age: u32,
    /// Enable ETag / If-None-Match
    pub etag: bool,
    /// Enable Last-Modified
    pub last_modified: bool,
    /// Serve dot files
    pub hidden: bool,
}

impl Default for StaticFileConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            index: Some("index.html".to_string()),
            max_age: 0,
            etag: true,
            last_modified: true,
            hidden: false,
        }
    }
}

impl StaticFileConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn index(mut self, name: Option<String>) -> Self {
        self.index = name;
        self
    }

    pub fn max_age(mut self, seconds: u32) -> Self {
        self.max_age = seconds;
        self
    }
}

/// Static file handler
#[derive(Debug, Clone)]
pub struct StaticFiles {
    config: StaticFileConfig,
}

impl StaticFiles {
    pub fn new(config: StaticFileConfig) -> Self {
        Self { config }
    }

    /// Serve static files from directory with default settings
    pub fn serve(root: impl Into<PathBuf>) -> Self {
        Self::new(StaticFileConfig::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    /// Serve the request path from the root directory.
    ///
    /// Returns `None` when no file matches so the caller can fall through
    /// to its routes.
    pub async fn try_serve(&self, req: &Request) -> Option<Response> {
        if !req.method.is_read() {
            return None;
        }

        let full_path = self.config.root.join(self.sanitize_path(&req.path)?);

        match tokio::fs::metadata(&full_path).await {
            Ok(meta) if meta.is_dir() => {
                let index_path = full_path.join(self.config.index.as_ref()?);
                match tokio::fs::metadata(&index_path).await {
                    Ok(index_meta) if index_meta.is_file() => {
                        Some(self.serve_file(&index_path, &index_meta, req).await)
                    }
                    _ => None,
                }
            }
            Ok(meta) => Some(self.serve_file(&full_path, &meta, req).await),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                warn!(path = %full_path.display(), error = %e, "static file not readable");
                Some(Response::internal_error("Internal Server Error"))
            }
            Err(_) => None,
        }
    }

    /// Serve one specific file; 404 when it does not exist
    pub async fn serve_path(&self, path: &Path, req: &Request) -> Response {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => self.serve_file(path, &meta, req).await,
            Ok(_) => Response::not_found(),
            Err(e) if e.kind() == ErrorKind::NotFound => Response::not_found(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "file not readable");
                Response::internal_error("Internal Server Error")
            }
        }
    }

    /// Percent-decode each segment of the request path and reject
    /// traversal, hidden segments and decoded separators
    fn sanitize_path(&self, path: &str) -> Option<PathBuf> {
        let mut result = PathBuf::new();

        for raw in path.split('/') {
            let segment = urlencoding::decode(raw).ok()?;
            match segment.as_ref() {
                "" | "." => {}
                ".." => return None,
                s if s.contains(['/', '\\', '\0']) => return None,
                s if s.starts_with('.') && !self.config.hidden => return None,
                s => result.push(s),
            }
        }

        Some(result)
    }

    async fn serve_file(&self, path: &Path, meta: &std::fs::Metadata, req: &Request) -> Response {
        let etag = self.config.etag.then(|| Self::etag(meta));

        // Validators and caching headers go on both 200 and 304
        let mut builder = ResponseBuilder::new(StatusCode::OK).header(
            "Cache-Control",
            format!("public, max-age={}", self.config.max_age),
        );
        if self.config.last_modified {
            if let Some(modified) = Self::last_modified(meta) {
                builder = builder.header("Last-Modified", modified);
            }
        }
        if let Some(etag) = &etag {
            builder = builder.header("ETag", etag.as_str());
        }

        if let (Some(etag), Some(if_none_match)) = (&etag, req.header("if-none-match")) {
            let matched = if_none_match
                .split(',')
                .map(str::trim)
                .any(|candidate| candidate == etag.as_str() || candidate == "*");
            if matched {
                return builder.status(StatusCode::NOT_MODIFIED).build();
            }
        }

        let content = match tokio::fs::read(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Response::not_found(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read file");
                return Response::internal_error("Internal Server Error");
            }
        };

        builder
            .header("Content-Type", Self::mime_type(path))
            .body(content)
            .build()
    }

    /// Weak validator from mtime and size
    fn etag(meta: &std::fs::Metadata) -> String {
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);

        format!("W/\"{:x}-{:x}\"", meta.len(), mtime)
    }

    fn last_modified(meta: &std::fs::Metadata) -> Option<String> {
        let modified: DateTime<Utc> = meta.modified().ok()?.into();
        Some(modified.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
    }

    fn mime_type(path: &Path) -> &'static str {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "html" | "htm" => "text/html; charset=utf-8",
            "css" => "text/css; charset=utf-8",
            "js" | "mjs" => "text/javascript; charset=utf-8",
            "json" | "map" => "application/json; charset=utf-8",
            "txt" => "text/plain; charset=utf-8",
            "csv" => "text/csv; charset=utf-8",
            "svg" => "image/svg+xml",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "ico" => "image/x-icon",
            "woff" => "font/woff",
            "woff2" => "font/woff2",
            "ttf" => "font/ttf",
            "wasm" => "application/wasm",
            _ => "application/octet-stream",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Method;

    #[test]
    fn test_sanitize_path() {
        let handler = StaticFiles::serve(".");

        assert_eq!(
            handler.sanitize_path("/style.css"),
            Some(PathBuf::from("style.css"))
        );
        assert_eq!(
            handler.sanitize_path("/fonts/./a.woff"),
            Some(PathBuf::from("fonts/a.woff"))
        );
        assert!(handler.sanitize_path("/../etc/passwd").is_none());
        assert!(handler.sanitize_path("/fonts/../../secret").is_none());
        assert!(handler.sanitize_path("/.git/config").is_none());
    }

    #[test]
    fn test_sanitize_percent_encoded_path() {
        let handler = StaticFiles::serve(".");

        assert_eq!(
            handler.sanitize_path("/my%20chart.css"),
            Some(PathBuf::from("my chart.css"))
        );
        assert_eq!(
            handler.sanitize_path("/fonts/r%C3%A9sum%C3%A9.woff"),
            Some(PathBuf::from("fonts/résumé.woff"))
        );

        // Checks apply to the decoded segment
        assert!(handler.sanitize_path("/%2e%2e/secret").is_none());
        assert!(handler.sanitize_path("/%2E%2E%2Fsecret").is_none());
        assert!(handler.sanitize_path("/fonts%2F..%2F..%2Fsecret").is_none());
        assert!(handler.sanitize_path("/a%5Cb").is_none());
        assert!(handler.sanitize_path("/a%00b.css").is_none());
        assert!(handler.sanitize_path("/%2egit/config").is_none());
        // Not valid UTF-8 once decoded
        assert!(handler.sanitize_path("/%ff.css").is_none());
    }

    #[tokio::test]
    async fn test_try_serve_encoded_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("my chart.css"), ".axis{}").unwrap();
        let handler = StaticFiles::serve(dir.path());

        let res = handler
            .try_serve(&Request::get("/my%20chart.css"))
            .await
            .unwrap();
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(&res.body[..], b".axis{}");
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(
            StaticFiles::mime_type(Path::new("index.html")),
            "text/html; charset=utf-8"
        );
        assert_eq!(
            StaticFiles::mime_type(Path::new("STYLE.CSS")),
            "text/css; charset=utf-8"
        );
        assert_eq!(
            StaticFiles::mime_type(Path::new("rtt_data.js")),
            "text/javascript; charset=utf-8"
        );
        assert_eq!(
            StaticFiles::mime_type(Path::new("blob")),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn test_try_serve_hit_and_miss() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("style.css"), "body{margin:0}").unwrap();
        let handler = StaticFiles::serve(dir.path());

        let res = handler.try_serve(&Request::get("/style.css")).await.unwrap();
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.content_type(), Some("text/css; charset=utf-8"));
        assert_eq!(res.header("cache-control"), Some("public, max-age=0"));
        assert!(res.header("last-modified").unwrap().ends_with(" GMT"));
        assert_eq!(&res.body[..], b"body{margin:0}");

        assert!(handler.try_serve(&Request::get("/json_data")).await.is_none());
        assert!(handler
            .try_serve(&Request::new(Method::Post, "/style.css"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_directory_index() {
        let dir = tempfile::tempdir().unwrap();
        let handler = StaticFiles::serve(dir.path());
        assert!(handler.try_serve(&Request::get("/")).await.is_none());

        std::fs::write(dir.path().join("index.html"), "<h1>rtt</h1>").unwrap();
        let res = handler.try_serve(&Request::get("/")).await.unwrap();
        assert_eq!(res.content_type(), Some("text/html; charset=utf-8"));
    }

    #[tokio::test]
    async fn test_etag_not_modified() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.js"), "draw();").unwrap();
        let handler = StaticFiles::serve(dir.path());

        let first = handler.try_serve(&Request::get("/app.js")).await.unwrap();
        let etag = first.header("etag").unwrap().to_string();

        let revalidate = Request::get("/app.js").with_header("If-None-Match", etag.as_str());
        let second = handler.try_serve(&revalidate).await.unwrap();
        assert_eq!(second.status, StatusCode::NOT_MODIFIED);
        assert!(second.body.is_empty());
        assert_eq!(second.header("etag"), Some(etag.as_str()));
        assert_eq!(second.header("cache-control"), Some("public, max-age=0"));
        assert_eq!(second.header("last-modified"), first.header("last-modified"));
        assert_eq!(second.header("content-type"), None);
    }

    #[tokio::test]
    async fn test_serve_path_missing() {
        let dir = tempfile::tempdir().unwrap();
        let handler = StaticFiles::serve(dir.path());

        let res = handler
            .serve_path(&dir.path().join("index.html"), &Request::get("/index"))
            .await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }
}
