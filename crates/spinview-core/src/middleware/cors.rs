//! CORS (Cross-Origin Resource Sharing) middleware
//!
//! Answers preflight requests and adds CORS headers to fixture responses.
//! The fixtures are public, so every origin is allowed and reported as `*`.

use super::Middleware;
use crate::{Method, Request, Response, StatusCode};
use smallvec::SmallVec;

/// CORS configuration
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Methods advertised on preflight
    pub methods: SmallVec<[Method; 4]>,
    /// Allowed request headers
    pub headers: SmallVec<[String; 8]>,
    /// Preflight max age (seconds)
    pub max_age: u32,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            methods: smallvec::smallvec![Method::Get, Method::Head, Method::Options],
            headers: smallvec::smallvec![
                "Origin".to_string(),
                "X-Requested-With".to_string(),
                "Content-Type".to_string(),
                "Accept".to_string(),
            ],
            max_age: 86400,
        }
    }
}

/// CORS middleware
pub struct Cors {
    config: CorsConfig,
}

impl Cors {
    pub fn new(config: CorsConfig) -> Self {
        Self { config }
    }

    /// Any origin, headers on every response. Used for the JSON fixtures.
    pub fn permissive() -> Self {
        Self::new(CorsConfig::default())
    }

    fn methods_string(&self) -> String {
        self.config
            .methods
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn add_cors_headers(&self, res: &mut Response) {
        res.headers
            .push(("Access-Control-Allow-Origin".to_string(), "*".to_string()));

        if !self.config.headers.is_empty() {
            res.headers.push((
                "Access-Control-Allow-Headers".to_string(),
                self.config.headers.join(", "),
            ));
        }
    }
}

impl Middleware for Cors {
    fn before(&self, req: &Request) -> Option<Response> {
        if req.method != Method::Options {
            return None;
        }

        let mut res = Response::new(StatusCode::NO_CONTENT);
        self.add_cors_headers(&mut res);
        res.headers.push((
            "Access-Control-Allow-Methods".to_string(),
            self.methods_string(),
        ));
        res.headers.push((
            "Access-Control-Max-Age".to_string(),
            self.config.max_age.to_string(),
        ));
        Some(res)
    }

    fn after(&self, _req: &Request, res: &mut Response) {
        self.add_cors_headers(res);
    }
}
