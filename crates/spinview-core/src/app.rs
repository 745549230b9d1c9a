//! The fixture application: routing plus the handlers behind each route
//!
//! [`App::handle`] is the whole request surface. It maps a method and path
//! to a status, headers and body using only the state built in [`App::new`],
//! so it can be driven directly in tests without a socket.

use crate::fixtures::{FixtureSet, RenderedFixtures};
use crate::handlers::{StaticFileConfig, StaticFiles};
use crate::middleware::{Cors, MiddlewareChain};
use crate::server::ServerConfig;
use crate::{Method, Request, Response, Result, StatusCode};
use spinview_router::Router;
use std::path::PathBuf;

/// Routes served by the fixture application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Measurement series as a JSON object
    JsonData,
    /// Session records as a JSON array
    Demo,
    /// The visualizer HTML page
    Index,
    /// The visualizer's data script
    RttData,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::JsonData => "/json_data",
            Route::Demo => "/demo",
            Route::Index => "/index",
            Route::RttData => "/rtt_data",
        }
    }

    /// JSON fixture routes are readable from any origin
    pub fn is_cross_origin(&self) -> bool {
        matches!(self, Route::JsonData | Route::Demo)
    }
}

/// Immutable request handler shared by all connections
pub struct App {
    router: Router<Route>,
    fixtures: RenderedFixtures,
    assets: StaticFiles,
    pages: StaticFiles,
    index_file: PathBuf,
    rtt_script: Option<PathBuf>,
    cross_origin: MiddlewareChain,
}

impl App {
    /// Render the fixtures and register every route they enable
    pub fn new(config: &ServerConfig, fixtures: &FixtureSet) -> Result<Self> {
        let fixtures = fixtures.render()?;

        let mut routes = vec![Route::JsonData, Route::Index];
        if fixtures.sessions.is_some() {
            routes.push(Route::Demo);
        }
        if config.rtt_script.is_some() {
            routes.push(Route::RttData);
        }

        let mut router = Router::new();
        for route in routes {
            router.insert(Method::Get.as_str(), route.path(), route)?;
            router.insert(Method::Head.as_str(), route.path(), route)?;
            if route.is_cross_origin() {
                router.insert(Method::Options.as_str(), route.path(), route)?;
            }
        }

        let mut cross_origin = MiddlewareChain::new();
        cross_origin.add(Cors::permissive());

        let assets = StaticFiles::new(
            StaticFileConfig::new(config.root.join(&config.asset_dir)).max_age(config.max_age),
        );
        let pages = StaticFiles::new(
            StaticFileConfig::new(&config.root)
                .index(None)
                .max_age(config.max_age),
        );

        Ok(Self {
            router,
            fixtures,
            index_file: config.root.join(&config.index_file),
            rtt_script: config.rtt_script.as_ref().map(|p| config.root.join(p)),
            assets,
            pages,
            cross_origin,
        })
    }

    /// Paths registered in the route table
    pub fn routes(&self) -> Vec<&'static str> {
        let mut paths = vec![Route::JsonData.path(), Route::Index.path()];
        if self.fixtures.sessions.is_some() {
            paths.push(Route::Demo.path());
        }
        if self.rtt_script.is_some() {
            paths.push(Route::RttData.path());
        }
        paths
    }

    /// Asset directory mounted at `/`
    pub fn asset_root(&self) -> &std::path::Path {
        self.assets.root()
    }

    /// Handle one request.
    ///
    /// Order: static asset match, then the route table, then 404.
    pub async fn handle(&self, req: &Request) -> Response {
        let mut res = match self.dispatch(req).await {
            Some(res) => res,
            None => Response::not_found(),
        };

        if req.method == Method::Head {
            res.strip_body();
        }
        res
    }

    async fn dispatch(&self, req: &Request) -> Option<Response> {
        if let Some(res) = self.assets.try_serve(req).await {
            return Some(res);
        }

        let route = *self.router.find(req.method.as_str(), &req.path)?;

        if route.is_cross_origin() {
            if let Some(res) = self.cross_origin.run_before(req) {
                return Some(res);
            }
        }

        let mut res = match route {
            Route::JsonData => Response::json(self.fixtures.measurements.clone()),
            Route::Demo => Response::json(self.fixtures.sessions.clone()?),
            Route::Index => self.pages.serve_path(&self.index_file, req).await,
            Route::RttData => {
                let script = self.rtt_script.as_ref()?;
                let mut res = self.pages.serve_path(script, req).await;
                if res.status == StatusCode::OK {
                    // Served verbatim, whatever the extension
                    set_header(&mut res, "Content-Type", "text/javascript; charset=utf-8");
                }
                res
            }
        };

        if route.is_cross_origin() {
            self.cross_origin.run_after(req, &mut res);
        }
        Some(res)
    }
}

fn set_header(res: &mut Response, name: &str, value: &str) {
    res.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    res.headers.push((name.to_string(), value.to_string()));
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.routes())
            .field("assets", &self.assets.root())
            .field("index_file", &self.index_file)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn app_in(root: &std::path::Path, fixtures: FixtureSet) -> App {
        let config = ServerConfig::default().root(root);
        App::new(&config, &fixtures).unwrap()
    }

    #[tokio::test]
    async fn test_json_data() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path(), FixtureSet::full());

        let res = app.handle(&Request::get("/json_data")).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.header("access-control-allow-origin"), Some("*"));
        assert_eq!(
            res.header("access-control-allow-headers"),
            Some("Origin, X-Requested-With, Content-Type, Accept")
        );

        let doc: Value = serde_json::from_slice(&res.body).unwrap();
        assert_eq!(doc["RTT"].as_array().unwrap().len(), 6);
        assert_eq!(doc["L-RTT"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_json_data_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path(), FixtureSet::full());

        let a = app.handle(&Request::get("/json_data")).await;
        let b = app.handle(&Request::get("/json_data")).await;
        assert_eq!(a.body, b.body);
    }

    #[tokio::test]
    async fn test_demo_gated_by_sessions() {
        let dir = tempfile::tempdir().unwrap();

        let full = app_in(dir.path(), FixtureSet::full());
        let res = full.handle(&Request::get("/demo")).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.header("access-control-allow-origin"), Some("*"));
        let doc: Value = serde_json::from_slice(&res.body).unwrap();
        assert_eq!(doc.as_array().unwrap().len(), 2);

        let minimal = app_in(dir.path(), FixtureSet::minimal());
        let res = minimal.handle(&Request::get("/demo")).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert!(!minimal.routes().contains(&"/demo"));
    }

    #[tokio::test]
    async fn test_index_present_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path(), FixtureSet::full());

        let res = app.handle(&Request::get("/index")).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);

        std::fs::write(dir.path().join("index.html"), "<html>rtt</html>").unwrap();
        let res = app.handle(&Request::get("/index")).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.content_type(), Some("text/html; charset=utf-8"));
        assert_eq!(&res.body[..], b"<html>rtt</html>");
    }

    #[tokio::test]
    async fn test_rtt_data_script() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rtt_data.js"), "var rtt = [1];").unwrap();
        let app = app_in(dir.path(), FixtureSet::full());

        let res = app.handle(&Request::get("/rtt_data")).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.content_type(), Some("text/javascript; charset=utf-8"));
        assert_eq!(&res.body[..], b"var rtt = [1];");

        let config = ServerConfig::default().root(dir.path()).rtt_script(None);
        let app = App::new(&config, &FixtureSet::full()).unwrap();
        let res = app.handle(&Request::get("/rtt_data")).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_static_assets_and_fallthrough() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("css")).unwrap();
        std::fs::write(dir.path().join("css").join("chart.css"), ".bar{}").unwrap();
        std::fs::write(dir.path().join("css").join("my chart.css"), ".axis{}").unwrap();
        let app = app_in(dir.path(), FixtureSet::full());

        let res = app.handle(&Request::get("/chart.css")).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.content_type(), Some("text/css; charset=utf-8"));
        // Static files carry no CORS headers
        assert_eq!(res.header("access-control-allow-origin"), None);

        let res = app.handle(&Request::get("/my%20chart.css")).await;
        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(&res.body[..], b".axis{}");

        let res = app.handle(&Request::get("/json_data")).await;
        assert_eq!(res.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_path_and_method() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path(), FixtureSet::full());

        let res = app.handle(&Request::get("/does-not-exist")).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);

        let res = app.handle(&Request::new(Method::Post, "/json_data")).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_head_and_preflight() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(dir.path(), FixtureSet::full());

        let get = app.handle(&Request::get("/json_data")).await;
        let head = app.handle(&Request::new(Method::Head, "/json_data")).await;
        assert_eq!(head.status, StatusCode::OK);
        assert!(head.body.is_empty());
        assert_eq!(
            head.header("content-length"),
            Some(get.body.len().to_string().as_str())
        );

        let preflight = Request::new(Method::Options, "/json_data")
            .with_header("Origin", "http://localhost:8080");
        let res = app.handle(&preflight).await;
        assert_eq!(res.status, StatusCode::NO_CONTENT);
        assert_eq!(res.header("access-control-allow-origin"), Some("*"));

        let res = app.handle(&Request::new(Method::Options, "/index")).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }
}
