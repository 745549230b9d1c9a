//! spinview-core: RTT fixture server core
//!
//! Serves hard-coded round-trip-time measurement fixtures as JSON for the
//! latency visualizer, plus the visualizer's HTML page and static assets.
//!
//! ## Routes
//! - `GET /json_data` - measurement series (CORS open to any origin)
//! - `GET /demo` - session records, when the fixture set defines them
//! - `GET /index` - the visualizer page
//! - `GET /rtt_data` - the visualizer's data script, when configured
//! - `GET /*` - files from the asset directory

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod app;
pub mod error;
pub mod fixtures;
pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

// Re-exports
pub use app::{App, Route};
pub use error::{Error, Result};
pub use fixtures::{FixtureSet, MeasurementSample, RenderedFixtures, SessionRecord, SERIES_LEN};
pub use request::{Method, Request};
pub use response::{Response, ResponseBuilder, StatusCode};

pub use handlers::{StaticFileConfig, StaticFiles};
pub use middleware::{Cors, CorsConfig, Middleware, MiddlewareChain};

pub use server::{
    create_optimized_socket, from_hyper_request, to_hyper_response, ConnectionTracker, Server,
    ServerConfig,
};
