//! Native HTTP server
//!
//! hyper HTTP/1.1 on a multi-threaded tokio runtime:
//! - One task per accepted connection
//! - Shared, immutable [`App`] behind an `Arc`
//! - SO_REUSEADDR and TCP_NODELAY on the listening socket
//! - Graceful shutdown: in-flight requests finish, idle keep-alive
//!   connections are closed

use crate::app::App;
use crate::fixtures::FixtureSet;
use crate::{Error, Request, Response, Result};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use socket2::{Domain, Protocol, Socket, Type};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub hostname: String,
    pub port: u16,
    /// Runtime worker threads (used by the binary when building the runtime)
    pub workers: usize,
    /// Directory holding the page, the script and the asset directory
    pub root: PathBuf,
    /// Asset directory mounted at `/`, relative to `root`
    pub asset_dir: PathBuf,
    /// Page served at `/index`, relative to `root`
    pub index_file: PathBuf,
    /// Script served at `/rtt_data`, relative to `root`; `None` disables the route
    pub rtt_script: Option<PathBuf>,
    /// Cache-Control max-age for files
    pub max_age: u32,
    /// How long shutdown waits for open connections
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            hostname: "0.0.0.0".to_string(),
            port: 3000,
            workers: num_cpus::get(),
            root: PathBuf::from("visualizer"),
            asset_dir: PathBuf::from("css"),
            index_file: PathBuf::from("index.html"),
            rtt_script: Some(PathBuf::from("rtt_data.js")),
            max_age: 0,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.asset_dir = dir.into();
        self
    }

    pub fn rtt_script(mut self, script: Option<PathBuf>) -> Self {
        self.rtt_script = script;
        self
    }

    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Resolve `hostname:port` to the first socket address
    pub async fn socket_addr(&self) -> Result<SocketAddr> {
        let target = format!("{}:{}", self.hostname, self.port);
        let mut addrs = tokio::net::lookup_host(target.as_str())
            .await
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", target, e)))?;
        addrs.next().ok_or_else(|| Error::InvalidAddress(target.clone()))
    }
}

/// Tracks active connections and signals them to close on shutdown
#[derive(Debug)]
pub struct ConnectionTracker {
    active: AtomicU64,
    shutdown: watch::Sender<bool>,
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self {
            active: AtomicU64::new(0),
            shutdown: watch::channel(false).0,
        }
    }
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receiver that observes [`start_shutdown`](Self::start_shutdown)
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    #[inline]
    pub fn increment(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    #[inline]
    pub fn decrement(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }

    pub fn start_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Wait until no connection is open. Returns false on timeout.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        while self.count() > 0 {
            if start.elapsed() >= timeout {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        true
    }
}

/// Create the listening socket with SO_REUSEADDR and TCP_NODELAY
pub fn create_optimized_socket(addr: &SocketAddr) -> std::io::Result<Socket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nodelay(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&(*addr).into())?;
    socket.listen(1024)?;

    Ok(socket)
}

/// Convert a hyper request to the handler's request type.
///
/// Fails only for methods outside the handler's vocabulary.
pub fn from_hyper_request<B>(req: &hyper::Request<B>) -> Result<Request> {
    let method = req.method().as_str().parse()?;

    let mut request = Request::new(method, req.uri().path());

    for (name, value) in req.headers() {
        if let Ok(v) = value.to_str() {
            request.headers.push((name.to_string(), v.to_string()));
        }
    }

    Ok(request)
}

/// Convert the handler's response to a hyper response
pub fn to_hyper_response(res: Response) -> hyper::Response<Full<Bytes>> {
    let mut builder = hyper::Response::builder().status(res.status.as_u16());
    for (name, value) in &res.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    match builder.body(Full::new(res.body)) {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "invalid response head");
            let mut fallback = hyper::Response::new(Full::new(Bytes::from_static(
                b"Internal Server Error",
            )));
            *fallback.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        }
    }
}

async fn serve_request(
    app: Arc<App>,
    req: hyper::Request<Incoming>,
) -> std::result::Result<hyper::Response<Full<Bytes>>, Infallible> {
    let start = Instant::now();

    let res = match from_hyper_request(&req) {
        Ok(request) => app.handle(&request).await,
        Err(_) => Response::not_found(),
    };

    debug!(
        method = %req.method(),
        path = req.uri().path(),
        status = res.status.as_u16(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "request"
    );

    Ok(to_hyper_response(res))
}

/// A bound fixture server, ready to accept connections
pub struct Server {
    listener: TcpListener,
    app: Arc<App>,
    tracker: Arc<ConnectionTracker>,
    shutdown_timeout: Duration,
}

impl Server {
    /// Build the app and bind the listening socket.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn bind(config: &ServerConfig, fixtures: &FixtureSet) -> Result<Self> {
        let app = App::new(config, fixtures)?;
        let addr = config.socket_addr().await?;
        let socket = create_optimized_socket(&addr)?;
        let listener = TcpListener::from_std(socket.into())?;

        Ok(Self {
            listener,
            app: Arc::new(app),
            tracker: Arc::new(ConnectionTracker::new()),
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    /// Address actually bound (resolves port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn tracker(&self) -> Arc<ConnectionTracker> {
        self.tracker.clone()
    }

    /// Serve until ctrl-c
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serve until `shutdown` resolves, then drain open connections.
    ///
    /// Every connection is told to shut down gracefully: a request in
    /// flight is answered, then the connection closes. Connections still
    /// open after `shutdown_timeout` are left to finish on their own.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let Server {
            listener,
            app,
            tracker,
            shutdown_timeout,
        } = self;

        info!(
            addr = %listener.local_addr()?,
            routes = ?app.routes(),
            assets = %app.asset_root().display(),
            "spinview fixture server listening"
        );

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                            continue;
                        }
                    };

                    let app = app.clone();
                    let conn_tracker = tracker.clone();
                    let mut shutdown_rx = tracker.subscribe();
                    conn_tracker.increment();

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let service = service_fn(move |req| serve_request(app.clone(), req));
                        let conn = http1::Builder::new().serve_connection(io, service);
                        tokio::pin!(conn);

                        let mut closing = false;
                        loop {
                            tokio::select! {
                                res = conn.as_mut() => {
                                    if let Err(e) = res {
                                        debug!(%peer, error = %e, "connection closed with error");
                                    }
                                    break;
                                }
                                _ = shutdown_rx.changed(), if !closing => {
                                    closing = true;
                                    conn.as_mut().graceful_shutdown();
                                }
                            }
                        }

                        conn_tracker.decrement();
                    });
                }
                _ = &mut shutdown => {
                    tracker.start_shutdown();
                    break;
                }
            }
        }

        drop(listener);
        info!(active = tracker.count(), "shutting down");

        if !tracker.drain(shutdown_timeout).await {
            warn!(
                active = tracker.count(),
                "shutdown timeout reached with connections still open"
            );
        }

        Ok(())
    }
}
