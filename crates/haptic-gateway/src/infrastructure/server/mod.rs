//! TLS-terminating control server.
//!
//! Accept loop and per-session lifecycle:
//!
//! 1. Bind a TCP listener on loopback. No TLS identity means `start()` fails
//!    fast with a descriptive error — identity absence is not retried.
//! 2. Accept connections with a short timeout so the loop can observe the
//!    shutdown flag even when idle.
//! 3. Per connection, on its own task: TLS handshake (no client
//!    certificate), read and parse one request head, then either answer the
//!    CORS preflight, promote the connection to the binary trigger channel,
//!    or route to a JSON handler.
//!
//! Handler failures surface as a 500 JSON body on that connection; they
//! never terminate the listener. `stop()` clears the flag and gives
//! in-flight sessions a bounded grace period before they are abandoned.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use crate::application::Router;
use crate::domain::responses::ApiResponse;
use crate::infrastructure::certs::TlsIdentity;

pub mod http;
pub mod ws;

/// How long the accept loop waits before re-checking the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// Per-connection limit on the TLS handshake plus request head.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Grace period for in-flight sessions at shutdown.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Errors that prevent the server from listening at all.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Constructed without a TLS identity; the server refuses to start.
    #[error("no TLS identity available; control server not started")]
    NoIdentity,

    /// The loopback port could not be bound.
    #[error("failed to bind 127.0.0.1:{port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

/// The TLS HTTP + WebSocket control server.
pub struct SecureControlServer {
    port: u16,
    acceptor: Option<TlsAcceptor>,
    router: Arc<Router>,
    running: Arc<AtomicBool>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl SecureControlServer {
    /// `identity` is optional so construction mirrors degraded certificate
    /// states; `start()` is where absence becomes an error.
    pub fn new(identity: Option<&TlsIdentity>, port: u16, router: Arc<Router>) -> Self {
        Self {
            port,
            acceptor: identity.map(|id| TlsAcceptor::from(Arc::clone(&id.server_config))),
            router,
            running: Arc::new(AtomicBool::new(false)),
            accept_task: Mutex::new(None),
        }
    }

    /// Binds the listener and spawns the accept loop.
    ///
    /// # Errors
    ///
    /// [`ServerError::NoIdentity`] when constructed without an identity;
    /// [`ServerError::Bind`] when the port cannot be acquired (in use,
    /// permission denied). Both are fatal to the server component only.
    pub async fn start(&self) -> Result<(), ServerError> {
        let acceptor = self.acceptor.clone().ok_or(ServerError::NoIdentity)?;

        let listener = TcpListener::bind(("127.0.0.1", self.port))
            .await
            .map_err(|source| ServerError::Bind {
                port: self.port,
                source,
            })?;
        info!(port = self.port, "control server listening on loopback TLS");

        self.running.store(true, Ordering::Relaxed);
        let running = Arc::clone(&self.running);
        let router = Arc::clone(&self.router);

        let handle = tokio::spawn(async move {
            accept_loop(listener, acceptor, router, running).await;
        });
        if let Ok(mut slot) = self.accept_task.lock() {
            *slot = Some(handle);
        }
        Ok(())
    }

    /// Signals shutdown and waits up to the grace period for the accept loop
    /// to drain.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        let handle = match self.accept_task.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            if timeout(STOP_GRACE, handle).await.is_err() {
                warn!("accept loop did not stop within the grace period");
            }
        }
        info!("control server stopped");
    }

    /// Whether the accept loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

// ── Accept loop ───────────────────────────────────────────────────────────────

/// Accepts connections until `running` is cleared. Each connection gets its
/// own task so one slow client never blocks the others.
async fn accept_loop(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    router: Arc<Router>,
    running: Arc<AtomicBool>,
) {
    loop {
        if !running.load(Ordering::Relaxed) {
            debug!("shutdown flag set; stopping accept loop");
            break;
        }

        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                debug!(%peer, "connection accepted");
                let acceptor = acceptor.clone();
                let router = Arc::clone(&router);
                tokio::spawn(async move {
                    handle_connection(stream, peer, acceptor, router).await;
                });
            }
            Ok(Err(err)) => {
                // Transient accept failure; keep listening.
                error!(%err, "accept error");
            }
            Err(_) => {
                // Timeout — re-check the shutdown flag.
            }
        }
    }
}

/// Outer session wrapper: logs the outcome so `run_session` can use `?`.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    router: Arc<Router>,
) {
    match run_session(stream, peer, acceptor, router).await {
        Ok(()) => debug!(%peer, "session closed"),
        Err(err) => debug!(%peer, error = %format!("{err:#}"), "session ended with error"),
    }
}

/// Full lifecycle of one connection: TLS handshake, one request, one
/// response (or a long-lived trigger channel).
async fn run_session(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    router: Arc<Router>,
) -> anyhow::Result<()> {
    let mut tls = acceptor
        .accept(stream)
        .await
        .with_context(|| format!("TLS handshake failed with {peer}"))?;

    let head = timeout(REQUEST_TIMEOUT, http::read_request_head(&mut tls))
        .await
        .with_context(|| format!("request head timed out from {peer}"))?
        .map_err(|err| anyhow::anyhow!("bad request head from {peer}: {err}"))?;
    let Some(head) = head else {
        return Ok(()); // connected and went away without sending anything
    };

    let request = match http::parse_request_head(&head) {
        Ok(request) => request,
        Err(err) => {
            debug!(%peer, %err, "unparseable request");
            return Ok(());
        }
    };
    debug!(%peer, method = %request.method, path = %request.path, "request");

    // CORS preflight answers 200 for any path, before routing.
    if request.method == "OPTIONS" {
        http::write_preflight_response(&mut tls).await?;
        return Ok(());
    }

    // WebSocket upgrade: promote to the binary trigger channel.
    if request.path.eq_ignore_ascii_case("/ws") && request.is_websocket_upgrade() {
        let Some(key) = request.header("Sec-WebSocket-Key").map(str::to_string) else {
            let response = ApiResponse::bad_request("Missing Sec-WebSocket-Key", None);
            http::write_json_response(&mut tls, &response).await?;
            return Ok(());
        };
        let ws_router = Arc::clone(&router);
        let pattern_count = router.pattern_count();
        ws::serve_trigger_channel(tls, &key, pattern_count, move |index| {
            ws_router.trigger_by_index(index);
        })
        .await?;
        return Ok(());
    }

    // JSON routes. Routing runs on the blocking pool: the diagnostics
    // handlers talk to HID hardware with real timeouts.
    let method = request.method.clone();
    let path = request.path.clone();
    let routed = tokio::task::spawn_blocking(move || router.handle(&method, &path)).await;

    let response = match routed {
        Ok(Some(response)) => response,
        Ok(None) => ApiResponse::not_found(),
        Err(err) => {
            // A panicking handler becomes a 500 on this connection only.
            error!(%peer, %err, "handler failed");
            ApiResponse::internal_error(err.to_string())
        }
    };
    http::write_json_response(&mut tls, &response).await?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
