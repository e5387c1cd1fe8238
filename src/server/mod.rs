//! server
//!
//! Thin HTTP front for the guestbook.
//!
//! # Routes
//!
//! - `GET /` - Count the visit and render the guest list
//! - `POST /sign` - Add a guest from a urlencoded form, then redirect to `/`
//!
//! # Architecture
//!
//! `tiny_http` receives requests on a dedicated thread and forwards them to
//! an async loop, which stops on cancellation. Each request is answered on
//! the blocking pool. Routing itself is the pure [`route`] function, so it
//! can be tested without sockets.

pub mod form;
pub mod render;

use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;

use thiserror::Error;
use tiny_http::{Header, Method, Request, Response, Server};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::counter::VisitCounter;
use crate::core::registry::Registry;
use form::SignForm;

/// Largest form body accepted by `POST /sign`.
const MAX_BODY_BYTES: u64 = 16 * 1024;

/// Errors from the HTTP front.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: SocketAddr, reason: String },
}

/// State shared by all request handlers.
///
/// Constructed once at startup and passed explicitly to the server.
#[derive(Debug, Default)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub visits: VisitCounter,
}

impl AppState {
    /// State around an existing registry.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            visits: VisitCounter::new(),
        }
    }
}

/// A routed response, independent of the HTTP library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: String,
    pub location: Option<&'static str>,
}

impl Reply {
    fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            location: None,
        }
    }

    fn redirect(location: &'static str) -> Self {
        Self {
            status: 303,
            body: String::new(),
            location: Some(location),
        }
    }
}

/// Route one request.
pub fn route(state: &AppState, method: &Method, url: &str, body: &str) -> Reply {
    let path = url.split('?').next().unwrap_or(url);
    match (path, method) {
        ("/", Method::Get) => {
            let visits = state.visits.record_visit();
            Reply::text(200, render::render_page(visits, &state.registry))
        }
        ("/sign", Method::Post) => match SignForm::parse(body) {
            Ok(form) => {
                info!(name = %form.name, special = form.special, "guest signed");
                state.registry.add(form.name, form.special);
                Reply::redirect("/")
            }
            Err(err) => {
                warn!(error = %err, "rejected sign-in");
                Reply::text(400, format!("{err}\n"))
            }
        },
        ("/", _) | ("/sign", _) => Reply::text(405, "method not allowed\n"),
        _ => Reply::text(404, "not found\n"),
    }
}

/// A bound, not yet running HTTP server.
pub struct HttpServer {
    server: Arc<Server>,
    addr: SocketAddr,
}

impl HttpServer {
    /// Bind to `addr`. Port 0 picks a free port; see [`HttpServer::local_addr`].
    pub fn bind(addr: SocketAddr) -> Result<Self, ServerError> {
        let server = Server::http(addr).map_err(|e| ServerError::Bind {
            addr,
            reason: e.to_string(),
        })?;
        let addr = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| ServerError::Bind {
                addr,
                reason: "unable to determine bound address".into(),
            })?;
        Ok(Self {
            server: Arc::new(server),
            addr,
        })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve requests until `token` is cancelled.
    pub async fn run(self, state: Arc<AppState>, token: CancellationToken) {
        info!(addr = %self.addr, "serving guestbook");

        let (tx, mut rx) = mpsc::channel::<Request>(64);
        let server = Arc::clone(&self.server);
        let receiver = thread::spawn(move || {
            while let Ok(request) = server.recv() {
                if tx.blocking_send(request).is_err() {
                    break;
                }
            }
        });

        let mut in_flight = JoinSet::new();
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                maybe_req = rx.recv() => {
                    let Some(request) = maybe_req else {
                        break;
                    };
                    let state = Arc::clone(&state);
                    in_flight.spawn_blocking(move || respond(&state, request));
                }
                // Reap finished responders so the set stays small.
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            }
        }

        info!("http front stopping");
        self.server.unblock();
        drop(rx);
        // Requests already accepted finish before the caller's final flush.
        while in_flight.join_next().await.is_some() {}
        let _ = tokio::task::spawn_blocking(move || receiver.join()).await;
    }
}

fn respond(state: &AppState, mut request: Request) {
    let mut body = String::new();
    let read = request
        .as_reader()
        .take(MAX_BODY_BYTES)
        .read_to_string(&mut body);
    let reply = match read {
        Ok(_) => route(state, request.method(), request.url(), &body),
        Err(e) => Reply::text(400, format!("unreadable body: {e}\n")),
    };
    debug!(method = %request.method(), url = %request.url(), status = reply.status, "request handled");

    let mut response = Response::from_string(reply.body).with_status_code(reply.status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"text/plain; charset=utf-8"[..]) {
        response = response.with_header(header);
    }
    if let Some(location) = reply.location {
        if let Ok(header) = Header::from_bytes(&b"Location"[..], location.as_bytes()) {
            response = response.with_header(header);
        }
    }
    if let Err(e) = request.respond(response) {
        debug!(error = %e, "client went away before response");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_root_counts_visits() {
        let state = AppState::default();
        state.registry.add("alice", true);

        let first = route(&state, &Method::Get, "/", "");
        let second = route(&state, &Method::Get, "/?x=1", "");

        assert_eq!(first.status, 200);
        assert!(first.body.starts_with("Visits: 1\n"));
        assert!(second.body.starts_with("Visits: 2\n"));
        assert!(second.body.contains("* alice\n"));
    }

    #[test]
    fn sign_adds_guest_and_redirects() {
        let state = AppState::default();
        let reply = route(&state, &Method::Post, "/sign", "name=bob&special=1");

        assert_eq!(reply.status, 303);
        assert_eq!(reply.location, Some("/"));
        assert_eq!(state.registry.get("bob"), Some(true));
    }

    #[test]
    fn invalid_sign_leaves_registry_untouched() {
        let state = AppState::default();
        let reply = route(&state, &Method::Post, "/sign", "name=");

        assert_eq!(reply.status, 400);
        assert!(state.registry.is_empty());
    }

    #[test]
    fn wrong_method_and_unknown_path() {
        let state = AppState::default();
        assert_eq!(route(&state, &Method::Get, "/sign", "").status, 405);
        assert_eq!(route(&state, &Method::Delete, "/", "").status, 405);
        assert_eq!(route(&state, &Method::Get, "/admin", "").status, 404);
        assert_eq!(state.visits.current(), 0);
    }
}
