//! Guestbook - a concurrent guest registry with crash-safe persistence
//!
//! Visitors sign in with a name (optionally marked special); the guest list
//! and a visit counter are rendered on request. Guests live in memory and are
//! flushed to durable, versioned images on an interval and on shutdown.
//!
//! # Architecture
//!
//! - [`core`] - Registry, visit counter, configuration, storage paths
//! - [`persist`] - Image format, crash-safe engine, background flusher
//! - [`server`] - Thin HTTP front (`GET /`, `POST /sign`)
//! - [`service`] - Wires hydration, flusher and server together
//! - [`cli`] - Command-line interface
//!
//! # Correctness Invariants
//!
//! 1. Registry mutations are atomic and never torn in a snapshot
//! 2. File I/O never happens while the registry lock is held
//! 3. A complete image is never overwritten or truncated
//! 4. Shutdown always attempts one final flush and never hangs on its failure

pub mod cli;
pub mod core;
pub mod persist;
pub mod server;
pub mod service;
