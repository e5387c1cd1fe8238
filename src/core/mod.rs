//! core
//!
//! Core domain types and in-memory state for the guestbook.
//!
//! # Modules
//!
//! - [`registry`] - Concurrent guest registry and snapshots
//! - [`counter`] - Atomic visit counter
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Centralized path routing for storage
//!
//! # Design Principles
//!
//! - Shared state is only reachable through its owning type's methods
//! - No method re-acquires a lock it already holds
//! - State is constructed explicitly and passed down, never global

pub mod config;
pub mod counter;
pub mod paths;
pub mod registry;
