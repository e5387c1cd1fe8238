//! core::registry
//!
//! Concurrent in-memory guest registry.
//!
//! # Concurrency
//!
//! The registry is a `HashMap` behind a single `RwLock`. Readers proceed
//! concurrently; each `add` takes the write lock for exactly one insert.
//! No method acquires the lock more than once, and visitors passed to
//! [`Registry::for_each`] only ever see plain [`GuestEntry`] values, so
//! there is no path that re-enters the registry while a read scope is held.
//!
//! # Invariants
//!
//! - Each name appears at most once; last write wins
//! - A [`Snapshot`] is a deep copy and never observes later mutations
//! - Iteration order is unspecified and may differ between calls
//!
//! # Example
//!
//! ```
//! use guestbook::core::registry::Registry;
//! use std::ops::ControlFlow;
//!
//! let registry = Registry::new();
//! registry.add("alice", true);
//! registry.add("bob", false);
//!
//! assert!(registry.is_special("alice"));
//! assert!(!registry.is_special("carol"));
//!
//! let mut special = Vec::new();
//! registry.for_each(|entry| {
//!     if entry.special {
//!         special.push(entry.name.clone());
//!     }
//!     ControlFlow::Continue(())
//! });
//! assert_eq!(special, vec!["alice".to_string()]);
//! ```

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A single guest and their special flag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GuestEntry {
    /// Guest name. Opaque UTF-8, used as the unique key.
    pub name: String,
    /// Whether the guest signed in as special.
    pub special: bool,
}

impl GuestEntry {
    /// Create a new entry.
    pub fn new(name: impl Into<String>, special: bool) -> Self {
        Self {
            name: name.into(),
            special,
        }
    }
}

/// Immutable point-in-time copy of a [`Registry`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    guests: HashMap<String, bool>,
}

impl Snapshot {
    /// An empty snapshot (fresh start).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from entries. Later duplicates win.
    pub fn from_entries(entries: impl IntoIterator<Item = GuestEntry>) -> Self {
        let guests = entries
            .into_iter()
            .map(|entry| (entry.name, entry.special))
            .collect();
        Self { guests }
    }

    /// Number of guests in the snapshot.
    pub fn len(&self) -> usize {
        self.guests.len()
    }

    /// Whether the snapshot has no guests.
    pub fn is_empty(&self) -> bool {
        self.guests.is_empty()
    }

    /// Exact lookup: `None` when the name is absent.
    pub fn get(&self, name: &str) -> Option<bool> {
        self.guests.get(name).copied()
    }

    /// Iterate over `(name, special)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
        self.guests
            .iter()
            .map(|(name, special)| (name.as_str(), *special))
    }

    /// Owned entries sorted by name, for stable output.
    pub fn sorted_entries(&self) -> Vec<GuestEntry> {
        let mut entries: Vec<GuestEntry> = self
            .iter()
            .map(|(name, special)| GuestEntry::new(name, special))
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }
}

/// Thread-safe registry of guests.
///
/// Share it between tasks with `Arc<Registry>`; all methods take `&self`.
#[derive(Debug, Default)]
pub struct Registry {
    guests: RwLock<HashMap<String, bool>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry hydrated from a durable snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            guests: RwLock::new(snapshot.guests),
        }
    }

    // A poisoned lock still guards a consistent map: every mutation is a
    // single `insert`, so recover the guard instead of propagating the panic.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, bool>> {
        self.guests.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, bool>> {
        self.guests.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or overwrite the entry for `name`.
    ///
    /// The name is not validated here; callers decide what a valid name is.
    pub fn add(&self, name: impl Into<String>, special: bool) {
        let name = name.into();
        self.write().insert(name, special);
    }

    /// Special flag for `name`, or `false` when the guest is unknown.
    pub fn is_special(&self, name: &str) -> bool {
        self.get(name).unwrap_or(false)
    }

    /// Exact lookup that distinguishes an unknown guest from a non-special one.
    pub fn get(&self, name: &str) -> Option<bool> {
        self.read().get(name).copied()
    }

    /// Number of registered guests.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no guest has signed yet.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Deep copy of the current contents, taken under one read scope.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            guests: self.read().clone(),
        }
    }

    /// Visit every guest under a single read scope.
    ///
    /// The visitor gets the full entry, name and flag together, and returns
    /// `ControlFlow::Break(())` to stop early. It must not block for long:
    /// writers wait until iteration ends.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&GuestEntry) -> ControlFlow<()>,
    {
        let guests = self.read();
        for (name, special) in guests.iter() {
            let entry = GuestEntry::new(name.clone(), *special);
            if visitor(&entry).is_break() {
                break;
            }
        }
    }
}
