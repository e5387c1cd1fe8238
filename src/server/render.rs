//! server::render
//!
//! Plain-text guest list.

use std::fmt::Write;
use std::ops::ControlFlow;

use crate::core::registry::{GuestEntry, Registry};

/// Render the page for visit number `visits`.
///
/// Special guests are marked `*`, everyone else `-`. Guests are sorted by
/// name so the page is stable between requests.
pub fn render_page(visits: u64, registry: &Registry) -> String {
    let mut guests: Vec<GuestEntry> = Vec::with_capacity(registry.len());
    registry.for_each(|entry| {
        guests.push(entry.clone());
        ControlFlow::Continue(())
    });
    guests.sort_by(|a, b| a.name.cmp(&b.name));
    render_guests(visits, &guests)
}

/// Render an already collected guest list.
pub fn render_guests(visits: u64, guests: &[GuestEntry]) -> String {
    let mut page = format!("Visits: {visits}\n\nGuests:\n");
    for guest in guests {
        let marker = if guest.special { '*' } else { '-' };
        // Writing to a String cannot fail
        let _ = writeln!(page, "{marker} {}", guest.name);
    }
    page
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_page() {
        let registry = Registry::new();
        assert_eq!(render_page(1, &registry), "Visits: 1\n\nGuests:\n");
    }

    #[test]
    fn marks_special_guests() {
        let registry = Registry::new();
        registry.add("bob", false);
        registry.add("alice", true);

        assert_eq!(
            render_page(7, &registry),
            "Visits: 7\n\nGuests:\n* alice\n- bob\n"
        );
    }
}
