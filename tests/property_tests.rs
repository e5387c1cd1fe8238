//! Property-based tests for the registry and image format.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use std::collections::HashMap;

use proptest::prelude::*;
use tempfile::TempDir;

use guestbook::core::registry::{GuestEntry, Registry, Snapshot};
use guestbook::persist::{codec, PersistenceEngine};

/// Guest names: anything printable, including spaces, but no line breaks.
fn guest_name() -> impl Strategy<Value = String> {
    "[^\r\n]{0,24}"
}

/// A sequence of sign-ins, possibly repeating names.
fn sign_ins() -> impl Strategy<Value = Vec<(String, bool)>> {
    prop::collection::vec((guest_name(), any::<bool>()), 0..40)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The registry keeps exactly one entry per name, holding the last flag.
    #[test]
    fn last_write_wins(adds in sign_ins()) {
        let registry = Registry::new();
        let mut expected = HashMap::new();
        for (name, special) in &adds {
            registry.add(name.clone(), *special);
            expected.insert(name.clone(), *special);
        }

        prop_assert_eq!(registry.len(), expected.len());
        for (name, special) in &expected {
            prop_assert_eq!(registry.get(name), Some(*special));
            prop_assert_eq!(registry.is_special(name), *special);
        }
    }

    /// Encoding then decoding reproduces the snapshot.
    #[test]
    fn codec_preserves_snapshot(adds in sign_ins()) {
        let snapshot = Snapshot::from_entries(
            adds.into_iter().map(|(name, special)| GuestEntry::new(name, special)),
        );

        let mut buf = Vec::new();
        codec::encode(&snapshot, &mut buf).unwrap();
        let decoded = codec::decode(buf.as_slice(), std::path::Path::new("mem")).unwrap();

        prop_assert_eq!(decoded, snapshot);
    }

    /// The newest image always loads back as the last snapshot persisted.
    #[test]
    fn engine_loads_last_persisted(batches in prop::collection::vec(sign_ins(), 1..4)) {
        let dir = TempDir::new().unwrap();
        let engine = PersistenceEngine::open(dir.path()).unwrap();
        let registry = Registry::new();

        for batch in batches {
            for (name, special) in batch {
                registry.add(name, special);
            }
            engine.persist(&registry.snapshot()).unwrap();
        }

        prop_assert_eq!(engine.load_latest().unwrap(), registry.snapshot());
    }
}
