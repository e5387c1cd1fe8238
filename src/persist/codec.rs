//! persist::codec
//!
//! Line-oriented record format for durable images.
//!
//! Each guest is one line: `<name> <true|false>\n`. There is no header,
//! footer, escaping or checksum. The decoder splits at the *last* space,
//! so names containing spaces survive a round trip. Line breaks inside a
//! name cannot be represented and are rejected at encode time.

use std::io::{BufRead, Write};
use std::path::Path;

use super::PersistError;
use crate::core::registry::{GuestEntry, Snapshot};

/// Check that every name in the snapshot can be written as one record.
pub fn check_encodable(snapshot: &Snapshot) -> Result<(), PersistError> {
    match snapshot
        .iter()
        .find(|(name, _)| name.contains(['\n', '\r']))
    {
        Some((name, _)) => Err(PersistError::Unencodable {
            name: name.to_string(),
        }),
        None => Ok(()),
    }
}

/// Write every record of `snapshot` to `out`.
///
/// Call [`check_encodable`] first; this function does not re-validate.
pub fn encode<W: Write>(snapshot: &Snapshot, out: &mut W) -> std::io::Result<()> {
    for (name, special) in snapshot.iter() {
        writeln!(out, "{name} {special}")?;
    }
    Ok(())
}

/// Read records from `input`. `path` is only used for error reporting.
///
/// Lines that are not valid UTF-8 are corrupt records, not I/O failures.
pub fn decode<R: BufRead>(input: R, path: &Path) -> Result<Snapshot, PersistError> {
    let mut entries = Vec::new();
    for (index, raw) in input.split(b'\n').enumerate() {
        let line_no = index + 1;
        let corrupt = |reason: String| PersistError::CorruptImage {
            path: path.to_path_buf(),
            line: line_no,
            reason,
        };
        let mut raw = raw.map_err(|e| PersistError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
        let line =
            String::from_utf8(raw).map_err(|e| corrupt(format!("invalid utf-8: {e}")))?;
        entries.push(decode_line(&line).map_err(corrupt)?);
    }
    Ok(Snapshot::from_entries(entries))
}

fn decode_line(line: &str) -> Result<GuestEntry, String> {
    let (name, flag) = line
        .rsplit_once(' ')
        .ok_or_else(|| format!("missing field separator in {line:?}"))?;
    let special = match flag {
        "true" => true,
        "false" => false,
        other => return Err(format!("invalid special flag {other:?}")),
    };
    Ok(GuestEntry::new(name, special))
}
