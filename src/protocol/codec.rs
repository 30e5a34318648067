//! Long-poll wire format.
//!
//! A request lists every watched key as
//! `dataId FS group FS fingerprint [FS namespaceId] RS`; the namespace field
//! is omitted for the default namespace. The server answers with the changed
//! keys as `dataId FS group [FS namespaceId] RS`, percent-encoded.
//! `FS` is byte 2 and `RS` byte 1, neither of which may appear in a key.

use crate::core::{DEFAULT_NAMESPACE_ID, FIELD_SEPARATOR, Fingerprint, ListenKey, RECORD_SEPARATOR};
use crate::error::{Result, WatchError};
use std::collections::HashSet;

/// Encode `(key, fingerprint)` pairs into a long-poll request body.
pub fn encode<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = (&'a ListenKey, &'a Fingerprint)>,
{
    let mut out = String::new();
    for (key, fingerprint) in entries {
        key.write_token(fingerprint, &mut out);
    }
    out
}

/// Decode a long-poll response into the keys it reports as changed.
///
/// An empty (or whitespace-only) body means nothing changed. Duplicate
/// records are collapsed; order of first appearance is kept.
///
/// # Errors
///
/// Returns [`WatchError::Protocol`] if the body is not valid percent-encoded
/// UTF-8 or a record does not describe a valid key.
pub fn decode(body: &str) -> Result<Vec<ListenKey>> {
    let decoded = urlencoding::decode(body)
        .map_err(|e| WatchError::Protocol(format!("response is not valid UTF-8: {}", e)))?;

    let mut seen = HashSet::new();
    let mut changed = Vec::new();
    for record in decoded.trim().split(RECORD_SEPARATOR) {
        let record = record.trim();
        if record.is_empty() {
            continue;
        }
        let key = decode_record(record)?;
        if seen.insert(key.clone()) {
            changed.push(key);
        }
    }
    Ok(changed)
}

fn decode_record(record: &str) -> Result<ListenKey> {
    let fields: Vec<&str> = record.split(FIELD_SEPARATOR).collect();
    let (data_id, group, namespace_id) = match fields.as_slice() {
        [data_id, group] => (*data_id, *group, DEFAULT_NAMESPACE_ID),
        [data_id, group, namespace_id] => (*data_id, *group, *namespace_id),
        _ => {
            return Err(WatchError::Protocol(format!(
                "expected 2 or 3 fields, got {} in record '{}'",
                fields.len(),
                record.escape_debug()
            )));
        }
    };

    ListenKey::new(namespace_id, group, data_id).map_err(|e| {
        WatchError::Protocol(format!("invalid record '{}': {}", record.escape_debug(), e))
    })
}
