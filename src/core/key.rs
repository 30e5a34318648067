//! Identity of a watched configuration.

use crate::core::Fingerprint;
use crate::error::{Result, WatchError};
use std::fmt;

/// Namespace used when the caller does not name one.
pub const DEFAULT_NAMESPACE_ID: &str = "public";

/// Group used when the caller does not name one.
pub const DEFAULT_GROUP: &str = "DEFAULT_GROUP";

/// Separates the records of a long-poll body.
pub const RECORD_SEPARATOR: char = '\u{1}';

/// Separates the fields of a single long-poll record.
pub const FIELD_SEPARATOR: char = '\u{2}';

/// Canonical identity of a watched configuration: `(namespace, group, data id)`.
///
/// Empty namespace and group fall back to [`DEFAULT_NAMESPACE_ID`] and
/// [`DEFAULT_GROUP`]. No component may contain the wire delimiters, so a key
/// that constructs successfully always encodes unambiguously.
///
/// # Examples
///
/// ```rust
/// use nacos_config_watch::core::ListenKey;
///
/// let key = ListenKey::new("", "", "app.properties").unwrap();
/// assert_eq!(key.namespace_id(), "public");
/// assert_eq!(key.group(), "DEFAULT_GROUP");
/// assert!(key.is_default_namespace());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenKey {
    namespace_id: String,
    group: String,
    data_id: String,
}

impl ListenKey {
    /// Create a key, applying defaults and validating every component.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::InvalidKey`] if `data_id` is empty or any
    /// component contains a reserved delimiter character.
    pub fn new(namespace_id: &str, group: &str, data_id: &str) -> Result<Self> {
        let namespace_id = non_empty_or(namespace_id, DEFAULT_NAMESPACE_ID);
        let group = non_empty_or(group, DEFAULT_GROUP);
        let data_id = data_id.trim();

        if data_id.is_empty() {
            return Err(WatchError::InvalidKey("dataId must not be empty".to_string()));
        }
        for (field, value) in [("namespaceId", namespace_id), ("group", group), ("dataId", data_id)] {
            if value.contains([RECORD_SEPARATOR, FIELD_SEPARATOR]) {
                return Err(WatchError::InvalidKey(format!(
                    "{} '{}' contains a reserved control character",
                    field,
                    value.escape_debug()
                )));
            }
        }

        Ok(Self {
            namespace_id: namespace_id.to_string(),
            group: group.to_string(),
            data_id: data_id.to_string(),
        })
    }

    /// The namespace (tenant) of this key.
    pub fn namespace_id(&self) -> &str {
        &self.namespace_id
    }

    /// The group of this key.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// The data id of this key.
    pub fn data_id(&self) -> &str {
        &self.data_id
    }

    /// Whether the key lives in the default namespace, which is omitted on the wire.
    pub fn is_default_namespace(&self) -> bool {
        self.namespace_id == DEFAULT_NAMESPACE_ID
    }

    /// Append this key's long-poll token to `out`.
    ///
    /// The token is `dataId FS group FS fingerprint [FS namespaceId] RS`.
    pub fn write_token(&self, fingerprint: &Fingerprint, out: &mut String) {
        out.push_str(&self.data_id);
        out.push(FIELD_SEPARATOR);
        out.push_str(&self.group);
        out.push(FIELD_SEPARATOR);
        out.push_str(fingerprint.as_str());
        if !self.is_default_namespace() {
            out.push(FIELD_SEPARATOR);
            out.push_str(&self.namespace_id);
        }
        out.push(RECORD_SEPARATOR);
    }
}

impl fmt::Display for ListenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace_id, self.group, self.data_id)
    }
}

fn non_empty_or<'a>(value: &'a str, default: &'a str) -> &'a str {
    let value = value.trim();
    if value.is_empty() { default } else { value }
}
