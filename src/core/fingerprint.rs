//! Content fingerprints used for change detection.

use std::fmt;

/// Digest of the last content observed for a key.
///
/// The fingerprint is the lowercase hex MD5 of the content, the same digest a
/// Nacos server compares against. Before the first observation (or after the
/// server reported the configuration missing) it is absent, which encodes as
/// an empty string.
///
/// # Examples
///
/// ```rust
/// use nacos_config_watch::core::Fingerprint;
///
/// let fp = Fingerprint::of("a=1");
/// assert!(!fp.is_absent());
/// assert_ne!(fp, Fingerprint::of("a=2"));
/// assert_eq!(Fingerprint::absent().as_str(), "");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Fingerprint(Option<String>);

impl Fingerprint {
    /// Fingerprint of the given content.
    pub fn of(content: &str) -> Self {
        Self(Some(format!("{:x}", md5::compute(content.as_bytes()))))
    }

    /// The fingerprint of a key that has not been observed.
    pub fn absent() -> Self {
        Self(None)
    }

    /// Whether no content has been observed.
    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }

    /// Wire representation: the hex digest, or `""` when absent.
    pub fn as_str(&self) -> &str {
        self.0.as_deref().unwrap_or("")
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(digest) => f.write_str(digest),
            None => f.write_str("<absent>"),
        }
    }
}
