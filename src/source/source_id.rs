//! Host source identification.

use std::sync::Arc;

/// Identifier of a host source, as stored in the `audio_source` setting.
///
/// Hosts typically use a UUID string. Cloning is an `Arc` pointer copy.
///
/// # Example
///
/// ```
/// use branch_output::SourceId;
///
/// let mic = SourceId::new("b8f3e1c0-mic");
/// assert_eq!(mic, SourceId::from("b8f3e1c0-mic"));
/// assert_eq!(mic.as_str(), "b8f3e1c0-mic");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(Arc<str>);

impl SourceId {
    /// Creates a source id from a string.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SourceId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_id_equality() {
        assert_eq!(SourceId::new("a"), SourceId::from(String::from("a")));
        assert_ne!(SourceId::new("a"), SourceId::new("b"));
    }

    #[test]
    fn test_source_id_display() {
        assert_eq!(SourceId::new("uuid-1").to_string(), "uuid-1");
    }
}
