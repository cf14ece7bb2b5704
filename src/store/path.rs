//! Slash-separated locations in the shared state tree.

use std::fmt;

use super::StoreError;

const FORBIDDEN_CHARS: [char; 5] = ['.', '#', '$', '[', ']'];

/// A normalized path into the state tree. The empty path is the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StatePath {
    segments: Vec<String>,
}

impl StatePath {
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a `/`-separated path. Empty segments are dropped.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPath` if any segment contains `.`, `#`, `$`, `[` or `]`.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let mut segments = Vec::new();
        for segment in raw.split('/') {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            validate_segment(segment).map_err(|()| StoreError::InvalidPath(raw.to_owned()))?;
            segments.push(segment.to_owned());
        }
        Ok(Self { segments })
    }

    /// Append one segment, trimmed the same way [`StatePath::parse`] trims.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPath` if the segment is blank or contains a forbidden character.
    pub fn child(&self, segment: &str) -> Result<Self, StoreError> {
        let segment = segment.trim();
        if segment.is_empty() || segment.contains('/') || validate_segment(segment).is_err() {
            return Err(StoreError::InvalidPath(format!("{self}/{segment}")));
        }
        let mut segments = self.segments.clone();
        segments.push(segment.to_owned());
        Ok(Self { segments })
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, if any.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// True if `self` equals `other` or is one of its ancestors.
    #[must_use]
    pub fn contains(&self, other: &StatePath) -> bool {
        other.segments.len() >= self.segments.len() && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// True if a change at either path can alter the value seen at the other.
    #[must_use]
    pub fn overlaps(&self, other: &StatePath) -> bool {
        self.contains(other) || other.contains(self)
    }
}

fn validate_segment(segment: &str) -> Result<(), ()> {
    if segment.chars().any(|c| FORBIDDEN_CHARS.contains(&c) || c.is_control()) {
        return Err(());
    }
    Ok(())
}

impl fmt::Display for StatePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}
