//! Dot-delimited scope paths.

use std::fmt;

use crate::error::{Error, Result};

/// A validated scope path such as `user.1.name`.
///
/// Segments are non-empty runs of ASCII letters, digits, `_` or `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopePath(String);

impl ScopePath {
    pub fn parse(path: &str) -> Result<Self> {
        let valid = !path.is_empty()
            && path.split('.').all(|segment| {
                !segment.is_empty()
                    && segment
                        .bytes()
                        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
            });
        if !valid {
            tracing::warn!(path, "invalid scope path");
            return Err(Error::InvalidScope(path.to_string()));
        }
        Ok(Self(path.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.0.split('.').count()
    }

    /// This path and each of its ancestors, most specific first.
    ///
    /// `user.1.name` yields `user.1.name`, `user.1`, `user`.
    pub fn ancestors(&self) -> impl Iterator<Item = &str> {
        std::iter::successors(Some(self.0.as_str()), |current| {
            current.rfind('.').map(|dot| &current[..dot])
        })
    }
}

impl fmt::Display for ScopePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
