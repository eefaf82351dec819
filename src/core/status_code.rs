//! Type-safe git file status codes.
//!
//! This module defines [`StatusCode`], the single-character code git prints for
//! each side (index and worktree) of a porcelain status record.
//!
//! # Public API
//! - [`StatusCode`]: Enumeration of all porcelain v1 status codes

use serde::{Deserialize, Serialize};
use std::fmt;

/// One side of a porcelain `XY` status pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    /// No change on this side (' ')
    Unmodified,
    /// Modified (M)
    Modified,
    /// Type changed (T)
    TypeChanged,
    /// Added (A)
    Added,
    /// Deleted (D)
    Deleted,
    /// Renamed (R)
    Renamed,
    /// Copied (C)
    Copied,
    /// Unmerged (U)
    Unmerged,
    /// Untracked (?)
    Untracked,
    /// Ignored (!)
    Ignored,
}

impl StatusCode {
    /// Decode a porcelain status byte. Unknown bytes yield `None`.
    pub fn from_byte(byte: u8) -> Option<Self> {
        let code = match byte {
            b' ' => StatusCode::Unmodified,
            b'M' => StatusCode::Modified,
            b'T' => StatusCode::TypeChanged,
            b'A' => StatusCode::Added,
            b'D' => StatusCode::Deleted,
            b'R' => StatusCode::Renamed,
            b'C' => StatusCode::Copied,
            b'U' => StatusCode::Unmerged,
            b'?' => StatusCode::Untracked,
            b'!' => StatusCode::Ignored,
            _ => return None,
        };
        Some(code)
    }

    pub fn as_char(&self) -> char {
        match self {
            StatusCode::Unmodified => ' ',
            StatusCode::Modified => 'M',
            StatusCode::TypeChanged => 'T',
            StatusCode::Added => 'A',
            StatusCode::Deleted => 'D',
            StatusCode::Renamed => 'R',
            StatusCode::Copied => 'C',
            StatusCode::Unmerged => 'U',
            StatusCode::Untracked => '?',
            StatusCode::Ignored => '!',
        }
    }

    /// Get human-readable description for status
    pub fn label(&self) -> &'static str {
        match self {
            StatusCode::Unmodified => "",
            StatusCode::Modified => "modified",
            StatusCode::TypeChanged => "type changed",
            StatusCode::Added => "new",
            StatusCode::Deleted => "deleted",
            StatusCode::Renamed => "renamed",
            StatusCode::Copied => "copied",
            StatusCode::Unmerged => "unmerged",
            StatusCode::Untracked => "untracked",
            StatusCode::Ignored => "ignored",
        }
    }

    /// Renames and copies carry an extra original-path field.
    pub fn has_origin(&self) -> bool {
        matches!(self, StatusCode::Renamed | StatusCode::Copied)
    }

    /// Whether this side records a change (neither unmodified nor untracked).
    pub fn is_change(&self) -> bool {
        !matches!(self, StatusCode::Unmodified | StatusCode::Untracked)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_byte_round_trips_known_codes() {
        for byte in b" MTADRCU?!" {
            let code = StatusCode::from_byte(*byte).unwrap();
            assert_eq!(code.as_char(), *byte as char);
        }
        assert_eq!(StatusCode::from_byte(b'X'), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", StatusCode::Modified), "M");
        assert_eq!(format!("{}", StatusCode::Untracked), "?");
    }

    #[test]
    fn test_properties() {
        assert!(StatusCode::Renamed.has_origin());
        assert!(StatusCode::Copied.has_origin());
        assert!(!StatusCode::Modified.has_origin());

        assert!(StatusCode::Modified.is_change());
        assert!(!StatusCode::Unmodified.is_change());
        assert!(!StatusCode::Untracked.is_change());
        assert_eq!(StatusCode::Added.label(), "new");
    }
}
