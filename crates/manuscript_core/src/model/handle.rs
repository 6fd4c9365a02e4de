//! Item handle identity.
//!
//! # Responsibility
//! - Define the stable identifier shared by items, nodes and content files.
//! - Validate handle text coming from snapshots and the content directory.
//!
//! # Invariants
//! - A `Handle` is always exactly 13 lowercase hex digits.
//! - Generated handles carry at most 52 bits of entropy.

use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Number of random bits encoded in one handle.
pub const HANDLE_BITS: u32 = 52;
/// Mask selecting the handle bits from a raw 64-bit draw.
pub const HANDLE_MASK: u64 = (1 << HANDLE_BITS) - 1;

static HANDLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-f0-9]{13}$").expect("valid handle regex"));

/// Returns whether `value` is a well-formed handle string.
pub fn is_handle(value: &str) -> bool {
    HANDLE_RE.is_match(value)
}

/// Handle text validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    /// Text is not 13 lowercase hex digits.
    Malformed(String),
}

impl Display for HandleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(value) => write!(f, "malformed item handle `{value}`"),
        }
    }
}

impl Error for HandleError {}

/// Stable identifier of one project item.
///
/// The handle doubles as the content file stem, so it is kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(String);

impl Handle {
    /// Parses and validates handle text.
    pub fn parse(value: &str) -> Result<Self, HandleError> {
        if is_handle(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(HandleError::Malformed(value.to_string()))
        }
    }

    /// Formats the low 52 bits of `bits` as a handle.
    pub fn from_bits(bits: u64) -> Self {
        Self(format!("{:013x}", bits & HANDLE_MASK))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Handle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Handle {
    type Err = HandleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for Handle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
