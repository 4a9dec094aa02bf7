use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Identifier assigned to a node when it is created.
///
/// A `UniqueId` is a fixed-length, random, URL-safe string. It doubles as the
/// tree segment name of the node folder, so it must never contain `/`.
/// Ordering is plain ordinal string comparison, which is what keeps sibling
/// traversal deterministic.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UniqueId(String);

impl UniqueId {
    /// Number of characters in every id.
    pub const LENGTH: usize = 12;

    /// Generate a fresh random id.
    pub fn create() -> Self {
        let mut rng = rand::thread_rng();
        let id: String = (0..Self::LENGTH)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        Self(id)
    }

    /// Validate and wrap an existing id string.
    pub fn parse(value: &str) -> Result<Self, TypeError> {
        if value.len() != Self::LENGTH {
            return Err(TypeError::InvalidUniqueId {
                value: value.to_string(),
                reason: format!("expected {} characters, got {}", Self::LENGTH, value.len()),
            });
        }
        if let Some(bad) = value.bytes().find(|b| !ALPHABET.contains(b)) {
            return Err(TypeError::InvalidUniqueId {
                value: value.to_string(),
                reason: format!("character {:?} is not url-safe", bad as char),
            });
        }
        Ok(Self(value.to_string()))
    }

    /// The id as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for UniqueId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UniqueId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UniqueId> for String {
    fn from(id: UniqueId) -> Self {
        id.0
    }
}

impl AsRef<str> for UniqueId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UniqueId({})", self.0)
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
