//! Short access codes handed out to raters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Characters a code may contain (lowercase ASCII letters and digits).
pub const ACCESS_CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Access code length in characters.
pub const ACCESS_CODE_LEN: usize = 4;

/// Returned when a string is not a well-formed access code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("access code must be 4 lowercase letters or digits")]
pub struct InvalidAccessCode;

/// A 4-character access code matching `^[a-z0-9]{4}$`.
///
/// The only way to obtain one is through [`AccessCode::parse`] (or `FromStr`),
/// so holding an `AccessCode` means the format has been checked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessCode(String);

impl AccessCode {
    pub fn parse(s: &str) -> Result<Self, InvalidAccessCode> {
        if s.len() == ACCESS_CODE_LEN && s.bytes().all(|b| ACCESS_CODE_ALPHABET.contains(&b)) {
            Ok(Self(s.to_owned()))
        } else {
            Err(InvalidAccessCode)
        }
    }

    /// Build a code from alphabet positions (taken modulo the alphabet size),
    /// e.g. as drawn by a random generator.
    pub fn from_alphabet_indices(indices: [usize; ACCESS_CODE_LEN]) -> Self {
        Self(
            indices
                .iter()
                .map(|&i| ACCESS_CODE_ALPHABET[i % ACCESS_CODE_ALPHABET.len()] as char)
                .collect(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for AccessCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccessCode {
    type Err = InvalidAccessCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AccessCode {
    type Error = InvalidAccessCode;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<AccessCode> for String {
    fn from(code: AccessCode) -> Self {
        code.0
    }
}

impl AsRef<str> for AccessCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
