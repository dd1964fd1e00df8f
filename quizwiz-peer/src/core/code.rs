//! Session Codes
//!
//! A session code is the host's connectable address: four characters a
//! participant can read off a projector and type on a phone.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Characters a code is drawn from. `I`, `1`, `0` and `O` are left out.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of characters in a code.
pub const CODE_LENGTH: usize = 4;

/// A validated, upper-case session code.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionCode(String);

impl SessionCode {
    /// Issue a fresh code from the thread-local RNG.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    /// Issue a code from the given RNG.
    ///
    /// Uniqueness across independent sessions is not checked here; the link
    /// refuses to open an id that is already registered.
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..CODE_LENGTH)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Parse user input. Surrounding whitespace is trimmed and letters are
    /// upper-cased before validation.
    pub fn parse(input: &str) -> Result<Self, CodeError> {
        let normalized = input.trim().to_ascii_uppercase();
        let len = normalized.chars().count();
        if len != CODE_LENGTH {
            return Err(CodeError::WrongLength(len));
        }
        if let Some(c) = normalized.chars().find(|c| !c.is_ascii() || !CODE_ALPHABET.contains(&(*c as u8))) {
            return Err(CodeError::InvalidCharacter(c));
        }
        Ok(Self(normalized))
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionCode {
    type Err = CodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SessionCode {
    type Error = CodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SessionCode> for String {
    fn from(code: SessionCode) -> Self {
        code.0
    }
}

/// Reasons a typed code is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeError {
    /// Code does not have exactly four characters.
    #[error("code must be 4 characters, got {0}")]
    WrongLength(usize),

    /// Code contains a character outside the alphabet.
    #[error("code contains invalid character {0:?}")]
    InvalidCharacter(char),
}
