/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

//! Interned short identifiers packed into 64 bits.
//!
//! An atom is a string of up to 10 characters drawn from a 63-symbol
//! alphabet (digits, `:`, ASCII letters), packed 6 bits per character into
//! a `u64`. Atoms compare and hash as plain integers, which makes them
//! cheap message discriminators; the kernel's control messages
//! (`:Link`, `:Unlink`, `:KillProxy`, `:Exit`) are atoms.
//!
//! # Encoding
//!
//! Characters are looked up in a fixed table; index 0 is reserved as the
//! terminator so leading characters are unambiguous. Encoding shifts each
//! 6-bit index in from the right:
//!
//! ```text
//! value = 0
//! for c in text: value = (value << 6) | index(c)
//! ```
//!
//! Decoding peels 6-bit groups back off and reverses them. The mapping is
//! exact in both directions for every valid atom.

use std::fmt;

use crate::common::MeshError;

/// Maximum number of characters in an atom.
pub const MAX_ATOM_LEN: usize = 10;

/// The 6-bit alphabet. Index 0 is the terminator and never maps to a
/// character; valid atom characters occupy indices 1..=63.
const ALPHABET: &[u8; 63] = b"0123456789:ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

fn char_index(c: char) -> Option<u64> {
    let b = u8::try_from(c).ok()?;
    ALPHABET
        .iter()
        .position(|&a| a == b)
        .map(|i| i as u64 + 1)
}

fn index_char(idx: u64) -> Option<char> {
    if (1..=63).contains(&idx) {
        Some(ALPHABET[(idx - 1) as usize] as char)
    } else {
        None
    }
}

/// A short identifier packed into a `u64`.
///
/// Construct with [`Atom::parse`] (fallible) or the [`atom`] convenience
/// function (panics on invalid input). The raw value is stable across
/// processes: two atoms built from the same text are bit-identical
/// everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(u64);

impl Atom {
    /// Parses an atom from text.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::BadFormat`] if the text is empty, longer than
    /// [`MAX_ATOM_LEN`] characters, or contains a character outside the
    /// atom alphabet.
    pub fn parse(text: &str) -> Result<Self, MeshError> {
        if text.is_empty() {
            return Err(MeshError::BadFormat("empty atom".to_string()));
        }
        if text.chars().count() > MAX_ATOM_LEN {
            return Err(MeshError::BadFormat(format!(
                "atom longer than {MAX_ATOM_LEN} characters: {text}"
            )));
        }
        let mut value = 0u64;
        for c in text.chars() {
            let idx = char_index(c).ok_or_else(|| {
                MeshError::BadFormat(format!("character {c:?} not allowed in atom {text:?}"))
            })?;
            value = (value << 6) | idx;
        }
        Ok(Self(value))
    }

    /// Wraps a raw packed value without validation.
    ///
    /// Used by deserializers that already carry the packed form. Values
    /// that were not produced by the atom encoding render as the empty
    /// string.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// The packed 64-bit value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut value = self.0;
        let mut chars = Vec::with_capacity(MAX_ATOM_LEN);
        while value != 0 {
            if let Some(c) = index_char(value & 0x3F) {
                chars.push(c);
            }
            value >>= 6;
        }
        for c in chars.iter().rev() {
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

/// Builds an atom from a literal.
///
/// # Panics
///
/// Panics if the text is not a valid atom. Use [`Atom::parse`] for
/// untrusted input.
#[must_use]
pub fn atom(text: &str) -> Atom {
    match Atom::parse(text) {
        Ok(a) => a,
        Err(e) => panic!("invalid atom literal {text:?}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for text in [":Link", ":Unlink", ":KillProxy", ":Exit", "quit", "0", "zZ9:aA"] {
            let a = atom(text);
            assert_eq!(a.to_string(), text, "round-trip failed for {text:?}");
            assert_eq!(Atom::parse(&a.to_string()).unwrap(), a);
        }
    }

    #[test]
    fn test_same_text_same_value() {
        assert_eq!(atom("quit"), atom("quit"));
        assert_ne!(atom("quit"), atom("quip"));
    }

    #[test]
    fn test_max_length() {
        let ten = "abcdefghij";
        assert_eq!(atom(ten).to_string(), ten);
        assert!(Atom::parse("abcdefghijk").is_err());
    }

    #[test]
    fn test_rejects_invalid_characters() {
        assert!(Atom::parse("has space").is_err());
        assert!(Atom::parse("dash-ed").is_err());
        assert!(Atom::parse("").is_err());
    }

    #[test]
    fn test_raw_survives() {
        let a = atom("quit");
        assert_eq!(Atom::from_raw(a.raw()), a);
        assert_eq!(Atom::from_raw(a.raw()).to_string(), "quit");
    }
}
