//! Session token generation
//!
//! Tokens are typed by hand on a phone or a keypad, so the default alphabet
//! leaves out characters that are easy to misread (`0`, `1`, `O`, `I`, `l`).

use rand::Rng;
use serde::{Deserialize, Serialize};

const ALPHANUMERIC: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
const NUMERIC: &[u8] = b"0123456789";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenAlphabet {
    /// Letters and digits without visually ambiguous characters
    Alphanumeric,
    /// Digits only, for numeric-keypad entry
    Numeric,
}

impl TokenAlphabet {
    pub fn chars(self) -> &'static [u8] {
        match self {
            TokenAlphabet::Alphanumeric => ALPHANUMERIC,
            TokenAlphabet::Numeric => NUMERIC,
        }
    }
}

/// Draws fixed-length tokens from an alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGenerator {
    pub length: usize,
    pub alphabet: TokenAlphabet,
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self {
            length: shared::TOKEN_LENGTH,
            alphabet: TokenAlphabet::Alphanumeric,
        }
    }
}

impl TokenGenerator {
    pub fn generate<R: Rng>(&self, rng: &mut R) -> String {
        let chars = self.alphabet.chars();
        (0..self.length)
            .map(|_| chars[rng.gen_range(0..chars.len())] as char)
            .collect()
    }

    /// True when `token` could have come from this generator.
    pub fn is_well_formed(&self, token: &str) -> bool {
        token.len() == self.length && token.bytes().all(|b| self.alphabet.chars().contains(&b))
    }
}
