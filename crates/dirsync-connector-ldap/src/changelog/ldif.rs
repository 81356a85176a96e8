//! Tokenizer for the LDIF fragment carried by a changelog record.
//!
//! The `changes` attribute of a change record holds a small piece of LDIF
//! describing the attribute deltas. It is folded like any LDIF file and may
//! carry base64 values (`attr:: ...`). Vendors are not consistent about
//! blank lines and `-` separators, so tokenizing is lenient: lines that do
//! not parse are dropped instead of failing the record.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::warn;

/// One token of a changelog LDIF fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Blank line between two records.
    RecordSeparator,
    /// A `-` line closing one attribute block of a `modify` change.
    AttributeSeparator,
    /// An `attribute: value` line. `raw_value` starts with `:` when the
    /// value is base64 encoded.
    Pair { name: String, raw_value: String },
}

impl Token {
    /// Create a pair token.
    pub fn pair(name: impl Into<String>, raw_value: impl Into<String>) -> Self {
        Token::Pair {
            name: name.into(),
            raw_value: raw_value.into(),
        }
    }
}

/// Join folded lines.
///
/// A physical line starting with a single space continues the previous
/// logical line, without that space.
pub fn unfold(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();

    for physical in text.split('\n') {
        let physical = physical.strip_suffix('\r').unwrap_or(physical);
        if let Some(continuation) = physical.strip_prefix(' ') {
            if let Some(previous) = lines.last_mut() {
                previous.push_str(continuation);
                continue;
            }
            lines.push(continuation.to_string());
        } else {
            lines.push(physical.to_string());
        }
    }

    lines
}

/// Tokenize an LDIF fragment.
///
/// Consecutive separators of the same kind collapse into one, lines without
/// a `name:` prefix are skipped, and the sequence always ends with a
/// [`Token::RecordSeparator`].
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();

    for line in unfold(text) {
        if line.trim().is_empty() {
            push_separator(&mut tokens, Token::RecordSeparator);
        } else if line.starts_with('-') {
            push_separator(&mut tokens, Token::AttributeSeparator);
        } else if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            tokens.push(Token::pair(name, value.trim()));
        }
    }

    if tokens.last() != Some(&Token::RecordSeparator) {
        tokens.push(Token::RecordSeparator);
    }

    tokens
}

fn push_separator(tokens: &mut Vec<Token>, separator: Token) {
    if tokens.last() != Some(&separator) {
        tokens.push(separator);
    }
}

/// Decode the raw value of a [`Token::Pair`].
///
/// Values starting with `:` are base64. Returns `None` when such a value
/// does not decode.
pub fn decode_value(raw_value: &str) -> Option<Vec<u8>> {
    match raw_value.strip_prefix(':') {
        Some(encoded) => match STANDARD.decode(encoded.trim()) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(error = %e, "Dropping undecodable base64 value in changelog LDIF");
                None
            }
        },
        None => Some(raw_value.as_bytes().to_vec()),
    }
}
