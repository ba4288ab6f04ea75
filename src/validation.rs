//! Display-name validation and note sanitization.
//!
//! Account names arrive from the game server or the admin CLI and end up in
//! chat broadcasts, leaderboards, and transaction notes, so they are checked
//! once at the boundary and stored trimmed.

use std::collections::HashSet;

/// Default byte ceiling for transaction notes.
pub const DEFAULT_NOTE_MAX_BYTES: usize = 120;

/// Display-name validation errors with helpful messages.
#[derive(Debug, thiserror::Error)]
pub enum NameError {
    #[error("name is too short (minimum {min} characters)")]
    TooShort { min: usize },

    #[error("name is too long (maximum {max} characters)")]
    TooLong { max: usize },

    #[error("name cannot start or end with whitespace")]
    InvalidWhitespace,

    #[error("name contains invalid characters: {chars}")]
    InvalidCharacters { chars: String },

    #[error("name is reserved")]
    Reserved,
}

/// Name validation rules configuration.
#[derive(Debug, Clone)]
pub struct NameRules {
    pub min_length: usize,
    pub max_length: usize,
    pub allow_spaces: bool,
    pub allow_unicode: bool,
}

impl NameRules {
    /// Strict rules for player account names as the game server reports them.
    pub fn player() -> Self {
        NameRules {
            min_length: 2,
            max_length: 16,
            allow_spaces: false,
            allow_unicode: false,
        }
    }

    /// Permissive rules for admin-set display names and nicknames.
    pub fn display() -> Self {
        NameRules {
            min_length: 2,
            max_length: 32,
            allow_spaces: true,
            allow_unicode: true,
        }
    }
}

/// Names that would collide with broadcast targets or built-in ledger
/// counterparties.
fn reserved_names() -> HashSet<&'static str> {
    [
        "server", "console", "system", "admin", "administrator", "operator",
        "everyone", "all", "nobody",
        "bank", "shop", "market", "auction", "village",
    ]
    .iter()
    .copied()
    .collect()
}

/// Validate a display name according to the given rules. Returns the
/// trimmed name on success.
pub fn validate_display_name(name: &str, rules: &NameRules) -> Result<String, NameError> {
    let trimmed = name.trim();

    if trimmed.len() < rules.min_length {
        return Err(NameError::TooShort {
            min: rules.min_length,
        });
    }
    if trimmed.len() > rules.max_length {
        return Err(NameError::TooLong {
            max: rules.max_length,
        });
    }

    if trimmed != name {
        return Err(NameError::InvalidWhitespace);
    }

    if reserved_names().contains(&trimmed.to_lowercase().as_str()) {
        return Err(NameError::Reserved);
    }

    let mut invalid_chars = Vec::new();
    for ch in trimmed.chars() {
        let valid = if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || ch == '.' {
            true
        } else if ch == ' ' {
            rules.allow_spaces
        } else if !ch.is_ascii() && !ch.is_control() {
            rules.allow_unicode
        } else {
            false
        };
        if !valid {
            invalid_chars.push(ch);
        }
    }

    if !invalid_chars.is_empty() {
        let unique_chars: HashSet<char> = invalid_chars.into_iter().collect();
        let chars_str: String = unique_chars.into_iter().collect();
        return Err(NameError::InvalidCharacters { chars: chars_str });
    }

    Ok(trimmed.to_string())
}

/// Clean a transaction note for storage. Control characters are dropped and
/// inner whitespace collapses to single spaces; the result is truncated to
/// `max_bytes` on a character boundary. Notes are cosmetic, so bad input is
/// repaired rather than rejected.
pub fn sanitize_note(note: &str, max_bytes: usize) -> String {
    let cleaned: String = note
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect();
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut out = String::with_capacity(collapsed.len().min(max_bytes));
    for ch in collapsed.chars() {
        if out.len() + ch.len_utf8() > max_bytes {
            break;
        }
        out.push(ch);
    }
    out
}
