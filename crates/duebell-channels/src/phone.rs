//! Phone number → WhatsApp address normalization.
//!
//! Numbers come from client records typed by humans: spaces, dashes, `+`,
//! parentheses and trunk zeros all show up. WhatsApp wants the bare
//! international digit string followed by the direct-chat suffix.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Suffix WhatsApp uses for one-to-one chats (groups use `@g.us`).
pub const DIRECT_PEER_SUFFIX: &str = "@c.us";
/// Fewer digits than this cannot be a dialable number.
pub const MIN_DIGITS: usize = 8;
/// At this length the number is assumed to already carry its country code.
pub const INTERNATIONAL_MIN_DIGITS: usize = 11;

/// The raw phone string had too few digits to address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid phone number: {digits} digit(s), need at least {MIN_DIGITS}")]
pub struct InvalidPhoneError {
    /// Digits left after stripping everything else.
    pub digits: usize,
}

/// Canonical WhatsApp chat identifier, e.g. `50688881234@c.us`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelAddress(String);

impl ChannelAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The digit part, without the chat suffix.
    pub fn number(&self) -> &str {
        self.0.strip_suffix(DIRECT_PEER_SUFFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for ChannelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Convert a raw phone string into a [`ChannelAddress`].
///
/// 1. Every non-digit character is dropped.
/// 2. Fewer than [`MIN_DIGITS`] digits is an error.
/// 3. Numbers with [`INTERNATIONAL_MIN_DIGITS`] or more digits are used as-is;
///    shorter ones lose their leading zeros and get `default_country_code`
///    (itself reduced to digits, so `"+506"` works) prepended.
/// 4. [`DIRECT_PEER_SUFFIX`] is appended.
pub fn normalize_phone(
    raw: &str,
    default_country_code: &str,
) -> Result<ChannelAddress, InvalidPhoneError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() < MIN_DIGITS {
        return Err(InvalidPhoneError {
            digits: digits.len(),
        });
    }

    let number = if digits.len() >= INTERNATIONAL_MIN_DIGITS {
        digits
    } else {
        let country: String = default_country_code
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        format!("{country}{}", digits.trim_start_matches('0'))
    };

    Ok(ChannelAddress(format!("{number}{DIRECT_PEER_SUFFIX}")))
}
