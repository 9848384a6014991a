use crate::error::{Result, TerminalError};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Default cap on the number of digits in the formatted amount ("9999999.99").
pub const DEFAULT_MAX_DIGITS: usize = 9;

const BACKSPACE: u32 = 8;
const ENTER: u32 = 13;

/// A discrete key event coming from the amount field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Digit(u8),
    Backspace,
    Submit,
    /// Anything else. Left to the native input handling.
    Other(u32),
}

impl Key {
    /// Maps a browser key code (top row and numpad digits, backspace, enter).
    pub fn from_key_code(code: u32) -> Self {
        match code {
            BACKSPACE => Key::Backspace,
            ENTER => Key::Submit,
            48..=57 => Key::Digit((code - 48) as u8),
            96..=105 => Key::Digit((code - 96) as u8),
            other => Key::Other(other),
        }
    }
}

/// What the accumulator did with a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Updated,
    /// The digit would push the amount past the digit cap; nothing changed.
    Rejected,
    Submit,
    PassThrough,
}

/// Turns digit and backspace keys into a bounded two-decimal amount.
///
/// Digits shift in from the right: typing `1`, `2`, `3` yields `0.01`, `0.12`,
/// `1.23`. Backspace shifts the value back down, dropping the least
/// significant entered digit rather than a trailing character.
#[derive(Debug, Clone, PartialEq)]
pub struct AmountAccumulator {
    value: Decimal,
    max_digits: usize,
}

impl AmountAccumulator {
    pub fn new(max_digits: usize) -> Self {
        Self {
            value: Decimal::ZERO,
            max_digits,
        }
    }

    /// Builds an accumulator from the raw field contents.
    ///
    /// Malformed, negative or over-cap contents count as zero.
    pub fn from_field(raw: &str, max_digits: usize) -> Self {
        let mut accumulator = Self::new(max_digits);
        accumulator.load(raw);
        accumulator
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    /// The field contents, always a fixed two-decimal string.
    pub fn display(&self) -> String {
        format_fixed(self.value, 2)
    }

    pub fn reset(&mut self) {
        self.value = Decimal::ZERO;
    }

    pub fn load(&mut self, raw: &str) {
        let max_digits = self.max_digits;
        self.value = Decimal::from_str(raw.trim())
            .ok()
            .filter(|value| !value.is_sign_negative())
            .map(|value| value.round_dp_with_strategy(2, RoundingStrategy::ToZero))
            .filter(|value| digit_count(&format_fixed(*value, 2)) <= max_digits)
            .unwrap_or(Decimal::ZERO);
    }

    pub fn apply(&mut self, key: Key) -> KeyOutcome {
        match key {
            Key::Digit(digit) if digit <= 9 => {
                let next = (self.value * Decimal::TEN + Decimal::new(i64::from(digit), 2))
                    .round_dp_with_strategy(2, RoundingStrategy::ToZero);
                if digit_count(&format_fixed(next, 2)) > self.max_digits {
                    return KeyOutcome::Rejected;
                }
                self.value = next;
                KeyOutcome::Updated
            }
            Key::Backspace => {
                self.value = (self.value * Decimal::TEN).floor() / Decimal::ONE_HUNDRED;
                KeyOutcome::Updated
            }
            Key::Submit => KeyOutcome::Submit,
            Key::Digit(_) | Key::Other(_) => KeyOutcome::PassThrough,
        }
    }
}

/// Validates a submitted amount against the minimum and the digit cap.
pub fn parse_amount(raw: &str, min_amount: Decimal, max_digits: usize) -> Result<Decimal> {
    let amount = Decimal::from_str(raw.trim())
        .map_err(|_| TerminalError::InvalidInput(format!("'{}' is not a number", raw.trim())))?;
    if amount < min_amount {
        return Err(TerminalError::InvalidInput(format!(
            "amount must be at least {}",
            min_amount
        )));
    }
    if amount.normalize().scale() > 2 {
        return Err(TerminalError::InvalidInput(
            "amount has more than two decimal places".to_string(),
        ));
    }
    if digit_count(&format_fixed(amount, 2)) > max_digits {
        return Err(TerminalError::InvalidInput(format!(
            "amount exceeds {} digits",
            max_digits
        )));
    }
    Ok(amount)
}

/// Renders `value` with exactly `places` fractional digits, rounding half away from zero.
pub fn format_fixed(value: Decimal, places: u32) -> String {
    let mut rounded = value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(places);
    rounded.to_string()
}

fn digit_count(formatted: &str) -> usize {
    formatted.chars().filter(char::is_ascii_digit).count()
}
