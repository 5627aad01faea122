//! Decimal text parsing and formatting for chart values.
//!
//! Values arrive from the query layer as text and are displayed as text, so
//! both directions go through the same [`NumberFormat`]. The format is plain
//! configuration: build it once, share it, never mutate it.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

lazy_static! {
    static ref SHARED_FORMAT: NumberFormat = NumberFormat::default();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "NumberFormatConfig")]
pub struct NumberFormat {
    pub decimal_separator: char,
    pub grouping_separator: char,
    pub uses_grouping_separator: bool,
    pub maximum_fraction_digits: usize,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            decimal_separator: '.',
            grouping_separator: ',',
            uses_grouping_separator: true,
            maximum_fraction_digits: 3,
        }
    }
}

// Deserialized shape; every field falls back to the default format.
#[derive(Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct NumberFormatConfig {
    decimal_separator: char,
    grouping_separator: char,
    uses_grouping_separator: bool,
    maximum_fraction_digits: usize,
}

impl Default for NumberFormatConfig {
    fn default() -> Self {
        let format = NumberFormat::default();
        Self {
            decimal_separator: format.decimal_separator,
            grouping_separator: format.grouping_separator,
            uses_grouping_separator: format.uses_grouping_separator,
            maximum_fraction_digits: format.maximum_fraction_digits,
        }
    }
}

impl TryFrom<NumberFormatConfig> for NumberFormat {
    type Error = ConfigError;

    fn try_from(config: NumberFormatConfig) -> Result<Self, Self::Error> {
        NumberFormat {
            decimal_separator: config.decimal_separator,
            grouping_separator: config.grouping_separator,
            uses_grouping_separator: config.uses_grouping_separator,
            maximum_fraction_digits: config.maximum_fraction_digits,
        }
        .validate()
    }
}

impl NumberFormat {
    /// More fraction digits than an `f64` carries.
    pub const MAX_FRACTION_DIGITS: usize = 17;

    /// Checks that text in this format reads back unambiguously.
    pub fn validate(self) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| Err(ConfigError::InvalidNumberFormat(reason.to_string()));
        if self.decimal_separator == self.grouping_separator {
            return invalid("decimal and grouping separators are identical");
        }
        for separator in [self.decimal_separator, self.grouping_separator] {
            if separator.is_ascii_digit() || separator == '-' || separator == '+' {
                return invalid("separators cannot be digits or signs");
            }
        }
        if self.maximum_fraction_digits > Self::MAX_FRACTION_DIGITS {
            return invalid("maximumFractionDigits is above 17");
        }
        Ok(self)
    }

    /// The process-wide format used when callers do not inject their own.
    pub fn shared() -> &'static NumberFormat {
        &SHARED_FORMAT
    }

    /// Parses decimal text such as `"1,234.5"`. Returns `None` for anything
    /// that is not a plain decimal number in this format.
    pub fn parse(&self, text: &str) -> Option<f64> {
        let text = text.trim();
        let (negative, unsigned) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };

        let (integer, fraction) = match unsigned.split_once(self.decimal_separator) {
            Some((integer, fraction)) => (integer, fraction),
            None => (unsigned, ""),
        };

        let integer = self.strip_grouping(integer)?;
        if !fraction.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if integer.is_empty() && fraction.is_empty() {
            return None;
        }

        let mut normalized = String::with_capacity(integer.len() + fraction.len() + 2);
        if negative {
            normalized.push('-');
        }
        normalized.push_str(if integer.is_empty() { "0" } else { &integer });
        if !fraction.is_empty() {
            normalized.push('.');
            normalized.push_str(fraction);
        }

        normalized.parse::<f64>().ok()
    }

    /// Formats a value with grouped integer digits and at most
    /// `maximum_fraction_digits` fraction digits, trailing zeros dropped.
    pub fn format(&self, value: f64) -> String {
        if !value.is_finite() {
            return value.to_string();
        }

        let precision = self.maximum_fraction_digits.min(Self::MAX_FRACTION_DIGITS);
        let rendered = format!("{:.*}", precision, value.abs());
        let (integer, fraction) = rendered.split_once('.').unwrap_or((&rendered, ""));
        let fraction = fraction.trim_end_matches('0');

        let mut out = String::with_capacity(rendered.len() + integer.len() / 3 + 1);
        if value < 0.0 && (integer.bytes().any(|b| b != b'0') || !fraction.is_empty()) {
            out.push('-');
        }

        let digits = integer.len();
        for (i, c) in integer.chars().enumerate() {
            if self.uses_grouping_separator && i > 0 && (digits - i) % 3 == 0 {
                out.push(self.grouping_separator);
            }
            out.push(c);
        }

        if !fraction.is_empty() {
            out.push(self.decimal_separator);
            out.push_str(fraction);
        }
        out
    }

    // Integer part with grouping separators removed. Groups after the first
    // must be exactly three digits wide.
    fn strip_grouping(&self, integer: &str) -> Option<String> {
        if !self.uses_grouping_separator || !integer.contains(self.grouping_separator) {
            return integer
                .chars()
                .all(|c| c.is_ascii_digit())
                .then(|| integer.to_string());
        }

        let mut digits = String::with_capacity(integer.len());
        for (i, group) in integer.split(self.grouping_separator).enumerate() {
            let width_ok = if i == 0 {
                (1..=3).contains(&group.len())
            } else {
                group.len() == 3
            };
            if !width_ok || !group.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            digits.push_str(group);
        }
        Some(digits)
    }
}
