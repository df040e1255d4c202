//! Spelling monetary amounts out in English for printed documents.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::services::money::round_money;

const ONES: [&str; 20] = [
    "Zero",
    "One",
    "Two",
    "Three",
    "Four",
    "Five",
    "Six",
    "Seven",
    "Eight",
    "Nine",
    "Ten",
    "Eleven",
    "Twelve",
    "Thirteen",
    "Fourteen",
    "Fifteen",
    "Sixteen",
    "Seventeen",
    "Eighteen",
    "Nineteen",
];

const TENS: [&str; 10] = [
    "", "", "Twenty", "Thirty", "Forty", "Fifty", "Sixty", "Seventy", "Eighty", "Ninety",
];

const SCALES: [(u64, &str); 4] = [
    (1_000_000_000_000, "Trillion"),
    (1_000_000_000, "Billion"),
    (1_000_000, "Million"),
    (1_000, "Thousand"),
];

#[derive(Debug, Error, PartialEq)]
pub enum SpellError {
    #[error("negative amounts cannot be spelled: {0}")]
    Negative(Decimal),
    #[error("amount out of range: {0}")]
    OutOfRange(Decimal),
}

/// Currency unit labels printed after the spelled amount.
#[derive(Debug, Clone)]
pub struct CurrencyLabels {
    pub major: String,
    pub minor: String,
}

impl Default for CurrencyLabels {
    fn default() -> Self {
        Self {
            major: "Dirhams".to_string(),
            minor: "Fils".to_string(),
        }
    }
}

/// Spell a whole number, e.g. `1050` -> "One Thousand Fifty".
pub fn spell_integer(value: u64) -> String {
    if value == 0 {
        return ONES[0].to_string();
    }

    let mut parts: Vec<String> = Vec::new();
    let mut rest = value;

    for (scale, name) in SCALES {
        if rest >= scale {
            parts.push(format!("{} {}", spell_below_thousand(rest / scale), name));
            rest %= scale;
        }
    }

    if rest > 0 {
        parts.push(spell_below_thousand(rest));
    }

    parts.join(" ")
}

fn spell_below_thousand(value: u64) -> String {
    let mut words: Vec<&str> = Vec::new();
    let hundreds = value / 100;
    let rest = value % 100;

    if hundreds > 0 {
        words.push(ONES[hundreds as usize]);
        words.push("Hundred");
    }

    if rest >= 20 {
        words.push(TENS[(rest / 10) as usize]);
        if rest % 10 > 0 {
            words.push(ONES[(rest % 10) as usize]);
        }
    } else if rest > 0 {
        words.push(ONES[rest as usize]);
    }

    words.join(" ")
}

/// Spell an amount with currency labels:
/// `1234.56` -> "One Thousand Two Hundred Thirty Four Dirhams and Fifty Six Fils Only".
pub fn try_amount_in_words(amount: Decimal, labels: &CurrencyLabels) -> Result<String, SpellError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(SpellError::Negative(amount));
    }

    let rounded = round_money(amount);
    let whole = rounded
        .trunc()
        .to_u64()
        .ok_or(SpellError::OutOfRange(amount))?;
    let minor = ((rounded - rounded.trunc()) * Decimal::ONE_HUNDRED)
        .round()
        .to_u64()
        .ok_or(SpellError::OutOfRange(amount))?;

    let mut text = format!("{} {}", spell_integer(whole), labels.major);
    if minor > 0 {
        text.push_str(&format!(" and {} {}", spell_integer(minor), labels.minor));
    }
    text.push_str(" Only");

    Ok(text)
}

/// Like [`try_amount_in_words`], falling back to a plain numeric string.
pub fn amount_in_words(amount: Decimal, labels: &CurrencyLabels) -> String {
    try_amount_in_words(amount, labels).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Falling back to numeric amount text");
        format!("{} {}", amount, labels.major)
    })
}
