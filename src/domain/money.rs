use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

/// Amounts are exact decimals so that splitting never accumulates binary
/// floating-point error. Only display and emitted settlements are rounded.
pub type Amount = Decimal;

/// Number of decimal places used for currency display.
pub const CURRENCY_DP: u32 = 2;

/// Largest amount a single expense may carry: one trillion.
///
/// Balances are sums of many expenses, so individual amounts must stay far
/// below `Decimal::MAX` for those sums to remain representable.
pub const MAX_EXPENSE_AMOUNT: Amount = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// Add two amounts, clamping to `Decimal::MAX` / `Decimal::MIN` instead of
/// panicking when the result is out of range.
pub fn saturating_add(a: Amount, b: Amount) -> Amount {
    a.checked_add(b).unwrap_or(if b.is_sign_negative() {
        Decimal::MIN
    } else {
        Decimal::MAX
    })
}

/// Sum amounts with [`saturating_add`].
pub fn saturating_sum<I: IntoIterator<Item = Amount>>(amounts: I) -> Amount {
    amounts.into_iter().fold(Decimal::ZERO, saturating_add)
}

/// Round an amount to whole cents, midpoint away from zero.
/// Example: 15.005 -> 15.01, 33.333 -> 33.33
pub fn round_to_cents(amount: Amount) -> Amount {
    amount.round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an amount as a two-decimal string.
/// Example: 15 -> "15.00", -12.345 -> "-12.35"
pub fn format_amount(amount: Amount) -> String {
    let rounded = round_to_cents(amount);
    // Avoid printing "-0.00" for dust that rounds away.
    let rounded = if rounded.is_zero() {
        Decimal::ZERO
    } else {
        rounded
    };
    format!("{:.2}", rounded)
}

/// Parse user-supplied decimal text into an amount.
/// Example: "30" -> 30, "12.5" -> 12.5, ".50" -> 0.50
pub fn parse_amount(input: &str) -> Result<Amount, ParseAmountError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseAmountError::Empty);
    }

    // rust_decimal rejects a bare leading dot, which people type all the time.
    let normalized = if let Some(rest) = input.strip_prefix('.') {
        format!("0.{}", rest)
    } else if let Some(rest) = input.strip_prefix("-.") {
        format!("-0.{}", rest)
    } else {
        input.to_string()
    };

    Decimal::from_str(&normalized).map_err(|_| ParseAmountError::InvalidFormat(input.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAmountError {
    Empty,
    InvalidFormat(String),
}

impl fmt::Display for ParseAmountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAmountError::Empty => write!(f, "amount is empty"),
            ParseAmountError::InvalidFormat(input) => {
                write!(f, "invalid amount format: '{}'", input)
            }
        }
    }
}

impl std::error::Error for ParseAmountError {}
