use alloy_primitives::utils::{format_units, parse_units};
use alloy_primitives::U256;

use crate::error::EthError;

/// Decimals assumed for both native and token amounts.
///
/// Token contracts are not asked for their `decimals()`; a token with a
/// different scale will be over- or under-sent.
pub const ASSUMED_DECIMALS: u8 = 18;

/// Converts a decimal amount string into base units (`amount × 10^18`).
///
/// Exact: no floating point. Signs, exponents, empty input, and more than 18
/// fractional digits are rejected instead of being rounded.
pub fn parse_amount(amount: &str) -> Result<U256, EthError> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(EthError::InvalidAmount("empty amount".into()));
    }
    if amount.starts_with('-') {
        return Err(EthError::InvalidAmount(format!("negative amount: {amount}")));
    }

    let (whole, fraction) = match amount.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (amount, ""),
    };
    let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !digits_only(whole) || !digits_only(fraction) || (whole.is_empty() && fraction.is_empty())
    {
        return Err(EthError::InvalidAmount(format!("not a decimal number: {amount}")));
    }
    if fraction.len() > ASSUMED_DECIMALS as usize {
        return Err(EthError::InvalidAmount(format!(
            "more than {ASSUMED_DECIMALS} fractional digits: {amount}"
        )));
    }

    parse_units(amount, ASSUMED_DECIMALS)
        .map(|units| units.get_absolute())
        .map_err(|e| EthError::InvalidAmount(format!("{amount}: {e}")))
}

/// Renders base units as a decimal string with `decimals` fractional digits.
pub fn format_amount(value: U256, decimals: u8) -> String {
    format_units(value, decimals).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wei(s: &str) -> U256 {
        U256::from_str_radix(s, 10).unwrap()
    }

    #[test]
    fn whole_amount() {
        assert_eq!(parse_amount("1").unwrap(), wei("1000000000000000000"));
        assert_eq!(parse_amount("0").unwrap(), U256::ZERO);
    }

    #[test]
    fn fractional_amount_is_exact() {
        assert_eq!(parse_amount("0.1").unwrap(), wei("100000000000000000"));
        assert_eq!(parse_amount("1.5").unwrap(), wei("1500000000000000000"));
        assert_eq!(parse_amount(".5").unwrap(), wei("500000000000000000"));
    }

    #[test]
    fn smallest_unit() {
        assert_eq!(parse_amount("0.000000000000000001").unwrap(), U256::from(1u8));
    }

    #[test]
    fn too_many_fractional_digits_rejected() {
        assert!(matches!(
            parse_amount("0.0000000000000000001"),
            Err(EthError::InvalidAmount(_))
        ));
    }

    #[test]
    fn garbage_rejected() {
        for bad in ["", "-1", "abc", "1e18", "1.2.3", ".", "1,5", "+1"] {
            assert!(
                matches!(parse_amount(bad), Err(EthError::InvalidAmount(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn amounts_beyond_u128() {
        let big = parse_amount("1000000000000000000000").unwrap();
        assert_eq!(big, wei("1000000000000000000000000000000000000000"));
    }

    #[test]
    fn format_round_trips_display() {
        let formatted = format_amount(wei("1500000000000000000"), 18);
        assert!(formatted.starts_with("1.5"));
    }
}
