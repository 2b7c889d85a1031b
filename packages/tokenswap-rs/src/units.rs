//! Decimal amount conversion
//!
//! Amounts are decimal strings at the edges and 18-decimal fixed-point
//! integers on-chain. No other precision is supported.

use alloy::primitives::{
    utils::{format_units, parse_units},
    U256,
};

use crate::error::WalletError;

/// Fractional digits used by TokenA, TokenB and the native currency
pub const TOKEN_DECIMALS: u8 = 18;

/// Convert a human decimal string into base units.
///
/// Accepts digits with at most one `.` and no more than 18 fractional digits.
/// Signs, exponents, separators and empty input are rejected.
pub fn to_base_units(amount: &str) -> Result<U256, WalletError> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(WalletError::invalid_amount(amount, "amount is empty"));
    }

    let (int_part, frac_part) = match trimmed.split_once('.') {
        Some((i, f)) => (i, f),
        None => (trimmed, ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(WalletError::invalid_amount(amount, "amount has no digits"));
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(WalletError::invalid_amount(
            amount,
            "only digits and a single decimal point are allowed",
        ));
    }
    if frac_part.len() > TOKEN_DECIMALS as usize {
        return Err(WalletError::invalid_amount(
            amount,
            format!("more than {} fractional digits", TOKEN_DECIMALS),
        ));
    }

    let normalized = match (int_part.is_empty(), frac_part.is_empty()) {
        (true, _) => format!("0.{}", frac_part),
        (false, true) => int_part.to_string(),
        (false, false) => format!("{}.{}", int_part, frac_part),
    };

    parse_units(&normalized, TOKEN_DECIMALS)
        .map(|parsed| parsed.get_absolute())
        .map_err(|e| WalletError::invalid_amount(amount, e.to_string()))
}

/// Convert base units into a canonical decimal string.
///
/// Trailing fractional zeros and a dangling decimal point are dropped, so
/// `10 * 10^18` renders as `"10"` and `15 * 10^17` as `"1.5"`.
pub fn from_base_units(raw: U256) -> String {
    let formatted = match format_units(raw, TOKEN_DECIMALS) {
        Ok(s) => s,
        // 18 is always a valid unit; fall back to the raw integer if not
        Err(_) => return raw.to_string(),
    };

    if formatted.contains('.') {
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        formatted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wei(tokens: u64) -> U256 {
        U256::from(tokens) * U256::from(10u64).pow(U256::from(18u64))
    }

    #[test]
    fn test_whole_amount() {
        assert_eq!(to_base_units("10").unwrap(), wei(10));
        assert_eq!(from_base_units(wei(10)), "10");
    }

    #[test]
    fn test_fractional_amount() {
        assert_eq!(
            to_base_units("1.5").unwrap(),
            U256::from(1_500_000_000_000_000_000u128)
        );
        assert_eq!(to_base_units(".5").unwrap(), U256::from(500_000_000_000_000_000u128));
        assert_eq!(to_base_units("2.").unwrap(), wei(2));
    }

    #[test]
    fn test_smallest_unit() {
        let one_wei = to_base_units("0.000000000000000001").unwrap();
        assert_eq!(one_wei, U256::from(1u64));
        assert_eq!(from_base_units(one_wei), "0.000000000000000001");
    }

    #[test]
    fn test_zero() {
        assert_eq!(to_base_units("0").unwrap(), U256::ZERO);
        assert_eq!(from_base_units(U256::ZERO), "0");
    }

    #[test]
    fn test_rejects_malformed_input() {
        for bad in ["", "   ", ".", "-1", "+1", "1e18", "1,000", "1.2.3", "abc", "0x10"] {
            let err = to_base_units(bad).unwrap_err();
            assert!(
                matches!(err, WalletError::InvalidAmount { .. }),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_rejects_excess_precision() {
        assert!(to_base_units("0.0000000000000000001").is_err());
    }

    #[test]
    fn test_round_trip_canonical_strings() {
        for amount in [
            "0",
            "1",
            "10",
            "0.1",
            "1.5",
            "123456789.987654321",
            "0.000000000000000001",
            "99999999999999999999.999999999999999999",
        ] {
            let raw = to_base_units(amount).unwrap();
            assert_eq!(from_base_units(raw), amount);
        }
    }

    #[test]
    fn test_round_trip_preserves_value_for_non_canonical_input() {
        for amount in ["007", "1.500", ".25", "3.", "0010.0100"] {
            let raw = to_base_units(amount).unwrap();
            let back = from_base_units(raw);
            assert_eq!(to_base_units(&back).unwrap(), raw, "{} -> {}", amount, back);
        }
        assert_eq!(from_base_units(to_base_units("1.500").unwrap()), "1.5");
    }
}
