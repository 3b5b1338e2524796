//! Conversion between raw ledger integers and decimal display values.
//!
//! Everything is integer arithmetic on 256-bit values; a display value is
//! the raw value shifted by `decimals` places with trailing zeros trimmed.

use crate::error::{Result, TlError};
use alloy::primitives::{I256, Sign, U256};
use serde::{Deserialize, Serialize};

/// Decimals of the native coin (gas price, balances).
pub const ETH_DECIMALS: u8 = 18;
/// 10^77 is the largest power of ten that fits into 256 bits.
pub const MAX_DECIMALS: u8 = 77;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub raw: String,
    pub value: String,
    pub decimals: u8,
}

impl Amount {
    pub fn from_raw(raw: I256, decimals: u8) -> Result<Self> {
        Ok(Self {
            raw: raw.to_string(),
            value: calc_value(raw, decimals)?,
            decimals,
        })
    }

    pub fn from_unsigned(raw: U256, decimals: u8) -> Result<Self> {
        Self::from_raw(to_signed(raw)?, decimals)
    }

    pub fn raw_value(&self) -> Result<I256> {
        parse_raw(&self.raw)
    }
}

/// Wrap a raw decimal integer string (as sent by the relay) into an
/// [`Amount`].
pub fn format_to_amount(raw: &str, decimals: u8) -> Result<Amount> {
    Amount::from_raw(parse_raw(raw)?, decimals)
}

pub fn parse_raw(raw: &str) -> Result<I256> {
    I256::from_dec_str(raw.trim())
        .map_err(|e| TlError::invalid_argument(format!("raw amount {:?}: {}", raw, e)))
}

pub fn calc_value(raw: I256, decimals: u8) -> Result<String> {
    let abs = raw.unsigned_abs();
    let divisor = pow10(decimals)?;
    let whole = abs / divisor;
    let remainder = abs % divisor;

    let mut value = whole.to_string();
    if !remainder.is_zero() {
        let fraction = format!("{:0>width$}", remainder.to_string(), width = decimals as usize);
        value.push('.');
        value.push_str(fraction.trim_end_matches('0'));
    }
    if raw.is_negative() {
        value.insert(0, '-');
    }
    Ok(value)
}

/// Parse a decimal display value into raw units. Inputs with more
/// fractional digits than `decimals` are rejected rather than rounded.
pub fn calc_raw(value: &str, decimals: u8) -> Result<I256> {
    let trimmed = value.trim();
    let (sign, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (Sign::Negative, rest),
        None => (Sign::Positive, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));

    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty()) || !is_digits(int_part) || !is_digits(frac_part)
    {
        return Err(TlError::invalid_argument(format!(
            "{:?} is not a decimal number",
            value
        )));
    }
    pow10(decimals)?;
    if frac_part.len() > decimals as usize {
        return Err(TlError::invalid_argument(format!(
            "{:?} has more than {} decimal places",
            value, decimals
        )));
    }

    let digits = format!("{}{:0<width$}", int_part, frac_part, width = decimals as usize);
    let abs = U256::from_str_radix(&digits, 10)
        .map_err(|e| TlError::invalid_argument(format!("{:?}: {}", value, e)))?;
    I256::checked_from_sign_and_abs(sign, abs)
        .ok_or_else(|| TlError::invalid_argument(format!("{:?} overflows int256", value)))
}

/// Check that `value` is a decimal number, at whatever precision it is
/// written in.
pub fn check_decimal(value: &str) -> Result<()> {
    let places = value.trim().split_once('.').map_or(0, |(_, frac)| frac.len());
    let decimals = u8::try_from(places)
        .ok()
        .filter(|d| *d <= MAX_DECIMALS)
        .ok_or_else(|| {
            TlError::invalid_argument(format!("{:?} has too many decimal places", value))
        })?;
    calc_raw(value, decimals).map(|_| ())
}

pub(crate) fn to_signed(raw: U256) -> Result<I256> {
    I256::checked_from_sign_and_abs(Sign::Positive, raw)
        .ok_or_else(|| TlError::invalid_argument(format!("{} overflows int256", raw)))
}

fn pow10(decimals: u8) -> Result<U256> {
    if decimals > MAX_DECIMALS {
        return Err(TlError::invalid_argument(format!(
            "decimals must be at most {}, got {}",
            MAX_DECIMALS, decimals
        )));
    }
    Ok(U256::from(10u64).pow(U256::from(decimals)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> I256 {
        I256::try_from(v).unwrap()
    }

    #[test]
    fn test_format_to_amount() {
        let amount = format_to_amount("123", 2).unwrap();
        assert_eq!(amount.value, "1.23");
        assert_eq!(amount.raw, "123");
        assert_eq!(amount.decimals, 2);

        assert_eq!(format_to_amount("100", 2).unwrap().value, "1");
        assert_eq!(format_to_amount("5", 2).unwrap().value, "0.05");
        assert_eq!(format_to_amount("0", 18).unwrap().value, "0");
        assert_eq!(format_to_amount("-150", 2).unwrap().value, "-1.5");
        assert_eq!(format_to_amount("42", 0).unwrap().value, "42");
        assert_eq!(
            format_to_amount("1000000000000000000", ETH_DECIMALS)
                .unwrap()
                .value,
            "1"
        );
    }

    #[test]
    fn format_rejects_garbage() {
        assert!(format_to_amount("1.5", 2).is_err());
        assert!(format_to_amount("abc", 2).is_err());
        assert!(format_to_amount("1", 78).is_err());
    }

    #[test]
    fn test_calc_raw() {
        assert_eq!(calc_raw("1.23", 2).unwrap(), int(123));
        assert_eq!(calc_raw("1", 2).unwrap(), int(100));
        assert_eq!(calc_raw("0.5", 1).unwrap(), int(5));
        assert_eq!(calc_raw(".5", 1).unwrap(), int(5));
        assert_eq!(calc_raw("5.", 1).unwrap(), int(50));
        assert_eq!(calc_raw("-0.05", 2).unwrap(), int(-5));
        assert_eq!(calc_raw("+7", 0).unwrap(), int(7));
        assert_eq!(calc_raw(" 2.5 ", 3).unwrap(), int(2500));
    }

    #[test]
    fn calc_raw_never_rounds() {
        let err = calc_raw("1.234", 2).unwrap_err();
        assert!(matches!(err, TlError::InvalidArgument(_)));
    }

    #[test]
    fn calc_raw_rejects_non_decimal_input() {
        for input in ["", ".", "-", "1e5", "1,5", "0x10", "1.2.3", "--1"] {
            assert!(calc_raw(input, 2).is_err(), "{:?} should be rejected", input);
        }
        assert!(calc_raw("1", MAX_DECIMALS + 1).is_err());
    }

    #[test]
    fn check_decimal_uses_the_written_precision() {
        for input in ["1", "12", "100", "0.5", "-3.25", "99999999999999999999"] {
            assert!(check_decimal(input).is_ok(), "{:?} should be accepted", input);
        }
        for input in ["", "abc", "1.2.3", "1e5"] {
            assert!(check_decimal(input).is_err(), "{:?} should be rejected", input);
        }
        let too_precise = format!("0.{}", "1".repeat(MAX_DECIMALS as usize + 1));
        assert!(check_decimal(&too_precise).is_err());
    }

    #[test]
    fn large_values_are_exact() {
        let raw = calc_raw("123456789012345678.901234567890123456", 18).unwrap();
        assert_eq!(raw.to_string(), "123456789012345678901234567890123456");
        assert_eq!(
            calc_value(raw, 18).unwrap(),
            "123456789012345678.901234567890123456"
        );
    }

    #[test]
    fn value_and_raw_agree() {
        for (value, decimals) in [("0.01", 2u8), ("-12.5", 4), ("1000", 0), ("0.000001", 18)] {
            let raw = calc_raw(value, decimals).unwrap();
            assert_eq!(calc_value(raw, decimals).unwrap(), value);
        }
    }

    #[test]
    fn unsigned_amounts() {
        let wei = U256::from(21_000u64) * U256::from(1_000_000_000u64);
        let amount = Amount::from_unsigned(wei, ETH_DECIMALS).unwrap();
        assert_eq!(amount.value, "0.000021");
        assert_eq!(amount.raw_value().unwrap(), int(21_000_000_000_000));
        assert!(to_signed(U256::MAX).is_err());
    }
}
