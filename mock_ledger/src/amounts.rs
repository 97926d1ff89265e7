use alloy::primitives::{I256, U256};

/// Renders a base-unit amount as a human-readable decimal string.
///
/// The whole part is the exact integer quotient against `10^decimals`. The
/// fractional remainder is truncated, never rounded, zero-padded out to
/// `decimals` digits and then stripped of trailing zeros. A zero remainder
/// renders as the whole part alone, with no decimal point.
///
/// # Arguments
///
/// * `amount` - The amount in base units
/// * `decimals` - The number of decimals of the asset (0 to 30)
///
/// # Returns
///
/// Returns the decimal string representation
pub fn to_human(amount: U256, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }

    let scale = U256::from(10).pow(U256::from(decimals));
    let whole = amount / scale;
    let frac = amount % scale;

    if frac.is_zero() {
        return whole.to_string();
    }

    let digits = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}

/// Converts a base-unit amount into a USD display string at the given price.
///
/// The amount goes through [`to_human`] first and the multiplication runs in
/// `f64`, so the result carries display precision only. Exact arithmetic
/// stays on the base-unit integers.
///
/// # Arguments
///
/// * `amount` - The amount in base units
/// * `decimals` - The number of decimals of the asset
/// * `price_usd` - The asset price in USD
///
/// # Returns
///
/// Returns the USD value as a display string
pub fn to_usd(amount: U256, decimals: u8, price_usd: f64) -> String {
    let human: f64 = to_human(amount, decimals).parse().unwrap_or(0.0);
    format!("{}", human * price_usd)
}

/// Signed companion of [`to_human`].
///
/// Negative balances only appear when a caller skips the eligibility checks,
/// but the projections stay total: the magnitude is rendered through the
/// unsigned codec with a leading sign.
pub fn signed_to_human(amount: I256, decimals: u8) -> String {
    if amount.is_negative() {
        format!("-{}", to_human(amount.unsigned_abs(), decimals))
    } else {
        to_human(amount.unsigned_abs(), decimals)
    }
}

/// Signed companion of [`to_usd`].
pub fn signed_to_usd(amount: I256, decimals: u8, price_usd: f64) -> String {
    let human: f64 = signed_to_human(amount, decimals).parse().unwrap_or(0.0);
    format!("{}", human * price_usd)
}

/// Parses a human-readable decimal string back into base units.
///
/// Fractional digits beyond `decimals` are truncated. Anything that is not a
/// plain non-negative decimal number returns `None`.
///
/// # Arguments
///
/// * `text` - The decimal string, e.g. "1.5"
/// * `decimals` - The number of decimals of the asset
///
/// # Returns
///
/// Returns the base-unit amount, or `None` on malformed input
pub fn human_to_base_units(text: &str, decimals: u8) -> Option<U256> {
    let text = text.trim();
    let (whole_part, frac_part) = match text.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (text, ""),
    };

    if whole_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !frac_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let scale = U256::from(10).pow(U256::from(decimals));
    let whole = if whole_part.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole_part, 10).ok()?
    };

    let truncated: String = frac_part.chars().take(decimals as usize).collect();
    let frac = if truncated.is_empty() {
        U256::ZERO
    } else {
        let padded = format!("{:0<width$}", truncated, width = decimals as usize);
        U256::from_str_radix(&padded, 10).ok()?
    };

    whole.checked_mul(scale)?.checked_add(frac)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(value: u128) -> U256 {
        U256::from(value)
    }

    #[test]
    fn renders_fractional_amounts() {
        assert_eq!(to_human(u(1_234_567), 6), "1.234567");
        assert_eq!(to_human(u(1_234_500), 6), "1.2345");
        assert_eq!(to_human(u(1), 6), "0.000001");
        assert_eq!(to_human(u(10_000_000_001), 8), "100.00000001");
    }

    #[test]
    fn strips_zero_fractions_entirely() {
        assert_eq!(to_human(u(1_000_000), 6), "1");
        assert_eq!(to_human(u(5_000_000_000), 6), "5000");
        assert_eq!(to_human(U256::ZERO, 18), "0");
    }

    #[test]
    fn zero_decimals_is_the_plain_integer() {
        assert_eq!(to_human(u(42), 0), "42");
    }

    #[test]
    fn usd_uses_display_precision() {
        assert_eq!(to_usd(u(5_000_000_000), 6, 1.0), "5000");
        assert_eq!(to_usd(u(200_000_000), 8, 40_000.0), "80000");
        assert_eq!(to_usd(u(1_500_000), 6, 2.0), "3");
        assert_eq!(to_usd(u(1_000_001), 6, 1.0), "1.000001");
    }

    #[test]
    fn signed_amounts_carry_the_sign() {
        let minus_one_token = I256::try_from(-1_000_000i64).unwrap();
        assert_eq!(signed_to_human(minus_one_token, 6), "-1");
        assert_eq!(signed_to_usd(minus_one_token, 6, 2.0), "-2");
        assert_eq!(signed_to_human(I256::try_from(1_500_000i64).unwrap(), 6), "1.5");
    }

    #[test]
    fn parses_human_amounts_back_to_base_units() {
        assert_eq!(human_to_base_units("1.5", 6), Some(u(1_500_000)));
        assert_eq!(human_to_base_units("1", 6), Some(u(1_000_000)));
        assert_eq!(human_to_base_units("0.000001", 6), Some(u(1)));
        assert_eq!(human_to_base_units(".5", 6), Some(u(500_000)));
        assert_eq!(human_to_base_units("1000", 0), Some(u(1000)));
    }

    #[test]
    fn parse_truncates_excess_fractional_digits() {
        assert_eq!(human_to_base_units("1.2345678", 6), Some(u(1_234_567)));
        assert_eq!(human_to_base_units("0.9999999", 6), Some(u(999_999)));
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert_eq!(human_to_base_units("", 6), None);
        assert_eq!(human_to_base_units(".", 6), None);
        assert_eq!(human_to_base_units("-1", 6), None);
        assert_eq!(human_to_base_units("1.2.3", 6), None);
        assert_eq!(human_to_base_units("abc", 6), None);
        assert_eq!(human_to_base_units("1.2a", 6), None);
    }

    #[test]
    fn round_trips_through_the_codec() {
        for (text, decimals) in [("1.234567", 6u8), ("0.00000001", 8), ("5000", 6), ("10", 18)] {
            let base = human_to_base_units(text, decimals).unwrap();
            assert_eq!(to_human(base, decimals), text);
        }
    }
}
