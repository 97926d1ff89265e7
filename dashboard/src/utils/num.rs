/// Parses a display figure, treating anything unparsable as zero.
///
/// Wire amounts arrive as decimal strings and consumers only ever need
/// display precision, so the coercion mirrors what the figures tolerate:
/// an absent or malformed value counts as nothing.
pub fn parse_f64_or_zero(value: &str) -> f64 {
    value.trim().parse().unwrap_or(0.0)
}

/// Like [`parse_f64_or_zero`], but junk poisons the result with NaN.
///
/// Used for sums whose finiteness decides source precedence: one malformed
/// remote figure must disqualify the whole remote total, not silently count
/// as zero. Empty strings still coerce to zero.
pub fn parse_f64_or_nan(value: &str) -> f64 {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    trimmed.parse().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_coercion_swallows_junk() {
        assert_eq!(parse_f64_or_zero("12.5"), 12.5);
        assert_eq!(parse_f64_or_zero(""), 0.0);
        assert_eq!(parse_f64_or_zero("junk"), 0.0);
        assert_eq!(parse_f64_or_zero(" 3 "), 3.0);
    }

    #[test]
    fn nan_coercion_poisons_junk_but_not_emptiness() {
        assert_eq!(parse_f64_or_nan("12.5"), 12.5);
        assert_eq!(parse_f64_or_nan(""), 0.0);
        assert!(parse_f64_or_nan("junk").is_nan());
    }
}
