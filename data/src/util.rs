/// Abbreviates volume-scale numbers for axis and cell labels.
pub fn abbr_large_numbers(value: f32) -> String {
    let abs = value.abs();
    let sign = if value < 0.0 { "-" } else { "" };

    match abs {
        v if v >= 1_000_000_000.0 => format!("{}{:.2}b", sign, v / 1_000_000_000.0),
        v if v >= 1_000_000.0 => format!("{}{:.2}m", sign, v / 1_000_000.0),
        v if v >= 1_000.0 => format!("{}{:.1}k", sign, v / 1_000.0),
        v if v >= 100.0 => format!("{}{:.0}", sign, v),
        v if v >= 1.0 => format!("{}{:.1}", sign, v),
        _ => format!("{}{:.2}", sign, abs),
    }
}

/// Delta labels carry an explicit sign so a positive print reads as flow,
/// not as a plain count.
pub fn abbr_signed(value: f32) -> String {
    if value > 0.0 {
        format!("+{}", abbr_large_numbers(value))
    } else {
        abbr_large_numbers(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviates_by_magnitude() {
        assert_eq!(abbr_large_numbers(2_340_000_000.0), "2.34b");
        assert_eq!(abbr_large_numbers(1_250_000.0), "1.25m");
        assert_eq!(abbr_large_numbers(12_500.0), "12.5k");
        assert_eq!(abbr_large_numbers(250.0), "250");
        assert_eq!(abbr_large_numbers(7.25), "7.2");
        assert_eq!(abbr_large_numbers(0.5), "0.50");
    }

    #[test]
    fn negative_values_keep_the_sign() {
        assert_eq!(abbr_large_numbers(-12_500.0), "-12.5k");
        assert_eq!(abbr_signed(-250.0), "-250");
        assert_eq!(abbr_signed(250.0), "+250");
        assert_eq!(abbr_signed(0.0), "0.00");
    }
}
