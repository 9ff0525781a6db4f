use rust_decimal::Decimal;

/// Format a decimal as a dollar amount with thousands separators: $1,234.56
pub fn money(val: Decimal) -> String {
    let negative = val < Decimal::ZERO;
    let cents = format!("{:.2}", val.abs().round_dp(2));
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative {
        format!("-${with_commas}.{dec_part}")
    } else {
        format!("${with_commas}.{dec_part}")
    }
}

/// One decimal place, e.g. `95.0%`.
pub fn percent(val: f64) -> String {
    format!("{val:.1}%")
}

pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(dec!(1234.56)), "$1,234.56");
        assert_eq!(money(dec!(-500.00)), "-$500.00");
        assert_eq!(money(dec!(0)), "$0.00");
        assert_eq!(money(dec!(1000000.99)), "$1,000,000.99");
        assert_eq!(money(dec!(42.1)), "$42.10");
        assert_eq!(money(dec!(3)), "$3.00");
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(95.0), "95.0%");
        assert_eq!(percent(33.33), "33.3%");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
