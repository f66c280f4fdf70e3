//! Growth calculations over chronologically sorted series.

/// Compound annual growth rate (%) from the first to the last value of `values`.
///
/// The exponent is derived from the same slice as the endpoints, so the
/// period count always matches the start/end pair. Returns 0 with fewer than
/// two points or a non-positive endpoint (a fractional power of a negative
/// base is undefined).
pub fn cagr(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let start = values[0];
    let end = values[values.len() - 1];
    if !(start > 0.0 && end > 0.0) || !start.is_finite() || !end.is_finite() {
        return 0.0;
    }
    let periods = (values.len() - 1) as f64;
    ((end / start).powf(1.0 / periods) - 1.0) * 100.0
}

/// CAGR (%) over the last `window_points` values (or all of them if fewer)
pub fn trailing_cagr(values: &[f64], window_points: usize) -> f64 {
    let start = values.len().saturating_sub(window_points);
    cagr(&values[start..])
}

/// Current streak of non-decreasing yearly dividends, counted from the most
/// recent year backward. A year counts only if its dividend is positive and at
/// least the prior year's; the first failure ends the streak.
pub fn consecutive_growth_years(yearly: &[f64]) -> u32 {
    let mut count = 0;
    for pair in yearly.windows(2).rev() {
        let (prior, current) = (pair[0], pair[1]);
        if current > 0.0 && current >= prior {
            count += 1;
        } else {
            break;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cagr_doubling_over_one_period() {
        assert!((cagr(&[100.0, 200.0]) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_cagr_five_periods() {
        // 100 -> 161.051 is 10% compounded over 5 periods
        let values = [100.0, 110.0, 121.0, 133.1, 146.41, 161.051];
        assert!((cagr(&values) - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_cagr_guards() {
        assert_eq!(cagr(&[]), 0.0);
        assert_eq!(cagr(&[5.0]), 0.0);
        assert_eq!(cagr(&[-10.0, 20.0]), 0.0);
        assert_eq!(cagr(&[10.0, -20.0]), 0.0);
        assert_eq!(cagr(&[10.0, 0.0]), 0.0);
    }

    #[test]
    fn test_five_year_window_with_zero_start_returns_zero() {
        let values = [0.0, 10.0, 12.0, 14.0, 16.0, 18.0];
        assert_eq!(trailing_cagr(&values, 6), 0.0);
    }

    #[test]
    fn test_trailing_window_uses_last_points() {
        let values = [1.0, 100.0, 110.0, 121.0];
        let g = trailing_cagr(&values, 3);
        assert!((g - 10.0).abs() < 1e-9);
        // Window larger than the series uses everything
        assert!((trailing_cagr(&[100.0, 121.0], 6) - 21.0).abs() < 1e-9);
    }

    #[test]
    fn test_streak_counts_current_run() {
        assert_eq!(consecutive_growth_years(&[10.0, 12.0, 14.0, 16.0, 18.0]), 4);
        assert_eq!(consecutive_growth_years(&[10.0, 12.0, 14.0, 16.0, 18.0, 11.0]), 0);
    }

    #[test]
    fn test_streak_flat_years_count_and_cut_stops() {
        assert_eq!(consecutive_growth_years(&[20.0, 10.0, 10.0, 12.0]), 2);
        assert_eq!(consecutive_growth_years(&[0.0, 0.0, 0.0]), 0);
        assert_eq!(consecutive_growth_years(&[15.0]), 0);
        assert_eq!(consecutive_growth_years(&[]), 0);
    }
}
