use crate::model::Candle;

/// Percent change of the closing price over `lookback` periods.
///
/// A series with `len() <= lookback` yields `0.0` rather than an
/// error: short history is expected for newly listed instruments and
/// must not distort the table.
pub fn percent_change(candles: &[Candle], lookback: usize) -> f64 {
    if candles.len() <= lookback {
        return 0.0;
    }

    let current = candles[candles.len() - 1].close;
    let previous = candles[candles.len() - 1 - lookback].close;
    let change = ((current - previous) / previous) * 100.0;

    (change * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn series(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .map(|&close| Candle {
                open_time: Utc::now(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 0.0,
            })
            .collect()
    }

    #[test]
    fn short_series_falls_back_to_zero() {
        assert_eq!(percent_change(&series(&[]), 1), 0.0);
        assert_eq!(percent_change(&series(&[100.0]), 1), 0.0);
        assert_eq!(percent_change(&series(&[100.0, 110.0]), 7), 0.0);
    }

    #[test]
    fn two_point_gain() {
        assert_eq!(percent_change(&series(&[100.0, 110.0]), 1), 10.0);
    }

    #[test]
    fn two_point_loss() {
        assert_eq!(percent_change(&series(&[200.0, 190.0]), 1), -5.0);
    }

    #[test]
    fn rounds_to_two_decimals() {
        // 3/900 * 100 = 0.3333... -> 0.33
        assert_eq!(percent_change(&series(&[900.0, 903.0]), 1), 0.33);
    }

    #[test]
    fn lookback_spans_multiple_periods() {
        let candles = series(&[100.0, 50.0, 25.0, 120.0]);
        assert_eq!(percent_change(&candles, 3), 20.0);
    }
}
