//! Rolling-window indicator math over ordered daily close/volume series.
//!
//! Every function takes the full ascending series and returns a vector of
//! the same length, `None` wherever the window is not yet full. All
//! computations are strictly causal: the value at index `i` depends only
//! on observations at or before `i`.

/// Simple moving average over the last `period` values.
///
/// `None` until `period` observations exist (inclusive of the current
/// one); never computed on a short window.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let mut window_sum: f64 = values[..period].iter().sum();
    out[period - 1] = Some(window_sum / period as f64);

    for i in period..values.len() {
        window_sum += values[i] - values[i - period];
        out[i] = Some(window_sum / period as f64);
    }

    out
}

/// Rolling sample standard deviation (n-1 denominator) over `period` values
pub fn rolling_std(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period < 2 || values.len() < period {
        return out;
    }

    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (period - 1) as f64;
        out[i] = Some(var.sqrt());
    }

    out
}

/// Bollinger Bands: middle = SMA, upper/lower = middle +/- k standard
/// deviations, width = (upper - lower) / middle
#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
    pub width: Vec<Option<f64>>,
}

pub fn bollinger(closes: &[f64], period: usize, k: f64) -> BollingerBands {
    let middle = sma(closes, period);
    let std = rolling_std(closes, period);

    let mut upper = vec![None; closes.len()];
    let mut lower = vec![None; closes.len()];
    let mut width = vec![None; closes.len()];

    for i in 0..closes.len() {
        if let (Some(m), Some(s)) = (middle[i], std[i]) {
            let u = m + k * s;
            let l = m - k * s;
            upper[i] = Some(u);
            lower[i] = Some(l);
            if m != 0.0 {
                width[i] = Some((u - l) / m);
            }
        }
    }

    BollingerBands { upper, middle, lower, width }
}

/// Exponential moving average with smoothing 2/(period+1), seeded by the
/// simple average of the first `period` values
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut current: f64 = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(current);

    for i in period..values.len() {
        current = alpha * values[i] + (1.0 - alpha) * current;
        out[i] = Some(current);
    }

    out
}

/// MACD line, signal line and histogram
#[derive(Debug, Clone, PartialEq)]
pub struct Macd {
    pub macd: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

/// MACD: macd = EMA(fast) - EMA(slow), signal = EMA(signal_period) of the
/// macd line, histogram = macd - signal.
///
/// The macd line starts once the slow EMA is seeded; the signal line is
/// seeded from the first `signal_period` macd values, so it (and the
/// histogram) starts `signal_period - 1` observations later.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal_period: usize) -> Macd {
    let n = closes.len();
    let ema_fast = ema(closes, fast);
    let ema_slow = ema(closes, slow);

    let mut macd_line = vec![None; n];
    for i in 0..n {
        if let (Some(f), Some(s)) = (ema_fast[i], ema_slow[i]) {
            macd_line[i] = Some(f - s);
        }
    }

    let mut signal = vec![None; n];
    let mut histogram = vec![None; n];
    if n >= slow {
        // The macd line is dense from index slow-1 onward; run the signal
        // EMA over that suffix and map it back.
        let offset = slow - 1;
        let dense: Vec<f64> = macd_line[offset..].iter().map(|v| v.unwrap_or(0.0)).collect();
        let signal_dense = ema(&dense, signal_period);
        for (j, value) in signal_dense.into_iter().enumerate() {
            if let Some(s) = value {
                let i = offset + j;
                signal[i] = Some(s);
                histogram[i] = macd_line[i].map(|m| m - s);
            }
        }
    }

    Macd { macd: macd_line, signal, histogram }
}

/// RSI with Wilder smoothing.
///
/// Average gain/loss are seeded with a simple mean of the first `period`
/// deltas, then exponentially smoothed with factor 1/period. `None`
/// before `period + 1` observations. When the average loss is zero the
/// RSI is 100; the output always lies in [0, 100].
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut out = vec![None; n];
    if period == 0 || n < period + 1 {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let delta = closes[i] - closes[i - 1];
        if delta > 0.0 {
            avg_gain += delta;
        } else {
            avg_loss += -delta;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    for i in (period + 1)..n {
        let delta = closes[i] - closes[i - 1];
        let (gain, loss) = if delta > 0.0 { (delta, 0.0) } else { (0.0, -delta) };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        out[i] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// Doji: the body is at most `body_ratio` of the day's range.
///
/// A zero-range bar is a doji only when the body is also zero.
pub fn is_doji(open: f64, high: f64, low: f64, close: f64, body_ratio: f64) -> bool {
    let body = (close - open).abs();
    let range = high - low;
    if range <= 0.0 {
        return body == 0.0;
    }
    body <= body_ratio * range
}

/// Hammer: lower shadow at least twice the body, with a small upper
/// shadow (body sits in the upper part of the range)
pub fn is_hammer(open: f64, high: f64, low: f64, close: f64) -> bool {
    let range = high - low;
    let body = (close - open).abs();
    if range <= 0.0 || body <= 0.0 {
        return false;
    }
    let upper_shadow = high - open.max(close);
    let lower_shadow = open.min(close) - low;
    lower_shadow >= 2.0 * body && upper_shadow <= 0.1 * range
}

/// Golden cross: the short MA was at or below the long MA yesterday and
/// is above it today. False (not null) unless both MAs are defined on
/// both days.
pub fn cross_up(
    short_prev: Option<f64>,
    long_prev: Option<f64>,
    short_cur: Option<f64>,
    long_cur: Option<f64>,
) -> bool {
    match (short_prev, long_prev, short_cur, long_cur) {
        (Some(sp), Some(lp), Some(sc), Some(lc)) => sp <= lp && sc > lc,
        _ => false,
    }
}

/// Death cross: mirror of [`cross_up`]
pub fn cross_down(
    short_prev: Option<f64>,
    long_prev: Option<f64>,
    short_cur: Option<f64>,
    long_cur: Option<f64>,
) -> bool {
    match (short_prev, long_prev, short_cur, long_cur) {
        (Some(sp), Some(lp), Some(sc), Some(lc)) => sp >= lp && sc < lc,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_window_boundary() {
        let closes = vec![10.0, 11.0, 12.0, 13.0, 14.0, 15.0];
        let ma3 = sma(&closes, 3);

        assert_eq!(ma3[0], None); // window not full
        assert_eq!(ma3[1], None);
        assert_eq!(ma3[2], Some(11.0)); // (10+11+12)/3
        assert_eq!(ma3[3], Some(12.0));
        assert_eq!(ma3[4], Some(13.0));
        assert_eq!(ma3[5], Some(14.0));
    }

    #[test]
    fn test_sma_constant_series() {
        let closes = vec![100.0; 120];
        let ma120 = sma(&closes, 120);
        assert!(ma120[..119].iter().all(Option::is_none));
        assert_eq!(ma120[119], Some(100.0));
    }

    #[test]
    fn test_sma_short_series_all_none() {
        let closes = vec![100.0; 50];
        assert!(sma(&closes, 120).iter().all(Option::is_none));
    }

    #[test]
    fn test_rolling_std_sample_denominator() {
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let std = rolling_std(&values, 8);
        // Sample variance of this classic series is 32/7
        let expected = (32.0f64 / 7.0).sqrt();
        assert!((std[7].unwrap() - expected).abs() < 1e-12);
        assert_eq!(std[6], None);
    }

    #[test]
    fn test_bollinger_flat_series_zero_width() {
        let closes = vec![50.0; 25];
        let bb = bollinger(&closes, 20, 2.0);
        assert_eq!(bb.middle[18], None);
        assert_eq!(bb.middle[19], Some(50.0));
        assert_eq!(bb.upper[19], Some(50.0));
        assert_eq!(bb.lower[19], Some(50.0));
        assert_eq!(bb.width[19], Some(0.0));
    }

    #[test]
    fn test_ema_seed_is_simple_average() {
        let values = vec![1.0, 2.0, 3.0, 4.0];
        let e = ema(&values, 3);
        assert_eq!(e[0], None);
        assert_eq!(e[1], None);
        assert_eq!(e[2], Some(2.0)); // (1+2+3)/3
        // alpha = 0.5: 0.5*4 + 0.5*2 = 3
        assert_eq!(e[3], Some(3.0));
    }

    #[test]
    fn test_macd_warmup_boundaries() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let m = macd(&closes, 12, 26, 9);
        assert_eq!(m.macd[24], None);
        assert!(m.macd[25].is_some());
        assert_eq!(m.signal[32], None);
        assert!(m.signal[33].is_some());
        assert!(m.histogram[33].is_some());
        let hist = m.macd[33].unwrap() - m.signal[33].unwrap();
        assert!((m.histogram[33].unwrap() - hist).abs() < 1e-12);
    }

    #[test]
    fn test_rsi_warmup_and_bounds() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let r = rsi(&closes, 14);
        assert!(r[..14].iter().all(Option::is_none));
        for value in r[14..].iter().flatten() {
            assert!(*value >= 0.0 && *value <= 100.0);
        }
    }

    #[test]
    fn test_rsi_all_gains_is_100() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let r = rsi(&closes, 14);
        assert_eq!(r[14], Some(100.0));
        assert_eq!(r[19], Some(100.0));
    }

    #[test]
    fn test_rsi_bounded_on_random_walk() {
        use rand::{rngs::StdRng, Rng, SeedableRng};
        let mut rng = StdRng::seed_from_u64(7);
        let mut price = 100.0f64;
        let closes: Vec<f64> = (0..500)
            .map(|_| {
                price = (price + rng.gen_range(-2.0..2.0)).max(1.0);
                price
            })
            .collect();
        for value in rsi(&closes, 14).iter().flatten() {
            assert!(*value >= 0.0 && *value <= 100.0);
        }
    }

    #[test]
    fn test_rsi_all_losses_is_0() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64 * 0.5).collect();
        let r = rsi(&closes, 14);
        assert_eq!(r[14], Some(0.0));
    }

    #[test]
    fn test_rsi_wilder_smoothing_differs_from_simple_mean() {
        // One early loss among steady gains. A simple 14-delta rolling
        // mean forgets the loss once it leaves the window (RSI would hit
        // exactly 100 at index 19); Wilder smoothing only decays it.
        let mut closes = Vec::with_capacity(25);
        let mut price = 100.0;
        closes.push(price);
        for i in 1..25 {
            price += if i == 5 { -1.0 } else { 1.0 };
            closes.push(price);
        }
        let r = rsi(&closes, 14);
        let seed = r[14].unwrap();
        assert!((seed - 100.0 * 13.0 / 14.0).abs() < 1e-9);
        let later = r[19].unwrap();
        assert!(later < 100.0);
        assert!(later > seed);
    }

    #[test]
    fn test_doji_classification() {
        assert!(is_doji(100.0, 105.0, 95.0, 100.4, 0.1)); // body 0.4, range 10
        assert!(!is_doji(100.0, 105.0, 95.0, 103.0, 0.1)); // body 3
        assert!(is_doji(100.0, 100.0, 100.0, 100.0, 0.1)); // degenerate flat bar
        assert!(!is_doji(100.0, 100.0, 100.0, 101.0, 0.1));
    }

    #[test]
    fn test_hammer_classification() {
        // Long lower shadow, tiny upper shadow, body near the top
        assert!(is_hammer(99.5, 100.0, 95.0, 100.0));
        // Body at the bottom of the range: not a hammer
        assert!(!is_hammer(95.5, 100.0, 95.0, 95.0));
        // Flat bar: no range, no hammer
        assert!(!is_hammer(100.0, 100.0, 100.0, 100.0));
    }

    #[test]
    fn test_cross_signals() {
        assert!(cross_up(Some(10.0), Some(10.0), Some(11.0), Some(10.5)));
        assert!(!cross_up(Some(10.6), Some(10.0), Some(11.0), Some(10.5)));
        assert!(!cross_up(None, Some(10.0), Some(11.0), Some(10.5)));
        assert!(cross_down(Some(10.0), Some(10.0), Some(9.0), Some(9.5)));
        assert!(!cross_down(Some(9.0), Some(10.0), Some(8.0), Some(9.5)));
    }
}
