// =============================================================================
// Persistence Exponent — Rescaled Range (R/S) Analysis
// =============================================================================
//
// Hurst-style measure of trend persistence:
//
//   H > 0.6  =>  trending / persistent
//   H ~ 0.5  =>  random walk
//   H < 0.4  =>  mean-reverting / anti-persistent
//
// For each lag in {10, 20, 50} (skipping lags larger than half the series),
// the closes are split into non-overlapping chunks of that length and the
// average R/S statistic is computed:
//
//   R = max(cumulative deviation from chunk mean) - min(...)
//   S = population standard deviation of the chunk (chunks with S = 0 skip)
//
// The persistence exponent is the OLS slope of log(avg R/S) on log(lag),
// clamped to [0, 1]. When fewer than two lags produce a valid point the
// neutral fallback 0.5 is returned — a flat series has no persistence signal.

use tracing::trace;

/// R/S chunk lengths.
const LAGS: [usize; 3] = [10, 20, 50];

/// Returned when the regression cannot be formed.
pub const PERSISTENCE_FALLBACK: f64 = 0.5;

/// Compute the persistence exponent of `closes` (oldest-first).
pub fn persistence_exponent(closes: &[f64]) -> f64 {
    let mut log_lag: Vec<f64> = Vec::with_capacity(LAGS.len());
    let mut log_rs: Vec<f64> = Vec::with_capacity(LAGS.len());

    for &lag in &LAGS {
        if lag > closes.len() / 2 {
            continue;
        }

        let num_chunks = closes.len() / lag;
        let mut rs_sum = 0.0_f64;
        let mut valid_chunks = 0usize;

        for chunk in closes.chunks_exact(lag).take(num_chunks) {
            let mean = chunk.iter().sum::<f64>() / lag as f64;
            let variance =
                chunk.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / lag as f64;
            let std_dev = variance.sqrt();

            if std_dev < f64::EPSILON {
                // Flat chunk carries no information.
                continue;
            }

            let mut running = 0.0_f64;
            let mut cum_max = f64::NEG_INFINITY;
            let mut cum_min = f64::INFINITY;
            for &val in chunk {
                running += val - mean;
                cum_max = cum_max.max(running);
                cum_min = cum_min.min(running);
            }

            rs_sum += (cum_max - cum_min) / std_dev;
            valid_chunks += 1;
        }

        if valid_chunks == 0 {
            continue;
        }

        let avg_rs = rs_sum / valid_chunks as f64;
        if avg_rs > 0.0 {
            log_lag.push((lag as f64).ln());
            log_rs.push(avg_rs.ln());
        }
    }

    if log_lag.len() < 2 {
        trace!("persistence: too few valid lags, using fallback 0.5");
        return PERSISTENCE_FALLBACK;
    }

    match ols_slope(&log_lag, &log_rs) {
        Some(slope) => slope.clamp(0.0, 1.0),
        None => PERSISTENCE_FALLBACK,
    }
}

/// Ordinary least-squares slope: Σ((x-x̄)(y-ȳ)) / Σ((x-x̄)²).
pub(crate) fn ols_slope(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len() as f64;
    let x_mean = xs.iter().sum::<f64>() / n;
    let y_mean = ys.iter().sum::<f64>() / n;

    let mut numerator = 0.0_f64;
    let mut denominator = 0.0_f64;
    for (x, y) in xs.iter().zip(ys) {
        numerator += (x - x_mean) * (y - y_mean);
        denominator += (x - x_mean) * (x - x_mean);
    }

    if denominator.abs() < f64::EPSILON {
        return None;
    }
    Some(numerator / denominator)
}
