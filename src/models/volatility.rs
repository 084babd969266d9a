use crate::errors::{HedgeError, HedgeResult};
use crate::state::PriceSeries;
use chrono::NaiveDate;

/// Trading sessions per year used for annualization (fixed modeling constant)
pub const SESSIONS_PER_YEAR: f64 = 252.0;

/// Rolling realized-volatility estimator over an underlying's close history.
///
/// The window is a count of closing prices (trading sessions), taken at or
/// before the reference date, so there is no lookahead. Returns are simple
/// period-over-period returns and the dispersion is the population standard
/// deviation of those returns. No smoothing, no outlier rejection.
pub struct VolatilityEstimator<'a> {
    history: &'a PriceSeries,
}

impl<'a> VolatilityEstimator<'a> {
    pub fn new(history: &'a PriceSeries) -> Self {
        Self { history }
    }

    /// Unannualized (per-session) volatility from the last `window` closes.
    pub fn daily(&self, date: NaiveDate, window: usize) -> HedgeResult<f64> {
        if window < 2 {
            return Err(HedgeError::Config(format!(
                "volatility window must span at least 2 sessions, got {window}"
            )));
        }

        let bars = self.history.trailing(date, window).ok_or_else(|| {
            HedgeError::InsufficientHistoricalData(format!(
                "{window}-session volatility at {date}: only {} closes available",
                self.history.count_at_or_before(date)
            ))
        })?;

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let returns = simple_returns(&closes);
        Ok(std_dev(&returns))
    }

    /// Annualized volatility: daily volatility scaled by sqrt(252).
    #[inline]
    pub fn annualized(&self, date: NaiveDate, window: usize) -> HedgeResult<f64> {
        Ok(self.daily(date, window)? * SESSIONS_PER_YEAR.sqrt())
    }
}

/// r_i = p_i / p_{i-1} - 1
pub fn simple_returns(closes: &[f64]) -> Vec<f64> {
    closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Population standard deviation (divides by n).
pub fn std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    let nf = n as f64;
    let mean = values.iter().sum::<f64>() / nf;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / nf;
    var.sqrt()
}
