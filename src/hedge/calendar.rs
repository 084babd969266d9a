use crate::state::PriceSeries;
use chrono::NaiveDate;

/// Trading calendar of the underlying: the distinct dates on which it
/// actually traded, as recorded in the store.
#[derive(Debug, Clone, Default)]
pub struct TradingCalendar {
    sessions: Vec<NaiveDate>,
}

impl TradingCalendar {
    pub fn new(mut sessions: Vec<NaiveDate>) -> Self {
        sessions.sort_unstable();
        sessions.dedup();
        Self { sessions }
    }

    pub fn from_series(series: &PriceSeries) -> Self {
        Self::new(series.dates().collect())
    }

    /// Distinct sessions in the inclusive interval `[from, to]`.
    pub fn sessions_between(&self, from: NaiveDate, to: NaiveDate) -> usize {
        if from > to {
            return 0;
        }
        let lo = self.sessions.partition_point(|d| *d < from);
        let hi = self.sessions.partition_point(|d| *d <= to);
        hi - lo
    }

    /// Sessions left before expiry, excluding the last counted day.
    #[inline]
    pub fn sessions_to_expiry(&self, date: NaiveDate, expiry: NaiveDate) -> usize {
        self.sessions_between(date, expiry).saturating_sub(1)
    }
}
