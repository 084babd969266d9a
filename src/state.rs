use crate::errors::{HedgeError, HedgeResult};
use crate::hedge::policy::{PriceBasis, RebalancePolicy};
use crate::models::black_scholes::Moneyness;
use chrono::NaiveDate;
use std::str::FromStr;

// ── Simulation State Machine ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationPhase {
    Uninitialized,
    Running,
    Terminal,
}

impl std::fmt::Display for SimulationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Running => write!(f, "running"),
            Self::Terminal => write!(f, "terminal"),
        }
    }
}

// ── Price Series ──

/// Which quote of a daily bar a computation reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceField {
    Open,
    Close,
}

impl std::fmt::Display for PriceField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Close => write!(f, "close"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
}

impl PriceBar {
    #[inline]
    pub fn price(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Open => self.open,
            PriceField::Close => self.close,
        }
    }
}

/// Daily bars for one instrument, kept in chronological order.
/// Dates are whatever sessions the store recorded; nothing is gap-filled.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        Self { bars }
    }

    #[inline]
    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.bars.iter().map(|b| b.date)
    }

    /// Number of bars dated at or before `date`.
    #[inline]
    pub fn count_at_or_before(&self, date: NaiveDate) -> usize {
        self.bars.partition_point(|b| b.date <= date)
    }

    /// Bars inside the inclusive interval `[from, to]`.
    #[cfg(test)]
    pub fn between(&self, from: NaiveDate, to: NaiveDate) -> PriceSeries {
        let bars = self
            .bars
            .iter()
            .filter(|b| b.date >= from && b.date <= to)
            .copied()
            .collect();
        Self { bars }
    }

    /// The last `count` bars at or before `date`, or None if fewer exist.
    pub fn trailing(&self, date: NaiveDate, count: usize) -> Option<&[PriceBar]> {
        let end = self.count_at_or_before(date);
        if end < count {
            return None;
        }
        Some(&self.bars[end - count..end])
    }
}

// ── Option Contract ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Call,
    Put,
}

impl FromStr for OptionKind {
    type Err = HedgeError;

    fn from_str(s: &str) -> HedgeResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" => Ok(Self::Call),
            "put" => Ok(Self::Put),
            other => Err(HedgeError::InvalidOptionKind(format!(
                "'{other}' (expected 'call' or 'put')"
            ))),
        }
    }
}

impl std::fmt::Display for OptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Put => write!(f, "put"),
        }
    }
}

/// Immutable contract metadata, fixed for the lifetime of a run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OptionContract {
    pub id: i64,
    pub ticker: String,
    pub kind: OptionKind,
    pub strike: f64,
    pub expiry: NaiveDate,
    pub underlying_id: i64,
    pub underlying_ticker: String,
}

// ── Run Configuration ──

/// Parameters of one hedge run. `quantity` is the number of options sold.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SimulationConfig {
    pub simulation_id: i64,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub quantity: f64,
    pub risk_free_rate: f64,
    pub vol_window: usize,
    pub policy: RebalancePolicy,
    pub price_basis: PriceBasis,
}

// ── Running Hedge State ──

/// Accumulator threaded through the daily fold. Owned by exactly one run.
#[derive(Debug, Clone, Default)]
pub struct HedgeState {
    pub shares: f64,
    pub cash: f64,
    pub deltas: Vec<f64>,
    pub rebalance_dates: Vec<NaiveDate>,
}

// ── Trace ──

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct DayRecord {
    pub date: NaiveDate,
    /// Prices used for delta and trade sizing
    pub underlying_price: f64,
    pub option_price: f64,
    /// Prices used for the mark-to-market balance
    pub mark_underlying: f64,
    pub mark_option: f64,
    pub sigma: f64,
    pub delta: f64,
    pub sessions_to_expiry: usize,
    pub target_shares: f64,
    pub share_adjustment: f64,
    pub shares_held: f64,
    pub cash_flow: f64,
    pub cumulative_cash: f64,
    pub real_balance: f64,
    pub rebalanced: bool,
}

/// Append-only while the run is live; read-only once returned.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SimulationTrace {
    records: Vec<DayRecord>,
}

impl SimulationTrace {
    pub(crate) fn from_records(records: Vec<DayRecord>) -> Self {
        Self { records }
    }

    #[inline]
    pub fn records(&self) -> &[DayRecord] {
        &self.records
    }

    pub fn first(&self) -> Option<&DayRecord> {
        self.records.first()
    }

    pub fn last(&self) -> Option<&DayRecord> {
        self.records.last()
    }

    #[cfg(test)]
    pub fn rebalance_count(&self) -> usize {
        self.records.iter().filter(|r| r.rebalanced).count()
    }
}

// ── Terminal Summary ──

#[derive(Debug, Clone, serde::Serialize)]
pub struct SimulationSummary {
    pub run_id: uuid::Uuid,
    pub simulation_id: i64,
    pub option_ticker: String,
    pub policy: String,
    pub risk_free_rate: f64,
    pub vol_window: usize,
    pub quantity: f64,
    pub days: usize,
    pub rebalances: usize,
    pub initial_cash: f64,
    pub initial_delta: f64,
    pub initial_moneyness: Moneyness,
    pub final_delta: f64,
    /// Underlying sizing price on the first day, marking price on the last
    pub initial_underlying: f64,
    pub final_underlying: f64,
    /// Best mark-to-market balance seen during the run (first day on ties)
    pub peak_real_balance: f64,
    pub peak_real_balance_date: NaiveDate,
    pub final_shares: f64,
    pub final_cash: f64,
    pub final_real_balance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            open: close,
            close,
            high: close,
            low: close,
        }
    }

    #[test]
    fn test_series_sorted_on_construction() {
        let s = PriceSeries::new(vec![bar(5, 3.0), bar(1, 1.0), bar(3, 2.0)]);
        let closes: Vec<f64> = s.bars().iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_trailing_window_excludes_future() {
        let s = PriceSeries::new((1..=10).map(|d| bar(d, d as f64)).collect());
        let window = s.trailing(NaiveDate::from_ymd_opt(2024, 3, 6).unwrap(), 3).unwrap();
        let closes: Vec<f64> = window.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![4.0, 5.0, 6.0]);
        assert!(s.trailing(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(), 3).is_none());
    }

    #[test]
    fn test_option_kind_parse() {
        assert_eq!("CALL".parse::<OptionKind>().unwrap(), OptionKind::Call);
        assert_eq!(" put ".parse::<OptionKind>().unwrap(), OptionKind::Put);
        assert!(matches!(
            "straddle".parse::<OptionKind>(),
            Err(HedgeError::InvalidOptionKind(_))
        ));
    }
}
