use crate::db::{self, MarketData};
use crate::errors::{HedgeError, HedgeResult};
use crate::hedge::calendar::TradingCalendar;
use crate::hedge::simulator::ScenarioData;
use crate::models::black_scholes;
use crate::models::volatility::{VolatilityEstimator, SESSIONS_PER_YEAR};
use crate::state::OptionKind;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Theoretical vs traded price for one session, both on the open.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ComparisonRow {
    pub date: NaiveDate,
    pub underlying_price: f64,
    pub market_price: f64,
    pub theoretical_price: f64,
    pub delta: f64,
    pub sigma: f64,
    pub sessions_to_expiry: usize,
    /// (market - theoretical) / theoretical * 100, NaN when theoretical is 0
    pub pct_difference: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PriceComparison {
    pub run_id: uuid::Uuid,
    pub simulation_id: i64,
    pub option_ticker: String,
    pub strike: f64,
    pub expiry: NaiveDate,
    pub risk_free_rate: f64,
    pub vol_window: usize,
    pub initial_sigma: f64,
    pub mean_pct_difference: f64,
    /// Underlying sessions without a traded option price
    pub skipped_days: usize,
    pub rows: Vec<ComparisonRow>,
}

pub fn compare_stored<M: MarketData + ?Sized>(
    store: &M,
    simulation_id: i64,
    risk_free_rate: f64,
    vol_window: usize,
) -> HedgeResult<PriceComparison> {
    let (_, data) = db::load_scenario(store, simulation_id)?;
    compare_prices(&data, simulation_id, risk_free_rate, vol_window)
}

/// Price the contract with Black-Scholes on every session both instruments
/// traded. Sessions where the option did not trade are skipped.
pub fn compare_prices(
    data: &ScenarioData,
    simulation_id: i64,
    risk_free_rate: f64,
    vol_window: usize,
) -> HedgeResult<PriceComparison> {
    let contract = &data.contract;
    let calendar = TradingCalendar::from_series(&data.history);
    let vol = VolatilityEstimator::new(&data.history);
    let option_open: HashMap<NaiveDate, f64> =
        data.option.bars().iter().map(|b| (b.date, b.open)).collect();

    let mut rows = Vec::with_capacity(data.underlying.len());
    let mut skipped_days = 0;
    for bar in data.underlying.bars() {
        let Some(&market_price) = option_open.get(&bar.date) else {
            skipped_days += 1;
            continue;
        };

        let sessions_to_expiry = calendar.sessions_to_expiry(bar.date, contract.expiry);
        let t = sessions_to_expiry as f64 / SESSIONS_PER_YEAR;
        let sigma = vol.annualized(bar.date, vol_window)?;
        let theoretical_price =
            black_scholes::call_price(bar.open, contract.strike, t, risk_free_rate, sigma)?;
        let delta =
            black_scholes::delta(OptionKind::Call, bar.open, contract.strike, t, risk_free_rate, sigma)?;

        let pct_difference = if theoretical_price > 0.0 {
            (market_price - theoretical_price) / theoretical_price * 100.0
        } else {
            f64::NAN
        };

        rows.push(ComparisonRow {
            date: bar.date,
            underlying_price: bar.open,
            market_price,
            theoretical_price,
            delta,
            sigma,
            sessions_to_expiry,
            pct_difference,
        });
    }

    let initial_sigma = rows.first().map(|r| r.sigma).ok_or_else(|| {
        HedgeError::InsufficientHistoricalData(format!(
            "simulation {simulation_id}: no session with both underlying and option prices"
        ))
    })?;

    let finite: Vec<f64> = rows
        .iter()
        .map(|r| r.pct_difference)
        .filter(|d| d.is_finite())
        .collect();
    let mean_pct_difference = if finite.is_empty() {
        f64::NAN
    } else {
        finite.iter().sum::<f64>() / finite.len() as f64
    };

    tracing::info!(
        simulation_id,
        option = %contract.ticker,
        days = rows.len(),
        skipped_days,
        initial_sigma,
        mean_pct_difference,
        "price comparison complete"
    );

    Ok(PriceComparison {
        run_id: uuid::Uuid::new_v4(),
        simulation_id,
        option_ticker: contract.ticker.clone(),
        strike: contract.strike,
        expiry: contract.expiry,
        risk_free_rate,
        vol_window,
        initial_sigma,
        mean_pct_difference,
        skipped_days,
        rows,
    })
}
