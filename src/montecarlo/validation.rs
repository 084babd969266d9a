use crate::db::MarketData;
use crate::errors::{HedgeError, HedgeResult};
use crate::models::gbm;
use crate::models::volatility::{VolatilityEstimator, SESSIONS_PER_YEAR};
use crate::montecarlo::stats::{mean, BandCoverage, EnsembleStats};
use crate::montecarlo::{GbmSampler, MonteCarloGenerator};
use crate::state::PriceSeries;
use chrono::NaiveDate;

const BAND_LOWER: f64 = 0.025;
const BAND_UPPER: f64 = 0.975;

/// Back-test of simulated GBM paths against the underlying's realized
/// prices over the last `sessions` sessions before an option's expiry.
#[derive(Debug, Clone)]
pub struct ValidationRequest {
    pub option_ticker: String,
    pub sessions: usize,
    pub drift: f64,
    pub vol_window: usize,
    pub n_paths: usize,
    pub sampler: GbmSampler,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ValidationReport {
    pub run_id: uuid::Uuid,
    pub option_ticker: String,
    pub underlying_ticker: String,
    pub start: NaiveDate,
    pub expiry: NaiveDate,
    pub sampler: GbmSampler,
    pub n_paths: usize,
    pub s0: f64,
    pub drift: f64,
    pub sigma: f64,
    pub realized: Vec<f64>,
    pub realized_terminal: f64,
    pub simulated_terminal_mean: f64,
    /// Mean of single closed-form draws over the realized horizon ((sessions + 1)/252)
    pub closed_form_terminal_mean: f64,
    pub stats: EnsembleStats,
    pub coverage: BandCoverage,
}

/// Run the validation for a stored option.
pub fn validate_option<M: MarketData + ?Sized>(
    store: &M,
    request: &ValidationRequest,
) -> HedgeResult<ValidationReport> {
    let contract = store.option_by_ticker(&request.option_ticker)?;
    let history = store.underlying_series(contract.underlying_id, None, contract.expiry)?;

    let mut report = validate_path(&history, contract.expiry, request)?;
    report.option_ticker = contract.ticker;
    report.underlying_ticker = contract.underlying_ticker;
    Ok(report)
}

/// Validation over an in-memory underlying history ending at or before `expiry`.
pub fn validate_path(
    history: &PriceSeries,
    expiry: NaiveDate,
    request: &ValidationRequest,
) -> HedgeResult<ValidationReport> {
    if request.sessions == 0 {
        return Err(HedgeError::Config("Monte Carlo validation needs at least one session".into()));
    }

    let available = history.count_at_or_before(expiry);
    let needed = request.sessions + 1;
    let window = history.trailing(expiry, needed).ok_or_else(|| {
        HedgeError::InsufficientHistoricalData(format!(
            "{}: {needed} sessions up to {expiry} required, {available} available",
            request.option_ticker
        ))
    })?;

    let first = window[0];
    let s0 = first.open;
    let mut realized: Vec<f64> = window.iter().map(|b| b.close).collect();
    realized[0] = s0;

    let sigma = VolatilityEstimator::new(history).annualized(first.date, request.vol_window)?;
    let mut rng = gbm::seeded_rng(request.seed);

    let generator = MonteCarloGenerator { s0, mu: request.drift, sigma, sampler: request.sampler };
    let ensemble = generator.generate(request.sessions, request.n_paths, &mut rng)?;
    let stats = EnsembleStats::from_ensemble(&ensemble, BAND_LOWER, BAND_UPPER)?;
    let coverage = stats.coverage(&realized)?;

    let horizon = closed_form_horizon(request.sessions);
    let single_step = (0..request.n_paths)
        .map(|_| gbm::future_price(s0, request.drift, sigma, horizon, None, &mut rng))
        .collect::<HedgeResult<Vec<_>>>()?;

    let realized_terminal = realized[realized.len() - 1];
    let simulated_terminal_mean = mean(&ensemble.terminals());

    tracing::info!(
        option = %request.option_ticker,
        sampler = %request.sampler,
        s0,
        sigma,
        realized_terminal,
        simulated_terminal_mean,
        quantile_coverage = coverage.quantile_fraction,
        normal_coverage = coverage.normal_fraction,
        "monte carlo validation complete"
    );

    Ok(ValidationReport {
        run_id: uuid::Uuid::new_v4(),
        option_ticker: request.option_ticker.clone(),
        underlying_ticker: String::new(),
        start: first.date,
        expiry,
        sampler: request.sampler,
        n_paths: ensemble.n_paths(),
        s0,
        drift: request.drift,
        sigma,
        realized,
        realized_terminal,
        simulated_terminal_mean,
        closed_form_terminal_mean: mean(&single_step),
        stats,
        coverage,
    })
}

/// Year fraction covered by the realized window: `sessions + 1` sessions,
/// counting the start day.
fn closed_form_horizon(sessions: usize) -> f64 {
    (sessions + 1) as f64 / SESSIONS_PER_YEAR
}
