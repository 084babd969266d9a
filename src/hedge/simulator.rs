use crate::errors::{HedgeError, HedgeResult};
use crate::hedge::calendar::TradingCalendar;
use crate::hedge::policy::DecisionContext;
use crate::models::black_scholes::{self, Moneyness};
use crate::models::volatility::{VolatilityEstimator, SESSIONS_PER_YEAR};
use crate::state::*;

/// Everything one run reads, fetched from the store before the loop starts.
///
/// `underlying` and `option` cover `[start, end]` and must share their
/// dates. `history` is the underlying from as far back as the store goes up
/// to max(end, expiry); it feeds both the volatility window and the
/// session count to expiry.
#[derive(Debug, Clone)]
pub struct ScenarioData {
    pub contract: OptionContract,
    pub underlying: PriceSeries,
    pub option: PriceSeries,
    pub history: PriceSeries,
}

/// Result of a run that reached `Terminal`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SimulationOutcome {
    pub summary: SimulationSummary,
    pub trace: SimulationTrace,
}

/// Day-by-day delta-hedge state machine for a short call position.
///
///   Uninitialized -> Running   once both series are validated
///   Running       -> Terminal  after the last date is folded in
///
/// Any failure aborts the run; no partial trace escapes.
pub struct HedgeSimulator<'a> {
    config: SimulationConfig,
    data: &'a ScenarioData,
    calendar: TradingCalendar,
    phase: SimulationPhase,
}

impl<'a> HedgeSimulator<'a> {
    pub fn new(config: SimulationConfig, data: &'a ScenarioData) -> HedgeResult<Self> {
        let mut sim = Self {
            config,
            data,
            calendar: TradingCalendar::default(),
            phase: SimulationPhase::Uninitialized,
        };
        sim.validate()?;
        sim.calendar = TradingCalendar::from_series(&data.history);
        sim.phase = SimulationPhase::Running;
        tracing::debug!(
            simulation_id = sim.config.simulation_id,
            days = data.underlying.len(),
            phase = %sim.phase,
            "series validated"
        );
        Ok(sim)
    }

    #[cfg(test)]
    pub fn phase(&self) -> SimulationPhase {
        self.phase
    }

    fn validate(&self) -> HedgeResult<()> {
        let cfg = &self.config;
        let contract = &self.data.contract;

        cfg.policy.validate()?;
        if !(cfg.quantity > 0.0) {
            return Err(HedgeError::Config(format!(
                "simulation {}: option quantity must be positive, got {}",
                cfg.simulation_id, cfg.quantity
            )));
        }
        if contract.kind != OptionKind::Call {
            return Err(HedgeError::InvalidOptionKind(format!(
                "simulation {}: only calls can be hedged, {} is a {}",
                cfg.simulation_id, contract.ticker, contract.kind
            )));
        }

        let (underlying, option) = (&self.data.underlying, &self.data.option);
        if underlying.is_empty() || option.is_empty() {
            return Err(HedgeError::InsufficientHistoricalData(format!(
                "simulation {}: no prices between {} and {} (underlying={}, option={})",
                cfg.simulation_id,
                cfg.start,
                cfg.end,
                underlying.len(),
                option.len()
            )));
        }

        if !underlying.dates().eq(option.dates()) {
            let first_gap = underlying
                .dates()
                .zip(option.dates())
                .find(|(u, o)| u != o)
                .map(|(u, o)| format!("underlying {u} vs option {o}"))
                .unwrap_or_else(|| "series lengths differ".to_string());
            return Err(HedgeError::SeriesMisalignment(format!(
                "simulation {}: {} underlying vs {} option sessions, first difference: {first_gap}",
                cfg.simulation_id,
                underlying.len(),
                option.len()
            )));
        }
        Ok(())
    }

    /// Fold every aligned day into the hedge state and return the finished run.
    pub fn run(mut self) -> HedgeResult<SimulationOutcome> {
        let days = self.data.underlying.len();
        let vol = VolatilityEstimator::new(&self.data.history);

        let (state, records) = self
            .data
            .underlying
            .bars()
            .iter()
            .zip(self.data.option.bars())
            .enumerate()
            .try_fold(
                (HedgeState::default(), Vec::with_capacity(days)),
                |(mut state, mut records), (i, (u, o))| {
                    let record = self.step(&mut state, &vol, i, i + 1 == days, u, o)?;
                    records.push(record);
                    Ok::<_, HedgeError>((state, records))
                },
            )?;

        self.phase = SimulationPhase::Terminal;
        let trace = SimulationTrace::from_records(records);
        let summary = self.summarize(&state, &trace)?;

        tracing::info!(
            simulation_id = summary.simulation_id,
            policy = %summary.policy,
            days = summary.days,
            rebalances = summary.rebalances,
            final_real_balance = summary.final_real_balance,
            phase = %self.phase,
            "hedge simulation complete"
        );

        Ok(SimulationOutcome { summary, trace })
    }

    fn step(
        &self,
        state: &mut HedgeState,
        vol: &VolatilityEstimator<'_>,
        day_index: usize,
        is_last_day: bool,
        underlying: &PriceBar,
        option: &PriceBar,
    ) -> HedgeResult<DayRecord> {
        let cfg = &self.config;
        let contract = &self.data.contract;
        let basis = cfg.price_basis;
        let date = underlying.date;

        let spot = underlying.price(basis.sizing);
        let option_price = option.price(basis.sizing);

        let sessions_to_expiry = self.calendar.sessions_to_expiry(date, contract.expiry);
        let ttl_years = sessions_to_expiry as f64 / SESSIONS_PER_YEAR;
        let sigma = vol.annualized(date, cfg.vol_window)?;
        let delta = black_scholes::delta(
            OptionKind::Call,
            spot,
            contract.strike,
            ttl_years,
            cfg.risk_free_rate,
            sigma,
        )?;
        let target_shares = delta * cfg.quantity;

        let rebalanced = cfg.policy.should_rebalance(&DecisionContext {
            day_index,
            is_last_day,
            current_shares: state.shares,
            target_shares,
            quantity: cfg.quantity,
        });

        let (share_adjustment, cash_flow) = if day_index == 0 {
            // Sell the calls, buy the initial hedge with the premium.
            (target_shares, cfg.quantity * option_price - target_shares * spot)
        } else if rebalanced {
            let adjustment = target_shares - state.shares;
            (adjustment, -adjustment * spot)
        } else {
            (0.0, 0.0)
        };

        state.shares += share_adjustment;
        state.cash += cash_flow;
        state.deltas.push(delta);
        if rebalanced {
            state.rebalance_dates.push(date);
            tracing::debug!(
                %date,
                delta,
                share_adjustment,
                cash_flow,
                shares = state.shares,
                "rebalanced"
            );
        }

        let mark_underlying = underlying.price(basis.valuation);
        let mark_option = option.price(basis.valuation);
        let real_balance =
            state.cash + state.shares * mark_underlying - cfg.quantity * mark_option;

        Ok(DayRecord {
            date,
            underlying_price: spot,
            option_price,
            mark_underlying,
            mark_option,
            sigma,
            delta,
            sessions_to_expiry,
            target_shares,
            share_adjustment,
            shares_held: state.shares,
            cash_flow,
            cumulative_cash: state.cash,
            real_balance,
            rebalanced,
        })
    }

    fn summarize(&self, state: &HedgeState, trace: &SimulationTrace) -> HedgeResult<SimulationSummary> {
        let cfg = &self.config;
        let (first, last) = match (trace.first(), trace.last()) {
            (Some(f), Some(l)) => (f, l),
            _ => {
                return Err(HedgeError::InsufficientHistoricalData(format!(
                    "simulation {}: empty trace",
                    cfg.simulation_id
                )))
            }
        };
        let peak = trace
            .records()
            .iter()
            .fold(first, |best, r| if r.real_balance > best.real_balance { r } else { best });

        Ok(SimulationSummary {
            run_id: uuid::Uuid::new_v4(),
            simulation_id: cfg.simulation_id,
            option_ticker: self.data.contract.ticker.clone(),
            policy: cfg.policy.to_string(),
            risk_free_rate: cfg.risk_free_rate,
            vol_window: cfg.vol_window,
            quantity: cfg.quantity,
            days: trace.records().len(),
            rebalances: state.rebalance_dates.len(),
            initial_cash: first.cumulative_cash,
            initial_delta: first.delta,
            initial_moneyness: Moneyness::from_delta(first.delta),
            final_delta: state.deltas.last().copied().unwrap_or(last.delta),
            initial_underlying: first.underlying_price,
            final_underlying: last.mark_underlying,
            peak_real_balance: peak.real_balance,
            peak_real_balance_date: peak.date,
            final_shares: state.shares,
            final_cash: state.cash,
            final_real_balance: last.real_balance,
        })
    }
}
