pub mod calendar;
pub mod policy;
pub mod simulator;

use crate::db::{self, MarketData, StoredSimulation};
use crate::errors::HedgeResult;
use crate::state::SimulationConfig;
use policy::{PriceBasis, RebalancePolicy};
use simulator::{HedgeSimulator, SimulationOutcome};

/// Run-time knobs layered on top of a stored scenario.
#[derive(Debug, Clone, Copy)]
pub struct RunParameters {
    pub policy: RebalancePolicy,
    pub risk_free_rate: f64,
    pub vol_window: usize,
    /// Overrides the policy's own open/close convention when set
    pub price_basis: Option<PriceBasis>,
}

impl RunParameters {
    pub fn configure(&self, stored: &StoredSimulation) -> SimulationConfig {
        SimulationConfig {
            simulation_id: stored.id,
            start: stored.start,
            end: stored.end,
            quantity: stored.quantity,
            risk_free_rate: self.risk_free_rate,
            vol_window: self.vol_window,
            policy: self.policy,
            price_basis: self
                .price_basis
                .unwrap_or_else(|| self.policy.default_price_basis()),
        }
    }
}

/// Load a stored scenario and hedge it to completion.
pub fn run_stored<M: MarketData + ?Sized>(
    store: &M,
    simulation_id: i64,
    params: &RunParameters,
) -> HedgeResult<SimulationOutcome> {
    let (stored, data) = db::load_scenario(store, simulation_id)?;
    tracing::info!(
        simulation_id,
        option = %data.contract.ticker,
        policy = %params.policy,
        rate = params.risk_free_rate,
        vol_window = params.vol_window,
        start = %stored.start,
        end = %stored.end,
        "starting hedge simulation"
    );
    HedgeSimulator::new(params.configure(&stored), &data)?.run()
}
