use crate::db::{self, MarketData};
use crate::errors::HedgeResult;
use crate::hedge::policy::RebalancePolicy;
use crate::hedge::simulator::HedgeSimulator;
use crate::hedge::RunParameters;
use crate::state::SimulationSummary;
use std::collections::BTreeMap;

/// Policies x volatility windows, all at one rate.
#[derive(Debug, Clone)]
pub struct SweepGrid {
    pub policies: Vec<RebalancePolicy>,
    pub vol_windows: Vec<usize>,
    pub risk_free_rate: f64,
}

impl SweepGrid {
    pub fn parameters(&self) -> impl Iterator<Item = RunParameters> + '_ {
        self.policies.iter().flat_map(move |&policy| {
            self.vol_windows.iter().map(move |&vol_window| RunParameters {
                policy,
                risk_free_rate: self.risk_free_rate,
                vol_window,
                price_basis: None,
            })
        })
    }
}

/// A scenario that aborted. The sweep carries on without it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScenarioFailure {
    pub simulation_id: i64,
    pub label: String,
    pub error: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SweepReport {
    pub run_id: uuid::Uuid,
    pub summaries: Vec<SimulationSummary>,
    pub failures: Vec<ScenarioFailure>,
    /// Highest final real balance per simulation
    pub best: Vec<SimulationSummary>,
}

fn label(params: &RunParameters) -> String {
    format!("{} window={} rate={}", params.policy, params.vol_window, params.risk_free_rate)
}

/// Run every grid point against every listed simulation.
pub fn run_sweep<M: MarketData + ?Sized>(
    store: &M,
    simulation_ids: &[i64],
    grid: &SweepGrid,
) -> HedgeResult<SweepReport> {
    let mut summaries = Vec::new();
    let mut failures = Vec::new();

    for &simulation_id in simulation_ids {
        let (stored, data) = match db::load_scenario(store, simulation_id) {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::error!(simulation_id, error = %e, "scenario load failed");
                failures.push(ScenarioFailure {
                    simulation_id,
                    label: "load".into(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        for params in grid.parameters() {
            let outcome = HedgeSimulator::new(params.configure(&stored), &data)
                .and_then(|sim| sim.run());
            match outcome {
                Ok(out) => summaries.push(out.summary),
                Err(e) => {
                    let label = label(&params);
                    tracing::error!(simulation_id, scenario = %label, error = %e, "scenario failed");
                    failures.push(ScenarioFailure { simulation_id, label, error: e.to_string() });
                }
            }
        }
    }

    let best = best_per_simulation(&summaries);
    for b in &best {
        tracing::info!(
            simulation_id = b.simulation_id,
            policy = %b.policy,
            vol_window = b.vol_window,
            final_real_balance = b.final_real_balance,
            "best scenario"
        );
    }
    tracing::info!(
        scenarios = summaries.len() + failures.len(),
        succeeded = summaries.len(),
        failed = failures.len(),
        "sweep complete"
    );

    Ok(SweepReport { run_id: uuid::Uuid::new_v4(), summaries, failures, best })
}

fn best_per_simulation(summaries: &[SimulationSummary]) -> Vec<SimulationSummary> {
    let mut best: BTreeMap<i64, &SimulationSummary> = BTreeMap::new();
    for s in summaries {
        best.entry(s.simulation_id)
            .and_modify(|cur| {
                if s.final_real_balance.total_cmp(&cur.final_real_balance).is_gt() {
                    *cur = s;
                }
            })
            .or_insert(s);
    }
    best.into_values().cloned().collect()
}
