mod batch;
mod config;
mod db;
mod errors;
mod hedge;
mod models;
mod montecarlo;
mod state;

use crate::batch::{comparison, sweep};
use crate::config::{AppConfig, RunMode};
use crate::db::{MarketData, SqliteStore};
use crate::errors::{HedgeError, HedgeResult};
use crate::hedge::RunParameters;
use crate::montecarlo::validation::{self, ValidationRequest};
use std::path::Path;

fn main() {
    // Structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cfg = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(mode = %cfg.mode, db = %cfg.db_path.display(), "hedge backtester starting");

    // The store (and its connection) lives for this scope only
    let result = SqliteStore::open_read_only(&cfg.db_path).and_then(|store| run(&cfg, &store));

    if let Err(e) = result {
        tracing::error!(mode = %cfg.mode, "run failed: {e}");
        std::process::exit(1);
    }
}

fn run(cfg: &AppConfig, store: &SqliteStore) -> HedgeResult<()> {
    let output = cfg.output_path.as_deref();
    match cfg.mode {
        RunMode::Simulate => {
            let simulation_id = cfg.simulation_id.ok_or_else(|| {
                HedgeError::Config("HEDGE_SIMULATION_ID is required in simulate mode".into())
            })?;
            let params = RunParameters {
                policy: cfg.policy,
                risk_free_rate: cfg.risk_free_rate,
                vol_window: cfg.vol_window,
                price_basis: None,
            };
            let outcome = hedge::run_stored(store, simulation_id, &params)?;
            let s = &outcome.summary;
            tracing::info!(
                simulation_id,
                option = %s.option_ticker,
                days = s.days,
                rebalances = s.rebalances,
                initial_moneyness = %s.initial_moneyness,
                final_shares = s.final_shares,
                final_cash = s.final_cash,
                final_real_balance = s.final_real_balance,
                "simulation summary"
            );
            write_output(output, &outcome)
        }

        RunMode::Sweep => {
            let grid = sweep::SweepGrid {
                policies: cfg.sweep_policies.clone(),
                vol_windows: cfg.sweep_vol_windows.clone(),
                risk_free_rate: cfg.risk_free_rate,
            };
            let report = sweep::run_sweep(store, &simulation_ids(cfg, store)?, &grid)?;
            write_output(output, &report)
        }

        RunMode::Compare => {
            let mut comparisons = Vec::new();
            for simulation_id in simulation_ids(cfg, store)? {
                match comparison::compare_stored(store, simulation_id, cfg.risk_free_rate, cfg.vol_window) {
                    Ok(c) => comparisons.push(c),
                    Err(e) => tracing::error!(simulation_id, error = %e, "price comparison failed"),
                }
            }
            write_output(output, &comparisons)
        }

        RunMode::MonteCarlo => {
            let mc = &cfg.monte_carlo;
            let option_ticker = mc.option_ticker.clone().ok_or_else(|| {
                HedgeError::Config("HEDGE_MC_OPTION_TICKER is required in montecarlo mode".into())
            })?;
            let request = ValidationRequest {
                option_ticker,
                sessions: mc.sessions,
                drift: mc.drift,
                vol_window: mc.vol_window,
                n_paths: mc.n_paths,
                sampler: mc.sampler,
                seed: mc.seed,
            };
            let report = validation::validate_option(store, &request)?;
            write_output(output, &report)
        }
    }
}

/// The configured simulation, or every stored one.
fn simulation_ids(cfg: &AppConfig, store: &SqliteStore) -> HedgeResult<Vec<i64>> {
    match cfg.simulation_id {
        Some(id) => Ok(vec![id]),
        None => {
            let ids = store.simulation_ids()?;
            if ids.is_empty() {
                return Err(HedgeError::ConfigurationNotFound("no stored simulations".into()));
            }
            Ok(ids)
        }
    }
}

fn write_output<T: serde::Serialize>(path: Option<&Path>, value: &T) -> HedgeResult<()> {
    let Some(path) = path else {
        tracing::info!("HEDGE_OUTPUT_PATH not set, structured results not written");
        return Ok(());
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    tracing::info!("results written to {}", path.display());
    Ok(())
}
