use crate::errors::{HedgeError, HedgeResult};
use crate::hedge::policy::RebalancePolicy;
use crate::montecarlo::GbmSampler;
use std::path::PathBuf;
use std::str::FromStr;

/// Which driver `main` runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Simulate,
    Sweep,
    Compare,
    MonteCarlo,
}

impl FromStr for RunMode {
    type Err = HedgeError;

    fn from_str(s: &str) -> HedgeResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulate" => Ok(Self::Simulate),
            "sweep" => Ok(Self::Sweep),
            "compare" => Ok(Self::Compare),
            "montecarlo" | "monte_carlo" => Ok(Self::MonteCarlo),
            other => Err(HedgeError::Config(format!(
                "HEDGE_MODE: unknown mode '{other}' (simulate, sweep, compare, montecarlo)"
            ))),
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simulate => write!(f, "simulate"),
            Self::Sweep => write!(f, "sweep"),
            Self::Compare => write!(f, "compare"),
            Self::MonteCarlo => write!(f, "montecarlo"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonteCarloSettings {
    pub option_ticker: Option<String>,
    pub sessions: usize,
    pub n_paths: usize,
    pub drift: f64,
    pub vol_window: usize,
    pub seed: Option<u64>,
    pub sampler: GbmSampler,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub mode: RunMode,
    pub simulation_id: Option<i64>,
    pub policy: RebalancePolicy,
    pub risk_free_rate: f64,
    pub vol_window: usize,
    pub sweep_policies: Vec<RebalancePolicy>,
    pub sweep_vol_windows: Vec<usize>,
    pub monte_carlo: MonteCarloSettings,
    pub output_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> HedgeResult<Self> {
        dotenvy::dotenv().ok();

        let monte_carlo = MonteCarloSettings {
            option_ticker: env_var_opt("HEDGE_MC_OPTION_TICKER"),
            sessions: parse_var("HEDGE_MC_SESSIONS", "20")?,
            n_paths: parse_var("HEDGE_MC_PATHS", "1000")?,
            drift: parse_var("HEDGE_MC_DRIFT", "0.06")?,
            vol_window: parse_var("HEDGE_MC_VOL_WINDOW", "252")?,
            seed: parse_opt("HEDGE_MC_SEED")?,
            sampler: parse_var("HEDGE_MC_SAMPLER", "euler")?,
        };

        Ok(Self {
            db_path: PathBuf::from(env_var_or("HEDGE_DB_PATH", "banco/mercado_opcoes.db")),
            mode: parse_var("HEDGE_MODE", "sweep")?,
            simulation_id: parse_opt("HEDGE_SIMULATION_ID")?,
            policy: parse_var("HEDGE_POLICY", "day:1")?,
            risk_free_rate: parse_var("HEDGE_RISK_FREE_RATE", "0.15")?,
            vol_window: parse_var("HEDGE_VOL_WINDOW", "30")?,
            sweep_policies: parse_list(
                "HEDGE_SWEEP_POLICIES",
                &env_var_or("HEDGE_SWEEP_POLICIES", "lot:50,lot:100,lot:200,lot:300"),
            )?,
            sweep_vol_windows: parse_list(
                "HEDGE_SWEEP_VOL_WINDOWS",
                &env_var_or("HEDGE_SWEEP_VOL_WINDOWS", "30,60,120,252"),
            )?,
            monte_carlo,
            output_path: env_var_opt("HEDGE_OUTPUT_PATH").map(PathBuf::from),
        })
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Unset and blank both mean "not given".
fn env_var_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(key: &str, default: &str) -> HedgeResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var_or(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| HedgeError::Config(format!("{key}: {e}")))
}

fn parse_opt<T>(key: &str) -> HedgeResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var_opt(key)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .map_err(|e| HedgeError::Config(format!("{key}: {e}")))
        })
        .transpose()
}

fn parse_list<T>(key: &str, raw: &str) -> HedgeResult<Vec<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let items = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<T>().map_err(|e| HedgeError::Config(format!("{key}: {e}"))))
        .collect::<HedgeResult<Vec<T>>>()?;
    if items.is_empty() {
        return Err(HedgeError::Config(format!("{key}: empty list")));
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_of_policies() {
        let policies: Vec<RebalancePolicy> =
            parse_list("TEST", "lot:50, lot:100 ,day:5,,delta:0.1").unwrap();
        assert_eq!(policies.len(), 4);
        assert_eq!(policies[2], RebalancePolicy::ByDay { frequency: 5 });
        assert!(parse_list::<RebalancePolicy>("TEST", "lot:50,bogus").is_err());
        assert!(parse_list::<usize>("TEST", " , ").is_err());
    }

    #[test]
    fn test_parse_windows() {
        let windows: Vec<usize> = parse_list("TEST", "30,60,120,252").unwrap();
        assert_eq!(windows, vec![30, 60, 120, 252]);
        let err = parse_list::<usize>("HEDGE_SWEEP_VOL_WINDOWS", "30,x").unwrap_err();
        assert!(err.to_string().contains("HEDGE_SWEEP_VOL_WINDOWS"), "{err}");
    }

    #[test]
    fn test_run_mode_parse() {
        assert_eq!("SWEEP".parse::<RunMode>().unwrap(), RunMode::Sweep);
        assert_eq!("monte_carlo".parse::<RunMode>().unwrap(), RunMode::MonteCarlo);
        assert_eq!(RunMode::Compare.to_string(), "compare");
        assert!("serve".parse::<RunMode>().is_err());
    }
}
