pub mod stats;
pub mod validation;

use crate::errors::{HedgeError, HedgeResult};
use crate::models::gbm;
use rand::Rng;
use std::str::FromStr;

/// Which GBM discretization builds each path. The two are not
/// interchangeable numerically; callers pick one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GbmSampler {
    Euler,
    ClosedForm,
}

impl FromStr for GbmSampler {
    type Err = HedgeError;

    fn from_str(s: &str) -> HedgeResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "euler" => Ok(Self::Euler),
            "closed_form" | "closed-form" | "exact" => Ok(Self::ClosedForm),
            other => Err(HedgeError::Config(format!(
                "unknown GBM sampler '{other}' (euler, closed_form)"
            ))),
        }
    }
}

impl std::fmt::Display for GbmSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Euler => write!(f, "euler"),
            Self::ClosedForm => write!(f, "closed_form"),
        }
    }
}

/// GBM path generator with fixed start price, drift and volatility.
#[derive(Debug, Clone, Copy)]
pub struct MonteCarloGenerator {
    pub s0: f64,
    pub mu: f64,
    pub sigma: f64,
    pub sampler: GbmSampler,
}

impl MonteCarloGenerator {
    /// `n_paths` independent trajectories of `n_steps` steps each (dt = 1/n_steps).
    pub fn generate<R: Rng + ?Sized>(
        &self,
        n_steps: usize,
        n_paths: usize,
        rng: &mut R,
    ) -> HedgeResult<MonteCarloEnsemble> {
        if n_paths == 0 {
            return Err(HedgeError::Config("Monte Carlo needs at least one path".into()));
        }

        let paths = (0..n_paths)
            .map(|_| match self.sampler {
                GbmSampler::Euler => gbm::euler_path(n_steps, self.s0, self.mu, self.sigma, None, &mut *rng),
                GbmSampler::ClosedForm => {
                    gbm::closed_form_path(n_steps, self.s0, self.mu, self.sigma, &mut *rng)
                }
            })
            .collect::<HedgeResult<Vec<_>>>()?;

        tracing::debug!(
            sampler = %self.sampler,
            n_steps,
            n_paths,
            s0 = self.s0,
            mu = self.mu,
            sigma = self.sigma,
            "ensemble generated"
        );
        Ok(MonteCarloEnsemble { n_steps, paths })
    }
}

/// n_paths x (n_steps + 1) prices, column 0 fixed at S0.
#[derive(Debug, Clone)]
pub struct MonteCarloEnsemble {
    n_steps: usize,
    paths: Vec<Vec<f64>>,
}

impl MonteCarloEnsemble {
    #[inline]
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    #[inline]
    pub fn n_paths(&self) -> usize {
        self.paths.len()
    }

    #[cfg(test)]
    pub fn paths(&self) -> &[Vec<f64>] {
        &self.paths
    }

    /// Every path's price at `step`.
    pub fn column(&self, step: usize) -> Vec<f64> {
        self.paths.iter().map(|p| p[step]).collect()
    }

    pub fn terminals(&self) -> Vec<f64> {
        self.column(self.n_steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::gbm::seeded_rng;

    fn generator(sampler: GbmSampler) -> MonteCarloGenerator {
        MonteCarloGenerator { s0: 35.0, mu: 0.06, sigma: 0.35, sampler }
    }

    #[test]
    fn test_ensemble_shape() {
        for sampler in [GbmSampler::Euler, GbmSampler::ClosedForm] {
            let ens = generator(sampler).generate(20, 50, &mut seeded_rng(Some(1))).unwrap();
            assert_eq!(ens.n_paths(), 50);
            assert_eq!(ens.n_steps(), 20);
            assert!(ens.paths().iter().all(|p| p.len() == 21), "{sampler}");
            assert!(ens.column(0).iter().all(|&s| s == 35.0), "{sampler}");
            assert_eq!(ens.terminals().len(), 50);
        }
    }

    #[test]
    fn test_seeded_ensembles_reproduce() {
        let a = generator(GbmSampler::Euler).generate(10, 5, &mut seeded_rng(Some(11))).unwrap();
        let b = generator(GbmSampler::Euler).generate(10, 5, &mut seeded_rng(Some(11))).unwrap();
        assert_eq!(a.paths(), b.paths());
    }

    #[test]
    fn test_zero_paths_rejected() {
        let result = generator(GbmSampler::ClosedForm).generate(10, 0, &mut seeded_rng(Some(1)));
        assert!(matches!(result, Err(HedgeError::Config(_))));
    }

    #[test]
    fn test_sampler_parse() {
        assert_eq!("euler".parse::<GbmSampler>().unwrap(), GbmSampler::Euler);
        assert_eq!("Closed_Form".parse::<GbmSampler>().unwrap(), GbmSampler::ClosedForm);
        assert_eq!(GbmSampler::ClosedForm.to_string(), "closed_form");
        assert!("milstein".parse::<GbmSampler>().is_err());
    }
}
