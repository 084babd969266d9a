use crate::errors::{HedgeError, HedgeResult};
use crate::models::volatility::std_dev;
use crate::montecarlo::MonteCarloEnsemble;

/// Two-sided 95% normal critical value
pub const Z_95: f64 = 1.96;

/// Per-step statistics of an ensemble; every vector has n_steps + 1 entries.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EnsembleStats {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
    pub min: Vec<f64>,
    pub max: Vec<f64>,
    pub lower_quantile: f64,
    pub upper_quantile: f64,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// How much of a realized path sits inside the simulated bands.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BandCoverage {
    pub steps: usize,
    pub inside_quantile_band: usize,
    pub inside_normal_band: usize,
    pub quantile_fraction: f64,
    pub normal_fraction: f64,
    /// Steps that fell outside the quantile band
    pub quantile_misses: Vec<usize>,
}

impl EnsembleStats {
    pub fn from_ensemble(
        ensemble: &MonteCarloEnsemble,
        lower_quantile: f64,
        upper_quantile: f64,
    ) -> HedgeResult<Self> {
        if !(0.0..=1.0).contains(&lower_quantile)
            || !(0.0..=1.0).contains(&upper_quantile)
            || lower_quantile > upper_quantile
        {
            return Err(HedgeError::Config(format!(
                "quantile band [{lower_quantile}, {upper_quantile}] must lie within [0, 1]"
            )));
        }

        let width = ensemble.n_steps() + 1;
        let mut stats = Self {
            mean: Vec::with_capacity(width),
            std: Vec::with_capacity(width),
            min: Vec::with_capacity(width),
            max: Vec::with_capacity(width),
            lower_quantile,
            upper_quantile,
            lower: Vec::with_capacity(width),
            upper: Vec::with_capacity(width),
        };

        for step in 0..width {
            let mut column = ensemble.column(step);
            column.sort_by(f64::total_cmp);
            stats.mean.push(mean(&column));
            stats.std.push(std_dev(&column));
            stats.min.push(column[0]);
            stats.max.push(column[column.len() - 1]);
            stats.lower.push(quantile(&column, lower_quantile));
            stats.upper.push(quantile(&column, upper_quantile));
        }
        Ok(stats)
    }

    #[inline]
    pub fn steps(&self) -> usize {
        self.mean.len().saturating_sub(1)
    }

    /// Compare a realized path (S0 first) against both bands, steps 1..=n.
    pub fn coverage(&self, realized: &[f64]) -> HedgeResult<BandCoverage> {
        if realized.len() != self.mean.len() {
            return Err(HedgeError::SeriesMisalignment(format!(
                "realized path has {} prices, ensemble has {}",
                realized.len(),
                self.mean.len()
            )));
        }

        let mut inside_quantile_band = 0;
        let mut inside_normal_band = 0;
        let mut quantile_misses = Vec::new();
        for step in 1..realized.len() {
            let price = realized[step];
            if price >= self.lower[step] && price <= self.upper[step] {
                inside_quantile_band += 1;
            } else {
                quantile_misses.push(step);
            }
            let half_width = Z_95 * self.std[step];
            if (price - self.mean[step]).abs() <= half_width {
                inside_normal_band += 1;
            }
        }

        let steps = self.steps();
        let frac = |n: usize| if steps == 0 { 0.0 } else { n as f64 / steps as f64 };
        Ok(BandCoverage {
            steps,
            inside_quantile_band,
            inside_normal_band,
            quantile_fraction: frac(inside_quantile_band),
            normal_fraction: frac(inside_normal_band),
            quantile_misses,
        })
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Quantile of sorted data, linear interpolation between closest ranks
/// (position q * (n - 1)).
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}
