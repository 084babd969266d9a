use crate::errors::{HedgeError, HedgeResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Geometric Brownian motion samplers.
///
///   dS = mu*S dt + sigma*S dW
///
/// Two discretizations, deliberately kept apart because they are not
/// numerically identical:
///   closed form: S' = S * exp((mu - sigma^2/2)*dt + sigma*sqrt(dt)*Z)
///   Euler:       S' = S + S * (mu*dt + sigma*sqrt(dt)*Z)

/// Seeded RNG when a seed is given, fresh entropy otherwise.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

fn validate(s: f64, sigma: f64, dt: f64) -> HedgeResult<()> {
    if !(s > 0.0) {
        return Err(HedgeError::InvalidPricingParameter(format!(
            "GBM start price must be positive (S={s})"
        )));
    }
    if !(sigma >= 0.0) {
        return Err(HedgeError::InvalidPricingParameter(format!(
            "GBM volatility must be non-negative (sigma={sigma})"
        )));
    }
    if !(dt > 0.0) {
        return Err(HedgeError::InvalidPricingParameter(format!(
            "GBM time increment must be positive (dt={dt})"
        )));
    }
    Ok(())
}

/// One exact GBM step with a given standard normal draw.
#[inline]
pub fn closed_form_step(s: f64, mu: f64, sigma: f64, dt: f64, z: f64) -> HedgeResult<f64> {
    validate(s, sigma, dt)?;
    Ok(s * ((mu - 0.5 * sigma * sigma) * dt + sigma * dt.sqrt() * z).exp())
}

/// Future price after `dt` years. Draws Z from `rng` unless `z` pins it.
pub fn future_price<R: Rng + ?Sized>(
    s: f64,
    mu: f64,
    sigma: f64,
    dt: f64,
    z: Option<f64>,
    rng: &mut R,
) -> HedgeResult<f64> {
    let z = match z {
        Some(z) => z,
        None => rng.sample(StandardNormal),
    };
    closed_form_step(s, mu, sigma, dt, z)
}

/// Closed-form path of `n` steps over a unit horizon (dt = 1/n).
pub fn closed_form_path<R: Rng + ?Sized>(
    n: usize,
    s0: f64,
    mu: f64,
    sigma: f64,
    rng: &mut R,
) -> HedgeResult<Vec<f64>> {
    if n == 0 {
        return Err(HedgeError::InvalidPricingParameter("GBM path needs at least one step".into()));
    }
    let dt = 1.0 / n as f64;
    let mut path = Vec::with_capacity(n + 1);
    let mut s = s0;
    path.push(s);
    for _ in 0..n {
        s = future_price(s, mu, sigma, dt, None, rng)?;
        path.push(s);
    }
    Ok(path)
}

/// Recursive Euler path with dt = 1/n, stopped after `until_step` steps
/// (capped at `n`). The returned path includes S0.
pub fn euler_path<R: Rng + ?Sized>(
    n: usize,
    s0: f64,
    mu: f64,
    sigma: f64,
    until_step: Option<usize>,
    rng: &mut R,
) -> HedgeResult<Vec<f64>> {
    if n == 0 {
        return Err(HedgeError::InvalidPricingParameter("GBM path needs at least one step".into()));
    }
    let dt = 1.0 / n as f64;
    validate(s0, sigma, dt)?;

    let steps = until_step.map_or(n, |k| k.min(n));
    let sqrt_dt = dt.sqrt();
    let mut path = Vec::with_capacity(steps + 1);
    let mut s = s0;
    path.push(s);
    for _ in 0..steps {
        let z: f64 = rng.sample(StandardNormal);
        s += s * (mu * dt + sigma * sqrt_dt * z);
        path.push(s);
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::volatility::std_dev;

    #[test]
    fn test_zero_shock_is_deterministic_growth() {
        let mut rng = seeded_rng(Some(1));
        let (s0, mu, sigma, t) = (100.0, 0.10, 0.30, 30.0 / 252.0);
        let s = future_price(s0, mu, sigma, t, Some(0.0), &mut rng).unwrap();
        assert_eq!(s / s0, ((mu - 0.5 * sigma * sigma) * t).exp());
        assert!(s > s0, "positive drift with z=0 should grow: {s}");
    }

    #[test]
    fn test_invalid_increment_rejected() {
        let mut rng = seeded_rng(Some(1));
        assert!(matches!(
            future_price(100.0, 0.10, 0.30, 0.0, None, &mut rng),
            Err(HedgeError::InvalidPricingParameter(_))
        ));
        assert!(matches!(
            future_price(100.0, 0.10, 0.30, -1.0, None, &mut rng),
            Err(HedgeError::InvalidPricingParameter(_))
        ));
    }

    #[test]
    fn test_closed_form_terminal_moments() {
        let mut rng = seeded_rng(Some(42));
        let (s0, mu, sigma, t) = (100.0, 0.10, 0.30, 30.0 / 252.0);
        let n = 5000;
        let samples: Vec<f64> = (0..n)
            .map(|_| future_price(s0, mu, sigma, t, None, &mut rng).unwrap())
            .collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let std = std_dev(&samples);

        let expected_mean = s0 * (mu * t).exp();
        let expected_std = expected_mean * ((sigma * sigma * t).exp() - 1.0).sqrt();
        assert!((mean - expected_mean).abs() < 0.05 * expected_mean, "mean={mean} expected={expected_mean}");
        assert!((std - expected_std).abs() < 0.10 * expected_std, "std={std} expected={expected_std}");
    }

    #[test]
    fn test_euler_terminal_moments() {
        let mut rng = seeded_rng(Some(7));
        let (s0, mu, sigma) = (100.0, 0.10, 0.30);
        let n_paths = 3000;
        let terminals: Vec<f64> = (0..n_paths)
            .map(|_| *euler_path(50, s0, mu, sigma, None, &mut rng).unwrap().last().unwrap())
            .collect();
        let mean = terminals.iter().sum::<f64>() / n_paths as f64;
        let std = std_dev(&terminals);

        // Unit horizon: E[S_1] = S0*e^mu
        let expected_mean = s0 * mu.exp();
        let expected_std = expected_mean * ((sigma * sigma).exp() - 1.0).sqrt();
        assert!((mean - expected_mean).abs() < 0.05 * expected_mean, "mean={mean} expected={expected_mean}");
        assert!((std - expected_std).abs() < 0.10 * expected_std, "std={std} expected={expected_std}");
    }

    #[test]
    fn test_euler_partial_path_and_seed_reproducibility() {
        let a = euler_path(20, 50.0, 0.05, 0.2, Some(7), &mut seeded_rng(Some(9))).unwrap();
        let b = euler_path(20, 50.0, 0.05, 0.2, Some(7), &mut seeded_rng(Some(9))).unwrap();
        assert_eq!(a.len(), 8);
        assert_eq!(a, b);
        assert_eq!(a[0], 50.0);

        let capped = euler_path(5, 50.0, 0.05, 0.2, Some(99), &mut seeded_rng(Some(9))).unwrap();
        assert_eq!(capped.len(), 6);
    }

    #[test]
    fn test_samplers_diverge_for_same_draws() {
        // Same seed feeds both samplers identical shocks, but the paths differ.
        let cf = closed_form_path(10, 100.0, 0.1, 0.4, &mut seeded_rng(Some(3))).unwrap();
        let eu = euler_path(10, 100.0, 0.1, 0.4, None, &mut seeded_rng(Some(3))).unwrap();
        assert_eq!(cf.len(), eu.len());
        assert!(cf.iter().zip(&eu).skip(1).any(|(a, b)| (a - b).abs() > 1e-9));
    }
}
