use crate::errors::{HedgeError, HedgeResult};
use crate::state::OptionKind;
use statrs::distribution::{ContinuousCDF, Normal};

/// Black-Scholes European option pricing (no dividends).
///
/// d1 = (ln(S/K) + (r + sigma^2/2)*T) / (sigma * sqrt(T))
/// d2 = d1 - sigma * sqrt(T)
///
/// call = S*Phi(d1) - K*e^{-rT}*Phi(d2)
/// call delta = Phi(d1), put delta = Phi(d1) - 1
///
/// Pure functions. T is in years; callers derive it from
/// trading sessions remaining / 252.

#[inline]
fn phi(x: f64) -> f64 {
    Normal::standard().cdf(x)
}

fn validate(s: f64, k: f64, t: f64, sigma: f64) -> HedgeResult<()> {
    if !(s > 0.0) || !(k > 0.0) {
        return Err(HedgeError::InvalidPricingParameter(format!(
            "spot and strike must be positive (S={s}, K={k})"
        )));
    }
    if !(t > 0.0) {
        return Err(HedgeError::InvalidPricingParameter(format!(
            "time to expiry must be positive (T={t})"
        )));
    }
    if !(sigma > 0.0) {
        return Err(HedgeError::InvalidPricingParameter(format!(
            "volatility must be positive (sigma={sigma})"
        )));
    }
    Ok(())
}

/// d1 term, assuming validated inputs.
#[inline]
fn d1(s: f64, k: f64, t: f64, r: f64, sigma: f64) -> f64 {
    ((s / k).ln() + (r + 0.5 * sigma * sigma) * t) / (sigma * t.sqrt())
}

/// Black-Scholes price of a European call.
pub fn call_price(s: f64, k: f64, t: f64, r: f64, sigma: f64) -> HedgeResult<f64> {
    validate(s, k, t, sigma)?;
    let d1 = d1(s, k, t, r, sigma);
    let d2 = d1 - sigma * t.sqrt();
    Ok(s * phi(d1) - k * (-r * t).exp() * phi(d2))
}

/// Black-Scholes delta for a call or a put.
pub fn delta(kind: OptionKind, s: f64, k: f64, t: f64, r: f64, sigma: f64) -> HedgeResult<f64> {
    validate(s, k, t, sigma)?;
    let d1 = d1(s, k, t, r, sigma);
    if d1.is_nan() {
        return Err(HedgeError::InvalidPricingParameter(format!(
            "d1 undefined for S={s}, K={k}, T={t}, r={r}, sigma={sigma}"
        )));
    }
    // Phi saturates cleanly at +/-inf, so T -> 0+ collapses to 0 or 1.
    let call_delta = phi(d1);
    Ok(match kind {
        OptionKind::Call => call_delta,
        OptionKind::Put => call_delta - 1.0,
    })
}

/// Moneyness bucket derived from a call delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Moneyness {
    Otm,
    Atm,
    Itm,
}

impl Moneyness {
    pub fn from_delta(delta: f64) -> Self {
        if delta <= 0.30 {
            Self::Otm
        } else if delta <= 0.70 {
            Self::Atm
        } else {
            Self::Itm
        }
    }
}

impl std::fmt::Display for Moneyness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Otm => write!(f, "OTM"),
            Self::Atm => write!(f, "ATM"),
            Self::Itm => write!(f, "ITM"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T30: f64 = 30.0 / 252.0;

    #[test]
    fn test_atm_call_delta_reference_case() {
        let d = delta(OptionKind::Call, 100.0, 100.0, T30, 0.10, 0.30).unwrap();
        assert!(d > 0.43 && d < 0.57, "ATM call delta={d} should be near 0.5");
    }

    #[test]
    fn test_put_delta_is_call_minus_one() {
        let c = delta(OptionKind::Call, 100.0, 100.0, T30, 0.10, 0.30).unwrap();
        let p = delta(OptionKind::Put, 100.0, 100.0, T30, 0.10, 0.30).unwrap();
        assert_eq!(p, c - 1.0);
        assert!(p > -0.58 && p < -0.42, "ATM put delta={p}");
    }

    #[test]
    fn test_atm_delta_band_over_typical_grid() {
        for &sigma in &[0.30, 0.45, 0.60] {
            for &r in &[0.0, 0.06, 0.10] {
                for &days in &[5.0, 21.0, 42.0] {
                    let t = days / 252.0;
                    let c = delta(OptionKind::Call, 50.0, 50.0, t, r, sigma).unwrap();
                    let p = delta(OptionKind::Put, 50.0, 50.0, t, r, sigma).unwrap();
                    assert!(c > 0.45 && c < 0.60, "call delta={c} sigma={sigma} r={r} days={days}");
                    assert!(p > -0.60 && p < -0.40, "put delta={p} sigma={sigma} r={r} days={days}");
                }
            }
        }
    }

    #[test]
    fn test_itm_otm_and_monotonic_in_spot() {
        let itm = delta(OptionKind::Call, 110.0, 100.0, T30, 0.10, 0.30).unwrap();
        let otm = delta(OptionKind::Call, 90.0, 100.0, T30, 0.10, 0.30).unwrap();
        assert!(itm > 0.5 && itm < 1.0, "ITM delta={itm}");
        assert!(otm < 0.5 && otm > 0.0, "OTM delta={otm}");

        let mut prev = 0.0;
        for spot in (60..=140).map(|s| s as f64) {
            let d = delta(OptionKind::Call, spot, 100.0, T30, 0.10, 0.30).unwrap();
            assert!(d >= prev, "delta must not decrease in S: S={spot} d={d} prev={prev}");
            prev = d;
        }
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(matches!(
            delta(OptionKind::Call, 100.0, 100.0, 0.0, 0.10, 0.30),
            Err(HedgeError::InvalidPricingParameter(_))
        ));
        assert!(matches!(
            delta(OptionKind::Call, 100.0, 100.0, T30, 0.10, 0.0),
            Err(HedgeError::InvalidPricingParameter(_))
        ));
        assert!(matches!(
            call_price(-1.0, 100.0, T30, 0.10, 0.30),
            Err(HedgeError::InvalidPricingParameter(_))
        ));
        assert!(matches!(
            call_price(100.0, 100.0, -0.1, 0.10, 0.30),
            Err(HedgeError::InvalidPricingParameter(_))
        ));
    }

    #[test]
    fn test_near_expiry_is_stable() {
        let t = 1e-12;
        let itm = delta(OptionKind::Call, 101.0, 100.0, t, 0.10, 0.30).unwrap();
        let otm = delta(OptionKind::Call, 99.0, 100.0, t, 0.10, 0.30).unwrap();
        assert!((itm - 1.0).abs() < 1e-9, "ITM near expiry delta={itm}");
        assert!(otm.abs() < 1e-9, "OTM near expiry delta={otm}");
    }

    #[test]
    fn test_call_price_reference_value() {
        // Hull's textbook case: S=K=100, T=1, r=5%, sigma=20% -> 10.4506
        let c = call_price(100.0, 100.0, 1.0, 0.05, 0.20).unwrap();
        assert!((c - 10.4506).abs() < 1e-3, "call price={c}");
        let deep = call_price(150.0, 100.0, T30, 0.10, 0.30).unwrap();
        let floor = 150.0 - 100.0 * (-0.10 * T30).exp();
        assert!(deep >= floor - 1e-9, "call below intrinsic: {deep} < {floor}");
    }

    #[test]
    fn test_moneyness_buckets() {
        assert_eq!(Moneyness::from_delta(0.30), Moneyness::Otm);
        assert_eq!(Moneyness::from_delta(0.31), Moneyness::Atm);
        assert_eq!(Moneyness::from_delta(0.70), Moneyness::Atm);
        assert_eq!(Moneyness::from_delta(0.71), Moneyness::Itm);
    }
}
