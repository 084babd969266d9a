use crate::errors::{HedgeError, HedgeResult};
use crate::state::PriceField;
use std::str::FromStr;

/// Rule deciding on which trading days the hedge position is adjusted.
///
/// Target shares are always delta * quantity; the variants only differ in
/// *when* the trade executes. Day 0 always trades (initial hedge).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RebalancePolicy {
    /// Trade on day indices that are multiples of `frequency`, plus the last day
    ByDay { frequency: usize },
    /// Trade when |target - current| shares exceeds `limit`
    ByLotThreshold { limit: f64 },
    /// Trade when |target - current| shares exceeds `limit * quantity`
    ByDeltaThreshold { limit: f64 },
}

/// Inputs to one daily decision. Stack-allocated.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext {
    pub day_index: usize,
    pub is_last_day: bool,
    pub current_shares: f64,
    pub target_shares: f64,
    pub quantity: f64,
}

/// Which bar quote sizes the trades and which one marks the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PriceBasis {
    pub sizing: PriceField,
    pub valuation: PriceField,
}

impl PriceBasis {
    pub const OPEN_OPEN: Self = Self { sizing: PriceField::Open, valuation: PriceField::Open };
    pub const OPEN_CLOSE: Self = Self { sizing: PriceField::Open, valuation: PriceField::Close };
}

impl RebalancePolicy {
    pub fn validate(&self) -> HedgeResult<()> {
        match *self {
            Self::ByDay { frequency } if frequency == 0 => Err(HedgeError::Config(
                "rebalance frequency must be at least 1 day".into(),
            )),
            Self::ByLotThreshold { limit } | Self::ByDeltaThreshold { limit }
                if !(limit >= 0.0) =>
            {
                Err(HedgeError::Config(format!(
                    "rebalance threshold must be a non-negative number, got {limit}"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Whether a trade executes today. Pure function.
    #[inline]
    pub fn should_rebalance(&self, ctx: &DecisionContext) -> bool {
        if ctx.day_index == 0 {
            return true;
        }
        let gap = (ctx.target_shares - ctx.current_shares).abs();
        match *self {
            Self::ByDay { frequency } => ctx.day_index % frequency.max(1) == 0 || ctx.is_last_day,
            Self::ByLotThreshold { limit } => gap > limit,
            Self::ByDeltaThreshold { limit } => gap > limit * ctx.quantity,
        }
    }

    /// ByDay sizes and marks on the open. The threshold policies size on
    /// the open but mark the book at the close.
    pub fn default_price_basis(&self) -> PriceBasis {
        match self {
            Self::ByDay { .. } => PriceBasis::OPEN_OPEN,
            Self::ByLotThreshold { .. } | Self::ByDeltaThreshold { .. } => PriceBasis::OPEN_CLOSE,
        }
    }
}

impl std::fmt::Display for RebalancePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ByDay { frequency } => write!(f, "day:{frequency}"),
            Self::ByLotThreshold { limit } => write!(f, "lot:{limit}"),
            Self::ByDeltaThreshold { limit } => write!(f, "delta:{limit}"),
        }
    }
}

/// Parses `day:N`, `lot:N` or `delta:X`.
impl FromStr for RebalancePolicy {
    type Err = HedgeError;

    fn from_str(s: &str) -> HedgeResult<Self> {
        let (kind, value) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| HedgeError::Config(format!("policy '{s}': expected kind:value")))?;

        let policy = match kind.trim().to_ascii_lowercase().as_str() {
            "day" => Self::ByDay {
                frequency: value
                    .trim()
                    .parse()
                    .map_err(|e| HedgeError::Config(format!("policy '{s}': {e}")))?,
            },
            "lot" => Self::ByLotThreshold {
                limit: value
                    .trim()
                    .parse()
                    .map_err(|e| HedgeError::Config(format!("policy '{s}': {e}")))?,
            },
            "delta" => Self::ByDeltaThreshold {
                limit: value
                    .trim()
                    .parse()
                    .map_err(|e| HedgeError::Config(format!("policy '{s}': {e}")))?,
            },
            other => {
                return Err(HedgeError::Config(format!(
                    "policy '{s}': unknown kind '{other}' (day, lot, delta)"
                )))
            }
        };
        policy.validate()?;
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(day_index: usize, is_last_day: bool, current: f64, target: f64) -> DecisionContext {
        DecisionContext {
            day_index,
            is_last_day,
            current_shares: current,
            target_shares: target,
            quantity: 1000.0,
        }
    }

    #[test]
    fn test_by_day_every_day() {
        let p = RebalancePolicy::ByDay { frequency: 1 };
        for i in 0..10 {
            assert!(p.should_rebalance(&ctx(i, i == 9, 500.0, 500.0)), "day {i}");
        }
    }

    #[test]
    fn test_by_day_multiples_plus_last() {
        let p = RebalancePolicy::ByDay { frequency: 3 };
        let traded: Vec<usize> = (0..8)
            .filter(|&i| p.should_rebalance(&ctx(i, i == 7, 0.0, 0.0)))
            .collect();
        assert_eq!(traded, vec![0, 3, 6, 7]);
    }

    #[test]
    fn test_lot_threshold_is_strict() {
        let p = RebalancePolicy::ByLotThreshold { limit: 50.0 };
        assert!(!p.should_rebalance(&ctx(4, false, 500.0, 550.0)));
        assert!(!p.should_rebalance(&ctx(4, false, 500.0, 450.0)));
        assert!(p.should_rebalance(&ctx(4, false, 500.0, 550.5)));
        assert!(p.should_rebalance(&ctx(4, false, 500.0, 449.0)));
        // Threshold policies do not force the last day
        assert!(!p.should_rebalance(&ctx(4, true, 500.0, 510.0)));
    }

    #[test]
    fn test_delta_threshold_scales_with_quantity() {
        let p = RebalancePolicy::ByDeltaThreshold { limit: 0.05 };
        // 0.05 * 1000 = 50 shares
        assert!(!p.should_rebalance(&ctx(2, false, 400.0, 440.0)));
        assert!(p.should_rebalance(&ctx(2, false, 400.0, 460.0)));
    }

    #[test]
    fn test_day_zero_always_trades() {
        let p = RebalancePolicy::ByLotThreshold { limit: 1e9 };
        assert!(p.should_rebalance(&ctx(0, false, 0.0, 0.0)));
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("day:5".parse::<RebalancePolicy>().unwrap(), RebalancePolicy::ByDay { frequency: 5 });
        assert_eq!(
            " LOT : 100 ".parse::<RebalancePolicy>().unwrap(),
            RebalancePolicy::ByLotThreshold { limit: 100.0 }
        );
        let d: RebalancePolicy = "delta:0.05".parse().unwrap();
        assert_eq!(d.to_string(), "delta:0.05");
        assert!("day:0".parse::<RebalancePolicy>().is_err());
        assert!("lot:-1".parse::<RebalancePolicy>().is_err());
        assert!("weekly:2".parse::<RebalancePolicy>().is_err());
        assert!("day".parse::<RebalancePolicy>().is_err());
    }

    #[test]
    fn test_price_basis_per_policy() {
        assert_eq!(RebalancePolicy::ByDay { frequency: 2 }.default_price_basis(), PriceBasis::OPEN_OPEN);
        assert_eq!(
            RebalancePolicy::ByLotThreshold { limit: 10.0 }.default_price_basis(),
            PriceBasis::OPEN_CLOSE
        );
    }
}
