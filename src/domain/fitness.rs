//! Fitness scores and the rules for comparing them.
//!
//! One canonical scalar formula is used by the parametric optimizers:
//!
//! ```text
//! fitness = (1 + net_profit / 100) + 3 * total_trades * sign(net_profit)
//! ```
//!
//! Runs that close no trade, and expression candidates rejected by the validity
//! filters, receive [`PENALTY`] instead.

use super::metrics::Performance;
use std::cmp::Ordering;
use std::fmt;

pub const PENALTY: f64 = -100_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FitnessScore {
    Scalar(f64),
    Pair { net_profit: f64, average_profit: f64 },
}

impl FitnessScore {
    pub fn is_penalty(&self) -> bool {
        match *self {
            FitnessScore::Scalar(v) => v <= PENALTY,
            FitnessScore::Pair { net_profit, .. } => net_profit <= PENALTY,
        }
    }

    /// Primary component, used for statistics and logging.
    pub fn primary(&self) -> f64 {
        match *self {
            FitnessScore::Scalar(v) => v,
            FitnessScore::Pair { net_profit, .. } => net_profit,
        }
    }

    /// Total order used for ranking: scalars by value, pairs lexicographically by
    /// `(net_profit, average_profit)`. Mixed kinds compare on the primary component.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (
                FitnessScore::Pair {
                    net_profit: a_net,
                    average_profit: a_avg,
                },
                FitnessScore::Pair {
                    net_profit: b_net,
                    average_profit: b_avg,
                },
            ) => a_net.total_cmp(b_net).then(a_avg.total_cmp(b_avg)),
            _ => self.primary().total_cmp(&other.primary()),
        }
    }

    /// Pareto dominance: no component worse and at least one strictly better.
    /// For scalars this is plain `>`.
    pub fn dominates(&self, other: &Self) -> bool {
        match (self, other) {
            (
                FitnessScore::Pair {
                    net_profit: a_net,
                    average_profit: a_avg,
                },
                FitnessScore::Pair {
                    net_profit: b_net,
                    average_profit: b_avg,
                },
            ) => a_net >= b_net && a_avg >= b_avg && (a_net > b_net || a_avg > b_avg),
            _ => self.primary() > other.primary(),
        }
    }
}

impl fmt::Display for FitnessScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitnessScore::Scalar(v) => write!(f, "{:.4}", v),
            FitnessScore::Pair {
                net_profit,
                average_profit,
            } => write!(f, "({:.4}, {:.4})", net_profit, average_profit),
        }
    }
}

/// `(1 + net/100) + 3 * trades * sign(net)`, or [`PENALTY`] for zero trades.
pub fn canonical(perf: &Performance) -> f64 {
    if perf.total_trades == 0 {
        return PENALTY;
    }
    let score = (1.0 + perf.net_profit / 100.0)
        + 3.0 * perf.total_trades as f64 * 1.0_f64.copysign(perf.net_profit);
    if score.is_finite() { score } else { PENALTY }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FitnessMode {
    #[default]
    Canonical,
    Weighted {
        net_weight: f64,
        average_weight: f64,
    },
    Pareto,
}

impl FitnessMode {
    pub fn score(&self, perf: &Performance) -> FitnessScore {
        if perf.total_trades == 0 {
            return self.penalty();
        }
        match *self {
            FitnessMode::Canonical => FitnessScore::Scalar(canonical(perf)),
            FitnessMode::Weighted {
                net_weight,
                average_weight,
            } => {
                let v = net_weight * perf.net_profit + average_weight * perf.average_profit;
                FitnessScore::Scalar(if v.is_finite() { v } else { PENALTY })
            }
            FitnessMode::Pareto => {
                if perf.net_profit.is_finite() && perf.average_profit.is_finite() {
                    FitnessScore::Pair {
                        net_profit: perf.net_profit,
                        average_profit: perf.average_profit,
                    }
                } else {
                    self.penalty()
                }
            }
        }
    }

    pub fn penalty(&self) -> FitnessScore {
        match self {
            FitnessMode::Pareto => FitnessScore::Pair {
                net_profit: PENALTY,
                average_profit: PENALTY,
            },
            _ => FitnessScore::Scalar(PENALTY),
        }
    }

    pub fn is_pareto(&self) -> bool {
        matches!(self, FitnessMode::Pareto)
    }
}

impl fmt::Display for FitnessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitnessMode::Canonical => write!(f, "canonical"),
            FitnessMode::Weighted {
                net_weight,
                average_weight,
            } => write!(f, "weighted({}, {})", net_weight, average_weight),
            FitnessMode::Pareto => write!(f, "pareto"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::TradeLedger;

    fn perf(net_profit: f64, total_trades: usize, average_profit: f64) -> Performance {
        let mut p = Performance::evaluate(&TradeLedger::new(), 100.0 + net_profit, 100.0);
        p.total_trades = total_trades;
        p.average_profit = average_profit;
        p
    }

    #[test]
    fn canonical_formula() {
        assert!((canonical(&perf(20.0, 1, 20.0)) - (1.2 + 3.0)).abs() < 1e-12);
        assert!((canonical(&perf(-10.0, 2, -5.0)) - (0.9 - 6.0)).abs() < 1e-12);
    }

    #[test]
    fn zero_net_with_trades_counts_as_positive_sign() {
        assert!((canonical(&perf(0.0, 1, 0.0)) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn zero_trades_is_penalized_in_every_mode() {
        let p = perf(50.0, 0, 0.0);
        assert_eq!(canonical(&p), PENALTY);
        for mode in [
            FitnessMode::Canonical,
            FitnessMode::Weighted {
                net_weight: 1.0,
                average_weight: 1.0,
            },
            FitnessMode::Pareto,
        ] {
            assert!(mode.score(&p).is_penalty(), "{mode}");
        }
    }

    #[test]
    fn weighted_scalarization() {
        let mode = FitnessMode::Weighted {
            net_weight: 2.0,
            average_weight: 0.5,
        };
        assert_eq!(mode.score(&perf(10.0, 3, 4.0)), FitnessScore::Scalar(22.0));
    }

    #[test]
    fn pareto_dominance() {
        let a = FitnessScore::Pair {
            net_profit: 10.0,
            average_profit: 2.0,
        };
        let b = FitnessScore::Pair {
            net_profit: 5.0,
            average_profit: 2.0,
        };
        let c = FitnessScore::Pair {
            net_profit: 1.0,
            average_profit: 9.0,
        };
        assert!(a.dominates(&b));
        assert!(!b.dominates(&a));
        assert!(!a.dominates(&c));
        assert!(!c.dominates(&a));
        assert!(!a.dominates(&a));
    }

    #[test]
    fn pair_ordering_is_lexicographic() {
        let a = FitnessScore::Pair {
            net_profit: 10.0,
            average_profit: 1.0,
        };
        let b = FitnessScore::Pair {
            net_profit: 10.0,
            average_profit: 3.0,
        };
        assert_eq!(a.total_cmp(&b), Ordering::Less);
        assert_eq!(
            FitnessScore::Scalar(2.0).total_cmp(&FitnessScore::Scalar(1.0)),
            Ordering::Greater
        );
    }
}
