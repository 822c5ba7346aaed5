//! Buy/sell expression pairs: validity filters, binding to a series, and scoring.

use std::fmt;

use rand::Rng;
use tracing::debug;

use super::generate::{self, DepthRange};
use super::operators;
use super::tree::{BoolExpr, Env};
use crate::domain::error::EvotraderError;
use crate::domain::fitness::{FitnessMode, FitnessScore};
use crate::domain::metrics::Performance;
use crate::domain::optimizer::Evaluate;
use crate::domain::price_series::{MACD_DIFF, PriceSeries, RSI};
use crate::domain::simulator::{self, SimulationConfig};
use crate::domain::trigger::Trigger;

/// DEAP-style static height limit.
pub const DEFAULT_MAX_HEIGHT: usize = 17;

/// Draws per side before a random predicate is accepted even if invalid.
pub const INIT_ATTEMPTS: usize = 200;

/// Mutations tried per side before the last mutant is kept regardless.
pub const MUTATION_ATTEMPTS: usize = 20;

/// Environments a predicate must not answer identically. The first two are the
/// classic `(t=100, 0, 0)` / `(t=100, 1, 1)` pair; the others separate common
/// RSI-band predicates that the first pair alone would call constant.
pub const PROBES: [Env; 4] = [
    Env {
        t: 100.0,
        macd_diff: 0.0,
        rsi: 0.0,
    },
    Env {
        t: 100.0,
        macd_diff: 1.0,
        rsi: 1.0,
    },
    Env {
        t: 100.0,
        macd_diff: -5.0,
        rsi: 50.0,
    },
    Env {
        t: 100.0,
        macd_diff: 5.0,
        rsi: 90.0,
    },
];

/// Which side(s) of the pair the search varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpTarget {
    #[default]
    Both,
    /// Sell side stays at `rsi > 70`.
    BuyOnly,
    /// Buy side stays at `rsi < 30`.
    SellOnly,
}

impl GpTarget {
    pub fn evolves_buy(self) -> bool {
        !matches!(self, GpTarget::SellOnly)
    }

    pub fn evolves_sell(self) -> bool {
        !matches!(self, GpTarget::BuyOnly)
    }
}

impl fmt::Display for GpTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GpTarget::Both => "both",
            GpTarget::BuyOnly => "buy",
            GpTarget::SellOnly => "sell",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalid {
    Constant,
    TooDeep { height: usize, limit: usize },
    NoIndicator,
}

impl fmt::Display for Invalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invalid::Constant => write!(f, "constant predicate"),
            Invalid::TooDeep { height, limit } => {
                write!(f, "height {} exceeds limit {}", height, limit)
            }
            Invalid::NoIndicator => write!(f, "no indicator terminal"),
        }
    }
}

/// Rejects predicates that cannot express a useful trigger.
pub fn check_validity(expr: &BoolExpr, max_height: usize) -> Result<(), Invalid> {
    let height = expr.height();
    if height > max_height {
        return Err(Invalid::TooDeep {
            height,
            limit: max_height,
        });
    }
    if !expr.uses_indicator() {
        return Err(Invalid::NoIndicator);
    }
    let first = expr.eval(&PROBES[0]);
    if PROBES[1..].iter().all(|env| expr.eval(env) == first) {
        return Err(Invalid::Constant);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerPair {
    pub buy: BoolExpr,
    pub sell: BoolExpr,
}

impl Default for TriggerPair {
    fn default() -> Self {
        Self {
            buy: operators::default_buy(),
            sell: operators::default_sell(),
        }
    }
}

impl TriggerPair {
    pub fn new(buy: BoolExpr, sell: BoolExpr) -> Self {
        Self { buy, sell }
    }

    /// Random pair; sides that are not evolved keep their default predicate.
    ///
    /// Each evolved side is redrawn until it passes [`check_validity`], up to
    /// [`INIT_ATTEMPTS`] draws.
    pub fn random<R: Rng + ?Sized>(
        target: GpTarget,
        depth: DepthRange,
        max_height: usize,
        rng: &mut R,
    ) -> Self {
        let mut pair = Self::default();
        if target.evolves_buy() {
            pair.buy = random_predicate(depth, max_height, rng);
        }
        if target.evolves_sell() {
            pair.sell = random_predicate(depth, max_height, rng);
        }
        pair
    }

    /// Validity of the evolved sides only.
    pub fn check(&self, target: GpTarget, max_height: usize) -> Result<(), Invalid> {
        if target.evolves_buy() {
            check_validity(&self.buy, max_height)?;
        }
        if target.evolves_sell() {
            check_validity(&self.sell, max_height)?;
        }
        Ok(())
    }

    /// Typed one-point crossover, buy trees and sell trees independently.
    pub fn crossover<R: Rng + ?Sized>(a: &mut Self, b: &mut Self, target: GpTarget, rng: &mut R) {
        if target.evolves_buy() {
            operators::crossover(&mut a.buy, &mut b.buy, rng);
        }
        if target.evolves_sell() {
            operators::crossover(&mut a.sell, &mut b.sell, rng);
        }
    }

    /// Mutates each evolved side, retrying from the parent tree while the
    /// mutant is invalid.
    pub fn mutate<R: Rng + ?Sized>(&mut self, target: GpTarget, max_height: usize, rng: &mut R) {
        if target.evolves_buy() {
            mutate_predicate(&mut self.buy, max_height, rng);
        }
        if target.evolves_sell() {
            mutate_predicate(&mut self.sell, max_height, rng);
        }
    }
}

fn random_predicate<R: Rng + ?Sized>(
    depth: DepthRange,
    max_height: usize,
    rng: &mut R,
) -> BoolExpr {
    let mut expr = generate::half_and_half(depth, rng);
    for _ in 1..INIT_ATTEMPTS {
        if check_validity(&expr, max_height).is_ok() {
            break;
        }
        expr = generate::half_and_half(depth, rng);
    }
    expr
}

fn mutate_predicate<R: Rng + ?Sized>(tree: &mut BoolExpr, max_height: usize, rng: &mut R) {
    let mut mutant = tree.clone();
    operators::mutate(&mut mutant, rng);
    for _ in 1..MUTATION_ATTEMPTS {
        if check_validity(&mutant, max_height).is_ok() {
            break;
        }
        mutant = tree.clone();
        operators::mutate(&mut mutant, rng);
    }
    *tree = mutant;
}

impl fmt::Display for TriggerPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buy: {} | sell: {}", self.buy, self.sell)
    }
}

/// An expression bound to an annotated series.
///
/// Fires only where both `macd_diff` and `rsi` are defined.
#[derive(Debug, Clone, Copy)]
pub struct ExprTrigger<'a> {
    expr: &'a BoolExpr,
    series: &'a PriceSeries,
}

impl<'a> ExprTrigger<'a> {
    pub fn new(expr: &'a BoolExpr, series: &'a PriceSeries) -> Self {
        Self { expr, series }
    }
}

impl Trigger for ExprTrigger<'_> {
    fn fires(&self, t: usize) -> bool {
        match (self.series.value(MACD_DIFF, t), self.series.value(RSI, t)) {
            (Some(macd_diff), Some(rsi)) => self.expr.eval(&Env::new(t as f64, macd_diff, rsi)),
            _ => false,
        }
    }

    fn warmup(&self) -> usize {
        let len = self.series.len();
        let macd = self.series.first_defined(MACD_DIFF).unwrap_or(len);
        let rsi = self.series.first_defined(RSI).unwrap_or(len);
        macd.max(rsi)
    }
}

/// Scores trigger pairs against a series already annotated with indicators.
#[derive(Debug, Clone)]
pub struct ExprEvaluator<'a> {
    series: &'a PriceSeries,
    config: SimulationConfig,
    mode: FitnessMode,
    target: GpTarget,
    max_height: usize,
}

impl<'a> ExprEvaluator<'a> {
    pub fn new(
        series: &'a PriceSeries,
        config: SimulationConfig,
        mode: FitnessMode,
        target: GpTarget,
        max_height: usize,
    ) -> Result<Self, EvotraderError> {
        config.validate()?;
        if series.column(MACD_DIFF).is_none() || series.column(RSI).is_none() {
            return Err(EvotraderError::Data {
                reason: "series must carry macd_diff and rsi columns".to_string(),
            });
        }
        Ok(Self {
            series,
            config,
            mode,
            target,
            max_height,
        })
    }

    pub fn performance(&self, pair: &TriggerPair) -> Result<Performance, EvotraderError> {
        let buy = ExprTrigger::new(&pair.buy, self.series);
        let sell = ExprTrigger::new(&pair.sell, self.series);
        let result = simulator::simulate(self.series, &buy, &sell, &self.config)?;
        Ok(Performance::from_simulation(&result, self.config.starting_balance))
    }
}

impl Evaluate<TriggerPair> for ExprEvaluator<'_> {
    fn evaluate(&self, pair: &TriggerPair) -> FitnessScore {
        if let Err(reason) = pair.check(self.target, self.max_height) {
            debug!(%pair, %reason, "invalid expression");
            return self.mode.penalty();
        }
        match self.performance(pair) {
            Ok(perf) => self.mode.score(&perf),
            Err(err) => {
                debug!(%pair, error = %err, "simulation failed");
                self.mode.penalty()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::expr::tree::{NumExpr, Var};
    use crate::domain::fitness::PENALTY;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const INIT_DEPTH: DepthRange = DepthRange::new(1, 2);

    fn series() -> PriceSeries {
        // rsi dips below 30 at t=1 and climbs above 70 at t=3
        let closes = [10.0, 9.0, 11.0, 14.0, 13.0];
        let rows: Vec<_> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| (i as i64 * 1000, c, c, c, c, 1.0))
            .collect();
        PriceSeries::from_tuples(&rows)
            .unwrap()
            .with_column(RSI, vec![None, Some(25.0), Some(50.0), Some(80.0), Some(60.0)])
            .unwrap()
            .with_column(MACD_DIFF, vec![None, Some(0.1), Some(0.2), Some(0.3), Some(0.1)])
            .unwrap()
    }

    fn evaluator(s: &PriceSeries, mode: FitnessMode) -> ExprEvaluator<'_> {
        let config = SimulationConfig {
            starting_balance: 100.0,
            fee_rate: 0.0,
        };
        ExprEvaluator::new(s, config, mode, GpTarget::Both, DEFAULT_MAX_HEIGHT).unwrap()
    }

    #[test]
    fn classic_environment_pair_alone_misses_rsi_bands() {
        // rsi < 30 is true on both classic probes but not on the extra ones
        let buy = operators::default_buy();
        assert_eq!(buy.eval(&PROBES[0]), buy.eval(&PROBES[1]));
        assert!(check_validity(&buy, DEFAULT_MAX_HEIGHT).is_ok());
        assert!(check_validity(&operators::default_sell(), DEFAULT_MAX_HEIGHT).is_ok());
    }

    #[test]
    fn constant_predicates_are_invalid() {
        let tautology = BoolExpr::Eq(
            Box::new(NumExpr::var(Var::Rsi)),
            Box::new(NumExpr::var(Var::Rsi)),
        );
        assert_eq!(
            check_validity(&tautology, DEFAULT_MAX_HEIGHT),
            Err(Invalid::Constant)
        );
    }

    #[test]
    fn predicates_without_indicators_are_invalid() {
        let time_only = BoolExpr::gt(NumExpr::var(Var::T), NumExpr::Const(3.0));
        assert_eq!(
            check_validity(&time_only, DEFAULT_MAX_HEIGHT),
            Err(Invalid::NoIndicator)
        );
        assert_eq!(
            check_validity(&BoolExpr::Lit(true), DEFAULT_MAX_HEIGHT),
            Err(Invalid::NoIndicator)
        );
    }

    #[test]
    fn deep_predicates_are_invalid() {
        let mut deep = operators::default_buy();
        for _ in 0..3 {
            deep = BoolExpr::Not(Box::new(deep));
        }
        assert!(matches!(
            check_validity(&deep, 3),
            Err(Invalid::TooDeep { height: 4, limit: 3 })
        ));
    }

    #[test]
    fn default_pair_trades_on_rsi_bands() {
        let s = series();
        let eval = evaluator(&s, FitnessMode::Canonical);
        let perf = eval.performance(&TriggerPair::default()).unwrap();
        // buy at t=1 @9, sell at t=3 @14
        assert_eq!(perf.total_trades, 1);
        assert!((perf.net_profit - (100.0 / 9.0 * 14.0 - 100.0)).abs() < 1e-9);
        let score = eval.evaluate(&TriggerPair::default());
        assert!(!score.is_penalty());
    }

    #[test]
    fn invalid_pair_gets_penalty_without_simulation() {
        let s = series();
        let eval = evaluator(&s, FitnessMode::Canonical);
        let pair = TriggerPair::new(BoolExpr::Lit(true), operators::default_sell());
        assert_eq!(eval.evaluate(&pair), FitnessScore::Scalar(PENALTY));
    }

    #[test]
    fn zero_trade_pair_gets_penalty() {
        let s = series();
        let eval = evaluator(&s, FitnessMode::Pareto);
        // valid on the probes, but the series never dips below 10
        let never = BoolExpr::lt(NumExpr::var(Var::Rsi), NumExpr::Const(10.0));
        let pair = TriggerPair::new(never, operators::default_sell());
        assert!(pair.check(GpTarget::Both, DEFAULT_MAX_HEIGHT).is_ok());
        assert_eq!(eval.performance(&pair).unwrap().total_trades, 0);
        assert_eq!(
            eval.evaluate(&pair),
            FitnessScore::Pair {
                net_profit: PENALTY,
                average_profit: PENALTY
            }
        );
    }

    #[test]
    fn target_limits_validation_to_evolved_side() {
        let pair = TriggerPair::new(operators::default_buy(), BoolExpr::Lit(true));
        assert!(pair.check(GpTarget::BuyOnly, DEFAULT_MAX_HEIGHT).is_ok());
        assert!(pair.check(GpTarget::Both, DEFAULT_MAX_HEIGHT).is_err());
    }

    #[test]
    fn random_pairs_from_default_depth_are_valid() {
        let mut rng = StdRng::seed_from_u64(21);
        for _ in 0..400 {
            let pair =
                TriggerPair::random(GpTarget::Both, INIT_DEPTH, DEFAULT_MAX_HEIGHT, &mut rng);
            assert_eq!(pair.check(GpTarget::Both, DEFAULT_MAX_HEIGHT), Ok(()), "{pair}");
        }
    }

    #[test]
    fn random_pair_keeps_default_on_fixed_side() {
        let mut rng = StdRng::seed_from_u64(4);
        let pair =
            TriggerPair::random(GpTarget::BuyOnly, INIT_DEPTH, DEFAULT_MAX_HEIGHT, &mut rng);
        assert_eq!(pair.sell, operators::default_sell());
        assert!(check_validity(&pair.buy, DEFAULT_MAX_HEIGHT).is_ok());
    }

    #[test]
    fn mutation_mostly_keeps_pairs_valid() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut valid = 0;
        for _ in 0..200 {
            let mut pair = TriggerPair::default();
            pair.mutate(GpTarget::Both, DEFAULT_MAX_HEIGHT, &mut rng);
            if pair.check(GpTarget::Both, DEFAULT_MAX_HEIGHT).is_ok() {
                valid += 1;
            }
        }
        assert!(valid >= 190, "only {valid} of 200 mutants valid");
    }

    #[test]
    fn expr_trigger_waits_for_indicators() {
        let s = series();
        let buy = operators::default_buy();
        let trigger = ExprTrigger::new(&buy, &s);
        assert_eq!(trigger.warmup(), 1);
        assert!(!trigger.fires(0));
        assert!(trigger.fires(1));
    }

    #[test]
    fn evaluator_requires_indicator_columns() {
        let bare = PriceSeries::from_tuples(&[(0, 1.0, 1.0, 1.0, 1.0, 1.0)]).unwrap();
        let result = ExprEvaluator::new(
            &bare,
            SimulationConfig::default(),
            FitnessMode::Canonical,
            GpTarget::Both,
            DEFAULT_MAX_HEIGHT,
        );
        assert!(matches!(result, Err(EvotraderError::Data { .. })));
    }
}
