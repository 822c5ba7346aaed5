//! Fixed-parameter MACD/RSI strategy encoding.
//!
//! Six genes grouped into four units that crossover and mutation treat atomically:
//!
//! | group          | genes                          | default draw                     |
//! |----------------|--------------------------------|----------------------------------|
//! | MACD windows   | `macd_fast`, `macd_slow`       | fast in 3..=80, slow in fast..=100 |
//! | RSI window     | `rsi_window`                   | 5..=70                           |
//! | MACD threshold | `macd_threshold`               | int in -10..=10 times [0, 1)     |
//! | RSI levels     | `rsi_buy`, `rsi_sell`          | buy in 10..=40, sell in 60..=90  |

use std::fmt;

use rand::Rng;
use tracing::debug;

use crate::domain::error::EvotraderError;
use crate::domain::fitness::{self, FitnessScore};
use crate::domain::indicator::{self, IndicatorWindows};
use crate::domain::metrics::Performance;
use crate::domain::optimizer::Evaluate;
use crate::domain::price_series::{MACD_DIFF, PriceSeries, RSI};
use crate::domain::simulator::{self, SimulationConfig, SimulationResult};
use crate::domain::trigger::{Condition, ThresholdTrigger};

/// Signal smoothing is not evolved.
pub const MACD_SIGNAL_WINDOW: usize = 9;

/// Number of real coordinates in [`ParamCandidate::to_vector`].
pub const DIMENSIONS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneGroup {
    MacdWindows,
    RsiWindow,
    MacdThreshold,
    RsiLevels,
}

impl GeneGroup {
    pub const ALL: [GeneGroup; 4] = [
        GeneGroup::MacdWindows,
        GeneGroup::RsiWindow,
        GeneGroup::MacdThreshold,
        GeneGroup::RsiLevels,
    ];
}

/// Inclusive sampling ranges for random initialisation and mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneBounds {
    pub macd_fast_min: usize,
    pub macd_fast_max: usize,
    pub macd_slow_max: usize,
    pub rsi_window_min: usize,
    pub rsi_window_max: usize,
    /// The threshold integer part is drawn from `-limit..=limit`.
    pub macd_threshold_limit: i32,
    pub rsi_buy_min: u32,
    pub rsi_buy_max: u32,
    pub rsi_sell_min: u32,
    pub rsi_sell_max: u32,
}

impl Default for GeneBounds {
    fn default() -> Self {
        Self {
            macd_fast_min: 3,
            macd_fast_max: 80,
            macd_slow_max: 100,
            rsi_window_min: 5,
            rsi_window_max: 70,
            macd_threshold_limit: 10,
            rsi_buy_min: 10,
            rsi_buy_max: 40,
            rsi_sell_min: 60,
            rsi_sell_max: 90,
        }
    }
}

impl GeneBounds {
    pub fn validate(&self) -> Result<(), EvotraderError> {
        let check = |ok: bool, key: &str, reason: String| {
            if ok {
                Ok(())
            } else {
                Err(EvotraderError::invalid("ga", key, reason))
            }
        };
        check(
            self.macd_fast_min >= 1 && self.macd_fast_min <= self.macd_fast_max,
            "macd_fast",
            format!(
                "range {}..={} must be non-empty and start at 1 or more",
                self.macd_fast_min, self.macd_fast_max
            ),
        )?;
        check(
            self.macd_fast_max <= self.macd_slow_max,
            "macd_slow_max",
            format!(
                "{} is below the largest fast window {}",
                self.macd_slow_max, self.macd_fast_max
            ),
        )?;
        check(
            self.rsi_window_min >= 1 && self.rsi_window_min <= self.rsi_window_max,
            "rsi_window",
            format!(
                "range {}..={} must be non-empty and start at 1 or more",
                self.rsi_window_min, self.rsi_window_max
            ),
        )?;
        check(
            self.macd_threshold_limit >= 0,
            "macd_threshold_limit",
            format!("must not be negative, got {}", self.macd_threshold_limit),
        )?;
        check(
            self.rsi_buy_min <= self.rsi_buy_max && self.rsi_buy_max <= 100,
            "rsi_buy",
            format!(
                "range {}..={} must be non-empty and within 0..=100",
                self.rsi_buy_min, self.rsi_buy_max
            ),
        )?;
        check(
            self.rsi_sell_min <= self.rsi_sell_max && self.rsi_sell_max <= 100,
            "rsi_sell",
            format!(
                "range {}..={} must be non-empty and within 0..=100",
                self.rsi_sell_min, self.rsi_sell_max
            ),
        )
    }

    /// Per-coordinate lower corner of the search box, in [`ParamCandidate::to_vector`] order.
    pub fn lower(&self) -> [f64; DIMENSIONS] {
        [
            self.macd_fast_min as f64,
            self.macd_fast_min as f64,
            self.rsi_window_min as f64,
            -(self.macd_threshold_limit as f64),
            self.rsi_buy_min as f64,
            self.rsi_sell_min as f64,
        ]
    }

    pub fn upper(&self) -> [f64; DIMENSIONS] {
        [
            self.macd_fast_max as f64,
            self.macd_slow_max as f64,
            self.rsi_window_max as f64,
            self.macd_threshold_limit as f64,
            self.rsi_buy_max as f64,
            self.rsi_sell_max as f64,
        ]
    }

    pub fn contains(&self, c: &ParamCandidate) -> bool {
        (self.macd_fast_min..=self.macd_fast_max).contains(&c.macd_fast)
            && (c.macd_fast..=self.macd_slow_max).contains(&c.macd_slow)
            && (self.rsi_window_min..=self.rsi_window_max).contains(&c.rsi_window)
            && c.macd_threshold.abs() <= self.macd_threshold_limit as f64
            && (self.rsi_buy_min as f64..=self.rsi_buy_max as f64).contains(&c.rsi_buy)
            && (self.rsi_sell_min as f64..=self.rsi_sell_max as f64).contains(&c.rsi_sell)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamCandidate {
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub rsi_window: usize,
    pub macd_threshold: f64,
    pub rsi_buy: f64,
    pub rsi_sell: f64,
}

impl ParamCandidate {
    /// Builds a candidate, rejecting inverted or empty windows and out-of-range levels.
    pub fn new(
        macd_fast: usize,
        macd_slow: usize,
        rsi_window: usize,
        macd_threshold: f64,
        rsi_buy: f64,
        rsi_sell: f64,
    ) -> Result<Self, EvotraderError> {
        let candidate = Self {
            macd_fast,
            macd_slow,
            rsi_window,
            macd_threshold,
            rsi_buy,
            rsi_sell,
        };
        candidate.validate()?;
        Ok(candidate)
    }

    pub fn validate(&self) -> Result<(), EvotraderError> {
        if self.macd_fast == 0 || self.rsi_window == 0 {
            return Err(EvotraderError::invalid(
                "candidate",
                "window",
                "indicator windows must be positive",
            ));
        }
        if self.macd_fast > self.macd_slow {
            return Err(EvotraderError::invalid(
                "candidate",
                "macd_fast",
                format!(
                    "fast window {} exceeds slow window {}",
                    self.macd_fast, self.macd_slow
                ),
            ));
        }
        if !self.macd_threshold.is_finite() {
            return Err(EvotraderError::invalid(
                "candidate",
                "macd_threshold",
                "must be finite",
            ));
        }
        for (key, level) in [("rsi_buy", self.rsi_buy), ("rsi_sell", self.rsi_sell)] {
            if !(0.0..=100.0).contains(&level) {
                return Err(EvotraderError::invalid(
                    "candidate",
                    key,
                    format!("{} is outside 0..=100", level),
                ));
            }
        }
        Ok(())
    }

    pub fn random<R: Rng + ?Sized>(bounds: &GeneBounds, rng: &mut R) -> Self {
        let mut candidate = Self {
            macd_fast: bounds.macd_fast_min,
            macd_slow: bounds.macd_slow_max,
            rsi_window: bounds.rsi_window_min,
            macd_threshold: 0.0,
            rsi_buy: bounds.rsi_buy_min as f64,
            rsi_sell: bounds.rsi_sell_max as f64,
        };
        for group in GeneGroup::ALL {
            candidate.redraw(group, bounds, rng);
        }
        candidate
    }

    /// Re-draw one gene group from its generator.
    pub fn redraw<R: Rng + ?Sized>(&mut self, group: GeneGroup, bounds: &GeneBounds, rng: &mut R) {
        match group {
            GeneGroup::MacdWindows => {
                self.macd_fast = rng.gen_range(bounds.macd_fast_min..=bounds.macd_fast_max);
                self.macd_slow = rng.gen_range(self.macd_fast..=bounds.macd_slow_max);
            }
            GeneGroup::RsiWindow => {
                self.rsi_window = rng.gen_range(bounds.rsi_window_min..=bounds.rsi_window_max);
            }
            GeneGroup::MacdThreshold => {
                let limit = bounds.macd_threshold_limit;
                let scale: f64 = rng.gen_range(0.0..1.0);
                self.macd_threshold = rng.gen_range(-limit..=limit) as f64 * scale;
            }
            GeneGroup::RsiLevels => {
                self.rsi_sell = rng.gen_range(bounds.rsi_sell_min..=bounds.rsi_sell_max) as f64;
                self.rsi_buy = rng.gen_range(bounds.rsi_buy_min..=bounds.rsi_buy_max) as f64;
            }
        }
    }

    /// One-point crossover over the four groups: groups before the point come from
    /// `a`, the rest from `b`. The point is uniform in `1..=4`.
    pub fn crossover<R: Rng + ?Sized>(a: &Self, b: &Self, rng: &mut R) -> Self {
        let point = rng.gen_range(1..=GeneGroup::ALL.len());
        Self::crossover_at(a, b, point)
    }

    pub fn crossover_at(a: &Self, b: &Self, point: usize) -> Self {
        let mut child = a.clone();
        for group in GeneGroup::ALL.iter().skip(point) {
            child.copy_group(*group, b);
        }
        child
    }

    fn copy_group(&mut self, group: GeneGroup, from: &Self) {
        match group {
            GeneGroup::MacdWindows => {
                self.macd_fast = from.macd_fast;
                self.macd_slow = from.macd_slow;
            }
            GeneGroup::RsiWindow => self.rsi_window = from.rsi_window,
            GeneGroup::MacdThreshold => self.macd_threshold = from.macd_threshold,
            GeneGroup::RsiLevels => {
                self.rsi_buy = from.rsi_buy;
                self.rsi_sell = from.rsi_sell;
            }
        }
    }

    /// Each group is independently re-drawn with probability `p_internal`.
    pub fn mutate<R: Rng + ?Sized>(&mut self, p_internal: f64, bounds: &GeneBounds, rng: &mut R) {
        for group in GeneGroup::ALL {
            if rng.gen_bool(p_internal) {
                self.redraw(group, bounds, rng);
            }
        }
    }

    pub fn indicator_windows(&self) -> IndicatorWindows {
        IndicatorWindows {
            macd_fast: self.macd_fast,
            macd_slow: self.macd_slow,
            macd_signal: MACD_SIGNAL_WINDOW,
            rsi: self.rsi_window,
            sma: Vec::new(),
            ema: Vec::new(),
        }
    }

    /// `macd_diff > threshold` and `rsi < rsi_buy`.
    pub fn buy_conditions(&self) -> Vec<Condition> {
        vec![
            Condition::above(MACD_DIFF, self.macd_threshold),
            Condition::below(RSI, self.rsi_buy),
        ]
    }

    /// `macd_diff < threshold` and `rsi > rsi_sell`.
    pub fn sell_conditions(&self) -> Vec<Condition> {
        vec![
            Condition::below(MACD_DIFF, self.macd_threshold),
            Condition::above(RSI, self.rsi_sell),
        ]
    }

    /// Computes this candidate's indicators on `series` and replays it.
    pub fn backtest(
        &self,
        series: &PriceSeries,
        config: &SimulationConfig,
    ) -> Result<(SimulationResult, Performance), EvotraderError> {
        self.validate()?;
        let annotated = indicator::compute_indicators(series, &self.indicator_windows())?;
        let buy = ThresholdTrigger::new(&annotated, self.buy_conditions());
        let sell = ThresholdTrigger::new(&annotated, self.sell_conditions());
        let result = simulator::simulate(&annotated, &buy, &sell, config)?;
        let perf = Performance::from_simulation(&result, config.starting_balance);
        Ok((result, perf))
    }

    /// Real-valued view used by differential evolution.
    pub fn to_vector(&self) -> [f64; DIMENSIONS] {
        [
            self.macd_fast as f64,
            self.macd_slow as f64,
            self.rsi_window as f64,
            self.macd_threshold,
            self.rsi_buy,
            self.rsi_sell,
        ]
    }

    /// Projects a real vector onto the nearest candidate inside `bounds`: window
    /// coordinates are rounded, every coordinate is clamped, and the slow window
    /// is raised to the fast window when needed.
    pub fn from_vector(v: &[f64; DIMENSIONS], bounds: &GeneBounds) -> Self {
        let lower = bounds.lower();
        let upper = bounds.upper();
        let project = |i: usize, lo: f64| {
            let x = if v[i].is_finite() { v[i] } else { lo };
            x.clamp(lo, upper[i])
        };

        let macd_fast = project(0, lower[0]).round() as usize;
        let macd_slow = project(1, macd_fast as f64).round() as usize;
        Self {
            macd_fast,
            macd_slow: macd_slow.max(macd_fast),
            rsi_window: project(2, lower[2]).round() as usize,
            macd_threshold: project(3, lower[3]),
            rsi_buy: project(4, lower[4]).round(),
            rsi_sell: project(5, lower[5]).round(),
        }
    }
}

impl fmt::Display for ParamCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MACD({},{},{}) threshold {:.4}, RSI({}) buy < {} sell > {}",
            self.macd_fast,
            self.macd_slow,
            MACD_SIGNAL_WINDOW,
            self.macd_threshold,
            self.rsi_window,
            self.rsi_buy,
            self.rsi_sell
        )
    }
}

/// Scores parametric candidates against one raw price series with the canonical
/// fitness formula. Indicators are recomputed for every candidate.
#[derive(Debug, Clone)]
pub struct ParamEvaluator<'a> {
    series: &'a PriceSeries,
    config: SimulationConfig,
}

impl<'a> ParamEvaluator<'a> {
    pub fn new(series: &'a PriceSeries, config: SimulationConfig) -> Result<Self, EvotraderError> {
        config.validate()?;
        Ok(Self { series, config })
    }
}

impl Evaluate<ParamCandidate> for ParamEvaluator<'_> {
    fn evaluate(&self, candidate: &ParamCandidate) -> FitnessScore {
        match candidate.backtest(self.series, &self.config) {
            Ok((_, perf)) => FitnessScore::Scalar(fitness::canonical(&perf)),
            Err(err) => {
                debug!(%candidate, error = %err, "candidate rejected");
                FitnessScore::Scalar(fitness::PENALTY)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sample() -> ParamCandidate {
        ParamCandidate::new(12, 26, 14, 0.5, 30.0, 70.0).unwrap()
    }

    fn other() -> ParamCandidate {
        ParamCandidate::new(5, 40, 20, -2.0, 15.0, 85.0).unwrap()
    }

    #[test]
    fn inverted_macd_windows_are_rejected() {
        let err = ParamCandidate::new(50, 20, 14, 0.0, 30.0, 70.0).unwrap_err();
        assert!(matches!(err, EvotraderError::ConfigInvalid { ref key, .. } if key == "macd_fast"));
    }

    #[test]
    fn zero_window_and_bad_levels_are_rejected() {
        assert!(ParamCandidate::new(0, 20, 14, 0.0, 30.0, 70.0).is_err());
        assert!(ParamCandidate::new(5, 20, 0, 0.0, 30.0, 70.0).is_err());
        assert!(ParamCandidate::new(5, 20, 14, f64::NAN, 30.0, 70.0).is_err());
        assert!(ParamCandidate::new(5, 20, 14, 0.0, 130.0, 70.0).is_err());
    }

    #[test]
    fn random_candidates_respect_bounds() {
        let bounds = GeneBounds::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let c = ParamCandidate::random(&bounds, &mut rng);
            assert!(bounds.contains(&c), "{c:?}");
            assert!(c.validate().is_ok());
            assert_eq!(c.rsi_buy.fract(), 0.0);
        }
    }

    #[test]
    fn random_is_deterministic_for_a_seed() {
        let bounds = GeneBounds::default();
        let a = ParamCandidate::random(&bounds, &mut StdRng::seed_from_u64(42));
        let b = ParamCandidate::random(&bounds, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn crossover_takes_prefix_from_first_parent() {
        let (a, b) = (sample(), other());

        let child = ParamCandidate::crossover_at(&a, &b, 1);
        assert_eq!((child.macd_fast, child.macd_slow), (12, 26));
        assert_eq!(child.rsi_window, 20);
        assert_eq!(child.macd_threshold, -2.0);
        assert_eq!((child.rsi_buy, child.rsi_sell), (15.0, 85.0));

        let child = ParamCandidate::crossover_at(&a, &b, 3);
        assert_eq!(child.rsi_window, 14);
        assert_eq!(child.macd_threshold, 0.5);
        assert_eq!((child.rsi_buy, child.rsi_sell), (15.0, 85.0));

        assert_eq!(ParamCandidate::crossover_at(&a, &b, 4), a);
    }

    #[test]
    fn crossover_children_are_mixtures_of_parents() {
        let (a, b) = (sample(), other());
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let child = ParamCandidate::crossover(&a, &b, &mut rng);
            assert!(child.macd_fast == a.macd_fast || child.macd_fast == b.macd_fast);
            assert_eq!(child.macd_fast == a.macd_fast, child.macd_slow == a.macd_slow);
            assert!(child.validate().is_ok());
        }
    }

    #[test]
    fn mutation_probability_extremes() {
        let bounds = GeneBounds::default();
        let mut rng = StdRng::seed_from_u64(11);

        let mut untouched = sample();
        untouched.mutate(0.0, &bounds, &mut rng);
        assert_eq!(untouched, sample());

        // every group, RSI levels included, is redrawn into the default bounds
        let mut redrawn = ParamCandidate::new(1, 1, 1, 50.0, 0.0, 100.0).unwrap();
        redrawn.mutate(1.0, &bounds, &mut rng);
        assert!(bounds.contains(&redrawn), "{redrawn:?}");
    }

    #[test]
    fn vector_projection() {
        let bounds = GeneBounds::default();
        let c = ParamCandidate::from_vector(&[90.4, 10.0, 4.0, 12.0, 25.6, 59.0], &bounds);
        assert_eq!(c.macd_fast, 80);
        assert_eq!(c.macd_slow, 80);
        assert_eq!(c.rsi_window, 5);
        assert_eq!(c.macd_threshold, 10.0);
        assert_eq!(c.rsi_buy, 26.0);
        assert_eq!(c.rsi_sell, 60.0);
        assert!(bounds.contains(&c));

        let round_trip = ParamCandidate::from_vector(&sample().to_vector(), &bounds);
        assert_eq!(round_trip, sample());
    }

    #[test]
    fn bounds_validation() {
        assert!(GeneBounds::default().validate().is_ok());
        let bad = GeneBounds {
            macd_fast_max: 120,
            ..GeneBounds::default()
        };
        assert!(bad.validate().is_err());
        let bad = GeneBounds {
            rsi_buy_min: 50,
            rsi_buy_max: 40,
            ..GeneBounds::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn display_lists_genes() {
        let text = sample().to_string();
        assert!(text.contains("MACD(12,26,9)"));
        assert!(text.contains("RSI(14)"));
    }
}
