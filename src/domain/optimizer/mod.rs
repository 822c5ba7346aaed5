//! Population-based strategy search.
//!
//! Three strategies share the pieces in this module:
//! - [`ga::GeneticAlgorithm`]: generational GA over [`ParamCandidate`](crate::domain::params::ParamCandidate)s
//! - [`de::DifferentialEvolution`]: DE/rand/1 with Gaussian local search and crowding
//! - [`gp::GeneticProgramming`]: tournament GP over expression-tree trigger pairs
//!
//! All randomness lives in the optimizer loop and comes from one seeded `StdRng`,
//! so a run is reproducible whether scores are computed serially or with rayon.

pub mod de;
pub mod ga;
pub mod gp;

use std::fmt;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::error::EvotraderError;
use crate::domain::fitness::FitnessScore;

/// Pure fitness function over one candidate.
pub trait Evaluate<C>: Sync {
    fn evaluate(&self, candidate: &C) -> FitnessScore;
}

impl<C, F> Evaluate<C> for F
where
    F: Fn(&C) -> FitnessScore + Sync,
{
    fn evaluate(&self, candidate: &C) -> FitnessScore {
        self(candidate)
    }
}

/// Scores returned in population order.
pub fn evaluate_population<C, E>(evaluator: &E, population: &[C], parallel: bool) -> Vec<FitnessScore>
where
    C: Sync,
    E: Evaluate<C> + ?Sized,
{
    if parallel {
        population.par_iter().map(|c| evaluator.evaluate(c)).collect()
    } else {
        population.iter().map(|c| evaluator.evaluate(c)).collect()
    }
}

/// Indices sorted best first. Equal scores keep population order.
pub fn rank_indices(scores: &[FitnessScore]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
}

/// Index of the best score; the earliest wins ties.
pub fn best_index(scores: &[FitnessScore]) -> Option<usize> {
    rank_indices(scores).first().copied()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationStats {
    pub generation: usize,
    pub max: f64,
    pub mean: f64,
    pub min: f64,
}

impl GenerationStats {
    /// Summary of the primary score component. `None` for an empty slice.
    pub fn from_scores(generation: usize, scores: &[FitnessScore]) -> Option<Self> {
        if scores.is_empty() {
            return None;
        }
        let values = scores.iter().map(FitnessScore::primary);
        let max = values.clone().fold(f64::NEG_INFINITY, f64::max);
        let min = values.clone().fold(f64::INFINITY, f64::min);
        let mean = values.sum::<f64>() / scores.len() as f64;
        Some(Self {
            generation,
            max,
            mean,
            min,
        })
    }
}

/// Optional cap on the number of fitness evaluations in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvaluationBudget {
    limit: Option<usize>,
    used: usize,
}

impl EvaluationBudget {
    pub fn new(limit: Option<usize>) -> Self {
        Self { limit, used: 0 }
    }

    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn remaining(&self) -> Option<usize> {
        self.limit.map(|l| l.saturating_sub(self.used))
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == Some(0)
    }

    /// Fraction of the budget consumed, in `[0, 1]`; 0 without a limit.
    pub fn progress(&self) -> f64 {
        match self.limit {
            Some(0) => 1.0,
            Some(l) => (self.used as f64 / l as f64).min(1.0),
            None => 0.0,
        }
    }

    /// Reserve `n` evaluations; fails without consuming anything if they do not fit.
    pub fn try_consume(&mut self, n: usize) -> bool {
        match self.remaining() {
            Some(left) if n > left => false,
            _ => {
                self.used += n;
                true
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptimizationReport<C> {
    pub best: C,
    pub best_score: FitnessScore,
    /// One entry per evaluated population.
    pub history: Vec<GenerationStats>,
    pub evaluations: usize,
    pub final_population: Vec<C>,
}

/// Best-ever candidate plus per-generation statistics of one run.
#[derive(Debug)]
pub(crate) struct BestTracker<C> {
    method: &'static str,
    best: Option<(C, FitnessScore)>,
    history: Vec<GenerationStats>,
}

impl<C: Clone + fmt::Display> BestTracker<C> {
    pub(crate) fn new(method: &'static str) -> Self {
        Self {
            method,
            best: None,
            history: Vec::new(),
        }
    }

    /// Logs and stores the statistics of one evaluated population and offers its
    /// best member.
    pub(crate) fn record(
        &mut self,
        generation: usize,
        population: &[C],
        scores: &[FitnessScore],
        evaluations: usize,
    ) {
        let Some(stats) = GenerationStats::from_scores(generation, scores) else {
            return;
        };
        info!(
            method = self.method,
            generation,
            max = stats.max,
            mean = stats.mean,
            min = stats.min,
            evaluations,
            "generation evaluated"
        );
        self.history.push(stats);
        if let Some(i) = best_index(scores) {
            self.offer(&population[i], scores[i]);
        }
    }

    /// Keeps `candidate` only if it strictly beats the current best.
    pub(crate) fn offer(&mut self, candidate: &C, score: FitnessScore) {
        let better = match &self.best {
            Some((_, current)) => score.total_cmp(current).is_gt(),
            None => true,
        };
        if better {
            debug!(method = self.method, %candidate, %score, "new best");
            self.best = Some((candidate.clone(), score));
        }
    }

    pub(crate) fn finish(
        self,
        final_population: Vec<C>,
        evaluations: usize,
    ) -> Result<OptimizationReport<C>, EvotraderError> {
        let (best, best_score) = self.best.ok_or_else(|| EvotraderError::EmptyPopulation {
            reason: "no candidate was evaluated".to_string(),
        })?;
        info!(method = self.method, %best, %best_score, evaluations, "optimization finished");
        Ok(OptimizationReport {
            best,
            best_score,
            history: self.history,
            evaluations,
            final_population,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scalars(values: &[f64]) -> Vec<FitnessScore> {
        values.iter().copied().map(FitnessScore::Scalar).collect()
    }

    #[test]
    fn ranking_is_descending_and_stable() {
        let scores = scalars(&[1.0, 5.0, 3.0, 5.0, -2.0]);
        assert_eq!(rank_indices(&scores), vec![1, 3, 2, 0, 4]);
        assert_eq!(best_index(&scores), Some(1));
        assert_eq!(best_index(&[]), None);
    }

    #[test]
    fn parallel_and_serial_agree() {
        let population: Vec<f64> = (0..64).map(|i| i as f64 * 0.5).collect();
        let square = |x: &f64| FitnessScore::Scalar(x * x);
        let serial = evaluate_population(&square, &population, false);
        let parallel = evaluate_population(&square, &population, true);
        assert_eq!(serial, parallel);
    }

    #[test]
    fn stats_summary() {
        let stats = GenerationStats::from_scores(3, &scalars(&[1.0, 2.0, 6.0])).unwrap();
        assert_eq!(stats.generation, 3);
        assert_relative_eq!(stats.max, 6.0);
        assert_relative_eq!(stats.mean, 3.0);
        assert_relative_eq!(stats.min, 1.0);
        assert!(GenerationStats::from_scores(0, &[]).is_none());
    }

    #[test]
    fn budget_accounting() {
        let mut budget = EvaluationBudget::new(Some(10));
        assert!(budget.try_consume(6));
        assert!(!budget.try_consume(5));
        assert_eq!(budget.used(), 6);
        assert_eq!(budget.remaining(), Some(4));
        assert!(budget.try_consume(4));
        assert!(budget.is_exhausted());
        assert_relative_eq!(budget.progress(), 1.0);

        let mut open = EvaluationBudget::unlimited();
        assert!(open.try_consume(1_000_000));
        assert!(!open.is_exhausted());
        assert_eq!(open.progress(), 0.0);
    }
}
