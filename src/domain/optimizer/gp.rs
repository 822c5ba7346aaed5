//! Genetic programming over buy/sell expression pairs.
//!
//! Generational loop with tournament selection, typed crossover and mutation,
//! elitism and a hall of fame of one. In Pareto mode a tournament challenger only
//! takes over when it dominates the current winner; the hall of fame and the
//! elite use the lexicographic `(net_profit, average_profit)` order.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use super::{
    BestTracker, EvaluationBudget, Evaluate, OptimizationReport, evaluate_population,
    rank_indices,
};
use crate::domain::error::EvotraderError;
use crate::domain::expr::{DEFAULT_MAX_HEIGHT, DepthRange, GpTarget, TriggerPair};
use crate::domain::fitness::{FitnessMode, FitnessScore};

#[derive(Debug, Clone, PartialEq)]
pub struct GpConfig {
    pub population_size: usize,
    pub generations: usize,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    pub tournament_size: usize,
    /// Share of the population copied unchanged into the next generation.
    pub elite_fraction: f64,
    pub max_height: usize,
    pub init_depth: DepthRange,
    pub fitness_mode: FitnessMode,
    pub target: GpTarget,
    pub seed: u64,
    pub parallel: bool,
    pub max_evaluations: Option<usize>,
}

impl Default for GpConfig {
    fn default() -> Self {
        Self {
            population_size: 200,
            generations: 10,
            crossover_rate: 0.9,
            mutation_rate: 0.5,
            tournament_size: 3,
            elite_fraction: 0.05,
            max_height: DEFAULT_MAX_HEIGHT,
            init_depth: DepthRange::new(1, 2),
            fitness_mode: FitnessMode::Canonical,
            target: GpTarget::Both,
            seed: 42,
            parallel: false,
            max_evaluations: None,
        }
    }
}

impl GpConfig {
    pub fn validate(&self) -> Result<(), EvotraderError> {
        if self.population_size == 0 {
            return Err(EvotraderError::EmptyPopulation {
                reason: "gp population_size is 0".to_string(),
            });
        }
        if self.generations == 0 {
            return Err(EvotraderError::invalid("gp", "generations", "must be at least 1"));
        }
        for (key, rate) in [
            ("crossover_rate", self.crossover_rate),
            ("mutation_rate", self.mutation_rate),
            ("elite_fraction", self.elite_fraction),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(EvotraderError::invalid(
                    "gp",
                    key,
                    format!("{} is outside [0, 1]", rate),
                ));
            }
        }
        if self.tournament_size == 0 {
            return Err(EvotraderError::invalid(
                "gp",
                "tournament_size",
                "must be at least 1",
            ));
        }
        if self.init_depth.min > self.init_depth.max {
            return Err(EvotraderError::invalid(
                "gp",
                "init_depth",
                format!(
                    "min {} exceeds max {}",
                    self.init_depth.min, self.init_depth.max
                ),
            ));
        }
        if self.max_height < self.init_depth.max {
            return Err(EvotraderError::invalid(
                "gp",
                "max_height",
                format!(
                    "{} is below the initial depth {}",
                    self.max_height, self.init_depth.max
                ),
            ));
        }
        if let FitnessMode::Weighted {
            net_weight,
            average_weight,
        } = self.fitness_mode
        {
            if !(net_weight.is_finite() && average_weight.is_finite()) {
                return Err(EvotraderError::invalid(
                    "gp",
                    "fitness_weights",
                    "weights must be finite",
                ));
            }
        }
        if let Some(limit) = self.max_evaluations {
            if limit < self.population_size {
                return Err(EvotraderError::invalid(
                    "gp",
                    "max_evaluations",
                    format!(
                        "{} cannot cover the initial population of {}",
                        limit, self.population_size
                    ),
                ));
            }
        }
        Ok(())
    }

    pub fn elite_count(&self) -> usize {
        ((self.elite_fraction * self.population_size as f64).round() as usize)
            .min(self.population_size)
    }
}

#[derive(Debug, Clone)]
pub struct GeneticProgramming {
    config: GpConfig,
}

impl GeneticProgramming {
    pub fn new(config: GpConfig) -> Result<Self, EvotraderError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GpConfig {
        &self.config
    }

    pub fn run<E>(&self, evaluator: &E) -> Result<OptimizationReport<TriggerPair>, EvotraderError>
    where
        E: Evaluate<TriggerPair> + ?Sized,
    {
        let cfg = &self.config;
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let n = cfg.population_size;
        let elite = cfg.elite_count();

        info!(
            population = n,
            generations = cfg.generations,
            elite,
            mode = %cfg.fitness_mode,
            target = %cfg.target,
            "starting genetic programming"
        );

        let mut population: Vec<TriggerPair> = (0..n)
            .map(|_| TriggerPair::random(cfg.target, cfg.init_depth, cfg.max_height, &mut rng))
            .collect();
        let mut budget = EvaluationBudget::new(cfg.max_evaluations);
        let mut hall_of_fame = BestTracker::new("gp");

        if !budget.try_consume(n) {
            return Err(EvotraderError::invalid(
                "gp",
                "max_evaluations",
                "cannot cover the initial population",
            ));
        }
        let mut scores = evaluate_population(evaluator, &population, cfg.parallel);
        hall_of_fame.record(0, &population, &scores, budget.used());

        for generation in 1..=cfg.generations {
            if !budget.try_consume(n) {
                warn!(generation, used = budget.used(), "evaluation budget exhausted");
                break;
            }

            let mut next: Vec<TriggerPair> = rank_indices(&scores)
                .into_iter()
                .take(elite)
                .map(|i| population[i].clone())
                .collect();

            let mut offspring: Vec<TriggerPair> = (0..n - elite)
                .map(|_| {
                    let winner = tournament(
                        &scores,
                        cfg.tournament_size,
                        cfg.fitness_mode.is_pareto(),
                        &mut rng,
                    );
                    population[winner].clone()
                })
                .collect();

            for i in (1..offspring.len()).step_by(2) {
                if rng.gen_bool(cfg.crossover_rate) {
                    let (left, right) = offspring.split_at_mut(i);
                    TriggerPair::crossover(&mut left[i - 1], &mut right[0], cfg.target, &mut rng);
                }
            }
            for child in offspring.iter_mut() {
                if rng.gen_bool(cfg.mutation_rate) {
                    child.mutate(cfg.target, cfg.max_height, &mut rng);
                }
            }

            next.extend(offspring);
            population = next;
            scores = evaluate_population(evaluator, &population, cfg.parallel);
            hall_of_fame.record(generation, &population, &scores, budget.used());
        }

        hall_of_fame.finish(population, budget.used())
    }
}

/// Draws `size` contestants with replacement. The first draw starts as winner;
/// a later one replaces it if strictly better (or, in Pareto mode, dominating).
pub fn tournament<R: Rng + ?Sized>(
    scores: &[FitnessScore],
    size: usize,
    pareto: bool,
    rng: &mut R,
) -> usize {
    let mut winner = rng.gen_range(0..scores.len());
    for _ in 1..size {
        let challenger = rng.gen_range(0..scores.len());
        let better = if pareto {
            scores[challenger].dominates(&scores[winner])
        } else {
            scores[challenger].total_cmp(&scores[winner]).is_gt()
        };
        if better {
            winner = challenger;
        }
    }
    winner
}
