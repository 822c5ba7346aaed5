//! Generational genetic algorithm over parametric candidates.
//!
//! One generation:
//!
//! 1. evaluate the population
//! 2. keep the top `survivors` (stable ranking)
//! 3. breed `offspring` children, each from two distinct parents drawn uniformly
//!    from the full evaluated population
//! 4. replace the population with survivors followed by offspring
//! 5. mutate: each individual is touched with the external rate, and inside a
//!    touched individual each gene group is redrawn with the internal rate
//!
//! The population after the last generation is not mutated; it is evaluated once
//! more and its statistics close the history.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use super::{
    BestTracker, EvaluationBudget, Evaluate, OptimizationReport, evaluate_population,
    rank_indices,
};
use crate::domain::error::EvotraderError;
use crate::domain::params::{GeneBounds, ParamCandidate};

#[derive(Debug, Clone, PartialEq)]
pub struct GaConfig {
    pub population_size: usize,
    /// Top-K carried over unchanged (before mutation).
    pub survivors: usize,
    /// Children bred per generation. Need not add up to `population_size` with `survivors`.
    pub offspring: usize,
    pub generations: usize,
    pub external_mutation_rate: f64,
    pub internal_mutation_rate: f64,
    pub seed: u64,
    pub parallel: bool,
    pub max_evaluations: Option<usize>,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            survivors: 75,
            offspring: 25,
            generations: 200,
            external_mutation_rate: 0.2,
            internal_mutation_rate: 0.2,
            seed: 42,
            parallel: false,
            max_evaluations: None,
        }
    }
}

impl GaConfig {
    pub fn validate(&self) -> Result<(), EvotraderError> {
        if self.population_size == 0 {
            return Err(EvotraderError::EmptyPopulation {
                reason: "ga population_size is 0".to_string(),
            });
        }
        if self.survivors + self.offspring == 0 {
            return Err(EvotraderError::EmptyPopulation {
                reason: "ga survivors and offspring are both 0".to_string(),
            });
        }
        if self.survivors > self.population_size {
            return Err(EvotraderError::invalid(
                "ga",
                "survivors",
                format!(
                    "{} exceeds population_size {}",
                    self.survivors, self.population_size
                ),
            ));
        }
        if self.offspring > 0 && (self.population_size < 2 || self.survivors + self.offspring < 2) {
            return Err(EvotraderError::invalid(
                "ga",
                "offspring",
                "breeding needs at least two individuals in every generation",
            ));
        }
        if self.generations == 0 {
            return Err(EvotraderError::invalid("ga", "generations", "must be at least 1"));
        }
        for (key, rate) in [
            ("external_mutation_rate", self.external_mutation_rate),
            ("internal_mutation_rate", self.internal_mutation_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(EvotraderError::invalid(
                    "ga",
                    key,
                    format!("{} is outside [0, 1]", rate),
                ));
            }
        }
        if let Some(limit) = self.max_evaluations {
            if limit < self.population_size {
                return Err(EvotraderError::invalid(
                    "ga",
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
}

#[derive(Debug, Clone)]
pub struct GeneticAlgorithm {
    config: GaConfig,
    bounds: GeneBounds,
}

impl GeneticAlgorithm {
    pub fn new(config: GaConfig, bounds: GeneBounds) -> Result<Self, EvotraderError> {
        config.validate()?;
        bounds.validate()?;
        Ok(Self { config, bounds })
    }

    pub fn config(&self) -> &GaConfig {
        &self.config
    }

    pub fn run<E>(&self, evaluator: &E) -> Result<OptimizationReport<ParamCandidate>, EvotraderError>
    where
        E: Evaluate<ParamCandidate> + ?Sized,
    {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let population = (0..self.config.population_size)
            .map(|_| ParamCandidate::random(&self.bounds, &mut rng))
            .collect();
        self.evolve(population, evaluator, &mut rng)
    }

    /// Runs from a caller-supplied initial population instead of a random one.
    pub fn run_from<E>(
        &self,
        population: Vec<ParamCandidate>,
        evaluator: &E,
    ) -> Result<OptimizationReport<ParamCandidate>, EvotraderError>
    where
        E: Evaluate<ParamCandidate> + ?Sized,
    {
        if population.is_empty() {
            return Err(EvotraderError::EmptyPopulation {
                reason: "initial population is empty".to_string(),
            });
        }
        if population.len() < self.config.survivors
            || (self.config.offspring > 0 && population.len() < 2)
        {
            return Err(EvotraderError::invalid(
                "ga",
                "population_size",
                format!(
                    "initial population of {} is too small for {} survivors",
                    population.len(),
                    self.config.survivors
                ),
            ));
        }
        for candidate in &population {
            candidate.validate()?;
        }
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        self.evolve(population, evaluator, &mut rng)
    }

    fn evolve<E>(
        &self,
        mut population: Vec<ParamCandidate>,
        evaluator: &E,
        rng: &mut StdRng,
    ) -> Result<OptimizationReport<ParamCandidate>, EvotraderError>
    where
        E: Evaluate<ParamCandidate> + ?Sized,
    {
        let cfg = &self.config;
        info!(
            population = population.len(),
            survivors = cfg.survivors,
            offspring = cfg.offspring,
            generations = cfg.generations,
            "starting genetic algorithm"
        );

        let mut budget = EvaluationBudget::new(cfg.max_evaluations);
        let mut tracker = BestTracker::new("ga");

        for generation in 0..cfg.generations {
            if !budget.try_consume(population.len()) {
                warn!(generation, used = budget.used(), "evaluation budget exhausted");
                break;
            }
            let scores = evaluate_population(evaluator, &population, cfg.parallel);
            tracker.record(generation, &population, &scores, budget.used());

            let ranked = rank_indices(&scores);
            let mut next: Vec<ParamCandidate> = ranked
                .iter()
                .take(cfg.survivors)
                .map(|&i| population[i].clone())
                .collect();
            for _ in 0..cfg.offspring {
                let parents = index::sample(rng, population.len(), 2);
                next.push(ParamCandidate::crossover(
                    &population[parents.index(0)],
                    &population[parents.index(1)],
                    rng,
                ));
            }
            population = next;

            if generation + 1 < cfg.generations {
                for individual in population.iter_mut() {
                    if rng.gen_bool(cfg.external_mutation_rate) {
                        individual.mutate(cfg.internal_mutation_rate, &self.bounds, rng);
                    }
                }
            }
        }

        if budget.try_consume(population.len()) {
            let scores = evaluate_population(evaluator, &population, cfg.parallel);
            tracker.record(cfg.generations, &population, &scores, budget.used());
        }

        tracker.finish(population, budget.used())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fitness::{FitnessScore, PENALTY};

    /// Rewards a fast MACD window close to 20 and nothing else.
    fn toward_twenty(c: &ParamCandidate) -> FitnessScore {
        FitnessScore::Scalar(-(c.macd_fast as f64 - 20.0).abs())
    }

    fn small_config() -> GaConfig {
        GaConfig {
            population_size: 20,
            survivors: 10,
            offspring: 10,
            generations: 15,
            seed: 9,
            ..GaConfig::default()
        }
    }

    fn sorted_keys(population: &[ParamCandidate]) -> Vec<String> {
        let mut keys: Vec<String> = population.iter().map(|c| format!("{c:?}")).collect();
        keys.sort();
        keys
    }

    #[test]
    fn survivors_only_keep_population_composition() {
        let config = GaConfig {
            population_size: 10,
            survivors: 10,
            offspring: 0,
            generations: 1,
            external_mutation_rate: 1.0,
            internal_mutation_rate: 1.0,
            ..GaConfig::default()
        };
        let ga = GeneticAlgorithm::new(config, GeneBounds::default()).unwrap();

        let mut rng = StdRng::seed_from_u64(1);
        let initial: Vec<ParamCandidate> = (0..10)
            .map(|_| ParamCandidate::random(&GeneBounds::default(), &mut rng))
            .collect();

        let report = ga.run_from(initial.clone(), &toward_twenty).unwrap();

        assert_eq!(report.final_population.len(), 10);
        assert_eq!(sorted_keys(&report.final_population), sorted_keys(&initial));
        assert_eq!(report.evaluations, 20);
    }

    #[test]
    fn population_size_follows_survivors_plus_offspring() {
        let config = GaConfig {
            population_size: 12,
            survivors: 4,
            offspring: 3,
            generations: 3,
            ..GaConfig::default()
        };
        let ga = GeneticAlgorithm::new(config, GeneBounds::default()).unwrap();
        let report = ga.run(&toward_twenty).unwrap();
        assert_eq!(report.final_population.len(), 7);
        assert_eq!(report.evaluations, 12 + 7 + 7 + 7);
        assert_eq!(report.history.len(), 4);
    }

    #[test]
    fn improves_toward_optimum() {
        let ga = GeneticAlgorithm::new(small_config(), GeneBounds::default()).unwrap();
        let report = ga.run(&toward_twenty).unwrap();
        let first = report.history.first().unwrap().max;
        assert!(report.best_score.primary() >= first);
        assert!(report.history.iter().all(|s| report.best_score.primary() >= s.max));
    }

    #[test]
    fn same_seed_same_result() {
        let ga = GeneticAlgorithm::new(small_config(), GeneBounds::default()).unwrap();
        let a = ga.run(&toward_twenty).unwrap();
        let b = ga.run(&toward_twenty).unwrap();
        assert_eq!(a.best, b.best);
        assert_eq!(a.history, b.history);
    }

    #[test]
    fn parallel_evaluation_is_deterministic() {
        let serial = GeneticAlgorithm::new(small_config(), GeneBounds::default()).unwrap();
        let parallel = GeneticAlgorithm::new(
            GaConfig {
                parallel: true,
                ..small_config()
            },
            GeneBounds::default(),
        )
        .unwrap();
        let a = serial.run(&toward_twenty).unwrap();
        let b = parallel.run(&toward_twenty).unwrap();
        assert_eq!(a.best, b.best);
        assert_eq!(a.history, b.history);
    }

    #[test]
    fn degenerate_candidates_do_not_abort() {
        let ga = GeneticAlgorithm::new(small_config(), GeneBounds::default()).unwrap();
        let always_penalty = |_c: &ParamCandidate| FitnessScore::Scalar(PENALTY);
        let report = ga.run(&always_penalty).unwrap();
        assert!(report.best_score.is_penalty());
    }

    #[test]
    fn budget_stops_early() {
        let config = GaConfig {
            max_evaluations: Some(45),
            ..small_config()
        };
        let ga = GeneticAlgorithm::new(config, GeneBounds::default()).unwrap();
        let report = ga.run(&toward_twenty).unwrap();
        assert_eq!(report.evaluations, 40);
        assert_eq!(report.history.len(), 2);
    }

    #[test]
    fn structural_misconfiguration_is_fatal() {
        let bounds = GeneBounds::default();
        let empty = GaConfig {
            population_size: 0,
            ..GaConfig::default()
        };
        assert!(matches!(
            GeneticAlgorithm::new(empty, bounds).unwrap_err(),
            EvotraderError::EmptyPopulation { .. }
        ));

        let too_many = GaConfig {
            survivors: 101,
            ..GaConfig::default()
        };
        assert!(GeneticAlgorithm::new(too_many, bounds).is_err());

        let bad_rate = GaConfig {
            internal_mutation_rate: 1.5,
            ..GaConfig::default()
        };
        assert!(GeneticAlgorithm::new(bad_rate, bounds).is_err());
    }
}
