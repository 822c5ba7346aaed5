//! Differential evolution with a Gaussian local-search step and crowding replacement.
//!
//! Each generation builds one trial per population member:
//!
//! ```text
//! mutant = x[r1] + F * (x[r2] - x[r3])        r1, r2, r3 distinct, != target
//! trial  = binomial crossover(target, mutant, CR), one coordinate always from mutant
//! trial += N(0, sigma * range)                 per coordinate
//! sigma  = initial_sigma * (final_sigma / initial_sigma) ^ (budget consumed)
//! ```
//!
//! Trials are projected onto the gene bounds, scored, and then each replaces the
//! member nearest to it (normalised Euclidean distance) unless it scores worse.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::info;

use super::{BestTracker, EvaluationBudget, Evaluate, OptimizationReport, evaluate_population};
use crate::domain::error::EvotraderError;
use crate::domain::params::{DIMENSIONS, GeneBounds, ParamCandidate};

#[derive(Debug, Clone, PartialEq)]
pub struct DeConfig {
    pub population_size: usize,
    pub max_evaluations: usize,
    /// `F` in the mutation step.
    pub differential_weight: f64,
    /// `CR` in the binomial crossover.
    pub crossover_rate: f64,
    /// Local-search step relative to each coordinate's range, at the start of a run.
    pub initial_sigma: f64,
    /// ... and once the budget is spent.
    pub final_sigma: f64,
    pub seed: u64,
    pub parallel: bool,
}

impl Default for DeConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            max_evaluations: 2_000,
            differential_weight: 0.5,
            crossover_rate: 0.9,
            initial_sigma: 0.1,
            final_sigma: 0.001,
            seed: 42,
            parallel: false,
        }
    }
}

impl DeConfig {
    pub fn validate(&self) -> Result<(), EvotraderError> {
        if self.population_size == 0 {
            return Err(EvotraderError::EmptyPopulation {
                reason: "de population_size is 0".to_string(),
            });
        }
        if self.population_size < 4 {
            return Err(EvotraderError::invalid(
                "de",
                "population_size",
                format!(
                    "DE/rand/1 needs at least 4 members, got {}",
                    self.population_size
                ),
            ));
        }
        if self.max_evaluations < self.population_size {
            return Err(EvotraderError::invalid(
                "de",
                "max_evaluations",
                format!(
                    "{} cannot cover the initial population of {}",
                    self.max_evaluations, self.population_size
                ),
            ));
        }
        if !(self.differential_weight > 0.0 && self.differential_weight <= 2.0) {
            return Err(EvotraderError::invalid(
                "de",
                "differential_weight",
                format!("{} is outside (0, 2]", self.differential_weight),
            ));
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            return Err(EvotraderError::invalid(
                "de",
                "crossover_rate",
                format!("{} is outside [0, 1]", self.crossover_rate),
            ));
        }
        for (key, sigma) in [
            ("initial_sigma", self.initial_sigma),
            ("final_sigma", self.final_sigma),
        ] {
            if !(sigma.is_finite() && sigma > 0.0) {
                return Err(EvotraderError::invalid(
                    "de",
                    key,
                    format!("must be positive, got {}", sigma),
                ));
            }
        }
        Ok(())
    }

    /// Local-search sigma after consuming `progress` (0..=1) of the budget.
    pub fn sigma_at(&self, progress: f64) -> f64 {
        let ratio = self.final_sigma / self.initial_sigma;
        self.initial_sigma * ratio.powf(progress.clamp(0.0, 1.0))
    }
}

#[derive(Debug, Clone)]
pub struct DifferentialEvolution {
    config: DeConfig,
    bounds: GeneBounds,
}

impl DifferentialEvolution {
    pub fn new(config: DeConfig, bounds: GeneBounds) -> Result<Self, EvotraderError> {
        config.validate()?;
        bounds.validate()?;
        Ok(Self { config, bounds })
    }

    pub fn config(&self) -> &DeConfig {
        &self.config
    }

    pub fn run<E>(&self, evaluator: &E) -> Result<OptimizationReport<ParamCandidate>, EvotraderError>
    where
        E: Evaluate<ParamCandidate> + ?Sized,
    {
        let cfg = &self.config;
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let lower = self.bounds.lower();
        let upper = self.bounds.upper();
        let range: [f64; DIMENSIONS] = std::array::from_fn(|j| upper[j] - lower[j]);

        info!(
            population = cfg.population_size,
            max_evaluations = cfg.max_evaluations,
            "starting differential evolution"
        );

        let mut population: Vec<ParamCandidate> = (0..cfg.population_size)
            .map(|_| ParamCandidate::random(&self.bounds, &mut rng))
            .collect();
        let mut budget = EvaluationBudget::new(Some(cfg.max_evaluations));
        let mut tracker = BestTracker::new("de");

        if !budget.try_consume(population.len()) {
            return Err(EvotraderError::invalid(
                "de",
                "max_evaluations",
                "cannot cover the initial population",
            ));
        }
        let mut scores = evaluate_population(evaluator, &population, cfg.parallel);
        tracker.record(0, &population, &scores, budget.used());

        let mut generation = 0;
        while let Some(remaining) = budget.remaining().filter(|&r| r > 0) {
            generation += 1;
            let sigma = cfg.sigma_at(budget.progress());
            let batch = remaining.min(population.len());
            if !budget.try_consume(batch) {
                break;
            }

            let vectors: Vec<[f64; DIMENSIONS]> =
                population.iter().map(ParamCandidate::to_vector).collect();
            let trials: Vec<ParamCandidate> = (0..batch)
                .map(|target| {
                    let v = self.trial_vector(&vectors, target, sigma, &range, &mut rng);
                    ParamCandidate::from_vector(&v, &self.bounds)
                })
                .collect();

            let trial_scores = evaluate_population(evaluator, &trials, cfg.parallel);

            for (trial, score) in trials.into_iter().zip(trial_scores) {
                let nearest = nearest_index(&population, &trial, &range);
                if score.total_cmp(&scores[nearest]).is_ge() {
                    tracker.offer(&trial, score);
                    population[nearest] = trial;
                    scores[nearest] = score;
                }
            }
            tracker.record(generation, &population, &scores, budget.used());
        }

        tracker.finish(population, budget.used())
    }

    fn trial_vector(
        &self,
        vectors: &[[f64; DIMENSIONS]],
        target: usize,
        sigma: f64,
        range: &[f64; DIMENSIONS],
        rng: &mut StdRng,
    ) -> [f64; DIMENSIONS] {
        let cfg = &self.config;
        let [r1, r2, r3] = distinct_others(vectors.len(), target, rng);
        let forced = rng.gen_range(0..DIMENSIONS);

        let mut trial = vectors[target];
        for j in 0..DIMENSIONS {
            if j == forced || rng.gen_bool(cfg.crossover_rate) {
                trial[j] = vectors[r1][j] + cfg.differential_weight * (vectors[r2][j] - vectors[r3][j]);
            }
            let scale = sigma * range[j];
            if scale > 0.0 {
                if let Ok(step) = Normal::new(0.0, scale) {
                    trial[j] += step.sample(rng);
                }
            }
        }
        trial
    }
}

/// Three distinct indices in `0..n`, none equal to `exclude`. Requires `n >= 4`.
fn distinct_others(n: usize, exclude: usize, rng: &mut StdRng) -> [usize; 3] {
    let mut picked = [usize::MAX; 3];
    let mut filled = 0;
    while filled < 3 {
        let i = rng.gen_range(0..n);
        if i != exclude && !picked[..filled].contains(&i) {
            picked[filled] = i;
            filled += 1;
        }
    }
    picked
}

/// Member closest to `trial` after scaling every coordinate by its range.
/// The earliest member wins ties.
fn nearest_index(
    population: &[ParamCandidate],
    trial: &ParamCandidate,
    range: &[f64; DIMENSIONS],
) -> usize {
    let t = trial.to_vector();
    let distance = |c: &ParamCandidate| -> f64 {
        let v = c.to_vector();
        (0..DIMENSIONS)
            .filter(|&j| range[j] > 0.0)
            .map(|j| ((v[j] - t[j]) / range[j]).powi(2))
            .sum()
    };
    population
        .iter()
        .enumerate()
        .map(|(i, c)| (i, distance(c)))
        .fold((0, f64::INFINITY), |best, (i, d)| if d < best.1 { (i, d) } else { best })
        .0
}
