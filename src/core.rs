//! Core RANSAC traits and pipeline.
//!
//! The consensus loop is generic over its components so that the fitting
//! strategy can be swapped (and seeded) without touching the loop:
//! - traits for estimators, samplers, scoring, local optimization and
//!   termination;
//! - a generic [`Ransac`] struct that orchestrates them.

use tracing::trace;

use crate::{settings::RansacSettings, types::DataMatrix};

/// Estimator responsible for generating model hypotheses from minimal samples.
pub trait Estimator {
    /// Model type produced by this estimator.
    type Model: Clone;

    /// Size of a minimal sample for this estimator.
    fn sample_size(&self) -> usize;

    /// Fewest points accepted by [`Estimator::estimate_model_nonminimal`].
    fn non_minimal_sample_size(&self) -> usize {
        self.sample_size()
    }

    /// Check whether a given sample is geometrically valid.
    fn is_valid_sample(&self, data: &DataMatrix, sample: &[usize]) -> bool;

    /// Estimate candidate models from a minimal sample.
    fn estimate_model(&self, data: &DataMatrix, sample: &[usize]) -> Vec<Self::Model>;

    /// Estimate from an over-determined sample.
    fn estimate_model_nonminimal(&self, data: &DataMatrix, sample: &[usize]) -> Vec<Self::Model> {
        self.estimate_model(data, sample)
    }

    /// Validate a candidate model before scoring.
    fn is_valid_model(
        &self,
        model: &Self::Model,
        data: &DataMatrix,
        sample: &[usize],
        threshold: f64,
    ) -> bool;
}

/// Sampler responsible for drawing minimal samples from the data.
pub trait Sampler {
    /// Draw a sample of `sample_size` elements into `out_indices`.
    ///
    /// Returns `false` if a valid sample could not be drawn (caller may retry).
    fn sample(&mut self, data: &DataMatrix, sample_size: usize, out_indices: &mut [usize]) -> bool;
}

/// Scoring strategy used to evaluate model quality and determine inliers.
pub trait Scoring<M> {
    /// Score type; must support ordering for "better than" comparisons.
    type Score: Clone + PartialOrd;

    /// Inlier/outlier threshold for residuals in the chosen domain.
    fn threshold(&self) -> f64;

    /// Score a model and return its inlier set in `inliers_out`.
    fn score(&self, data: &DataMatrix, model: &M, inliers_out: &mut Vec<usize>) -> Self::Score;
}

/// Local optimization strategy, potentially refining a model using its inliers.
pub trait LocalOptimizer<M, S: Clone> {
    /// Run local optimization on the given model and inliers.
    ///
    /// Returns `(refined_model, refined_score, refined_inliers)`.
    fn run(
        &mut self,
        data: &DataMatrix,
        inliers: &[usize],
        model: &M,
        best_score: &S,
    ) -> (M, S, Vec<usize>);
}

/// Least squares refit on all inliers, rescored with the pipeline's scoring.
pub struct LeastSquaresOptimizer<E, Sc> {
    estimator: E,
    scoring: Sc,
}

impl<E, Sc> LeastSquaresOptimizer<E, Sc>
where
    E: Estimator,
    Sc: Scoring<E::Model>,
{
    pub fn new(estimator: E, scoring: Sc) -> Self {
        Self { estimator, scoring }
    }
}

impl<E, Sc> LocalOptimizer<E::Model, Sc::Score> for LeastSquaresOptimizer<E, Sc>
where
    E: Estimator,
    Sc: Scoring<E::Model>,
{
    fn run(
        &mut self,
        data: &DataMatrix,
        inliers: &[usize],
        model: &E::Model,
        best_score: &Sc::Score,
    ) -> (E::Model, Sc::Score, Vec<usize>) {
        if inliers.len() < self.estimator.non_minimal_sample_size() {
            return (model.clone(), best_score.clone(), inliers.to_vec());
        }

        match self
            .estimator
            .estimate_model_nonminimal(data, inliers)
            .into_iter()
            .next()
        {
            Some(refined) => {
                let mut refined_inliers = Vec::new();
                let refined_score = self.scoring.score(data, &refined, &mut refined_inliers);
                (refined, refined_score, refined_inliers)
            }
            None => (model.clone(), best_score.clone(), inliers.to_vec()),
        }
    }
}

/// Termination criterion deciding when the RANSAC loop can stop.
pub trait TerminationCriterion<S> {
    /// Update the termination state.
    ///
    /// Returns `true` if the algorithm should terminate immediately.
    fn check(
        &mut self,
        data: &DataMatrix,
        best_score: &S,
        sample_size: usize,
        max_iterations: &mut usize,
    ) -> bool;
}

/// Shrinks the iteration budget with the standard formula
/// `N = log(1 - confidence) / log(1 - inlier_ratio^sample_size)`.
pub struct RansacTerminationCriterion {
    /// Desired confidence in \[0, 1\].
    pub confidence: f64,
}

impl TerminationCriterion<crate::scoring::Score> for RansacTerminationCriterion {
    fn check(
        &mut self,
        data: &DataMatrix,
        best_score: &crate::scoring::Score,
        sample_size: usize,
        max_iterations: &mut usize,
    ) -> bool {
        let n = data.nrows() as f64;
        if n <= 0.0 {
            return false;
        }

        let inlier_ratio = (best_score.inlier_count as f64 / n).clamp(0.0, 1.0);
        if inlier_ratio <= 0.0 {
            return false;
        }
        if inlier_ratio >= 1.0 {
            // Every point agrees; no better hypothesis can exist.
            *max_iterations = 0;
            return false;
        }

        let p_good_sample = inlier_ratio.powi(sample_size as i32);
        if p_good_sample <= 0.0 || p_good_sample >= 1.0 {
            return false;
        }

        let log_one_minus_conf = (1.0 - self.confidence).ln();
        let log_one_minus_p = (1.0 - p_good_sample).ln();
        if !log_one_minus_conf.is_finite() || !log_one_minus_p.is_finite() {
            return false;
        }

        let required = (log_one_minus_conf / log_one_minus_p).ceil().max(1.0) as usize;
        if required < *max_iterations {
            *max_iterations = required;
        }

        // The outer loop stops once the (possibly updated) budget is spent.
        false
    }
}

/// Generic RANSAC pipeline orchestrating the above components.
pub struct Ransac<E, Sa, Sc, LO, T>
where
    E: Estimator,
    Sa: Sampler,
    Sc: Scoring<E::Model>,
    LO: LocalOptimizer<E::Model, Sc::Score>,
    T: TerminationCriterion<Sc::Score>,
{
    pub settings: RansacSettings,
    pub estimator: E,
    pub sampler: Sa,
    pub scoring: Sc,
    pub local_optimizer: Option<LO>,
    pub final_optimizer: Option<LO>,
    pub termination: T,

    // Outputs / diagnostics
    pub best_model: Option<E::Model>,
    pub best_inliers: Vec<usize>,
    pub best_score: Option<Sc::Score>,
    pub iteration: usize,
}

impl<E, Sa, Sc, LO, T> Ransac<E, Sa, Sc, LO, T>
where
    E: Estimator,
    Sa: Sampler,
    Sc: Scoring<E::Model>,
    LO: LocalOptimizer<E::Model, Sc::Score>,
    T: TerminationCriterion<Sc::Score>,
{
    /// Create a new pipeline from its components.
    pub fn new(
        settings: RansacSettings,
        estimator: E,
        sampler: Sa,
        scoring: Sc,
        local_optimizer: Option<LO>,
        final_optimizer: Option<LO>,
        termination: T,
    ) -> Self {
        Self {
            settings,
            estimator,
            sampler,
            scoring,
            local_optimizer,
            final_optimizer,
            termination,
            best_model: None,
            best_inliers: Vec::new(),
            best_score: None,
            iteration: 0,
        }
    }

    /// Run the RANSAC loop on the given data matrix.
    ///
    /// Manages sampling, model generation, scoring, optional local
    /// optimization and termination. Results land in `best_model`,
    /// `best_inliers` and `best_score`.
    pub fn run(&mut self, data: &DataMatrix) {
        let sample_size = self.estimator.sample_size();
        let mut sample = vec![0usize; sample_size];
        let mut tmp_inliers = Vec::new();

        let mut max_iterations = self.settings.max_iterations;
        let min_iterations = self.settings.min_iterations;

        self.best_inliers.clear();
        self.best_model = None;
        self.best_score = None;
        self.iteration = 0;

        if data.nrows() < sample_size {
            return;
        }

        let threshold = self.scoring.threshold();

        while self.iteration < max_iterations || self.iteration < min_iterations {
            // Try to obtain a valid sample and a valid model.
            let mut models: Vec<E::Model> = Vec::new();

            for _ in 0..100 {
                if !self.sampler.sample(data, sample_size, &mut sample[..])
                    || !self.estimator.is_valid_sample(data, &sample)
                {
                    continue;
                }

                models = self.estimator.estimate_model(data, &sample);
                if !models.is_empty() {
                    break;
                }
            }

            if models.is_empty() {
                self.iteration += 1;
                continue;
            }

            let mut iteration_improved_best = false;

            for model in models.iter() {
                if !self.estimator.is_valid_model(model, data, &sample, threshold) {
                    continue;
                }

                let score = self.scoring.score(data, model, &mut tmp_inliers);

                let better = match &self.best_score {
                    None => true,
                    Some(best) => score > *best,
                };

                if better {
                    trace!(
                        iteration = self.iteration,
                        inliers = tmp_inliers.len(),
                        "new best hypothesis"
                    );
                    self.best_score = Some(score);
                    self.best_model = Some(model.clone());
                    self.best_inliers.clear();
                    self.best_inliers.extend_from_slice(&tmp_inliers);
                    iteration_improved_best = true;
                }
            }

            if iteration_improved_best {
                if let (Some(lo), Some(best_model), Some(best_score)) = (
                    &mut self.local_optimizer,
                    &self.best_model,
                    &self.best_score,
                ) {
                    let (refined_model, refined_score, refined_inliers) =
                        lo.run(data, &self.best_inliers, best_model, best_score);

                    if refined_score > *best_score {
                        self.best_model = Some(refined_model);
                        self.best_score = Some(refined_score);
                        self.best_inliers = refined_inliers;
                    }
                }

                if let Some(best_score) = &self.best_score {
                    if self
                        .termination
                        .check(data, best_score, sample_size, &mut max_iterations)
                    {
                        break;
                    }
                }
            }

            self.iteration += 1;
        }

        if let (Some(final_opt), Some(best_model), Some(best_score)) = (
            &mut self.final_optimizer,
            &self.best_model,
            &self.best_score,
        ) {
            if self.best_inliers.len() > sample_size {
                let (refined_model, refined_score, refined_inliers) =
                    final_opt.run(data, &self.best_inliers, best_model, best_score);

                if refined_score > *best_score {
                    self.best_model = Some(refined_model);
                    self.best_score = Some(refined_score);
                    self.best_inliers = refined_inliers;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::settings::RansacSettings;
    use crate::types::DataMatrix;

    #[derive(Clone, Debug)]
    struct MockModel;

    #[derive(Clone, Debug, PartialEq, PartialOrd)]
    struct MockScore(f64);

    struct MockEstimator;

    impl Estimator for MockEstimator {
        type Model = MockModel;

        fn sample_size(&self) -> usize {
            2
        }

        fn is_valid_sample(&self, _data: &DataMatrix, _sample: &[usize]) -> bool {
            true
        }

        fn estimate_model(&self, _data: &DataMatrix, _sample: &[usize]) -> Vec<Self::Model> {
            vec![MockModel]
        }

        fn is_valid_model(
            &self,
            _model: &Self::Model,
            _data: &DataMatrix,
            _sample: &[usize],
            _threshold: f64,
        ) -> bool {
            true
        }
    }

    struct MockSampler {
        sample_calls: usize,
    }

    impl Sampler for MockSampler {
        fn sample(
            &mut self,
            data: &DataMatrix,
            sample_size: usize,
            out_indices: &mut [usize],
        ) -> bool {
            self.sample_calls += 1;
            for (i, v) in out_indices.iter_mut().enumerate().take(sample_size) {
                *v = i.min(data.nrows().saturating_sub(1));
            }
            true
        }
    }

    struct MockScoring;

    impl Scoring<MockModel> for MockScoring {
        type Score = MockScore;

        fn threshold(&self) -> f64 {
            1.0
        }

        fn score(
            &self,
            _data: &DataMatrix,
            _model: &MockModel,
            inliers_out: &mut Vec<usize>,
        ) -> Self::Score {
            inliers_out.clear();
            inliers_out.push(0);
            MockScore(1.0)
        }
    }

    struct PassThrough;

    impl LocalOptimizer<MockModel, MockScore> for PassThrough {
        fn run(
            &mut self,
            _data: &DataMatrix,
            inliers: &[usize],
            model: &MockModel,
            best_score: &MockScore,
        ) -> (MockModel, MockScore, Vec<usize>) {
            (model.clone(), best_score.clone(), inliers.to_vec())
        }
    }

    struct StopImmediately {
        called: usize,
    }

    impl TerminationCriterion<MockScore> for StopImmediately {
        fn check(&mut self, _: &DataMatrix, _: &MockScore, _: usize, _: &mut usize) -> bool {
            self.called += 1;
            true
        }
    }

    fn pipeline(
        settings: RansacSettings,
    ) -> Ransac<MockEstimator, MockSampler, MockScoring, PassThrough, StopImmediately> {
        Ransac::new(
            settings,
            MockEstimator,
            MockSampler { sample_calls: 0 },
            MockScoring,
            Some(PassThrough),
            None,
            StopImmediately { called: 0 },
        )
    }

    #[test]
    fn ransac_runs_and_updates_best_model() {
        let data = DataMatrix::zeros(4, 2);
        let mut ransac = pipeline(RansacSettings::default());
        ransac.run(&data);

        assert!(ransac.best_model.is_some());
        assert_eq!(ransac.best_score, Some(MockScore(1.0)));
        assert_eq!(ransac.best_inliers, vec![0]);
        assert_eq!(ransac.termination.called, 1);
        assert_eq!(ransac.sampler.sample_calls, 1);
    }

    #[test]
    fn too_few_rows_produce_no_model() {
        let data = DataMatrix::zeros(1, 2);
        let mut ransac = pipeline(RansacSettings::default());
        ransac.run(&data);

        assert!(ransac.best_model.is_none());
        assert!(ransac.best_inliers.is_empty());
        assert_eq!(ransac.sampler.sample_calls, 0);
    }

    #[test]
    fn termination_shrinks_budget_from_inlier_ratio() {
        let data = DataMatrix::zeros(100, 4);
        let mut criterion = RansacTerminationCriterion { confidence: 0.99 };
        let mut budget = 5000;
        let score = crate::scoring::Score::new(50, 0.0);
        assert!(!criterion.check(&data, &score, 4, &mut budget));
        // log(0.01) / log(1 - 0.5^4) = 71.36...
        assert_eq!(budget, 72);

        let all = crate::scoring::Score::new(100, 0.0);
        criterion.check(&data, &all, 4, &mut budget);
        assert_eq!(budget, 0);
    }
}
