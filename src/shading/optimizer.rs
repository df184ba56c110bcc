//! Iterative z-factor search.
//!
//! Each step renders the surface at the current guess, measures the masked
//! hillshade and lets the update rules move the guess. The search stops when
//! a step leaves the guess unchanged or the iteration budget runs out. There
//! is no convergence guarantee: a guess can oscillate until the budget ends.

use serde::Serialize;
use tracing::{debug, info};

use super::contrast::{ContrastEvaluator, MaskedStatistics};
use super::renderer::{ShadingRenderer, SunGeometry};
use super::rules::{apply_rules, default_rules, UpdateRule};
use super::surface::{Footprint, PreparedSurface, SurfaceProvider};
use crate::error::ShadingError;
use crate::settings::ShadingSettings;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum OptimizationState {
    Running {
        guess: f64,
        prev_guess: f64,
        iteration: usize,
    },
    Converged(f64),
    BudgetExhausted(f64),
}

impl OptimizationState {
    pub fn initial(guess: f64) -> Self {
        OptimizationState::Running {
            guess,
            prev_guess: guess,
            iteration: 0,
        }
    }

    pub fn zfactor(&self) -> f64 {
        match *self {
            OptimizationState::Running { guess, .. } => guess,
            OptimizationState::Converged(z) | OptimizationState::BudgetExhausted(z) => z,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OptimizationState::Running { .. })
    }
}

/// One render and the update it produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub zfactor: f64,
    pub statistics: MaskedStatistics,
    pub next: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationOutcome {
    pub state: OptimizationState,
    pub history: Vec<IterationRecord>,
}

impl OptimizationOutcome {
    pub fn zfactor(&self) -> f64 {
        self.state.zfactor()
    }

    pub fn iterations(&self) -> usize {
        self.history.len()
    }
}

pub struct ShadingOptimizer<R> {
    renderer: R,
    evaluator: ContrastEvaluator,
    rules: Vec<UpdateRule>,
    settings: ShadingSettings,
}

impl<R: ShadingRenderer> ShadingOptimizer<R> {
    pub fn new(renderer: R, settings: ShadingSettings) -> Self {
        Self {
            renderer,
            evaluator: ContrastEvaluator::new(settings.high_saturation, settings.low_saturation),
            rules: default_rules(),
            settings,
        }
    }

    /// Replace the update rules.
    pub fn with_rules(mut self, rules: Vec<UpdateRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> &[UpdateRule] {
        &self.rules
    }

    pub fn settings(&self) -> &ShadingSettings {
        &self.settings
    }

    /// Advance a running state by one render. Terminal states are returned
    /// unchanged with no record.
    pub fn step(
        &self,
        state: OptimizationState,
        surface: &PreparedSurface,
        sun: &SunGeometry,
    ) -> Result<(OptimizationState, Option<IterationRecord>), ShadingError> {
        let OptimizationState::Running {
            guess, iteration, ..
        } = state
        else {
            return Ok((state, None));
        };

        let shade = self.renderer.render(surface, sun, guess)?;
        let stats = self.evaluator.evaluate(&shade, surface.roi())?;
        debug!(
            iteration,
            zfactor = guess,
            high_saturation = stats.prop_high_sat,
            low_saturation = stats.prop_low_sat,
            stdev = stats.stdev,
            mean = stats.mean,
            "hillshade statistics"
        );

        let next = apply_rules(&self.rules, guess, &stats).max(self.settings.min_zfactor);
        info!("{guess} --> {next}");

        let iteration = iteration + 1;
        let state = if next == guess {
            OptimizationState::Converged(next)
        } else if iteration >= self.settings.max_iterations {
            OptimizationState::BudgetExhausted(next)
        } else {
            OptimizationState::Running {
                guess: next,
                prev_guess: guess,
                iteration,
            }
        };
        let record = IterationRecord {
            iteration,
            zfactor: guess,
            statistics: stats,
            next,
        };
        Ok((state, Some(record)))
    }

    /// Search from the configured initial guess on an already prepared
    /// surface.
    pub fn run(
        &self,
        surface: &PreparedSurface,
        sun: &SunGeometry,
    ) -> Result<OptimizationOutcome, ShadingError> {
        if surface.roi().is_empty() {
            return Err(ShadingError::EmptyMask);
        }

        let mut state = OptimizationState::initial(self.settings.initial_guess);
        let mut history = Vec::new();
        if self.settings.max_iterations == 0 {
            state = OptimizationState::BudgetExhausted(state.zfactor());
        }
        while !state.is_terminal() {
            let (next, record) = self.step(state, surface, sun)?;
            history.extend(record);
            state = next;
        }

        match state {
            OptimizationState::Converged(z) => info!(
                identifier = surface.identifier(),
                iterations = history.len(),
                "z-factor converged at {z}"
            ),
            _ => info!(
                identifier = surface.identifier(),
                iterations = history.len(),
                "z-factor search stopped at {} without converging",
                state.zfactor()
            ),
        }
        Ok(OptimizationOutcome { state, history })
    }

    /// Prepare the surface for `footprint` once, then search.
    pub fn optimize<P: SurfaceProvider>(
        &self,
        provider: &P,
        footprint: &Footprint,
        sun: &SunGeometry,
    ) -> Result<OptimizationOutcome, ShadingError> {
        let surface = provider.prepare(footprint)?;
        self.run(&surface, sun)
    }
}
