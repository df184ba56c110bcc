//! Z-factor update heuristics.
//!
//! Each rule maps the statistics of the latest render to an additive
//! adjustment. Rules run in order on the current guess; the optimizer
//! applies the lower bound afterwards.

use std::fmt;

use super::contrast::MaskedStatistics;

#[derive(Clone, Copy)]
pub struct UpdateRule {
    pub name: &'static str,
    pub adjust: fn(&MaskedStatistics) -> f64,
}

impl UpdateRule {
    pub const fn new(name: &'static str, adjust: fn(&MaskedStatistics) -> f64) -> Self {
        Self { name, adjust }
    }

    pub fn apply(&self, stats: &MaskedStatistics) -> f64 {
        (self.adjust)(stats)
    }
}

impl fmt::Debug for UpdateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateRule").field("name", &self.name).finish()
    }
}

fn highlight_saturation(s: &MaskedStatistics) -> f64 {
    (s.prop_high_sat * 10.0).round_ties_even()
}

fn shadow_saturation(s: &MaskedStatistics) -> f64 {
    -(s.prop_low_sat * 10.0).round_ties_even()
}

fn flat_contrast(s: &MaskedStatistics) -> f64 {
    if s.stdev < 45.0 {
        0.5
    } else {
        0.0
    }
}

fn dark_mean(s: &MaskedStatistics) -> f64 {
    if s.mean < 50.0 {
        -1.0
    } else if s.mean < 100.0 {
        -0.5
    } else {
        0.0
    }
}

fn bright_mean(s: &MaskedStatistics) -> f64 {
    if s.mean > 200.0 {
        1.0
    } else if s.mean > 150.0 {
        0.5
    } else {
        0.0
    }
}

fn spread_below_black(s: &MaskedStatistics) -> f64 {
    if s.mean - s.stdev < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn spread_above_white(s: &MaskedStatistics) -> f64 {
    if s.mean + s.stdev > 255.0 {
        1.0
    } else {
        0.0
    }
}

/// The built-in rule list, in application order.
pub fn default_rules() -> Vec<UpdateRule> {
    vec![
        UpdateRule::new("highlight_saturation", highlight_saturation),
        UpdateRule::new("shadow_saturation", shadow_saturation),
        UpdateRule::new("flat_contrast", flat_contrast),
        UpdateRule::new("dark_mean", dark_mean),
        UpdateRule::new("bright_mean", bright_mean),
        UpdateRule::new("spread_below_black", spread_below_black),
        UpdateRule::new("spread_above_white", spread_above_white),
    ]
}

/// Apply each rule to `guess` in turn.
pub fn apply_rules(rules: &[UpdateRule], guess: f64, stats: &MaskedStatistics) -> f64 {
    rules.iter().fold(guess, |g, rule| g + rule.apply(stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(prop_high_sat: f64, prop_low_sat: f64, mean: f64, stdev: f64) -> MaskedStatistics {
        MaskedStatistics {
            prop_high_sat,
            prop_low_sat,
            mean,
            stdev,
        }
    }

    #[test]
    fn balanced_image_needs_no_change() {
        assert_eq!(apply_rules(&default_rules(), 1.0, &stats(0.0, 0.0, 125.0, 55.0)), 1.0);
    }

    #[test]
    fn saturation_rounds_half_to_even() {
        assert_eq!(highlight_saturation(&stats(0.25, 0.0, 0.0, 0.0)), 2.0);
        assert_eq!(highlight_saturation(&stats(0.75, 0.0, 0.0, 0.0)), 8.0);
        assert_eq!(shadow_saturation(&stats(0.0, 0.25, 0.0, 0.0)), -2.0);
        assert_eq!(shadow_saturation(&stats(0.0, 0.16, 0.0, 0.0)), -2.0);
    }

    #[test]
    fn mean_bands() {
        assert_eq!(dark_mean(&stats(0.0, 0.0, 49.9, 0.0)), -1.0);
        assert_eq!(dark_mean(&stats(0.0, 0.0, 50.0, 0.0)), -0.5);
        assert_eq!(dark_mean(&stats(0.0, 0.0, 100.0, 0.0)), 0.0);
        assert_eq!(bright_mean(&stats(0.0, 0.0, 150.0, 0.0)), 0.0);
        assert_eq!(bright_mean(&stats(0.0, 0.0, 150.5, 0.0)), 0.5);
        assert_eq!(bright_mean(&stats(0.0, 0.0, 200.5, 0.0)), 1.0);
    }

    #[test]
    fn dark_flat_image_sums_every_rule() {
        // -10 shadows, +0.5 flat, -1 dark.
        let next = apply_rules(&default_rules(), 2.0, &stats(0.0, 1.0, 0.0, 0.0));
        assert_eq!(next, -8.5);
    }

    #[test]
    fn wide_spread_hits_both_tails() {
        let s = stats(0.0, 0.0, 128.0, 140.0);
        assert_eq!(spread_below_black(&s), -1.0);
        assert_eq!(spread_above_white(&s), 1.0);
    }
}
