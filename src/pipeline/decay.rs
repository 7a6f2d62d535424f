//! Freshness decay curves.

use std::time::Duration;

use crate::config::DecayKind;

/// Maps an item's age to a multiplier in `0.0..=1.0`, non-increasing in age.
pub trait DecayCurve: Send + Sync {
    fn factor(&self, age: Duration) -> f64;
}

/// Halves every `half_life`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialDecay {
    half_life_hours: f64,
}

impl ExponentialDecay {
    #[must_use]
    pub fn new(half_life: Duration) -> Self {
        Self {
            half_life_hours: hours(half_life),
        }
    }
}

impl DecayCurve for ExponentialDecay {
    fn factor(&self, age: Duration) -> f64 {
        if self.half_life_hours <= 0.0 {
            return 0.0;
        }
        0.5_f64.powf(hours(age) / self.half_life_hours)
    }
}

/// Straight line from 1 at age zero to 0 at twice the half-life.
#[derive(Debug, Clone, Copy)]
pub struct LinearDecay {
    half_life_hours: f64,
}

impl LinearDecay {
    #[must_use]
    pub fn new(half_life: Duration) -> Self {
        Self {
            half_life_hours: hours(half_life),
        }
    }
}

impl DecayCurve for LinearDecay {
    fn factor(&self, age: Duration) -> f64 {
        if self.half_life_hours <= 0.0 {
            return 0.0;
        }
        (1.0 - hours(age) / (2.0 * self.half_life_hours)).clamp(0.0, 1.0)
    }
}

#[must_use]
pub fn from_kind(kind: DecayKind, half_life: Duration) -> Box<dyn DecayCurve> {
    match kind {
        DecayKind::Exponential => Box::new(ExponentialDecay::new(half_life)),
        DecayKind::Linear => Box::new(LinearDecay::new(half_life)),
    }
}

fn hours(duration: Duration) -> f64 {
    duration.as_secs_f64() / 3600.0
}
