//! Mutation policy - decides, per stock per tick, whether and how much
//! the price moves.
//!
//! The decision is pure given its random draws, so tests script the draw
//! sequence and assert exact deltas. Every draw comes from one independent
//! uniform source; nothing is re-seeded from the price itself.

use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

/// Uniform random values in [0, 1).
pub trait UniformSource {
    fn draw(&mut self) -> f64;
}

/// Production source backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngSource;

impl UniformSource for ThreadRngSource {
    fn draw(&mut self) -> f64 {
        rand::rng().random()
    }
}

/// Outcome of one policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Unchanged,
    Changed { delta: Decimal },
}

/// Per-tick price mutation parameters.
#[derive(Debug, Clone, Copy)]
pub struct MutationPolicy {
    update_probability: f64,
    range_percent: f64,
    sign_bias: f64,
}

impl MutationPolicy {
    pub fn new(update_probability: f64, range_percent: f64, sign_bias: f64) -> Self {
        Self {
            update_probability,
            range_percent,
            sign_bias,
        }
    }

    /// Decide one stock's move for this tick.
    ///
    /// 1. Skip draw: above `update_probability` means no mutation.
    /// 2. Magnitude draw: `delta = round(price * p * range_percent, 2dp)`.
    /// 3. Sign draw: above `sign_bias` means positive, else negative.
    ///
    /// Price arithmetic stays in fixed-point; only the draws are floats.
    /// Rounding is midpoint-to-even.
    pub fn decide(&self, price: Decimal, rng: &mut dyn UniformSource) -> Mutation {
        let r = rng.draw();
        if r > self.update_probability {
            return Mutation::Unchanged;
        }

        let percent = rng.draw() * self.range_percent;
        let Some(factor) = Decimal::from_f64(percent) else {
            // Unrepresentable draw; treat as no move this tick.
            return Mutation::Unchanged;
        };
        let magnitude = (price * factor).round_dp(2);

        let delta = if rng.draw() > self.sign_bias {
            magnitude
        } else {
            -magnitude
        };
        Mutation::Changed { delta }
    }
}
