//! Synthetic signal generation
//!
//! Produces an endless stream of observations for demos and soak runs:
//!
//! ```text
//! value(t) = base + drift * t + amplitude * sin(2πt / period) + N(0, noise_std)
//! ```
//!
//! with occasional injected spikes (`± spike_magnitude * noise_std`) and
//! invalid (NaN) values. Each observation records what was injected under the
//! `injected` metadata key so downstream findings can be checked against it.

use chrono::{DateTime, Duration, Utc};
use rand::prelude::*;
use rand_distr::{Distribution, Normal, NormalError};
use std::f64::consts::TAU;

use crate::config::SourceConfig;
use crate::types::Observation;

/// Metadata `source` value for generated observations.
pub const SOURCE_NAME: &str = "synthetic";

/// What, if anything, was injected into a generated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Injection {
    None,
    Spike,
    Invalid,
}

impl Injection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Injection::None => "none",
            Injection::Spike => "spike",
            Injection::Invalid => "invalid",
        }
    }
}

/// Seeded generator of synthetic observations. Never ends; bound it with `take`.
pub struct SignalGenerator {
    rng: StdRng,
    noise: Normal<f64>,
    config: SourceConfig,
    start: DateTime<Utc>,
    sequence: u64,
}

impl SignalGenerator {
    /// Build from config. Fails only when `noise_std` is negative or NaN.
    pub fn from_config(config: &SourceConfig) -> Result<Self, NormalError> {
        let rng = match config.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            rng,
            noise: Normal::new(0.0, config.noise_std)?,
            config: config.clone(),
            start: Utc::now(),
            sequence: 0,
        })
    }

    /// Anchor generated timestamps at `start` instead of now.
    #[must_use]
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    /// Noise-free component of the signal at step `t`.
    pub fn expected_value(&self, t: u64) -> f64 {
        let c = &self.config;
        let t = t as f64;
        let phase = TAU * t / c.seasonal_period.max(1) as f64;
        c.base_value + c.drift_per_step * t + c.seasonal_amplitude * phase.sin()
    }

    fn next_value(&mut self, t: u64) -> (f64, Injection) {
        if chance(&mut self.rng, self.config.invalid_probability) {
            return (f64::NAN, Injection::Invalid);
        }

        let value = self.expected_value(t) + self.noise.sample(&mut self.rng);

        if chance(&mut self.rng, self.config.spike_probability) {
            let sign = if self.rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            let spike = sign * self.config.spike_magnitude * self.config.noise_std;
            return (value + spike, Injection::Spike);
        }
        (value, Injection::None)
    }
}

/// Bernoulli draw that tolerates out-of-range probabilities.
fn chance(rng: &mut StdRng, p: f64) -> bool {
    if p.is_nan() || p <= 0.0 {
        false
    } else if p >= 1.0 {
        true
    } else {
        rng.gen_bool(p)
    }
}

impl Iterator for SignalGenerator {
    type Item = Observation;

    fn next(&mut self) -> Option<Observation> {
        let t = self.sequence;
        self.sequence += 1;

        let (value, injected) = self.next_value(t);
        let step_ms = i64::try_from(self.config.interval_ms.max(1)).unwrap_or(i64::MAX);
        let offset = i64::try_from(t).unwrap_or(i64::MAX).saturating_mul(step_ms);
        let timestamp = self.start + Duration::milliseconds(offset);

        Some(
            Observation::at(value, timestamp)
                .with_metadata("source", SOURCE_NAME)
                .with_metadata("sequence", t)
                .with_metadata("injected", injected.as_str()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_config(seed: u64) -> SourceConfig {
        SourceConfig {
            seed: Some(seed),
            spike_probability: 0.0,
            invalid_probability: 0.0,
            ..SourceConfig::default()
        }
    }

    #[test]
    fn test_seeded_generators_agree() {
        let cfg = quiet_config(7);
        let start = Utc::now();
        let a: Vec<f64> = SignalGenerator::from_config(&cfg)
            .unwrap()
            .starting_at(start)
            .take(50)
            .map(|o| o.value)
            .collect();
        let b: Vec<f64> = SignalGenerator::from_config(&cfg)
            .unwrap()
            .starting_at(start)
            .take(50)
            .map(|o| o.value)
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_noise_free_signal_is_exact() {
        let cfg = SourceConfig {
            noise_std: 0.0,
            drift_per_step: 1.0,
            seasonal_amplitude: 0.0,
            ..quiet_config(1)
        };
        let values: Vec<f64> = SignalGenerator::from_config(&cfg)
            .unwrap()
            .take(4)
            .map(|o| o.value)
            .collect();
        assert_eq!(values, vec![50.0, 51.0, 52.0, 53.0]);
    }

    #[test]
    fn test_timestamps_step_by_interval() {
        let start = Utc::now();
        let cfg = SourceConfig {
            interval_ms: 250,
            ..quiet_config(3)
        };
        let obs: Vec<Observation> = SignalGenerator::from_config(&cfg)
            .unwrap()
            .starting_at(start)
            .take(3)
            .collect();
        assert_eq!(obs[0].timestamp, start);
        assert_eq!(obs[2].timestamp - obs[0].timestamp, Duration::milliseconds(500));
    }

    #[test]
    fn test_metadata_records_injection() {
        let cfg = SourceConfig {
            invalid_probability: 1.0,
            ..quiet_config(5)
        };
        let obs = SignalGenerator::from_config(&cfg).unwrap().next().unwrap();
        assert!(!obs.is_valid());
        assert_eq!(obs.metadata["injected"], serde_json::json!("invalid"));
        assert_eq!(obs.metadata["source"], serde_json::json!(SOURCE_NAME));
        assert_eq!(obs.metadata["sequence"], serde_json::json!(0));
    }

    #[test]
    fn test_spikes_are_offset_by_magnitude() {
        let cfg = SourceConfig {
            noise_std: 1.0,
            spike_probability: 1.0,
            spike_magnitude: 10.0,
            seasonal_amplitude: 0.0,
            drift_per_step: 0.0,
            ..quiet_config(11)
        };
        for obs in SignalGenerator::from_config(&cfg).unwrap().take(20) {
            assert_eq!(obs.metadata["injected"], serde_json::json!("spike"));
            // |noise| < 5 sigma with overwhelming probability
            assert!((obs.value - 50.0).abs() > 5.0);
        }
    }

    #[test]
    fn test_negative_noise_is_rejected() {
        let cfg = SourceConfig {
            noise_std: -1.0,
            ..SourceConfig::default()
        };
        assert!(SignalGenerator::from_config(&cfg).is_err());
    }
}
