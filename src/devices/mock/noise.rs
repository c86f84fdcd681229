//! Seeded measurement noise for the simulated components
//!
//! Every component owns a [`SensorNoise`] on its own [`NoiseStream`], so
//! extra reads on one sensor never shift the sequence another one sees.

use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand_distr::{Bernoulli, Distribution, Normal};

/// Independent random sequences of one simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseStream {
    /// Wheel slip against the floor
    Slip,
    Encoders,
    Reflectance,
    Proximity,
}

impl NoiseStream {
    fn derive(self, seed: u64) -> u64 {
        seed.wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(self as u64)
    }
}

/// Read failures and additive Gaussian error for one component
#[derive(Debug, Clone)]
pub struct SensorNoise {
    rng: SmallRng,
    error: Option<Normal<f64>>,
    failure: Option<Bernoulli>,
}

impl SensorNoise {
    /// Noise with the given error spread and read failure probability.
    ///
    /// A seed of 0 draws from OS entropy. Out-of-range parameters disable
    /// that part of the noise; `SimulationConfig::validate` rejects them.
    pub fn new(seed: u64, stream: NoiseStream, stddev: f64, failure_rate: f64) -> Self {
        let rng = if seed == 0 {
            SmallRng::from_entropy()
        } else {
            SmallRng::seed_from_u64(stream.derive(seed))
        };

        Self {
            rng,
            error: (stddev > 0.0)
                .then(|| Normal::new(0.0, stddev).ok())
                .flatten(),
            failure: (failure_rate > 0.0)
                .then(|| Bernoulli::new(failure_rate).ok())
                .flatten(),
        }
    }

    /// Whether the next read should fail.
    pub fn read_fails(&mut self) -> bool {
        match self.failure {
            Some(failure) => failure.sample(&mut self.rng),
            None => false,
        }
    }

    /// `value` plus one draw of the measurement error.
    pub fn perturb(&mut self, value: f64) -> f64 {
        match self.error {
            Some(error) => value + error.sample(&mut self.rng),
            None => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_and_stream_repeat() {
        let mut a = SensorNoise::new(42, NoiseStream::Proximity, 1.0, 0.2);
        let mut b = SensorNoise::new(42, NoiseStream::Proximity, 1.0, 0.2);
        for _ in 0..100 {
            assert_eq!(a.read_fails(), b.read_fails());
            assert_eq!(a.perturb(10.0), b.perturb(10.0));
        }
    }

    #[test]
    fn test_streams_are_independent() {
        let mut slip = SensorNoise::new(42, NoiseStream::Slip, 1.0, 0.0);
        let mut proximity = SensorNoise::new(42, NoiseStream::Proximity, 1.0, 0.0);
        let same = (0..20)
            .filter(|_| slip.perturb(0.0) == proximity.perturb(0.0))
            .count();
        assert!(same < 20);
    }

    #[test]
    fn test_quiet_noise_is_exact() {
        let mut noise = SensorNoise::new(42, NoiseStream::Reflectance, 0.0, 0.0);
        for _ in 0..10 {
            assert_eq!(noise.perturb(47.5), 47.5);
            assert!(!noise.read_fails());
        }

        // Rejected by validation; treated as no noise here
        let mut invalid = SensorNoise::new(42, NoiseStream::Encoders, -1.0, 1.5);
        assert_eq!(invalid.perturb(3.0), 3.0);
        assert!(!invalid.read_fails());
    }

    #[test]
    fn test_failure_rate() {
        let mut noise = SensorNoise::new(42, NoiseStream::Encoders, 0.0, 0.3);
        let trials = 10_000;
        let failed = (0..trials).filter(|_| noise.read_fails()).count();
        let ratio = failed as f64 / trials as f64;
        assert!((ratio - 0.3).abs() < 0.05);

        let mut always = SensorNoise::new(42, NoiseStream::Encoders, 0.0, 1.0);
        assert!((0..10).all(|_| always.read_fails()));
    }

    #[test]
    fn test_error_spread() {
        let mut noise = SensorNoise::new(7, NoiseStream::Proximity, 2.0, 0.0);
        let n = 10_000;
        let samples: Vec<f64> = (0..n).map(|_| noise.perturb(100.0)).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n as f64;
        assert!((mean - 100.0).abs() < 0.1, "mean={}", mean);
        assert!((var.sqrt() - 2.0).abs() < 0.1, "stddev={}", var.sqrt());
    }
}
