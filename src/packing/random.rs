//! Sampling helpers over the engine's PRNG.
//!
//! All draws go through a caller-supplied generator so a run is reproducible
//! from its seed and independent engines never share state.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand::SeedableRng;
use rand_distr::{Beta, Distribution, Normal};

use crate::packing::error::{PackError, PackResult};

/// Engine PRNG.
pub type PackRng = ChaCha8Rng;

/// Seed the engine PRNG.
pub fn seeded(seed: u64) -> PackRng {
	ChaCha8Rng::seed_from_u64(seed)
}

/// Uniform draw on [0, 1).
#[inline]
pub fn uniform<R: Rng + ?Sized>(rng: &mut R) -> f64 {
	rng.gen_range(0.0..1.0)
}

/// Normal(mean, sd) draw.
pub fn normal<R: Rng + ?Sized>(rng: &mut R, mean: f64, sd: f64) -> PackResult<f64> {
	let dist = Normal::new(mean, sd).map_err(|_| PackError::InvalidDistribution {
		name: "Normal",
		a: mean,
		b: sd,
	})?;
	Ok(dist.sample(rng))
}

/// Beta(alpha, beta) draw.
pub fn beta<R: Rng + ?Sized>(rng: &mut R, alpha: f64, beta: f64) -> PackResult<f64> {
	let dist = Beta::new(alpha, beta).map_err(|_| PackError::InvalidDistribution {
		name: "Beta",
		a: alpha,
		b: beta,
	})?;
	Ok(dist.sample(rng))
}
