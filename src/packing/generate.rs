//! Drawing new grains from a phase's statistics.

use tracing::warn;

use crate::packing::engine::PackingEngine;
use crate::packing::error::PackResult;
use crate::packing::grain::Grain;
use crate::packing::math::beta_pdf;
use crate::packing::orientation::ODF_SIZE;
use crate::packing::random::{beta, normal, uniform};
use crate::packing::shape::ShapeKind;
use crate::packing::stats::PhaseStats;

impl PackingEngine {
	/// Equivalent diameter in [min, max) drawn from the phase's log-normal.
	/// After `max_sample_retries` misses the last draw is clamped into range.
	pub fn sample_diameter(&mut self, phase: usize) -> PackResult<f64> {
		let stats = &self.statistics.phases[phase];
		let (min, max) = (stats.min_diameter, stats.max_diameter);
		for _ in 0..self.settings.max_sample_retries {
			let d = normal(&mut self.rng, stats.avg_log_diameter, stats.sd_log_diameter)?.exp();
			if d >= min && d < max {
				return Ok(d);
			}
		}
		let d = normal(&mut self.rng, stats.avg_log_diameter, stats.sd_log_diameter)?.exp();
		let upper = (max * (1.0 - 1e-12)).max(min);
		let clamped = d.clamp(min, upper);
		warn!(phase, drawn = d, clamped, "diameter retries exhausted, clamping");
		Ok(clamped)
	}

	/// New grain for `phase` with an empty footprint at the origin.
	pub fn generate_grain(&mut self, phase: usize) -> PackResult<Grain> {
		let diameter = self.sample_diameter(phase)?;
		let stats = &self.statistics.phases[phase];
		let bin = stats.diameter_bin(diameter);
		let [ba_alpha, ba_beta] = PhaseStats::beta_for(&stats.b_over_a, bin);
		let [ca_alpha, ca_beta] = PhaseStats::beta_for(&stats.c_over_a, bin);
		let [cb_alpha, cb_beta] = PhaseStats::beta_for(&stats.c_over_b, bin);

		// c/b must be plausible under its own distribution and never exceed 1
		let mut ratios = None;
		for _ in 0..self.settings.max_sample_retries {
			let b_over_a = beta(&mut self.rng, ba_alpha, ba_beta)?;
			let c_over_a = beta(&mut self.rng, ca_alpha, ca_beta)?;
			let c_over_b = c_over_a / b_over_a;
			if beta_pdf(c_over_b, cb_alpha, cb_beta) > uniform(&mut self.rng) && c_over_b <= 1.0 {
				ratios = Some((b_over_a, c_over_a));
				break;
			}
		}
		let (b_over_a, c_over_a) = match ratios {
			Some(r) => r,
			None => {
				let b_over_a = beta(&mut self.rng, ba_alpha, ba_beta)?;
				let c_over_a = beta(&mut self.rng, ca_alpha, ca_beta)?;
				warn!(phase, bin, "aspect ratio retries exhausted, ordering last draw");
				if c_over_a > b_over_a { (c_over_a, b_over_a) } else { (b_over_a, c_over_a) }
			}
		};

		let cdf = &self.odf_cdfs[phase];
		let u = uniform(&mut self.rng);
		let odf_bin = cdf.partition_point(|&c| c < u).min(ODF_SIZE - 1);
		let axis_euler_angles = self.orientation.determine_euler_angles(odf_bin);

		let [om_alpha, om_beta] = PhaseStats::beta_for(&stats.omega3, bin);
		let mut omega3 = beta(&mut self.rng, om_alpha, om_beta)?;
		if stats.shape == ShapeKind::Ellipsoid {
			omega3 = 1.0;
		}

		Ok(Grain {
			phase,
			volume: Grain::volume_from_diameter(diameter),
			equivalent_diameter: diameter,
			radius1: 1.0,
			radius2: b_over_a,
			radius3: c_over_a,
			axis_euler_angles,
			omega3,
			..Default::default()
		})
	}
}
