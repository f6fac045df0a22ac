//! Building the grain population and matching it to the size targets.
//!
//! After [`PackingEngine::match_size_distribution`] the grain count is fixed;
//! later stages only move grains.

use tracing::{debug, info};

use crate::packing::compare::compare_2d_distributions;
use crate::packing::engine::PackingEngine;
use crate::packing::error::PackResult;
use crate::packing::grain::Grain;
use crate::packing::random::uniform;

impl PackingEngine {
	/// Generate grains until their combined volume reaches the domain volume
	/// (with overshoot when the domain is not periodic).
	pub fn build_initial_population(&mut self) -> PackResult<()> {
		let target = self.domain.total_volume() * self.settings.volume_factor(self.domain.periodic);
		let mut current = 0.0;
		let mut iteration = 0usize;
		while current < target {
			if self.at_checkpoint(iteration) {
				self.check_cancel("initial population")?;
			}
			iteration += 1;
			let phase = self.primary.pick(uniform(&mut self.rng));
			let grain = self.generate_grain(phase)?;
			current += grain.volume;
			self.grains.push(grain);
		}
		self.size_error = self.check_size_dist_error(None, None);
		info!(
			grains = self.grains.len(),
			volume = current,
			target,
			size_overlap = self.size_error,
			"initial population built"
		);
		Ok(())
	}

	/// Overlap between the size targets and the population with `add`
	/// included and the grain at `remove` left out.
	pub fn check_size_dist_error(&self, add: Option<&Grain>, remove: Option<usize>) -> f64 {
		let simulated = self.targets.simulate_sizes(&self.primary, &self.grains, add, remove);
		compare_2d_distributions(&simulated, &self.targets.size_rows())
	}

	/// Greedy add/remove until the size overlap reaches the threshold or the
	/// iteration cap is hit. Only strict improvements are kept.
	pub fn match_size_distribution(&mut self) -> PackResult<()> {
		let threshold = self.settings.size_match_threshold;
		let cap = self.settings.max_size_match_iterations;
		self.size_error = self.check_size_dist_error(None, None);
		let mut iteration = 0usize;
		let (mut added, mut removed) = (0usize, 0usize);

		while self.size_error < threshold && iteration < cap {
			if self.at_checkpoint(iteration) {
				self.check_cancel("size matching")?;
			}
			iteration += 1;

			if uniform(&mut self.rng) < 0.5 {
				let phase = self.primary.pick(uniform(&mut self.rng));
				let candidate = self.generate_grain(phase)?;
				let overlap = self.check_size_dist_error(Some(&candidate), None);
				if overlap > self.size_error {
					self.grains.push(candidate);
					self.size_error = overlap;
					added += 1;
				}
			} else {
				let count = self.grains.len();
				// never empty the population
				if count <= 1 {
					continue;
				}
				let index = ((uniform(&mut self.rng) * count as f64) as usize).min(count - 1);
				let overlap = self.check_size_dist_error(None, Some(index));
				if overlap > self.size_error {
					self.grains.remove(index);
					self.size_error = overlap;
					removed += 1;
				}
			}
		}

		if self.size_error < threshold {
			debug!(iterations = iteration, "size matching stopped at the iteration cap");
		}
		info!(
			grains = self.grains.len(),
			added,
			removed,
			iterations = iteration,
			size_overlap = self.size_error,
			"size distribution matched"
		);
		Ok(())
	}
}
