use std::mem;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, trace};

use crate::packing::engine::PackingEngine;
use crate::packing::error::PackResult;
use crate::packing::random::uniform;

impl PackingEngine {
	/// Uniform random point inside the domain.
	pub(crate) fn random_point(&mut self) -> [f64; 3] {
		let size = self.domain.size();
		[
			uniform(&mut self.rng) * size[0],
			uniform(&mut self.rng) * size[1],
			uniform(&mut self.rng) * size[2],
		]
	}

	/// Point within two packing cells of `origin` on every axis.
	pub(crate) fn nudge_point(&mut self, origin: [f64; 3]) -> [f64; 3] {
		let res = self.grid.resolution;
		let mut out = origin;
		for axis in 0..3 {
			out[axis] += 2.0 * (uniform(&mut self.rng) - 0.5) * (2.0 * res[axis]);
		}
		out
	}

	/// Move grain `idx` to `target` by a rigid footprint shift and keep the
	/// move if the filling error does not get worse; otherwise put it back.
	/// Returns whether it was kept.
	pub fn try_move(&mut self, idx: usize, target: [f64; 3]) -> bool {
		self.try_relocation(idx, target, false)
	}

	/// Like [`PackingEngine::try_move`], but the footprint is rebuilt at
	/// `target`, which resamples the grain's sub-cell offset.
	pub fn try_placement(&mut self, idx: usize, target: [f64; 3]) -> bool {
		self.try_relocation(idx, target, true)
	}

	fn try_relocation(&mut self, idx: usize, target: [f64; 3], rebuild: bool) -> bool {
		let old_error = self.grid.filling_error();
		let old_centroid = self.grains[idx].centroid;
		self.check_filling_error(None, Some(idx));
		let saved = if rebuild {
			let saved = mem::take(&mut self.grains[idx].footprint);
			self.grains[idx].centroid = target;
			self.insert_grain(idx);
			Some(saved)
		} else {
			self.move_grain(idx, target);
			None
		};
		let new_error = self.check_filling_error(Some(idx), None);
		if new_error <= old_error {
			return true;
		}
		self.check_filling_error(None, Some(idx));
		match saved {
			Some(footprint) => {
				let grain = &mut self.grains[idx];
				grain.footprint = footprint;
				grain.centroid = old_centroid;
			}
			None => self.move_grain(idx, old_centroid),
		}
		self.check_filling_error(Some(idx), None);
		false
	}

	/// Start every grain at the domain center, claim it, then try
	/// `placement_trials` random placements for it.
	pub fn place_grains(&mut self) -> PackResult<()> {
		let size = self.domain.size();
		let center = [size[0] / 2.0, size[1] / 2.0, size[2] / 2.0];
		for grain in self.grains.iter_mut() {
			grain.centroid = center;
		}
		self.compute_footprints_parallel();

		let trials = self.settings.placement_trials;
		for idx in 0..self.grains.len() {
			if self.at_checkpoint(idx) {
				self.check_cancel("placement")?;
			}
			self.check_filling_error(Some(idx), None);
			for _ in 0..trials {
				let target = self.random_point();
				self.try_placement(idx, target);
			}
		}
		info!(grains = self.grains.len(), filling_error = self.grid.filling_error(), "grains placed");
		Ok(())
	}

	/// `refinement_factor` moves per grain. Even iterations jump anywhere in
	/// the domain, odd ones nudge (unless nudges are disabled).
	pub fn refine_packing(&mut self) -> PackResult<()> {
		let count = self.grains.len();
		if count == 0 {
			return Ok(());
		}
		let iterations = self.settings.refinement_factor * count;
		let log_interval = self.settings.progress_log_interval.max(1);

		let pb = if self.show_progress {
			let pb = ProgressBar::new(iterations as u64);
			pb.set_style(
				ProgressStyle::default_bar()
				.template("Refining Packing: [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
				.unwrap_or_else(|_| ProgressStyle::default_bar())
				.progress_chars("#>-"),
			);
			pb
		} else {
			ProgressBar::hidden()
		};

		for iteration in 0..iterations {
			if iteration % log_interval == 0 {
				trace!(
					iteration,
					filling_error = self.grid.filling_error(),
					size_overlap = self.size_error,
					neighborhood_overlap = self.neighborhood_error,
					grains = count,
					accepted = self.accepted_moves,
					"refinement progress"
				);
			}
			if self.at_checkpoint(iteration) {
				if let Err(e) = self.check_cancel("refinement") {
					pb.abandon_with_message("cancelled");
					return Err(e);
				}
				pb.set_position(iteration as u64);
			}

			let idx = ((uniform(&mut self.rng) * count as f64) as usize).min(count - 1);
			let target = if self.settings.nudge_moves && iteration % 2 == 1 {
				let origin = self.grains[idx].centroid;
				self.nudge_point(origin)
			} else {
				self.random_point()
			};
			if self.try_move(idx, target) {
				self.accepted_moves += 1;
			}
		}

		pb.finish_with_message("Refinement complete!");
		info!(
			iterations,
			accepted = self.accepted_moves,
			filling_error = self.grid.filling_error(),
			"refinement finished"
		);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use crate::packing::engine::PackingEngine;
	use crate::packing::engine::tests::small_config;

	fn placed(seed: u64) -> PackingEngine {
		let mut engine = PackingEngine::new(small_config(16, seed));
		engine.prepare().unwrap();
		engine.build_initial_population().unwrap();
		engine.match_size_distribution().unwrap();
		engine.place_grains().unwrap();
		engine
	}

	#[test]
	fn test_placement_claims_every_grain() {
		let engine = placed(6);
		let claimed: usize = engine.grid.owners.iter().map(|&o| o as usize).sum();
		let footprint_cells: usize = engine.grains().iter().map(|g| g.footprint.len()).sum();
		assert_eq!(claimed, footprint_cells);
		assert_eq!(engine.grid.filling_total, engine.grid.recompute_filling_total());
	}

	#[test]
	fn test_refinement_never_worsens_filling() {
		let mut engine = placed(7);
		let before = engine.filling_error();
		engine.refine_packing().unwrap();
		assert!(engine.filling_error() <= before);
		assert_eq!(engine.grid.filling_total, engine.grid.recompute_filling_total());
		assert!(engine.accepted_moves() > 0);
	}

	#[test]
	fn test_rejected_move_restores_state() {
		let mut engine = placed(8);
		let owners = engine.grid.owners.clone();
		let centroid = engine.grains[0].centroid;
		let footprint = engine.grains[0].footprint.clone();
		if !engine.try_move(0, [1.0, 1.0, 1.0]) {
			assert_eq!(engine.grid.owners, owners);
			assert_eq!(engine.grains[0].centroid, centroid);
			assert_eq!(engine.grains[0].footprint, footprint);
		}
	}

	#[test]
	fn test_rejected_placement_restores_state() {
		let mut engine = placed(10);
		for idx in 0..engine.grains.len().min(50) {
			let owners = engine.grid.owners.clone();
			let centroid = engine.grains[idx].centroid;
			let footprint = engine.grains[idx].footprint.clone();
			let target = engine.random_point();
			if !engine.try_placement(idx, target) {
				assert_eq!(engine.grid.owners, owners);
				assert_eq!(engine.grains[idx].centroid, centroid);
				assert_eq!(engine.grains[idx].footprint, footprint);
			} else {
				assert_eq!(engine.grains[idx].centroid, target);
			}
		}
		assert_eq!(engine.grid.filling_total, engine.grid.recompute_filling_total());
	}

	#[test]
	fn test_nudges_stay_close() {
		let mut engine = placed(9);
		let origin = [8.0, 8.0, 8.0];
		for _ in 0..100 {
			let p = engine.nudge_point(origin);
			for axis in 0..3 {
				assert!((p[axis] - origin[axis]).abs() <= 4.0);
			}
		}
	}
}
