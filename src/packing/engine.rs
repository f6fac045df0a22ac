//! The packing engine: owns the grid, the population and the PRNG for one run.
//!
//! Stages live in sibling modules as further `impl PackingEngine` blocks:
//! grain generation, population building, footprints, neighbor bookkeeping
//! and the optimization loops.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::packing::config::{Domain, PackSettings, PackingConfig};
use crate::packing::error::{PackError, PackResult};
use crate::packing::grain::Grain;
use crate::packing::grid::PackingGrid;
use crate::packing::orientation::{OrientationOps, OrthoRhombicOps};
use crate::packing::random::{self, PackRng};
use crate::packing::stats::StatisticsModel;
use crate::packing::targets::{DistributionTargets, PrimaryPhases};

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackingSummary {
	pub seed: u64,
	pub grain_count: usize,
	pub covered_cells: usize,
	pub total_cells: usize,
	pub filling_error: f64,
	/// Bhattacharyya overlap of simulated and target size histograms.
	pub size_overlap: f64,
	/// Bhattacharyya overlap of simulated and target neighbor histograms.
	pub neighborhood_overlap: f64,
	pub accepted_moves: usize,
	pub elapsed_secs: f64,
}

pub struct PackingEngine {
	pub(crate) settings: PackSettings,
	pub(crate) statistics: StatisticsModel,
	pub(crate) domain: Domain,
	pub(crate) orientation: Box<dyn OrientationOps>,
	pub(crate) seed: u64,
	pub(crate) rng: PackRng,
	pub(crate) grid: PackingGrid,
	pub(crate) grains: Vec<Grain>,
	pub(crate) primary: PrimaryPhases,
	pub(crate) targets: DistributionTargets,
	/// Cumulative axis ODF per phase.
	pub(crate) odf_cdfs: Vec<Vec<f64>>,
	pub(crate) size_error: f64,
	pub(crate) neighborhood_error: f64,
	pub(crate) accepted_moves: usize,
	pub(crate) show_progress: bool,
	cancel: Arc<AtomicBool>,
	error_condition: i32,
	error_message: String,
}

impl PackingEngine {
	/// Engine for `config`. Nothing is validated until [`PackingEngine::prepare`]
	/// or [`PackingEngine::execute`].
	pub fn new(config: PackingConfig) -> Self {
		let PackingConfig { domain, settings, statistics } = config;
		let seed = settings.seed.unwrap_or_else(wall_clock_seed);
		Self {
			rng: random::seeded(seed),
			seed,
			grid: PackingGrid::new(&domain),
			settings,
			statistics,
			domain,
			orientation: Box::new(OrthoRhombicOps),
			grains: Vec::new(),
			primary: PrimaryPhases::default(),
			targets: DistributionTargets::default(),
			odf_cdfs: Vec::new(),
			size_error: 0.0,
			neighborhood_error: 0.0,
			accepted_moves: 0,
			show_progress: false,
			cancel: Arc::new(AtomicBool::new(false)),
			error_condition: 0,
			error_message: String::new(),
		}
	}

	/// Replace the orientation capability used to turn ODF bins into angles.
	pub fn with_orientation_ops(mut self, ops: Box<dyn OrientationOps>) -> Self {
		self.orientation = ops;
		self
	}

	/// Show a progress bar over refinement.
	pub fn with_progress(mut self, show: bool) -> Self {
		self.show_progress = show;
		self
	}

	/// Flag the host sets to stop the run at the next checkpoint.
	pub fn cancel_handle(&self) -> Arc<AtomicBool> {
		Arc::clone(&self.cancel)
	}

	pub fn seed(&self) -> u64 {
		self.seed
	}

	pub fn domain(&self) -> &Domain {
		&self.domain
	}

	pub fn grid(&self) -> &PackingGrid {
		&self.grid
	}

	pub fn grains(&self) -> &[Grain] {
		&self.grains
	}

	pub fn targets(&self) -> &DistributionTargets {
		&self.targets
	}

	pub fn filling_error(&self) -> f64 {
		self.grid.filling_error()
	}

	pub fn size_error(&self) -> f64 {
		self.size_error
	}

	pub fn neighborhood_error(&self) -> f64 {
		self.neighborhood_error
	}

	pub fn accepted_moves(&self) -> usize {
		self.accepted_moves
	}

	/// 0 after success, negative after failure.
	pub fn error_condition(&self) -> i32 {
		self.error_condition
	}

	pub fn error_message(&self) -> &str {
		&self.error_message
	}

	/// Build the packing grid at twice the domain resolution.
	pub fn initialize_packing_grid(&mut self) {
		self.grid = PackingGrid::new(&self.domain);
		info!(
			cells = self.grid.total_cells,
			dims = ?[self.grid.len_i, self.grid.len_j, self.grid.len_k],
			resolution = ?self.grid.resolution,
			"packing grid initialized"
		);
	}

	/// Validate the configuration, build the packing grid and the target
	/// histograms, and clear any previous population.
	pub fn prepare(&mut self) -> PackResult<()> {
		self.domain.validate()?;
		self.statistics.validate()?;
		self.initialize_packing_grid();
		self.primary = PrimaryPhases::from_model(&self.statistics)?;
		self.targets = DistributionTargets::build(&self.statistics, &self.primary);
		self.odf_cdfs = self.statistics.phases.iter().map(|p| p.axis_odf_cdf()).collect();
		self.grains.clear();
		self.size_error = 0.0;
		self.neighborhood_error = 0.0;
		self.accepted_moves = 0;
		info!(seed = self.seed, primary_phases = self.primary.len(), "packing prepared");
		Ok(())
	}

	/// Run every stage. The status channel mirrors the outcome, and whatever
	/// population exists when a stage fails stays available.
	pub fn execute(&mut self) -> PackResult<PackingSummary> {
		self.error_condition = 0;
		self.error_message.clear();
		let start = Instant::now();

		match self.run_stages() {
			Ok(()) => {
				self.error_message = "Packing completed".to_string();
				let summary = self.summary(start.elapsed().as_secs_f64());
				info!(
					grains = summary.grain_count,
					filling_error = summary.filling_error,
					size_overlap = summary.size_overlap,
					neighborhood_overlap = summary.neighborhood_overlap,
					accepted_moves = summary.accepted_moves,
					"packing completed"
				);
				Ok(summary)
			}
			Err(e) => {
				self.error_condition = e.code();
				self.error_message = e.to_string();
				error!(code = self.error_condition, grains = self.grains.len(), "{}", self.error_message);
				Err(e)
			}
		}
	}

	fn run_stages(&mut self) -> PackResult<()> {
		self.prepare()?;
		self.build_initial_population()?;
		self.match_size_distribution()?;
		self.place_grains()?;
		self.update_neighbor_buckets();
		self.neighborhood_error = self.check_neighborhood_error(None, None);
		info!(neighborhood_overlap = self.neighborhood_error, "initial neighborhood");
		self.refine_packing()?;
		self.update_neighbor_buckets();
		self.neighborhood_error = self.check_neighborhood_error(None, None);
		Ok(())
	}

	/// Snapshot of the current state.
	pub fn summary(&self, elapsed_secs: f64) -> PackingSummary {
		PackingSummary {
			seed: self.seed,
			grain_count: self.grains.len(),
			covered_cells: self.grid.count_covered(),
			total_cells: self.grid.total_cells,
			filling_error: self.grid.filling_error(),
			size_overlap: self.size_error,
			neighborhood_overlap: self.neighborhood_error,
			accepted_moves: self.accepted_moves,
			elapsed_secs,
		}
	}

	/// Err once the host has asked to stop.
	pub(crate) fn check_cancel(&self, stage: &'static str) -> PackResult<()> {
		if self.cancel.load(Ordering::Relaxed) {
			return Err(PackError::Cancelled(stage));
		}
		Ok(())
	}

	/// True every `cancel_check_interval` iterations.
	pub(crate) fn at_checkpoint(&self, iteration: usize) -> bool {
		iteration % self.settings.cancel_check_interval.max(1) == 0
	}
}

fn wall_clock_seed() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or(0)
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use crate::packing::stats::tests::sample_phase;

	pub(crate) fn small_config(dims: usize, seed: u64) -> PackingConfig {
		PackingConfig {
			domain: Domain::new([dims; 3], [1.0; 3], true),
			settings: PackSettings { seed: Some(seed), refinement_factor: 10, ..Default::default() },
			statistics: StatisticsModel { phases: vec![sample_phase()] },
		}
	}

	#[test]
	fn test_prepare_builds_grid_and_targets() {
		let mut engine = PackingEngine::new(small_config(10, 3));
		engine.prepare().unwrap();
		assert_eq!(engine.grid().total_cells, 125);
		assert_eq!(engine.targets().size.len(), 1);
		assert_eq!(engine.odf_cdfs.len(), 1);
	}

	#[test]
	fn test_invalid_domain_sets_status() {
		let mut config = small_config(10, 3);
		config.domain.dims = [10, 0, 10];
		let mut engine = PackingEngine::new(config);
		let err = engine.execute().unwrap_err();
		assert!(matches!(err, PackError::InvalidDomain(_)));
		assert_eq!(engine.error_condition(), err.code());
		assert!(engine.error_message().contains("Invalid domain"));
	}

	#[test]
	fn test_cancel_before_run() {
		let mut engine = PackingEngine::new(small_config(10, 3));
		engine.cancel_handle().store(true, Ordering::Relaxed);
		let err = engine.execute().unwrap_err();
		assert!(matches!(err, PackError::Cancelled(_)));
		assert!(engine.error_condition() < 0);
	}

	#[test]
	fn test_cancel_during_refinement_keeps_population() {
		let mut config = small_config(12, 5);
		config.settings.cancel_check_interval = 8;
		let mut engine = PackingEngine::new(config);
		engine.prepare().unwrap();
		engine.build_initial_population().unwrap();
		engine.match_size_distribution().unwrap();
		engine.place_grains().unwrap();
		let grains = engine.grains().len();
		let claimed = engine.grid.owners.clone();

		engine.cancel_handle().store(true, Ordering::Relaxed);
		let err = engine.refine_packing().unwrap_err();
		assert!(matches!(err, PackError::Cancelled("refinement")));
		assert_eq!(engine.grains().len(), grains);
		assert_eq!(engine.grid.owners, claimed);
		assert_eq!(engine.grid.filling_total, engine.grid.recompute_filling_total());
	}

	#[test]
	fn test_cancel_during_placement_keeps_population() {
		let mut config = small_config(12, 5);
		config.settings.cancel_check_interval = 4;
		let mut engine = PackingEngine::new(config);
		engine.prepare().unwrap();
		engine.build_initial_population().unwrap();
		let grains = engine.grains().len();

		engine.cancel_handle().store(true, Ordering::Relaxed);
		assert!(matches!(engine.place_grains(), Err(PackError::Cancelled("placement"))));
		assert_eq!(engine.grains().len(), grains);
		assert_eq!(engine.grid.filling_total, engine.grid.recompute_filling_total());
	}

	struct FixedOps;

	impl OrientationOps for FixedOps {
		fn determine_euler_angles(&self, _bin: usize) -> [f64; 3] {
			[0.1, 0.2, 0.3]
		}
	}

	#[test]
	fn test_custom_orientation_ops() {
		let mut engine = PackingEngine::new(small_config(10, 3)).with_orientation_ops(Box::new(FixedOps));
		engine.prepare().unwrap();
		let grain = engine.generate_grain(0).unwrap();
		assert_eq!(grain.axis_euler_angles, [0.1, 0.2, 0.3]);
	}

	#[test]
	fn test_execute_reports_success() {
		let mut engine = PackingEngine::new(small_config(10, 11));
		let summary = engine.execute().unwrap();
		assert_eq!(engine.error_condition(), 0);
		assert_eq!(engine.error_message(), "Packing completed");
		assert_eq!(summary.seed, 11);
		assert!(summary.grain_count > 0);
		assert_eq!(summary.grain_count, engine.grains().len());
		assert_eq!(engine.grid().filling_total, engine.grid().recompute_filling_total());
	}
}
