//! Run configuration: domain descriptor, tunables and statistics, loadable
//! from a single JSON document.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::packing::error::{PackError, PackResult};
use crate::packing::stats::StatisticsModel;

/// Reconstruction domain: voxel counts, voxel edge lengths and boundary mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Domain {
	pub dims: [usize; 3],
	pub resolution: [f64; 3],
	#[serde(default = "default_periodic")]
	pub periodic: bool,
}

fn default_periodic() -> bool {
	true
}

impl Domain {
	pub fn new(dims: [usize; 3], resolution: [f64; 3], periodic: bool) -> Self {
		Self { dims, resolution, periodic }
	}

	/// Physical edge lengths.
	pub fn size(&self) -> [f64; 3] {
		[
			self.dims[0] as f64 * self.resolution[0],
			self.dims[1] as f64 * self.resolution[1],
			self.dims[2] as f64 * self.resolution[2],
		]
	}

	pub fn total_volume(&self) -> f64 {
		let s = self.size();
		s[0] * s[1] * s[2]
	}

	/// Reject empty or non-positive domains, and domains too small to hold a
	/// single packing cell.
	pub fn validate(&self) -> PackResult<()> {
		for axis in 0..3 {
			if self.dims[axis] == 0 {
				return Err(PackError::InvalidDomain(format!("axis {axis} has zero voxels")));
			}
			let res = self.resolution[axis];
			if !res.is_finite() || res <= 0.0 {
				return Err(PackError::InvalidDomain(format!("axis {axis} resolution {res} must be > 0")));
			}
			if self.dims[axis] < 2 {
				return Err(PackError::InvalidDomain(format!(
					"axis {axis} needs at least 2 voxels for one packing cell"
				)));
			}
		}
		Ok(())
	}
}

/// Tunables for one packing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackSettings {
	/// PRNG seed; wall-clock millis when absent.
	pub seed: Option<u64>,
	/// Random trial moves per grain during initial placement.
	pub placement_trials: usize,
	/// Refinement iterations per grain.
	pub refinement_factor: usize,
	/// Size overlap at which size matching stops.
	pub size_match_threshold: f64,
	pub max_size_match_iterations: usize,
	/// Cap on every rejection-sampling loop.
	pub max_sample_retries: usize,
	/// Iterations between cancellation checks and progress updates.
	pub cancel_check_interval: usize,
	/// Alternate jumps with short nudges during refinement.
	pub nudge_moves: bool,
	/// Volume overshoot when the domain is not periodic.
	pub nonperiodic_volume_factor: f64,
	/// Refinement iterations between trace records.
	pub progress_log_interval: usize,
}

impl Default for PackSettings {
	fn default() -> Self {
		Self {
			seed: None,
			placement_trials: 10,
			refinement_factor: 100,
			size_match_threshold: 0.999,
			max_size_match_iterations: 20_000,
			max_sample_retries: 10_000,
			cancel_check_interval: 1024,
			nudge_moves: true,
			nonperiodic_volume_factor: 1.1,
			progress_log_interval: 25,
		}
	}
}

impl PackSettings {
	/// Volume the initial population must reach, as a multiple of the domain.
	pub fn volume_factor(&self, periodic: bool) -> f64 {
		if periodic { 1.0 } else { self.nonperiodic_volume_factor }
	}
}

/// Everything a run needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackingConfig {
	pub domain: Domain,
	#[serde(default)]
	pub settings: PackSettings,
	pub statistics: StatisticsModel,
}

impl PackingConfig {
	pub fn from_json_file<P: AsRef<Path>>(path: P) -> PackResult<Self> {
		let text = fs::read_to_string(path)?;
		Self::from_json_str(&text)
	}

	pub fn from_json_str(text: &str) -> PackResult<Self> {
		Ok(serde_json::from_str(text)?)
	}
}
