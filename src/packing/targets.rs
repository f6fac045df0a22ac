//! Target histograms the simulated population is compared against.

use crate::packing::compare::normalize;
use crate::packing::error::{PackError, PackResult};
use crate::packing::grain::Grain;
use crate::packing::math::erf;
use crate::packing::stats::{PhaseStats, StatisticsModel};

/// Bins in every size histogram.
pub const SIZE_BINS: usize = 40;

/// Shells in every neighbor-count histogram row.
pub const NEIGHBOR_SHELLS: usize = 3;

/// Primary phases and their cumulative renormalized fractions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimaryPhases {
	pub phases: Vec<usize>,
	pub cumulative: Vec<f64>,
}

impl PrimaryPhases {
	pub fn from_model(model: &StatisticsModel) -> PackResult<Self> {
		let phases = model.primary_phases();
		let total: f64 = phases.iter().map(|&p| model.phases[p].phase_fraction).sum();
		if phases.is_empty() || total <= 0.0 {
			return Err(PackError::NoPrimaryPhases);
		}
		let mut cumulative = Vec::with_capacity(phases.len());
		let mut running = 0.0;
		for &p in &phases {
			running += model.phases[p].phase_fraction / total;
			cumulative.push(running);
		}
		Ok(Self { phases, cumulative })
	}

	pub fn len(&self) -> usize {
		self.phases.len()
	}

	pub fn is_empty(&self) -> bool {
		self.phases.is_empty()
	}

	/// Phase selected by a uniform draw on [0, 1).
	pub fn pick(&self, u: f64) -> usize {
		let slot = self.cumulative.partition_point(|&c| c <= u);
		self.phases[slot.min(self.phases.len() - 1)]
	}

	/// Position of `phase` among the primary phases.
	pub fn slot_of(&self, phase: usize) -> Option<usize> {
		self.phases.iter().position(|&p| p == phase)
	}
}

/// Discretized log-normal size target for one primary phase.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeTarget {
	/// Histogram bin width.
	pub step: f64,
	/// Left edge of bin 0 (half the minimum diameter).
	pub origin: f64,
	pub histogram: Vec<f64>,
}

impl SizeTarget {
	/// Bins span [min/2, 2 max]; each bin holds the log-normal mass up to its
	/// right edge not already assigned to earlier bins.
	pub fn from_phase(stats: &PhaseStats) -> Self {
		let origin = stats.min_diameter / 2.0;
		let step = (2.0 * stats.max_diameter - origin) / SIZE_BINS as f64;
		let spread = (2.0 * stats.sd_log_diameter * stats.sd_log_diameter).sqrt();
		let mut histogram = Vec::with_capacity(SIZE_BINS);
		let mut previous_total = 0.0;
		for j in 0..SIZE_BINS {
			let edge = (j + 1) as f64 * step + origin;
			let cdf = 0.5 + 0.5 * erf((edge.ln() - stats.avg_log_diameter) / spread);
			let mass = cdf - previous_total;
			histogram.push(mass);
			previous_total += mass;
		}
		Self { step, origin, histogram }
	}

	/// Histogram bin of a diameter, clamped to the table.
	pub fn bin_of(&self, diameter: f64) -> usize {
		let bin = ((diameter - self.origin) / self.step).floor();
		if bin.is_nan() || bin < 0.0 {
			return 0;
		}
		(bin as usize).min(SIZE_BINS - 1)
	}
}

/// Immutable per-phase targets for a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistributionTargets {
	/// Indexed by primary slot.
	pub size: Vec<SizeTarget>,
	/// Indexed by primary slot, then diameter bin; each row sums to 1.
	pub neighbors: Vec<Vec<[f64; NEIGHBOR_SHELLS]>>,
}

impl DistributionTargets {
	pub fn build(model: &StatisticsModel, primary: &PrimaryPhases) -> Self {
		let mut size = Vec::with_capacity(primary.len());
		let mut neighbors = Vec::with_capacity(primary.len());
		for &phase in &primary.phases {
			let stats = &model.phases[phase];
			size.push(SizeTarget::from_phase(stats));
			neighbors.push(neighbor_rows(stats));
		}
		Self { size, neighbors }
	}

	/// Target size histograms as nested rows for comparison.
	pub fn size_rows(&self) -> Vec<Vec<f64>> {
		self.size.iter().map(|t| t.histogram.clone()).collect()
	}

	/// Target neighbor histograms as nested rows for comparison.
	pub fn neighbor_rows(&self) -> Vec<Vec<Vec<f64>>> {
		self.neighbors
			.iter()
			.map(|bins| bins.iter().map(|row| row.to_vec()).collect())
			.collect()
	}

	/// Normalized simulated size histograms over the grains that survive
	/// `remove`, plus `add`.
	pub fn simulate_sizes(
		&self,
		primary: &PrimaryPhases,
		grains: &[Grain],
		add: Option<&Grain>,
		remove: Option<usize>,
	) -> Vec<Vec<f64>> {
		let mut rows = vec![vec![0.0; SIZE_BINS]; primary.len()];
		let kept = grains.iter().enumerate().filter(|(i, _)| Some(*i) != remove).map(|(_, g)| g);
		for grain in kept.chain(add) {
			if let Some(slot) = primary.slot_of(grain.phase) {
				rows[slot][self.size[slot].bin_of(grain.equivalent_diameter)] += 1.0;
			}
		}
		for row in rows.iter_mut() {
			normalize(row);
		}
		rows
	}
}

/// Expected neighbor counts at shell midpoints 0.5, 1.5 and 2.5 for every
/// diameter bin, normalized per bin.
fn neighbor_rows(stats: &PhaseStats) -> Vec<[f64; NEIGHBOR_SHELLS]> {
	stats
		.neighbor_params
		.iter()
		.map(|&[a, b, k]| {
			let mut row = [0.0; NEIGHBOR_SHELLS];
			for (shell, value) in row.iter_mut().enumerate() {
				*value = (a * (shell as f64 + 0.5).powf(k) + b).max(0.0);
			}
			normalize(&mut row);
			row
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::packing::stats::tests::sample_phase;
	use crate::packing::stats::PhaseType;
	use approx::assert_relative_eq;

	#[test]
	fn test_size_target_shape() {
		let t = SizeTarget::from_phase(&sample_phase());
		assert_eq!(t.histogram.len(), SIZE_BINS);
		assert_relative_eq!(t.origin, 0.25);
		assert_relative_eq!(t.step, (4.0 - 0.25) / 40.0);
		let total: f64 = t.histogram.iter().sum();
		assert_relative_eq!(total, 1.0, epsilon = 1e-6);
		// exp(0) = 1 sits on the edge between bins 7 and 8
		assert_eq!(t.bin_of(1.0), 8);
		assert!(t.histogram[7] + t.histogram[8] > 0.99);
	}

	#[test]
	fn test_size_bin_clamps() {
		let t = SizeTarget::from_phase(&sample_phase());
		assert_eq!(t.bin_of(0.0), 0);
		assert_eq!(t.bin_of(100.0), SIZE_BINS - 1);
	}

	#[test]
	fn test_neighbor_rows_normalized() {
		let rows = neighbor_rows(&sample_phase());
		assert_eq!(rows.len(), 3);
		for row in rows {
			assert_relative_eq!(row.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
			assert!(row[0] < row[1] && row[1] < row[2]);
		}
	}

	#[test]
	fn test_primary_phase_selection() {
		let mut a = sample_phase();
		a.phase_fraction = 3.0;
		let mut b = sample_phase();
		b.phase_type = PhaseType::Matrix;
		let mut c = sample_phase();
		c.phase_fraction = 1.0;
		let model = StatisticsModel { phases: vec![a, b, c] };
		let primary = PrimaryPhases::from_model(&model).unwrap();
		assert_eq!(primary.phases, vec![0, 2]);
		assert_relative_eq!(primary.cumulative[0], 0.75);
		assert_relative_eq!(primary.cumulative[1], 1.0);
		assert_eq!(primary.pick(0.1), 0);
		assert_eq!(primary.pick(0.8), 2);
		assert_eq!(primary.pick(0.999_999), 2);
		assert_eq!(primary.slot_of(2), Some(1));
		assert_eq!(primary.slot_of(1), None);
	}

	#[test]
	fn test_simulated_sizes_add_and_remove() {
		let model = StatisticsModel { phases: vec![sample_phase()] };
		let primary = PrimaryPhases::from_model(&model).unwrap();
		let targets = DistributionTargets::build(&model, &primary);
		let grain = |d: f64| Grain { equivalent_diameter: d, ..Default::default() };
		let grains = vec![grain(1.0), grain(1.9)];

		let rows = targets.simulate_sizes(&primary, &grains, None, Some(1));
		assert_eq!(rows[0][targets.size[0].bin_of(1.0)], 1.0);

		let extra = grain(1.0);
		let rows = targets.simulate_sizes(&primary, &grains, Some(&extra), None);
		assert_relative_eq!(rows[0][targets.size[0].bin_of(1.0)], 2.0 / 3.0);
	}
}
