//! Per-phase target statistics.
//!
//! Everything here is loaded once, validated, and treated as immutable for
//! the duration of a run.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::packing::error::{PackError, PackResult};
use crate::packing::math::erf;
use crate::packing::orientation::ODF_SIZE;
use crate::packing::shape::ShapeKind;

/// Beta distribution (alpha, beta) for one diameter bin. alpha == 0 marks an
/// empty bin that borrows the parameters of the bin before it.
pub type BetaParams = [f64; 2];

/// Power law (a, b, k) for one diameter bin: a * x^k + b neighbors at x radii.
pub type PowerLawParams = [f64; 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseType {
	#[default]
	Primary,
	Precipitate,
	Matrix,
	Boundary,
	Unknown,
}

/// Target statistics for one phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseStats {
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub phase_type: PhaseType,
	pub phase_fraction: f64,
	#[serde(default)]
	pub shape: ShapeKind,
	/// Mean of ln(diameter).
	pub avg_log_diameter: f64,
	/// Standard deviation of ln(diameter).
	pub sd_log_diameter: f64,
	pub min_diameter: f64,
	pub max_diameter: f64,
	pub bin_step_size: f64,
	pub b_over_a: Vec<BetaParams>,
	pub c_over_a: Vec<BetaParams>,
	pub c_over_b: Vec<BetaParams>,
	pub omega3: Vec<BetaParams>,
	pub neighbor_params: Vec<PowerLawParams>,
	/// Raw 36^3 axis orientation density; uniform when absent.
	#[serde(default)]
	pub axis_odf: Option<Vec<f64>>,
}

impl PhaseStats {
	/// Number of diameter bins carried by the per-bin tables.
	pub fn num_bins(&self) -> usize {
		self.b_over_a.len()
	}

	/// Diameter bin index, clamped to the table range.
	pub fn diameter_bin(&self, diameter: f64) -> usize {
		let bin = ((diameter - self.min_diameter) / self.bin_step_size).floor();
		if bin.is_nan() || bin < 0.0 {
			return 0;
		}
		(bin as usize).min(self.num_bins().saturating_sub(1))
	}

	/// Beta parameters for `bin`, falling back to the nearest earlier
	/// non-empty bin.
	pub fn beta_for(table: &[BetaParams], bin: usize) -> BetaParams {
		let mut b = bin.min(table.len().saturating_sub(1));
		while b > 0 && table[b][0] == 0.0 {
			b -= 1;
		}
		table[b]
	}

	/// Normalized cumulative axis ODF.
	pub fn axis_odf_cdf(&self) -> Vec<f64> {
		let mut cdf = Vec::with_capacity(ODF_SIZE);
		match &self.axis_odf {
			Some(density) => {
				let total: f64 = density.iter().sum();
				let mut running = 0.0;
				for d in density {
					running += d;
					cdf.push(running / total);
				}
			}
			None => {
				for i in 0..ODF_SIZE {
					cdf.push((i + 1) as f64 / ODF_SIZE as f64);
				}
			}
		}
		cdf
	}

	/// Probability that one log-normal draw lands in [min, max).
	pub fn diameter_acceptance(&self) -> f64 {
		let cdf = |d: f64| {
			0.5 * (1.0 + erf((d.ln() - self.avg_log_diameter) / (self.sd_log_diameter * 2.0_f64.sqrt())))
		};
		cdf(self.max_diameter) - cdf(self.min_diameter)
	}

	/// Check that the phase can be sampled.
	pub fn validate(&self, phase: usize) -> PackResult<()> {
		let bad = |reason: String| -> PackResult<()> { Err(PackError::InvalidStatistics { phase, reason }) };

		if !self.phase_fraction.is_finite() || self.phase_fraction < 0.0 {
			return bad(format!("phase fraction {} must be >= 0", self.phase_fraction));
		}
		if !self.avg_log_diameter.is_finite() {
			return bad("average log diameter is not finite".into());
		}
		if !self.sd_log_diameter.is_finite() || self.sd_log_diameter <= 0.0 {
			return bad(format!("log diameter deviation {} must be > 0", self.sd_log_diameter));
		}
		if !(self.min_diameter > 0.0 && self.min_diameter < self.max_diameter && self.max_diameter.is_finite()) {
			return bad(format!(
				"diameter range [{}, {}) is empty or non-positive",
				self.min_diameter, self.max_diameter
			));
		}
		if !self.bin_step_size.is_finite() || self.bin_step_size <= 0.0 {
			return bad(format!("bin step size {} must be > 0", self.bin_step_size));
		}

		let bins = self.num_bins();
		if bins == 0 {
			return bad("no diameter bins".into());
		}
		let tables = [
			("c_over_a", self.c_over_a.len()),
			("c_over_b", self.c_over_b.len()),
			("omega3", self.omega3.len()),
			("neighbor_params", self.neighbor_params.len()),
		];
		for (name, len) in tables {
			if len != bins {
				return bad(format!("{name} has {len} bins, b_over_a has {bins}"));
			}
		}
		for (name, table) in [
			("b_over_a", &self.b_over_a),
			("c_over_a", &self.c_over_a),
			("c_over_b", &self.c_over_b),
			("omega3", &self.omega3),
		] {
			validate_beta_table(phase, name, table)?;
		}
		if self.neighbor_params.iter().flatten().any(|v| !v.is_finite()) {
			return bad("neighbor parameters are not finite".into());
		}

		if let Some(density) = &self.axis_odf {
			if density.len() != ODF_SIZE {
				return bad(format!("axis ODF has {} entries, need {}", density.len(), ODF_SIZE));
			}
			if density.iter().any(|d| !d.is_finite() || *d < 0.0) {
				return bad("axis ODF has negative or non-finite entries".into());
			}
			if density.iter().sum::<f64>() <= 0.0 {
				return bad("axis ODF is empty".into());
			}
		}

		let acceptance = self.diameter_acceptance();
		if acceptance < 1e-6 {
			warn!(phase, acceptance, "diameter draws will rarely land in [min, max); expect clamped fallbacks");
		}
		Ok(())
	}
}

fn validate_beta_table(phase: usize, name: &str, table: &[BetaParams]) -> PackResult<()> {
	if table[0][0] == 0.0 {
		return Err(PackError::InvalidStatistics {
			phase,
			reason: format!("{name} bin 0 is empty and has no bin to fall back to"),
		});
	}
	for (bin, [a, b]) in table.iter().enumerate() {
		if *a == 0.0 {
			continue;
		}
		if !(a.is_finite() && b.is_finite() && *a > 0.0 && *b > 0.0) {
			return Err(PackError::InvalidStatistics {
				phase,
				reason: format!("{name} bin {bin} has invalid Beta parameters ({a}, {b})"),
			});
		}
	}
	Ok(())
}

/// All phases of a run, indexed by position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatisticsModel {
	pub phases: Vec<PhaseStats>,
}

impl StatisticsModel {
	/// Indices of the phases packed directly.
	pub fn primary_phases(&self) -> Vec<usize> {
		self.phases
			.iter()
			.enumerate()
			.filter(|(_, p)| p.phase_type == PhaseType::Primary)
			.map(|(i, _)| i)
			.collect()
	}

	pub fn validate(&self) -> PackResult<()> {
		let primary = self.primary_phases();
		if primary.is_empty() {
			return Err(PackError::NoPrimaryPhases);
		}
		for &phase in &primary {
			self.phases[phase].validate(phase)?;
		}
		let total: f64 = primary.iter().map(|&p| self.phases[p].phase_fraction).sum();
		if total <= 0.0 {
			return Err(PackError::NoPrimaryPhases);
		}
		Ok(())
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use approx::assert_relative_eq;

	/// Single-bin-per-half-unit phase used across the crate's tests.
	pub(crate) fn sample_phase() -> PhaseStats {
		PhaseStats {
			name: "grains".into(),
			phase_type: PhaseType::Primary,
			phase_fraction: 1.0,
			shape: ShapeKind::Ellipsoid,
			avg_log_diameter: 0.0,
			sd_log_diameter: 0.01,
			min_diameter: 0.5,
			max_diameter: 2.0,
			bin_step_size: 0.5,
			b_over_a: vec![[12.0, 3.0]; 3],
			c_over_a: vec![[10.0, 4.0]; 3],
			c_over_b: vec![[12.0, 3.0]; 3],
			omega3: vec![[10.0, 2.0]; 3],
			neighbor_params: vec![[2.0, 1.0, 1.5]; 3],
			axis_odf: None,
		}
	}

	#[test]
	fn test_sample_phase_is_valid() {
		let model = StatisticsModel { phases: vec![sample_phase()] };
		model.validate().unwrap();
		assert_eq!(model.primary_phases(), vec![0]);
	}

	#[test]
	fn test_diameter_bin_is_clamped() {
		let p = sample_phase();
		assert_eq!(p.diameter_bin(0.5), 0);
		assert_eq!(p.diameter_bin(1.2), 1);
		assert_eq!(p.diameter_bin(1.99), 2);
		assert_eq!(p.diameter_bin(5.0), 2);
		assert_eq!(p.diameter_bin(0.1), 0);
	}

	#[test]
	fn test_empty_bin_falls_back() {
		let table = vec![[2.0, 3.0], [0.0, 0.0], [0.0, 0.0], [5.0, 6.0]];
		assert_eq!(PhaseStats::beta_for(&table, 2), [2.0, 3.0]);
		assert_eq!(PhaseStats::beta_for(&table, 3), [5.0, 6.0]);
		assert_eq!(PhaseStats::beta_for(&table, 10), [5.0, 6.0]);
	}

	#[test]
	fn test_uniform_odf_cdf() {
		let cdf = sample_phase().axis_odf_cdf();
		assert_eq!(cdf.len(), ODF_SIZE);
		assert_relative_eq!(cdf[ODF_SIZE - 1], 1.0);
		assert!(cdf.windows(2).all(|w| w[0] <= w[1]));
	}

	#[test]
	fn test_diameter_acceptance() {
		let p = sample_phase();
		assert!(p.diameter_acceptance() > 0.999);
	}

	#[test]
	fn test_invalid_statistics() {
		let mut p = sample_phase();
		p.min_diameter = 3.0;
		assert!(matches!(p.validate(0), Err(PackError::InvalidStatistics { .. })));

		let mut p = sample_phase();
		p.omega3.pop();
		assert!(p.validate(0).is_err());

		let mut p = sample_phase();
		p.b_over_a[0] = [0.0, 0.0];
		assert!(p.validate(0).is_err());

		let mut p = sample_phase();
		p.axis_odf = Some(vec![1.0; 10]);
		assert!(p.validate(0).is_err());
	}

	#[test]
	fn test_no_primary_phases() {
		let mut p = sample_phase();
		p.phase_type = PhaseType::Precipitate;
		let model = StatisticsModel { phases: vec![p] };
		assert!(matches!(model.validate(), Err(PackError::NoPrimaryPhases)));
	}
}
