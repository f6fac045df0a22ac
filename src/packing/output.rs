use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::packing::config::Domain;
use crate::packing::engine::{PackingEngine, PackingSummary};
use crate::packing::error::PackResult;
use crate::packing::grain::Grain;

/// Packed population handed to voxel assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationReport {
	pub summary: PackingSummary,
	/// 0 after a completed run, the negative status code otherwise.
	pub error_condition: i32,
	pub error_message: String,
	pub domain: Domain,
	/// Cell edge lengths the footprints are expressed in.
	pub packing_resolution: [f64; 3],
	pub packing_dims: [usize; 3],
	pub grains: Vec<Grain>,
}

impl PopulationReport {
	pub fn read_json_file<P: AsRef<Path>>(path: P) -> PackResult<Self> {
		let file = File::open(path)?;
		Ok(serde_json::from_reader(BufReader::new(file))?)
	}
}

impl PackingEngine {
	pub fn population_report(&self, summary: &PackingSummary) -> PopulationReport {
		PopulationReport {
			summary: summary.clone(),
			error_condition: self.error_condition(),
			error_message: self.error_message().to_string(),
			domain: self.domain,
			packing_resolution: self.grid.resolution,
			packing_dims: [self.grid.len_i, self.grid.len_j, self.grid.len_k],
			grains: self.grains.clone(),
		}
	}

	/// Save the packed population as JSON and report save time. A failed run
	/// is saved too, carrying its status.
	pub fn write_population_json<P: AsRef<Path>>(&self, path: P, summary: &PackingSummary) -> PackResult<()> {
		let path = path.as_ref();
		let start_time = Instant::now();

		let mut writer = BufWriter::new(File::create(path)?);
		serde_json::to_writer_pretty(&mut writer, &self.population_report(summary))?;
		writer.flush()?;

		let duration = start_time.elapsed();
		eprintln!("Saved {} grains to {} in {:.2?}", self.grains.len(), path.display(), duration);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::packing::engine::tests::small_config;

	#[test]
	fn test_report_round_trip() {
		let mut engine = PackingEngine::new(small_config(8, 2));
		let summary = engine.execute().unwrap();
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("grains.json");
		engine.write_population_json(&path, &summary).unwrap();

		let report = PopulationReport::read_json_file(&path).unwrap();
		assert_eq!(report.summary, summary);
		assert_eq!(report.error_message, "Packing completed");
		assert_eq!(report.packing_dims, [4, 4, 4]);
		assert_eq!(report.grains.len(), engine.grains().len());
		assert_eq!(report.grains[0].footprint, engine.grains()[0].footprint);
	}
}
