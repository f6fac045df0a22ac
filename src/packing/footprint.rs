use std::thread;

use nalgebra::Vector3;
use tracing::debug;

use crate::packing::engine::PackingEngine;
use crate::packing::grain::Grain;
use crate::packing::grid::{Cell, PackingGrid};
use crate::packing::math::{orientation_matrix, to_grain_frame};
use crate::packing::shape::{ShapeKind, ShapeOps};

/// Cells of `grid` whose lattice points fall inside `grain` at its centroid.
/// Lattice points are measured from the true centroid, so a grain smaller
/// than a cell may cover none.
pub fn compute_footprint(grid: &PackingGrid, grain: &Grain, kind: ShapeKind) -> Vec<Cell> {
	let shape = grain.shape(kind);
	let [a, b, c] = grain.semi_axes(&shape);
	if !(a.is_finite() && b.is_finite() && c.is_finite()) || a <= 0.0 || b <= 0.0 || c <= 0.0 {
		debug!(phase = grain.phase, a, b, c, "degenerate semi-axes, empty footprint");
		return Vec::new();
	}

	let g = orientation_matrix(grain.axis_euler_angles);
	let center = grid.cell_of(grain.centroid);
	let anchor = grid.cell_position(center);
	let offset = [
		grain.centroid[0] - anchor[0],
		grain.centroid[1] - anchor[1],
		grain.centroid[2] - anchor[2],
	];
	let extent = shape.reach() * a.max(b).max(c);
	let res = grid.resolution;
	let span_i = (extent / res[0]).ceil() as i32 + 1;
	let span_j = (extent / res[1]).ceil() as i32 + 1;
	let span_k = (extent / res[2]).ceil() as i32 + 1;

	let mut cells = Vec::new();
	for dk in -span_k..=span_k {
		let z = dk as f64 * res[2];
		for dj in -span_j..=span_j {
			let y = dj as f64 * res[1];
			for di in -span_i..=span_i {
				let x = di as f64 * res[0];
				let p = to_grain_frame(&g, Vector3::new(x - offset[0], y - offset[1], z - offset[2]));
				if shape.inside(p.x / a, p.y / b, p.z / c) >= 0.0 {
					cells.push(center.shifted(Cell::new(di, dj, dk)));
				}
			}
		}
	}
	if cells.is_empty() {
		debug!(phase = grain.phase, diameter = grain.equivalent_diameter, "grain covers no packing cells");
	}
	cells
}

impl PackingEngine {
	/// Rebuild the footprint of grain `idx` at its current centroid.
	/// The grid is not touched.
	pub fn insert_grain(&mut self, idx: usize) {
		let kind = self.statistics.phases[self.grains[idx].phase].shape;
		let cells = compute_footprint(&self.grid, &self.grains[idx], kind);
		self.grains[idx].footprint = cells;
	}

	/// Rebuild every footprint, split across threads. Grains are independent
	/// until they are claimed on the grid.
	pub fn compute_footprints_parallel(&mut self) {
		if self.grains.is_empty() {
			return;
		}
		let grid = &self.grid;
		let phases = &self.statistics.phases;

		let threads = thread::available_parallelism()
			.map(|n| n.get())
			.unwrap_or(1);
		let chunk_size = self.grains.len().div_ceil(threads);

		thread::scope(|scope| {
			for grain_chunk in self.grains.chunks_mut(chunk_size) {
				scope.spawn(move || {
					for grain in grain_chunk {
						let kind = phases[grain.phase].shape;
						grain.footprint = compute_footprint(grid, grain, kind);
					}
				});
			}
		});
	}

	/// Move grain `idx` to `centroid`, rigidly shifting its footprint by the
	/// whole-cell offset between the old and new nearest lattice points. The
	/// sub-cell offset of the footprint is kept, so the result matches a fresh
	/// [`PackingEngine::insert_grain`] only for whole-cell displacements. The
	/// caller releases the grain from the grid first.
	pub fn move_grain(&mut self, idx: usize, centroid: [f64; 3]) {
		let grain = &mut self.grains[idx];
		let shift = self.grid.cell_of(centroid).delta(self.grid.cell_of(grain.centroid));
		for cell in grain.footprint.iter_mut() {
			*cell = cell.shifted(shift);
		}
		grain.centroid = centroid;
	}

	/// Claim the footprint of `add`, then release the footprint of `remove`,
	/// and return the normalized filling error.
	pub fn check_filling_error(&mut self, add: Option<usize>, remove: Option<usize>) -> f64 {
		if let Some(i) = add {
			let (_, quality) = self.grid.claim_cells(&self.grains[i].footprint);
			self.grains[i].pack_quality = quality;
		}
		if let Some(i) = remove {
			self.grid.release_cells(&self.grains[i].footprint);
		}
		self.grid.filling_error()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::packing::config::Domain;
	use crate::packing::engine::tests::small_config;

	fn sphere(diameter: f64, centroid: [f64; 3]) -> Grain {
		Grain {
			volume: Grain::volume_from_diameter(diameter),
			equivalent_diameter: diameter,
			radius1: 1.0,
			radius2: 1.0,
			radius3: 1.0,
			omega3: 1.0,
			centroid,
			..Default::default()
		}
	}

	fn grid(periodic: bool) -> PackingGrid {
		PackingGrid::new(&Domain::new([20; 3], [1.0; 3], periodic))
	}

	#[test]
	fn test_sphere_footprint() {
		let g = grid(true);
		// radius 2.5 over cells of edge 2: the 7 cells within one step
		let cells = compute_footprint(&g, &sphere(5.0, [10.0, 10.0, 10.0]), ShapeKind::Ellipsoid);
		assert_eq!(cells.len(), 7);
		assert!(cells.contains(&Cell::new(5, 5, 5)));
		assert!(cells.contains(&Cell::new(6, 5, 5)));
		assert!(!cells.contains(&Cell::new(6, 6, 5)));
	}

	#[test]
	fn test_tiny_grain_covers_at_most_one_point() {
		let g = grid(true);
		// radius 0.25, the nearest lattice point sits at (4, 4, 6)
		assert!(compute_footprint(&g, &sphere(0.5, [3.1, 4.2, 5.0]), ShapeKind::Ellipsoid).is_empty());
		let cells = compute_footprint(&g, &sphere(0.5, [4.1, 3.9, 6.05]), ShapeKind::Ellipsoid);
		assert_eq!(cells, vec![Cell::new(2, 2, 3)]);
	}

	#[test]
	fn test_footprint_follows_true_centroid() {
		let g = grid(true);
		// radius 1.1 reaches the lattice points 1 away on either side in x
		let cells = compute_footprint(&g, &sphere(2.2, [11.0, 10.0, 10.0]), ShapeKind::Ellipsoid);
		assert_eq!(cells.len(), 2);
		assert!(cells.contains(&Cell::new(5, 5, 5)));
		assert!(cells.contains(&Cell::new(6, 5, 5)));
	}

	#[test]
	fn test_degenerate_grain_is_empty() {
		let g = grid(true);
		let mut flat = sphere(2.0, [5.0; 3]);
		flat.radius3 = 0.0;
		assert!(compute_footprint(&g, &flat, ShapeKind::Ellipsoid).is_empty());
	}

	#[test]
	fn test_move_then_insert_matches_fresh_insert() {
		let mut engine = PackingEngine::new(small_config(20, 1));
		engine.prepare().unwrap();
		let mut grain = sphere(4.3, [10.0, 10.0, 10.0]);
		grain.radius2 = 0.8;
		grain.radius3 = 0.6;
		grain.axis_euler_angles = [0.4, 1.0, 0.2];
		engine.grains.push(grain);
		engine.insert_grain(0);

		// whole-cell displacements of a centroid sitting off the lattice
		engine.grains[0].centroid = [10.25, 10.5, 9.75];
		engine.insert_grain(0);
		for shift in [[2.0, -4.0, 6.0], [-8.0, 0.0, 2.0], [14.0, 18.0, -12.0]] {
			let c = engine.grains[0].centroid;
			engine.move_grain(0, [c[0] + shift[0], c[1] + shift[1], c[2] + shift[2]]);
			let moved = engine.grains[0].footprint.clone();
			engine.insert_grain(0);
			assert_eq!(moved, engine.grains[0].footprint);
		}
	}

	#[test]
	fn test_parallel_matches_sequential() {
		let mut engine = PackingEngine::new(small_config(20, 2));
		engine.prepare().unwrap();
		engine.build_initial_population().unwrap();
		for (i, grain) in engine.grains.iter_mut().enumerate() {
			grain.centroid = [(i % 20) as f64, (i % 7) as f64 * 2.5, 10.0];
		}
		engine.compute_footprints_parallel();
		let parallel: Vec<Vec<Cell>> = engine.grains.iter().map(|g| g.footprint.clone()).collect();
		for i in 0..engine.grains.len() {
			engine.insert_grain(i);
			assert_eq!(engine.grains[i].footprint, parallel[i]);
		}
	}

	#[test]
	fn test_filling_error_tracks_recompute() {
		let mut engine = PackingEngine::new(small_config(20, 3));
		engine.prepare().unwrap();
		engine.grains.push(sphere(5.0, [10.0; 3]));
		engine.grains.push(sphere(5.0, [12.0, 10.0, 10.0]));
		engine.insert_grain(0);
		engine.insert_grain(1);
		let empty = engine.filling_error();

		engine.check_filling_error(Some(0), None);
		let after = engine.check_filling_error(Some(1), None);
		let total = engine.grid.recompute_filling_total();
		assert_eq!(engine.grid.filling_total, total);
		assert_eq!(after, total as f64 / engine.grid.total_cells as f64);
		assert!(engine.grains[1].pack_quality > 0.0);

		engine.check_filling_error(None, Some(1));
		let back = engine.check_filling_error(None, Some(0));
		assert_eq!(back, empty);
		assert!(engine.grid.owners.iter().all(|&o| o == 0));
	}
}
