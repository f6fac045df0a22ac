use bitvec::vec::BitVec;
use serde::{Deserialize, Serialize};

use crate::packing::config::Domain;

/// Packing-grid cell coordinates. May lie outside the grid until resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Cell {
	pub col: i32,
	pub row: i32,
	pub plane: i32,
}

impl Cell {
	pub fn new(col: i32, row: i32, plane: i32) -> Self {
		Self { col, row, plane }
	}

	/// Componentwise `self + shift`
	#[inline]
	pub fn shifted(self, shift: Cell) -> Cell {
		Cell::new(self.col + shift.col, self.row + shift.row, self.plane + shift.plane)
	}

	/// Componentwise `self - other`
	#[inline]
	pub fn delta(self, other: Cell) -> Cell {
		Cell::new(self.col - other.col, self.row - other.row, self.plane - other.plane)
	}
}

/// Owner-count lattice at twice the reconstruction resolution
#[derive(Clone, Debug)]
pub struct PackingGrid {
	pub len_i: usize,  // Number of cells along I (col)
	pub len_j: usize,  // Number of cells along J (row)
	pub len_k: usize,  // Number of cells along K (plane)
	pub total_cells: usize, // Total number of cells IxJxK
	pub resolution: [f64; 3],  // Cell edge lengths in physical units
	pub periodic: bool,  // Wrap out-of-range cells instead of dropping them
	pub owners: Vec<i32>,  // Owner count per cell
	pub filling_total: i64,  // Running sum of (owner - 1)^2
}

impl PackingGrid {
	/// Build the packing grid for `domain`: cells are twice the voxel edge,
	/// counts start at zero.
	pub fn new(domain: &Domain) -> Self {
		let len_i = domain.dims[0] / 2;
		let len_j = domain.dims[1] / 2;
		let len_k = domain.dims[2] / 2;
		let total_cells = len_i * len_j * len_k;
		let resolution = [
			2.0 * domain.resolution[0],
			2.0 * domain.resolution[1],
			2.0 * domain.resolution[2],
		];

		Self {
			len_i,
			len_j,
			len_k,
			total_cells,
			resolution,
			periodic: domain.periodic,
			owners: vec![0; total_cells],
			// every empty cell contributes (0 - 1)^2
			filling_total: total_cells as i64,
		}
	}

	/// Linear index of `cell`, wrapping when periodic and dropping it otherwise
	#[inline]
	pub fn resolve(&self, cell: Cell) -> Option<usize> {
		let (li, lj, lk) = (self.len_i as i32, self.len_j as i32, self.len_k as i32);
		let (i, j, k) = if self.periodic {
			(cell.col.rem_euclid(li), cell.row.rem_euclid(lj), cell.plane.rem_euclid(lk))
		} else {
			if cell.col < 0 || cell.col >= li || cell.row < 0 || cell.row >= lj || cell.plane < 0 || cell.plane >= lk {
				return None;
			}
			(cell.col, cell.row, cell.plane)
		};
		Some(self.ijk_to_index(i as usize, j as usize, k as usize))
	}

	/// Cell nearest to a physical point
	#[inline]
	pub fn cell_of(&self, point: [f64; 3]) -> Cell {
		Cell::new(
			(point[0] / self.resolution[0] + 0.5).floor() as i32,
			(point[1] / self.resolution[1] + 0.5).floor() as i32,
			(point[2] / self.resolution[2] + 0.5).floor() as i32,
		)
	}

	/// Physical position of a cell's lattice point
	#[inline]
	pub fn cell_position(&self, cell: Cell) -> [f64; 3] {
		[
			cell.col as f64 * self.resolution[0],
			cell.row as f64 * self.resolution[1],
			cell.plane as f64 * self.resolution[2],
		]
	}

	/// Claim every cell of a footprint, keeping the filling total current.
	/// Returns the change in the total and the mean (owner - 1)^2 over the
	/// claimed cells.
	pub fn claim_cells(&mut self, cells: &[Cell]) -> (i64, f64) {
		let mut delta = 0i64;
		let mut quality = 0i64;
		let mut claimed = 0usize;
		for &cell in cells {
			if let Some(index) = self.resolve(cell) {
				let owner = self.owners[index] as i64;
				delta += 2 * owner - 1;
				self.owners[index] += 1;
				quality += owner * owner;
				claimed += 1;
			}
		}
		self.filling_total += delta;
		let pack_quality = if claimed == 0 { 0.0 } else { quality as f64 / claimed as f64 };
		(delta, pack_quality)
	}

	/// Release every cell of a footprint previously claimed. Returns the
	/// change in the filling total.
	pub fn release_cells(&mut self, cells: &[Cell]) -> i64 {
		let mut delta = 0i64;
		for &cell in cells {
			if let Some(index) = self.resolve(cell) {
				let owner = self.owners[index] as i64;
				debug_assert!(owner > 0, "released an unclaimed cell {:?}", cell);
				delta += -2 * owner + 3;
				self.owners[index] -= 1;
			}
		}
		self.filling_total += delta;
		delta
	}

	/// Normalized filling error
	pub fn filling_error(&self) -> f64 {
		if self.total_cells == 0 {
			return 0.0;
		}
		self.filling_total as f64 / self.total_cells as f64
	}

	/// Filling total computed from scratch
	pub fn recompute_filling_total(&self) -> i64 {
		self.owners
			.iter()
			.map(|&o| {
				let d = o as i64 - 1;
				d * d
			})
			.sum()
	}

	/// Bit per cell, set where at least one grain claims it
	pub fn coverage_mask(&self) -> BitVec {
		self.owners.iter().map(|&o| o > 0).collect()
	}

	/// Count the number of covered cells
	pub fn count_covered(&self) -> usize {
		self.coverage_mask().count_ones()
	}
}
