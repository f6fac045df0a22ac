//! Neighbor-distance bookkeeping.
//!
//! Bucket k of a grain counts the other grains whose centroids lie closer
//! than (k + 1) of its equivalent radii. Periodic domains measure the
//! minimum-image distance.

use tracing::debug;

use crate::packing::compare::{compare_3d_distributions, normalize};
use crate::packing::engine::PackingEngine;
use crate::packing::targets::NEIGHBOR_SHELLS;

type Buckets = [i32; NEIGHBOR_SHELLS];

/// Add `sign` to every bucket of a grain with equivalent radius `radius`
/// that reaches a neighbor at `distance`.
#[inline]
fn tally(buckets: &mut Buckets, distance: f64, radius: f64, sign: i32) {
	if radius <= 0.0 || distance >= NEIGHBOR_SHELLS as f64 * radius {
		return;
	}
	let first = (distance / radius) as usize;
	for bucket in buckets.iter_mut().skip(first) {
		*bucket += sign;
	}
}

impl PackingEngine {
	/// Centroid distance, wrapped to the nearest image when periodic.
	pub fn neighbor_distance(&self, a: [f64; 3], b: [f64; 3]) -> f64 {
		let size = self.domain.size();
		let mut sum = 0.0;
		for axis in 0..3 {
			let mut d = (a[axis] - b[axis]).abs();
			if self.domain.periodic {
				d %= size[axis];
				d = d.min(size[axis] - d);
			}
			sum += d * d;
		}
		sum.sqrt()
	}

	/// Recount every grain's buckets from scratch using a spatial bin grid
	/// with bins at least three of the largest radii wide.
	pub fn update_neighbor_buckets(&mut self) {
		for grain in self.grains.iter_mut() {
			grain.neighbor_distance_buckets = [0; NEIGHBOR_SHELLS];
		}
		let n = self.grains.len();
		if n < 2 {
			return;
		}
		let r_max = self.grains.iter().map(|g| g.equivalent_radius()).fold(0.0, f64::max);
		let cutoff = (NEIGHBOR_SHELLS as f64 * r_max).max(f64::MIN_POSITIVE);
		let size = self.domain.size();
		let mut bins_per_axis = [1usize; 3];
		let mut width = [0.0; 3];
		for axis in 0..3 {
			bins_per_axis[axis] = ((size[axis] / cutoff).floor() as usize).max(1);
			width[axis] = size[axis] / bins_per_axis[axis] as f64;
		}
		let bin_count = bins_per_axis[0] * bins_per_axis[1] * bins_per_axis[2];

		let periodic = self.domain.periodic;
		let bin_of = |p: [f64; 3]| -> [usize; 3] {
			let mut ijk = [0usize; 3];
			for axis in 0..3 {
				let raw = (p[axis] / width[axis]).floor() as i64;
				let count = bins_per_axis[axis] as i64;
				let wrapped = if periodic { raw.rem_euclid(count) } else { raw.clamp(0, count - 1) };
				ijk[axis] = wrapped as usize;
			}
			ijk
		};
		let flat = |ijk: [usize; 3]| ijk[0] + ijk[1] * bins_per_axis[0] + ijk[2] * bins_per_axis[0] * bins_per_axis[1];

		let mut bins: Vec<Vec<usize>> = vec![Vec::new(); bin_count];
		let homes: Vec<[usize; 3]> = self.grains.iter().map(|g| bin_of(g.centroid)).collect();
		for (i, home) in homes.iter().enumerate() {
			bins[flat(*home)].push(i);
		}

		let mut buckets = vec![[0; NEIGHBOR_SHELLS]; n];
		let mut nearby = Vec::with_capacity(27);
		for (i, home) in homes.iter().enumerate() {
			nearby.clear();
			for dk in -1i64..=1 {
				for dj in -1i64..=1 {
					for di in -1i64..=1 {
						if let Some(bin) = neighbor_bin(*home, [di, dj, dk], bins_per_axis, periodic) {
							nearby.push(flat(bin));
						}
					}
				}
			}
			// fewer than three bins on an axis wrap onto the same bin
			nearby.sort_unstable();
			nearby.dedup();

			let ri = self.grains[i].equivalent_radius();
			for &bin in &nearby {
				for &j in &bins[bin] {
					if j <= i {
						continue;
					}
					let d = self.neighbor_distance(self.grains[i].centroid, self.grains[j].centroid);
					tally(&mut buckets[i], d, ri, 1);
					tally(&mut buckets[j], d, self.grains[j].equivalent_radius(), 1);
				}
			}
		}

		for (grain, b) in self.grains.iter_mut().zip(buckets) {
			grain.neighbor_distance_buckets = b;
		}
		debug!(grains = n, bins = bin_count, "neighbor buckets rebuilt");
	}

	/// Add (`sign` = 1) or withdraw (-1) the pair contributions between grain
	/// `idx` and every other grain except `skip`.
	pub fn determine_neighbors(&self, buckets: &mut [Buckets], idx: usize, sign: i32, skip: Option<usize>) {
		let centroid = self.grains[idx].centroid;
		let radius = self.grains[idx].equivalent_radius();
		for (j, other) in self.grains.iter().enumerate() {
			if j == idx || Some(j) == skip {
				continue;
			}
			let d = self.neighbor_distance(centroid, other.centroid);
			tally(&mut buckets[idx], d, radius, sign);
			tally(&mut buckets[j], d, other.equivalent_radius(), sign);
		}
	}

	/// Overlap of the neighbor histograms with the targets, as if grain `add`
	/// (not yet counted in the buckets) were registered and grain `remove`
	/// were gone. The stored buckets are left untouched.
	pub fn check_neighborhood_error(&self, add: Option<usize>, remove: Option<usize>) -> f64 {
		let mut buckets: Vec<Buckets> = self.grains.iter().map(|g| g.neighbor_distance_buckets).collect();
		if let Some(r) = remove {
			self.determine_neighbors(&mut buckets, r, -1, add);
		}
		if let Some(a) = add {
			self.determine_neighbors(&mut buckets, a, 1, remove);
		}

		let mut simulated: Vec<Vec<Vec<f64>>> = self
			.targets
			.neighbors
			.iter()
			.map(|rows| vec![vec![0.0; NEIGHBOR_SHELLS]; rows.len()])
			.collect();
		for (i, grain) in self.grains.iter().enumerate() {
			if Some(i) == remove {
				continue;
			}
			let Some(slot) = self.primary.slot_of(grain.phase) else {
				continue;
			};
			let bin = self.statistics.phases[grain.phase].diameter_bin(grain.equivalent_diameter);
			for (shell, &count) in buckets[i].iter().enumerate() {
				if count > 0 {
					simulated[slot][bin][shell] += count as f64;
				}
			}
		}
		for rows in simulated.iter_mut() {
			for row in rows.iter_mut() {
				normalize(row);
			}
		}
		compare_3d_distributions(&simulated, &self.targets.neighbor_rows())
	}
}

fn neighbor_bin(home: [usize; 3], step: [i64; 3], bins_per_axis: [usize; 3], periodic: bool) -> Option<[usize; 3]> {
	let mut out = [0usize; 3];
	for axis in 0..3 {
		let count = bins_per_axis[axis] as i64;
		let raw = home[axis] as i64 + step[axis];
		out[axis] = if periodic {
			raw.rem_euclid(count) as usize
		} else if raw < 0 || raw >= count {
			return None;
		} else {
			raw as usize
		};
	}
	Some(out)
}
