use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::packing::grid::Cell;
use crate::packing::shape::{Shape, ShapeKind, ShapeOps};

/// One grain being packed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Grain {
	pub phase: usize,
	pub volume: f64,
	pub equivalent_diameter: f64,
	/// Always 1; the ratios below are relative to it.
	pub radius1: f64,
	/// b/a
	pub radius2: f64,
	/// c/a
	pub radius3: f64,
	pub axis_euler_angles: [f64; 3],
	pub omega3: f64,
	pub centroid: [f64; 3],
	/// Other grains within 1, 2 and 3 of this grain's equivalent radii.
	pub neighbor_distance_buckets: [i32; 3],
	/// Mean (owner - 1)^2 over the footprint at its latest claim.
	pub pack_quality: f64,
	pub footprint: Vec<Cell>,
}

impl Grain {
	/// Sphere volume for an equivalent diameter.
	pub fn volume_from_diameter(diameter: f64) -> f64 {
		let r = diameter / 2.0;
		4.0 / 3.0 * PI * r * r * r
	}

	pub fn equivalent_radius(&self) -> f64 {
		self.equivalent_diameter / 2.0
	}

	/// Resolve the phase shape class against this grain's omega3.
	pub fn shape(&self, kind: ShapeKind) -> Shape {
		kind.resolve(self.omega3)
	}

	/// Absolute semi-axes (a, b, c) for this grain's volume and aspect ratios.
	pub fn semi_axes(&self, shape: &Shape) -> [f64; 3] {
		let a = shape.radcur1(self.volume, self.radius2, self.radius3);
		[a * self.radius1, a * self.radius2, a * self.radius3]
	}
}
