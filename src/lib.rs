pub mod packing {
	pub mod error;
	pub mod config;
	pub mod info;
	pub mod math;
	pub mod random;
	pub mod shape;
	pub mod orientation;
	pub mod stats;
	pub mod grid;
	pub mod utils;
	pub mod grain;
	pub mod compare;
	pub mod targets;
	pub mod engine;
	pub mod generate;
	pub mod population;
	pub mod footprint;
	pub mod neighbors;
	pub mod optimize;
	pub mod output;
}
