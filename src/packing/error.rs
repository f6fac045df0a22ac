//! Error types for grain packing.

use thiserror::Error;

/// Errors that can stop a packing run.
#[derive(Debug, Error)]
pub enum PackError {
	/// Domain has a zero/negative extent or is too small for the packing grid.
	#[error("Invalid domain: {0}")]
	InvalidDomain(String),

	/// The statistics model has no primary phase to pack.
	#[error("No primary phases in the statistics model")]
	NoPrimaryPhases,

	/// A phase carries statistics the engine cannot sample from.
	#[error("Invalid statistics for phase {phase}: {reason}")]
	InvalidStatistics { phase: usize, reason: String },

	/// A distribution could not be constructed from its parameters.
	#[error("Invalid {name} distribution parameters ({a}, {b})")]
	InvalidDistribution { name: &'static str, a: f64, b: f64 },

	/// The host requested cancellation.
	#[error("Packing cancelled during {0}")]
	Cancelled(&'static str),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

/// Result type for packing operations.
pub type PackResult<T> = std::result::Result<T, PackError>;

impl PackError {
	/// Negative status code reported on the engine's error channel.
	pub fn code(&self) -> i32 {
		match self {
			PackError::InvalidDomain(_) => -10,
			PackError::NoPrimaryPhases => -11,
			PackError::InvalidStatistics { .. } => -12,
			PackError::InvalidDistribution { .. } => -13,
			PackError::Cancelled(_) => -20,
			PackError::Io(_) => -30,
			PackError::Json(_) => -31,
		}
	}

	/// Configuration errors are detected before optimization starts.
	pub fn is_configuration(&self) -> bool {
		matches!(
			self,
			PackError::InvalidDomain(_)
				| PackError::NoPrimaryPhases
				| PackError::InvalidStatistics { .. }
				| PackError::InvalidDistribution { .. }
		)
	}
}
