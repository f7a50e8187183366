use crate::{Error, Result};

/// Weights at or below zero would read as "no match", so every weight is clamped to this floor.
pub const MIN_WEIGHT: f64 = 0.001;

/// Maps (rank of first match, query priority) to a per-query weight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NormalizationPolicy {
	One,
	InverseRank,
	WeightedInverseRank,
	InversePriority,
}
impl NormalizationPolicy {
	pub fn parse(raw: &str) -> Result<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"one" => Ok(Self::One),
			"inverse_rank" => Ok(Self::InverseRank),
			"weighted_inverse_rank" => Ok(Self::WeightedInverseRank),
			"inverse_priority" => Ok(Self::InversePriority),
			other => Err(Error::InvalidRequest {
				message: format!("Unknown normalization policy {other:?}."),
			}),
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::One => "one",
			Self::InverseRank => "inverse_rank",
			Self::WeightedInverseRank => "weighted_inverse_rank",
			Self::InversePriority => "inverse_priority",
		}
	}

	/// `rank` is 1-indexed. A rank of zero is treated as rank one.
	pub fn weight(self, rank: u32, priority: i64) -> f64 {
		let rank = f64::from(rank.max(1));
		let raw = match self {
			Self::One => 1.0,
			Self::InverseRank => 1.0 / rank,
			Self::WeightedInverseRank => 1.0 / rank.sqrt(),
			Self::InversePriority =>
				if priority > 0 {
					1.0 / priority as f64
				} else {
					1.0
				},
		};

		raw.max(MIN_WEIGHT)
	}
}
