use serde::{Deserialize, Serialize};

use crate::variant::{self, CONTROL, TREATMENT};

pub const MIN_PERCENTAGE: i32 = 0;
pub const MAX_PERCENTAGE: i32 = 100;

static ROLLOUT_VARIANTS: [&str; 2] = [TREATMENT, CONTROL];

/// Outcome of checking an experiment's switch and rollout before any assignment lookup.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "gate")]
pub enum Gate {
	Disabled,
	FullyRolledOut,
	NotRolledOut,
	Bucketed { rollout_percentage: i32 },
}
impl Gate {
	/// Variant answered without touching assignments, if any.
	pub fn short_circuit(self) -> Option<&'static str> {
		match self {
			Self::Disabled | Self::NotRolledOut => Some(CONTROL),
			Self::FullyRolledOut => Some(TREATMENT),
			Self::Bucketed { .. } => None,
		}
	}
}

/// Disabled wins over everything, then full rollout, then zero rollout.
pub fn gate(enabled: bool, rollout_percentage: i32) -> Gate {
	if !enabled {
		return Gate::Disabled;
	}
	if rollout_percentage >= MAX_PERCENTAGE {
		return Gate::FullyRolledOut;
	}
	if rollout_percentage <= MIN_PERCENTAGE {
		return Gate::NotRolledOut;
	}

	Gate::Bucketed { rollout_percentage }
}

/// Clamps to `0..=100` and rounds half away from zero. Non-finite input has no percentage.
pub fn normalize_percentage(value: f64) -> Option<i32> {
	if !value.is_finite() {
		return None;
	}

	Some(value.clamp(MIN_PERCENTAGE as f64, MAX_PERCENTAGE as f64).round() as i32)
}

/// Treatment for buckets below the rollout, control for the rest.
pub fn rollout_variant(bucket: u8, rollout_percentage: i32) -> &'static str {
	let treatment_weight = rollout_percentage.clamp(MIN_PERCENTAGE, MAX_PERCENTAGE) as u32;
	let weights = [treatment_weight, MAX_PERCENTAGE as u32 - treatment_weight];

	variant::resolve_variant(bucket, &ROLLOUT_VARIANTS, Some(weights.as_slice()))
}
