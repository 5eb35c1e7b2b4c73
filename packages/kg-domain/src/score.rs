use std::{cmp::Ordering, collections::BTreeMap};

use crate::{DatasourceId, ResolvedWeights};

const DEFAULT_RANK_DAMPING_EXPONENT: f64 = 1.0;

/// Combines per-datasource evidence into one association score.
///
/// Each datasource contributes `weight * score`. Contributions are ranked descending (ties go to
/// the lower datasource id) and the contribution at 1-based rank `i` is divided by
/// `i ^ rank_damping_exponent` before summing. The sum is clamped to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreCombiner {
	rank_damping_exponent: f64,
}
impl ScoreCombiner {
	pub fn new(rank_damping_exponent: f64) -> Self {
		Self { rank_damping_exponent }
	}

	/// Returns `None` when the pair must be excluded: a required datasource has no positive score
	/// or nothing contributes.
	pub fn combine(
		&self,
		per_datasource: &BTreeMap<DatasourceId, f64>,
		weights: &ResolvedWeights,
	) -> Option<f64> {
		for setting in weights.required() {
			match per_datasource.get(&setting.id) {
				Some(score) if *score > 0.0 => {},
				_ => return None,
			}
		}

		let mut contributions: Vec<(&DatasourceId, f64)> = per_datasource
			.iter()
			.filter(|(_, score)| !score.is_nan())
			.map(|(id, score)| (id, weights.weight(id) * score.clamp(0.0, 1.0)))
			.filter(|(_, contribution)| *contribution > 0.0)
			.collect();

		if contributions.is_empty() {
			return None;
		}

		contributions.sort_by(|(a_id, a), (b_id, b)| match b.total_cmp(a) {
			Ordering::Equal => a_id.cmp(b_id),
			other => other,
		});

		let aggregated: f64 = contributions
			.iter()
			.enumerate()
			.map(|(idx, (_, contribution))| {
				contribution / ((idx + 1) as f64).powf(self.rank_damping_exponent)
			})
			.sum();

		Some(aggregated.clamp(0.0, 1.0))
	}
}
impl Default for ScoreCombiner {
	fn default() -> Self {
		Self::new(DEFAULT_RANK_DAMPING_EXPONENT)
	}
}

/// Harmonic-sum combination with the default rank damping.
pub fn combine(
	per_datasource: &BTreeMap<DatasourceId, f64>,
	weights: &ResolvedWeights,
) -> Option<f64> {
	ScoreCombiner::default().combine(per_datasource, weights)
}
