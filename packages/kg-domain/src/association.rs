use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{DatasourceId, EntityId, ResolvedWeights, ScoreCombiner};

/// Facet values attached to one association, keyed by dimension.
pub type Annotations = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourceScore {
	pub id: DatasourceId,
	pub score: f64,
}

/// Aggregated score for one (source, destination) pair.
///
/// The aggregated score is only produced by [`AssociationScore::combine`], so it always reflects
/// the per-datasource scores it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationScore {
	source_id: EntityId,
	destination_id: EntityId,
	per_datasource: BTreeMap<DatasourceId, f64>,
	score: f64,
}
impl AssociationScore {
	pub fn combine(
		source_id: EntityId,
		destination_id: EntityId,
		per_datasource: BTreeMap<DatasourceId, f64>,
		weights: &ResolvedWeights,
		combiner: &ScoreCombiner,
	) -> Option<Self> {
		let score = combiner.combine(&per_datasource, weights)?;

		Some(Self { source_id, destination_id, per_datasource, score })
	}

	pub fn source_id(&self) -> &EntityId {
		&self.source_id
	}

	pub fn destination_id(&self) -> &EntityId {
		&self.destination_id
	}

	pub fn score(&self) -> f64 {
		self.score
	}

	pub fn per_datasource(&self) -> &BTreeMap<DatasourceId, f64> {
		&self.per_datasource
	}

	/// Per-datasource scores ordered by datasource id.
	pub fn datasource_scores(&self) -> Vec<DatasourceScore> {
		self.per_datasource
			.iter()
			.map(|(id, score)| DatasourceScore { id: id.clone(), score: *score })
			.collect()
	}
}

/// A scored pair plus the facet values it is filtered and counted on.
#[derive(Debug, Clone, PartialEq)]
pub struct Association {
	pub score: AssociationScore,
	pub annotations: Annotations,
}
impl Association {
	pub fn new(score: AssociationScore) -> Self {
		Self { score, annotations: Annotations::new() }
	}

	pub fn annotate(&mut self, dimension: &str, value: &str) {
		self.annotations.entry(dimension.to_string()).or_default().insert(value.to_string());
	}

	pub fn values(&self, dimension: &str) -> Option<&BTreeSet<String>> {
		self.annotations.get(dimension)
	}
}
