use std::{
	collections::{BTreeMap, HashMap},
	sync::Arc,
	time::Duration,
};

use tokio::{task::JoinSet, time};

use kg_domain::{
	Association, AssociationScore, DATASOURCE_DIMENSION, DatasourceId, DatasourceSetting, EntityId,
	FacetSource, IdentifierSet, ResolvedWeights, filter::{self, AggregationFilter},
};
use kg_storage::models::EvidenceRow;

use crate::{Error, IndirectExpansion, KgService, Result};

/// Inputs of one planning pass. Everything here is already validated.
pub struct PlanInput<'a> {
	pub sources: &'a IdentifierSet,
	/// `None` leaves destinations unrestricted.
	pub destinations: Option<&'a IndirectExpansion>,
	pub weights: &'a ResolvedWeights,
	/// Pairs scoring strictly below this are dropped. `0.0` keeps everything.
	pub threshold: f64,
}

enum FetchOutcome {
	Rows(Vec<EvidenceRow>),
	TimedOut,
}

type PairKey = (EntityId, EntityId);

impl KgService {
	/// Scored, annotated and thresholded pairs before aggregation filters.
	///
	/// Facet counting needs this set because every facet ignores the filters on its own
	/// dimension.
	pub async fn plan_candidates(&self, input: PlanInput<'_>) -> Result<Vec<Association>> {
		let contributing: Vec<DatasourceSetting> = input.weights.contributing().cloned().collect();

		if contributing.is_empty() || input.sources.is_empty() {
			return Ok(Vec::new());
		}

		let source_ids: Arc<[String]> =
			input.sources.iter().map(|id| id.as_str().to_string()).collect();
		let destination_ids: Option<Arc<[String]>> = input
			.destinations
			.map(|expansion| expansion.expanded.iter().map(|id| id.as_str().to_string()).collect());
		let pairs = self
			.fetch_pairs(&contributing, source_ids, destination_ids, input.destinations)
			.await?;
		let mut associations = Vec::with_capacity(pairs.len());

		for ((source_id, destination_id), per_datasource) in pairs {
			let Some(score) = AssociationScore::combine(
				source_id,
				destination_id,
				per_datasource,
				input.weights,
				&self.combiner,
			) else {
				continue;
			};

			if score.score() < input.threshold {
				continue;
			}

			associations.push(Association::new(score));
		}

		self.annotate(&mut associations, input.weights).await?;

		Ok(associations)
	}

	/// Pairs passing every aggregation filter. Ordering is left to pagination.
	pub async fn plan(
		&self,
		input: PlanInput<'_>,
		filters: &[AggregationFilter],
	) -> Result<Vec<Association>> {
		let candidates = self.plan_candidates(input).await?;

		Ok(filter::apply(filters, candidates))
	}

	/// Fetches every contributing datasource concurrently and groups rows per pair.
	///
	/// Returning early drops the join set, which aborts every fetch still in flight.
	async fn fetch_pairs(
		&self,
		contributing: &[DatasourceSetting],
		source_ids: Arc<[String]>,
		destination_ids: Option<Arc<[String]>>,
		destinations: Option<&IndirectExpansion>,
	) -> Result<BTreeMap<PairKey, BTreeMap<DatasourceId, f64>>> {
		let fetch_timeout = Duration::from_millis(self.cfg.association.fetch_timeout_ms);
		let mut tasks = JoinSet::new();

		for setting in contributing {
			let setting = setting.clone();
			let store = self.stores.evidence.clone();
			let permits = self.fetch_permits.clone();
			let source_ids = source_ids.clone();
			let destination_ids = destination_ids.clone();

			tasks.spawn(async move {
				let _permit = permits.acquire_owned().await.map_err(|_| Error::Store {
					message: "fetch limiter is closed.".to_string(),
				})?;
				let fetch = store.fetch_evidence(
					setting.id.as_str(),
					&source_ids,
					destination_ids.as_deref(),
				);
				let outcome = match time::timeout(fetch_timeout, fetch).await {
					Ok(rows) => FetchOutcome::Rows(rows?),
					Err(_) => FetchOutcome::TimedOut,
				};

				Ok::<_, Error>((setting, outcome))
			});
		}

		let mut pairs: BTreeMap<PairKey, BTreeMap<DatasourceId, f64>> = BTreeMap::new();
		let mut degraded = Vec::new();

		while let Some(joined) = tasks.join_next().await {
			let (setting, outcome) = joined.map_err(|err| Error::Store {
				message: format!("evidence fetch task failed: {err}."),
			})??;
			let rows = match outcome {
				FetchOutcome::Rows(rows) => rows,
				FetchOutcome::TimedOut if setting.is_effectively_required() => {
					return Err(Error::Store {
						message: format!(
							"required datasource '{}' timed out after {} ms.",
							setting.id,
							fetch_timeout.as_millis()
						),
					});
				},
				FetchOutcome::TimedOut => {
					tracing::warn!(
						datasource_id = %setting.id,
						timeout_ms = fetch_timeout.as_millis() as u64,
						"Optional datasource timed out. Treating it as absent."
					);

					degraded.push(setting.id);

					continue;
				},
			};

			merge_rows(&mut pairs, &setting.id, rows, destinations);
		}

		tracing::debug!(
			datasources = contributing.len(),
			degraded = degraded.len(),
			pairs = pairs.len(),
			"Evidence fetched."
		);

		Ok(pairs)
	}

	/// Attaches configured entity annotations and the builtin datasource annotation.
	async fn annotate(
		&self,
		associations: &mut [Association],
		weights: &ResolvedWeights,
	) -> Result<()> {
		for association in associations.iter_mut() {
			let contributors: Vec<String> = association
				.score
				.per_datasource()
				.iter()
				.filter(|(id, score)| **score > 0.0 && weights.weight(id) > 0.0)
				.map(|(id, _)| id.as_str().to_string())
				.collect();

			for id in contributors {
				association.annotate(DATASOURCE_DIMENSION, &id);
			}
		}

		let sides: HashMap<String, FacetSource> = self
			.catalog
			.entity_dimensions()
			.map(|(dimension, source)| (dimension.to_string(), source))
			.collect();

		if sides.is_empty() || associations.is_empty() {
			return Ok(());
		}

		let mut entity_ids = IdentifierSet::new();

		for association in associations.iter() {
			entity_ids.insert(association.score.source_id().clone());
			entity_ids.insert(association.score.destination_id().clone());
		}

		let entity_ids: Vec<String> = entity_ids.iter().map(|id| id.as_str().to_string()).collect();
		let dimensions: Vec<String> = sides.keys().cloned().collect();
		let _permit = self.fetch_permits.acquire().await.map_err(|_| Error::Store {
			message: "fetch limiter is closed.".to_string(),
		})?;
		let fetch_timeout = Duration::from_millis(self.cfg.association.fetch_timeout_ms);
		let rows = time::timeout(
			fetch_timeout,
			self.stores.evidence.fetch_annotations(&entity_ids, &dimensions),
		)
		.await
		.map_err(|_| Error::Store {
			message: format!("annotation fetch timed out after {} ms.", fetch_timeout.as_millis()),
		})??;
		let mut by_entity: HashMap<(&str, &str), Vec<&str>> = HashMap::new();

		for row in &rows {
			by_entity
				.entry((row.entity_id.as_str(), row.dimension.as_str()))
				.or_default()
				.push(row.value.as_str());
		}

		for association in associations.iter_mut() {
			let source_id = association.score.source_id().as_str().to_string();
			let destination_id = association.score.destination_id().as_str().to_string();

			for (dimension, side) in &sides {
				let entity_id = match side {
					FacetSource::SourceEntity => source_id.as_str(),
					FacetSource::DestinationEntity => destination_id.as_str(),
					FacetSource::Datasource => continue,
				};
				let Some(values) = by_entity.get(&(entity_id, dimension.as_str())) else {
					continue;
				};

				for value in values {
					association.annotate(dimension, value);
				}
			}
		}

		Ok(())
	}
}

/// Groups one datasource's rows per pair. Rows on expanded destinations are credited to every
/// direct destination they originate from. Within a datasource the highest score wins.
fn merge_rows(
	pairs: &mut BTreeMap<PairKey, BTreeMap<DatasourceId, f64>>,
	datasource_id: &DatasourceId,
	rows: Vec<EvidenceRow>,
	destinations: Option<&IndirectExpansion>,
) {
	for row in rows {
		let (Ok(source_id), Ok(destination_id)) =
			(EntityId::parse(&row.source_id), EntityId::parse(&row.destination_id))
		else {
			tracing::warn!(
				datasource_id = %datasource_id,
				source_id = %row.source_id,
				destination_id = %row.destination_id,
				"Skipping evidence row with an invalid id."
			);

			continue;
		};
		let targets: Vec<EntityId> = match destinations {
			Some(expansion) => expansion.origins_of(&destination_id).to_vec(),
			None => vec![destination_id],
		};

		for target in targets {
			let slot = pairs
				.entry((source_id.clone(), target))
				.or_default()
				.entry(datasource_id.clone())
				.or_insert(f64::NAN);

			// `f64::max` ignores NaN, so a NaN row never displaces a real score.
			*slot = slot.max(row.score);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn id(raw: &str) -> EntityId {
		EntityId::parse(raw).expect("valid id")
	}

	fn row(source_id: &str, destination_id: &str, score: f64) -> EvidenceRow {
		EvidenceRow {
			source_id: source_id.to_string(),
			destination_id: destination_id.to_string(),
			score,
		}
	}

	#[test]
	fn duplicate_rows_keep_the_highest_score() {
		let ds = DatasourceId::parse("chembl").expect("valid datasource id");
		let mut pairs = BTreeMap::new();

		merge_rows(
			&mut pairs,
			&ds,
			vec![
				row("ENSG1", "EFO1", 0.2),
				row("ENSG1", "EFO1", f64::NAN),
				row("ENSG1", "EFO1", 0.6),
			],
			None,
		);

		assert_eq!(pairs[&(id("ENSG1"), id("EFO1"))][&ds], 0.6);
	}

	#[test]
	fn rows_outside_the_expansion_are_dropped() {
		let ds = DatasourceId::parse("chembl").expect("valid datasource id");
		let expansion =
			IndirectExpansion::identity(IdentifierSet::parse(&["EFO1"]).expect("valid ids"));
		let mut pairs = BTreeMap::new();

		merge_rows(&mut pairs, &ds, vec![row("ENSG1", "EFO5", 0.4)], Some(&expansion));

		assert!(pairs.is_empty());
	}
}
