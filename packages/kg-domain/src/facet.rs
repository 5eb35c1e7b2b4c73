use std::{
	cmp::Ordering,
	collections::{BTreeMap, BTreeSet},
};

use serde::Serialize;

use kg_config::{DATASOURCE_DIMENSION, Facet, FacetSide};

use crate::{AggregationFilter, Association, filter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetCount {
	pub dimension: String,
	pub value: String,
	pub count: u64,
}

/// Where the values of a facet dimension come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetSource {
	/// Annotation of the source entity.
	SourceEntity,
	/// Annotation of the destination entity.
	DestinationEntity,
	/// Ids of the datasources contributing to the pair.
	Datasource,
}

/// Known facet dimensions: the configured ones in configuration order, then `datasource`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetCatalog {
	dimensions: Vec<(String, FacetSource)>,
}
impl FacetCatalog {
	pub fn from_config(facets: &[Facet]) -> Self {
		let mut dimensions: Vec<(String, FacetSource)> = facets
			.iter()
			.map(|facet| {
				let source = match facet.side {
					FacetSide::Source => FacetSource::SourceEntity,
					FacetSide::Destination => FacetSource::DestinationEntity,
				};

				(facet.dimension.clone(), source)
			})
			.collect();

		dimensions.push((DATASOURCE_DIMENSION.to_string(), FacetSource::Datasource));

		Self { dimensions }
	}

	pub fn contains(&self, dimension: &str) -> bool {
		self.dimensions.iter().any(|(name, _)| name == dimension)
	}

	pub fn dimensions(&self) -> impl Iterator<Item = &str> {
		self.dimensions.iter().map(|(name, _)| name.as_str())
	}

	/// Dimensions annotated from entity records, with the side they are read from.
	pub fn entity_dimensions(&self) -> impl Iterator<Item = (&str, FacetSource)> {
		self.dimensions
			.iter()
			.filter(|(_, source)| *source != FacetSource::Datasource)
			.map(|(name, source)| (name.as_str(), *source))
	}
}

/// Counts distinct values per requested dimension.
///
/// `candidates` is the scored set before aggregation filters. For each dimension every filter is
/// applied except the ones on that dimension, so a facet keeps showing its alternative values
/// while one of them is selected. Rows come out in requested dimension order, then by count
/// descending and value ascending. An association with several values on a dimension counts once
/// for each distinct value.
pub fn aggregate(
	candidates: &[Association],
	filters: &[AggregationFilter],
	dimensions: &[String],
) -> Vec<FacetCount> {
	let mut out = Vec::new();
	let mut done = BTreeSet::new();

	for dimension in dimensions {
		if !done.insert(dimension.as_str()) {
			continue;
		}

		let mut counts: BTreeMap<&str, u64> = BTreeMap::new();

		for association in candidates {
			if !filter::matches_except(filters, association, dimension) {
				continue;
			}

			let Some(values) = association.values(dimension) else {
				continue;
			};

			for value in values {
				*counts.entry(value.as_str()).or_insert(0) += 1;
			}
		}

		let mut rows: Vec<(&str, u64)> = counts.into_iter().collect();

		rows.sort_by(|(a_value, a_count), (b_value, b_count)| match b_count.cmp(a_count) {
			Ordering::Equal => a_value.cmp(b_value),
			other => other,
		});

		out.extend(rows.into_iter().map(|(value, count)| FacetCount {
			dimension: dimension.clone(),
			value: value.to_string(),
			count,
		}));
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{
		AssociationScore, DatasourceId, DatasourceSetting, EntityId, RawAggregationFilter,
		ResolvedWeights, ScoreCombiner,
	};

	fn catalog() -> FacetCatalog {
		FacetCatalog::from_config(&[
			Facet { dimension: "target_class".to_string(), side: FacetSide::Source },
			Facet { dimension: "therapeutic_area".to_string(), side: FacetSide::Destination },
		])
	}

	fn association(destination: &str, annotations: &[(&str, &str)]) -> Association {
		let ds = DatasourceId::parse("chembl").expect("valid datasource id");
		let weights = ResolvedWeights::from_settings([
			DatasourceSetting::new(ds.clone(), 1.0, false).expect("valid setting")
		]);
		let score = AssociationScore::combine(
			EntityId::parse("ENSG1").expect("valid id"),
			EntityId::parse(destination).expect("valid id"),
			BTreeMap::from([(ds, 0.5)]),
			&weights,
			&ScoreCombiner::default(),
		)
		.expect("pair is kept");
		let mut association = Association::new(score);

		for (dimension, value) in annotations {
			association.annotate(dimension, value);
		}

		association
	}

	fn candidates() -> Vec<Association> {
		vec![
			association("EFO1", &[("therapeutic_area", "oncology"), ("target_class", "kinase")]),
			association("EFO2", &[("therapeutic_area", "oncology"), ("target_class", "enzyme")]),
			association("EFO3", &[("therapeutic_area", "immunology"), ("target_class", "kinase")]),
			association(
				"EFO4",
				&[
					("therapeutic_area", "immunology"),
					("therapeutic_area", "oncology"),
					("target_class", "kinase"),
				],
			),
		]
	}

	fn dims(names: &[&str]) -> Vec<String> {
		names.iter().map(|name| name.to_string()).collect()
	}

	fn count(facets: &[FacetCount], dimension: &str, value: &str) -> u64 {
		facets
			.iter()
			.find(|row| row.dimension == dimension && row.value == value)
			.map(|row| row.count)
			.unwrap_or(0)
	}

	#[test]
	fn catalog_appends_builtin_datasource_dimension() {
		let catalog = catalog();

		assert_eq!(
			catalog.dimensions().collect::<Vec<_>>(),
			vec!["target_class", "therapeutic_area", "datasource"]
		);
		assert_eq!(
			catalog.entity_dimensions().collect::<Vec<_>>(),
			vec![
				("target_class", FacetSource::SourceEntity),
				("therapeutic_area", FacetSource::DestinationEntity),
			]
		);
	}

	#[test]
	fn counts_are_ordered_by_count_then_value() {
		let facets = aggregate(&candidates(), &[], &dims(&["therapeutic_area", "target_class"]));
		let order: Vec<_> = facets
			.iter()
			.map(|row| (row.dimension.as_str(), row.value.as_str(), row.count))
			.collect();

		assert_eq!(
			order,
			vec![
				("therapeutic_area", "oncology", 3),
				("therapeutic_area", "immunology", 2),
				("target_class", "kinase", 3),
				("target_class", "enzyme", 1),
			]
		);
	}

	#[test]
	fn own_filter_is_excluded_from_own_counts() {
		let filters = crate::filter::normalize(
			&[
				RawAggregationFilter {
					dimension: "therapeutic_area".to_string(),
					values: vec!["immunology".to_string()],
				},
				RawAggregationFilter {
					dimension: "target_class".to_string(),
					values: vec!["kinase".to_string()],
				},
			],
			&[],
			&catalog(),
		)
		.expect("valid filters");
		let facets =
			aggregate(&candidates(), &filters, &dims(&["therapeutic_area", "target_class"]));

		// therapeutic_area ignores its own filter but honours target_class=kinase.
		assert_eq!(count(&facets, "therapeutic_area", "oncology"), 2);
		assert_eq!(count(&facets, "therapeutic_area", "immunology"), 2);
		// target_class ignores its own filter but honours therapeutic_area=immunology.
		assert_eq!(count(&facets, "target_class", "kinase"), 2);
		assert_eq!(count(&facets, "target_class", "enzyme"), 0);
	}

	#[test]
	fn multi_valued_counts_bound_the_union() {
		let candidates = candidates();
		let facets = aggregate(&candidates, &[], &dims(&["therapeutic_area"]));
		let union = candidates
			.iter()
			.filter(|association| association.values("therapeutic_area").is_some())
			.count() as u64;
		let sum = count(&facets, "therapeutic_area", "oncology")
			+ count(&facets, "therapeutic_area", "immunology");

		assert!(sum >= union);
		assert_eq!(sum, union + 1);
	}

	#[test]
	fn repeated_dimension_is_counted_once() {
		let facets = aggregate(&candidates(), &[], &dims(&["target_class", "target_class"]));

		assert_eq!(facets.len(), 2);
	}
}
