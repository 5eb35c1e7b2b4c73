use serde::{Deserialize, Serialize};

use crate::{Association, Error, FacetCatalog, Result};

const MAX_FILTERS: usize = 32;
const MAX_FILTER_VALUES: usize = 128;
const MAX_VALUE_BYTES: usize = 512;
const FACET_SELECTOR_SEPARATOR: char = ':';

/// Filter as it arrives from the request, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAggregationFilter {
	pub dimension: String,
	#[serde(default)]
	pub values: Vec<String>,
}

/// Validated filter: matches when the association has any of `values` on `dimension`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregationFilter {
	pub dimension: String,
	pub values: Vec<String>,
}
impl AggregationFilter {
	pub fn matches(&self, association: &Association) -> bool {
		association
			.values(&self.dimension)
			.is_some_and(|present| self.values.iter().any(|value| present.contains(value)))
	}

	fn push_value(&mut self, value: String) {
		if !self.values.contains(&value) {
			self.values.push(value);
		}
	}
}

/// Validates request filters and facet selectors into the predicates the planner applies.
///
/// `raw_facet_values` are `dimension:value` selectors. They are grouped per dimension in first-seen
/// order and merged into the first explicit filter on the same dimension, or appended as new
/// filters after the explicit ones.
pub fn normalize(
	raw_filters: &[RawAggregationFilter],
	raw_facet_values: &[String],
	catalog: &FacetCatalog,
) -> Result<Vec<AggregationFilter>> {
	let mut filters = Vec::with_capacity(raw_filters.len());

	for (idx, raw) in raw_filters.iter().enumerate() {
		let path = format!("$.aggregationFilters[{idx}]");
		let dimension = parse_dimension(&raw.dimension, &path, catalog)?;
		let mut filter = AggregationFilter { dimension, values: Vec::new() };

		for (value_idx, value) in raw.values.iter().enumerate() {
			filter.push_value(parse_value(value, &format!("{path}.values[{value_idx}]"))?);
		}

		if filter.values.is_empty() {
			return Err(Error::validation(format!(
				"{path}.values must contain at least one value."
			)));
		}

		check_value_count(&filter, &path)?;

		filters.push(filter);
	}

	let mut selected: Vec<AggregationFilter> = Vec::new();

	for (idx, selector) in raw_facet_values.iter().enumerate() {
		let path = format!("$.facetFilters[{idx}]");
		let Some((dimension, value)) = selector.split_once(FACET_SELECTOR_SEPARATOR) else {
			return Err(Error::validation(format!(
				"{path} must have the form 'dimension{FACET_SELECTOR_SEPARATOR}value'."
			)));
		};
		let dimension = parse_dimension(dimension, &path, catalog)?;
		let value = parse_value(value, &path)?;

		match selected.iter_mut().find(|filter| filter.dimension == dimension) {
			Some(filter) => filter.push_value(value),
			None => selected.push(AggregationFilter { dimension, values: vec![value] }),
		}
	}

	for selection in selected {
		let path = format!("$.facetFilters[{}]", selection.dimension);

		match filters.iter_mut().find(|filter| filter.dimension == selection.dimension) {
			Some(filter) => {
				for value in selection.values {
					filter.push_value(value);
				}

				check_value_count(filter, &path)?;
			},
			None => {
				check_value_count(&selection, &path)?;

				filters.push(selection);
			},
		}
	}

	if filters.len() > MAX_FILTERS {
		return Err(Error::validation(format!(
			"at most {MAX_FILTERS} aggregation filters are allowed."
		)));
	}

	Ok(filters)
}

/// Keeps the associations that pass every filter.
pub fn apply(filters: &[AggregationFilter], associations: Vec<Association>) -> Vec<Association> {
	if filters.is_empty() {
		return associations;
	}

	associations
		.into_iter()
		.filter(|association| filters.iter().all(|filter| filter.matches(association)))
		.collect()
}

/// Whether the association passes every filter that is not on `skip_dimension`.
pub fn matches_except(
	filters: &[AggregationFilter],
	association: &Association,
	skip_dimension: &str,
) -> bool {
	filters
		.iter()
		.filter(|filter| filter.dimension != skip_dimension)
		.all(|filter| filter.matches(association))
}

fn parse_dimension(raw: &str, path: &str, catalog: &FacetCatalog) -> Result<String> {
	let dimension = raw.trim();

	if !catalog.contains(dimension) {
		return Err(Error::validation(format!(
			"{path}: dimension '{dimension}' is not in allowlist: {}.",
			catalog.dimensions().collect::<Vec<_>>().join(", "),
		)));
	}

	Ok(dimension.to_string())
}

fn parse_value(raw: &str, path: &str) -> Result<String> {
	let value = raw.trim();

	if value.is_empty() {
		return Err(Error::validation(format!("{path}: filter value must be non-empty.")));
	}
	if value.len() > MAX_VALUE_BYTES {
		return Err(Error::validation(format!(
			"{path}: filter value must be at most {MAX_VALUE_BYTES} bytes."
		)));
	}

	Ok(value.to_string())
}

fn check_value_count(filter: &AggregationFilter, path: &str) -> Result<()> {
	if filter.values.len() > MAX_FILTER_VALUES {
		return Err(Error::validation(format!(
			"{path}: at most {MAX_FILTER_VALUES} values are allowed per filter."
		)));
	}

	Ok(())
}
