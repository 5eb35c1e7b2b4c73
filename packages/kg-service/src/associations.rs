use kg_domain::{
	DatasourceId, DatasourceScore, DatasourceSetting, EntityId, EntityKind, FacetCount,
	IdentifierSet, RawAggregationFilter, datasource, facet, filter,
	page::{self, Cursor, Pagination, ScoreOrder},
};

use crate::{Error, IndirectExpansion, KgService, Result, expand, planner::PlanInput};

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationsRequest {
	pub source_ids: Vec<String>,
	pub destination_ids: Option<Vec<String>>,
	pub source_kind: Option<EntityKind>,
	pub destination_kind: Option<EntityKind>,
	pub enable_indirect: Option<bool>,
	pub datasources: Option<Vec<DatasourceRequest>>,
	pub aggregation_filters: Option<Vec<RawAggregationFilter>>,
	pub facet_filters: Option<Vec<String>>,
	/// Dimensions to count. Defaults to every known dimension.
	pub facets: Option<Vec<String>>,
	pub threshold: Option<f64>,
	pub order_by_score: Option<String>,
	pub page: Option<PageRequest>,
	pub cursor: Option<String>,
	pub size: Option<i64>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DatasourceRequest {
	pub id: String,
	pub weight: f64,
	#[serde(default)]
	pub required: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PageRequest {
	#[serde(default)]
	pub index: i64,
	pub size: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationRow {
	pub source_id: EntityId,
	pub destination_id: EntityId,
	pub score: f64,
	pub datasource_scores: Vec<DatasourceScore>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AssociationsResponse {
	pub rows: Vec<AssociationRow>,
	pub facets: Vec<FacetCount>,
	/// Matching pairs before pagination.
	pub count: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cursor: Option<String>,
}

enum PageMode {
	Offset(Pagination),
	Cursor { after: Option<Cursor>, size: usize },
}

struct ValidatedRequest {
	sources: IdentifierSet,
	destinations: Option<IdentifierSet>,
	destination_kind: EntityKind,
	enable_indirect: bool,
	datasources: Option<Vec<DatasourceSetting>>,
	facet_dimensions: Vec<String>,
	threshold: f64,
	order: ScoreOrder,
	mode: PageMode,
}

impl KgService {
	/// Resolves one association query end to end.
	///
	/// All request validation happens before any evidence is fetched. Destination expansion and
	/// filter normalization run concurrently.
	pub async fn associations(&self, req: AssociationsRequest) -> Result<AssociationsResponse> {
		let validated = self.validate_request(&req)?;
		let weights = datasource::resolve(validated.datasources.as_deref(), self.defaults());
		let raw_filters = req.aggregation_filters.as_deref().unwrap_or_default();
		let raw_facet_values = req.facet_filters.as_deref().unwrap_or_default();
		let expansion = async {
			match validated.destinations.clone() {
				Some(ids) => expand::expand(
					self.stores.closures.as_ref(),
					ids,
					validated.enable_indirect,
					validated.destination_kind,
				)
				.await
				.map(Some),
				None => Ok(None),
			}
		};
		let normalization =
			async { filter::normalize(raw_filters, raw_facet_values, self.catalog()) };
		let (expansion, filters) = tokio::join!(expansion, normalization);
		let filters = filters?;
		let expansion: Option<IndirectExpansion> = expansion?;
		let candidates = self
			.plan_candidates(PlanInput {
				sources: &validated.sources,
				destinations: expansion.as_ref(),
				weights: &weights,
				threshold: validated.threshold,
			})
			.await?;
		let facets = facet::aggregate(&candidates, &filters, &validated.facet_dimensions);
		let matching = filter::apply(&filters, candidates);
		let count = matching.len() as u64;
		let (rows, cursor) = match validated.mode {
			PageMode::Offset(pagination) =>
				(page::paginate(matching, &pagination, validated.order), None),
			PageMode::Cursor { after, size } => {
				let (rows, next) =
					page::next_cursor(matching, after.as_ref(), size, validated.order);

				(rows, next.map(|cursor| cursor.encode()))
			},
		};

		tracing::info!(
			source_kind = req.source_kind.unwrap_or(EntityKind::Target).as_str(),
			destination_kind = validated.destination_kind.as_str(),
			sources = validated.sources.len(),
			destinations = expansion.as_ref().map(|expansion| expansion.direct.len()),
			expanded = expansion.as_ref().map(|expansion| expansion.expanded.len()),
			indirect = expansion.as_ref().is_some_and(IndirectExpansion::is_indirect),
			datasources = weights.contributing().count(),
			count,
			returned = rows.len(),
			has_cursor = cursor.is_some(),
			"Associations resolved."
		);

		let rows = rows
			.into_iter()
			.map(|association| AssociationRow {
				source_id: association.score.source_id().clone(),
				destination_id: association.score.destination_id().clone(),
				score: association.score.score(),
				datasource_scores: association.score.datasource_scores(),
			})
			.collect();

		Ok(AssociationsResponse { rows, facets, count, cursor })
	}

	fn validate_request(&self, req: &AssociationsRequest) -> Result<ValidatedRequest> {
		if req.source_ids.is_empty() {
			return Err(validation("$.sourceIds must contain at least one id."));
		}

		let sources = parse_ids(&req.source_ids, "$.sourceIds")?;
		let destinations = match req.destination_ids.as_deref() {
			Some([]) => {
				return Err(validation("$.destinationIds must contain at least one id when set."));
			},
			Some(raw) => Some(parse_ids(raw, "$.destinationIds")?),
			None => None,
		};
		let datasources = match req.datasources.as_deref() {
			Some(raw) => Some(parse_datasources(raw)?),
			None => None,
		};
		let threshold = req.threshold.unwrap_or(0.0);

		if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
			return Err(validation("$.threshold must be between 0 and 1."));
		}

		let facet_dimensions = match req.facets.as_deref() {
			Some(raw) => {
				let mut dimensions = Vec::with_capacity(raw.len());

				for (idx, dimension) in raw.iter().enumerate() {
					let dimension = dimension.trim();

					if !self.catalog().contains(dimension) {
						return Err(validation(format!(
							"$.facets[{idx}]: dimension '{dimension}' is not in allowlist: {}.",
							self.catalog().dimensions().collect::<Vec<_>>().join(", "),
						)));
					}

					dimensions.push(dimension.to_string());
				}

				dimensions
			},
			None => self.catalog().dimensions().map(str::to_string).collect(),
		};
		let order = match req.order_by_score.as_deref() {
			Some(raw) => ScoreOrder::parse(raw)?,
			None => ScoreOrder::default(),
		};
		let max_size = self.cfg.association.max_page_size;
		let default_size = i64::from(self.cfg.association.default_page_size);
		let mode = match (&req.page, &req.cursor) {
			(Some(_), Some(_)) => {
				return Err(validation("$.page and $.cursor are mutually exclusive."));
			},
			(Some(_), None) if req.size.is_some() => {
				return Err(validation("$.size is only used with cursor paging; set $.page.size."));
			},
			(Some(page), None) => PageMode::Offset(Pagination::new(
				page.index,
				page.size.unwrap_or(default_size),
				max_size,
			)?),
			(None, cursor) => {
				let size = page::page_size(req.size.unwrap_or(default_size), max_size)?;
				let after = match cursor {
					Some(token) => Some(Cursor::decode(token, order)?),
					None => None,
				};

				PageMode::Cursor { after, size }
			},
		};

		Ok(ValidatedRequest {
			sources,
			destinations,
			destination_kind: req.destination_kind.unwrap_or(EntityKind::Disease),
			enable_indirect: req.enable_indirect.unwrap_or(false),
			datasources,
			facet_dimensions,
			threshold,
			order,
			mode,
		})
	}
}

fn validation(message: impl Into<String>) -> Error {
	Error::Validation { message: message.into() }
}

fn parse_ids(raw: &[String], path: &str) -> Result<IdentifierSet> {
	let mut ids = IdentifierSet::new();

	for (idx, value) in raw.iter().enumerate() {
		let id = EntityId::parse(value).map_err(|err| validation(format!("{path}[{idx}]: {err}")))?;

		ids.insert(id);
	}

	Ok(ids)
}

fn parse_datasources(raw: &[DatasourceRequest]) -> Result<Vec<DatasourceSetting>> {
	let mut settings = Vec::with_capacity(raw.len());

	for (idx, entry) in raw.iter().enumerate() {
		let path = format!("$.datasources[{idx}]");
		let id =
			DatasourceId::parse(&entry.id).map_err(|err| validation(format!("{path}: {err}")))?;
		let setting = DatasourceSetting::new(id, entry.weight, entry.required)
			.map_err(|err| validation(format!("{path}: {err}")))?;

		settings.push(setting);
	}

	Ok(settings)
}
