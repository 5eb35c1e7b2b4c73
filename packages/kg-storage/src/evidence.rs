use sqlx::PgExecutor;

use crate::{
	Result,
	models::{AnnotationRow, EvidenceRow},
};

/// Evidence rows of one datasource for the given sources, optionally restricted to destinations.
///
/// Duplicate rows for the same pair collapse to their maximum score.
pub async fn fetch_evidence<'e, E>(
	executor: E,
	datasource_id: &str,
	source_ids: &[String],
	destination_ids: Option<&[String]>,
) -> Result<Vec<EvidenceRow>>
where
	E: PgExecutor<'e>,
{
	if source_ids.is_empty() || destination_ids.is_some_and(|ids| ids.is_empty()) {
		return Ok(Vec::new());
	}

	let rows = sqlx::query_as::<_, EvidenceRow>(
		"\
SELECT
	source_id,
	destination_id,
	MAX(score)::float8 AS score
FROM association_evidence
WHERE datasource_id = $1
	AND source_id = ANY($2)
	AND ($3::text[] IS NULL OR destination_id = ANY($3))
GROUP BY source_id, destination_id",
	)
	.bind(datasource_id)
	.bind(source_ids)
	.bind(destination_ids)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

/// Facet annotations for the given entities on the given dimensions.
pub async fn fetch_annotations<'e, E>(
	executor: E,
	entity_ids: &[String],
	dimensions: &[String],
) -> Result<Vec<AnnotationRow>>
where
	E: PgExecutor<'e>,
{
	if entity_ids.is_empty() || dimensions.is_empty() {
		return Ok(Vec::new());
	}

	let rows = sqlx::query_as::<_, AnnotationRow>(
		"\
SELECT entity_id, dimension, value
FROM entity_annotations
WHERE entity_id = ANY($1)
	AND dimension = ANY($2)
ORDER BY entity_id, dimension, value",
	)
	.bind(entity_ids)
	.bind(dimensions)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn insert_evidence<'e, E>(
	executor: E,
	datasource_id: &str,
	row: &EvidenceRow,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO association_evidence (datasource_id, source_id, destination_id, score)
VALUES ($1, $2, $3, $4)",
	)
	.bind(datasource_id)
	.bind(row.source_id.as_str())
	.bind(row.destination_id.as_str())
	.bind(row.score as f32)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn insert_annotation<'e, E>(executor: E, row: &AnnotationRow) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO entity_annotations (entity_id, dimension, value)
VALUES ($1, $2, $3)
ON CONFLICT DO NOTHING",
	)
	.bind(row.entity_id.as_str())
	.bind(row.dimension.as_str())
	.bind(row.value.as_str())
	.execute(executor)
	.await?;

	Ok(())
}
