#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct EvidenceRow {
	pub source_id: String,
	pub destination_id: String,
	pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct AnnotationRow {
	pub entity_id: String,
	pub dimension: String,
	pub value: String,
}

/// One entity's precomputed one-hop closure as stored in the search index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureRecord {
	pub entity_id: String,
	pub closure: Vec<String>,
}
