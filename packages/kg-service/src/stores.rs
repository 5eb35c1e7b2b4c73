//! Production implementations of the store traits over Postgres and Qdrant.

use std::collections::HashMap;

use kg_domain::{EntityId, EntityKind};
use kg_storage::{
	closure,
	db::Db,
	evidence,
	models::{AnnotationRow, EvidenceRow},
	qdrant::QdrantStore,
};

use crate::{BoxFuture, ClosureMap, ClosureProvider, EvidenceStore, Result};

pub struct PgEvidenceStore {
	db: Db,
}
impl PgEvidenceStore {
	pub fn new(db: Db) -> Self {
		Self { db }
	}
}
impl EvidenceStore for PgEvidenceStore {
	fn fetch_evidence<'a>(
		&'a self,
		datasource_id: &'a str,
		source_ids: &'a [String],
		destination_ids: Option<&'a [String]>,
	) -> BoxFuture<'a, Result<Vec<EvidenceRow>>> {
		Box::pin(async move {
			let rows =
				evidence::fetch_evidence(&self.db.pool, datasource_id, source_ids, destination_ids)
					.await?;

			Ok(rows)
		})
	}

	fn fetch_annotations<'a>(
		&'a self,
		entity_ids: &'a [String],
		dimensions: &'a [String],
	) -> BoxFuture<'a, Result<Vec<AnnotationRow>>> {
		Box::pin(async move {
			let rows = evidence::fetch_annotations(&self.db.pool, entity_ids, dimensions).await?;

			Ok(rows)
		})
	}
}

pub struct QdrantClosureStore {
	qdrant: QdrantStore,
}
impl QdrantClosureStore {
	pub fn new(qdrant: QdrantStore) -> Self {
		Self { qdrant }
	}
}
impl ClosureProvider for QdrantClosureStore {
	fn closures<'a>(
		&'a self,
		kind: EntityKind,
		ids: &'a [EntityId],
	) -> BoxFuture<'a, Result<ClosureMap>> {
		Box::pin(async move {
			let raw_ids: Vec<String> = ids.iter().map(|id| id.as_str().to_string()).collect();
			let records = closure::fetch_closures(&self.qdrant, kind.as_str(), &raw_ids).await?;
			let mut out = HashMap::with_capacity(records.len());

			for record in records {
				let Ok(entity_id) = EntityId::parse(&record.entity_id) else {
					tracing::warn!(
						entity_id = %record.entity_id,
						"Skipping closure with an invalid entity id."
					);

					continue;
				};
				let members = record
					.closure
					.iter()
					.filter_map(|member| EntityId::parse(member).ok())
					.collect();

				out.insert(entity_id, members);
			}

			Ok(out)
		})
	}
}
