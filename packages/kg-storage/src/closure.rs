use std::collections::HashMap;

use qdrant_client::qdrant::{Condition, Filter, ScrollPointsBuilder, Value, value::Kind};

use crate::{
	Result,
	models::ClosureRecord,
	qdrant::{CLOSURE_FIELD, ENTITY_ID_FIELD, KIND_FIELD, QdrantStore},
};

const SCROLL_PAGE_SIZE: u32 = 256;

/// Looks up the stored closures of `ids` for one entity kind.
///
/// Ids without a stored point are simply absent from the result.
pub async fn fetch_closures(
	store: &QdrantStore,
	kind: &str,
	ids: &[String],
) -> Result<Vec<ClosureRecord>> {
	if ids.is_empty() {
		return Ok(Vec::new());
	}

	let filter = Filter::must([
		Condition::matches(KIND_FIELD, kind.to_string()),
		Condition::matches(ENTITY_ID_FIELD, ids.to_vec()),
	]);
	let mut out = Vec::new();
	let mut offset = None;

	loop {
		let mut request = ScrollPointsBuilder::new(store.collection.clone())
			.filter(filter.clone())
			.with_payload(true)
			.with_vectors(false)
			.limit(SCROLL_PAGE_SIZE);

		if let Some(offset) = offset.take() {
			request = request.offset(offset);
		}

		let response = store.client.scroll(request).await?;

		out.extend(response.result.iter().filter_map(|point| record_from_payload(&point.payload)));

		match response.next_page_offset {
			Some(next) => offset = Some(next),
			None => break,
		}
	}

	Ok(out)
}

fn record_from_payload(payload: &HashMap<String, Value>) -> Option<ClosureRecord> {
	let entity_id = payload.get(ENTITY_ID_FIELD).and_then(payload_string)?;
	let closure = match payload.get(CLOSURE_FIELD).map(|value| &value.kind) {
		Some(Some(Kind::ListValue(list))) =>
			list.values.iter().filter_map(payload_string).collect(),
		_ => Vec::new(),
	};

	Some(ClosureRecord { entity_id, closure })
}

fn payload_string(value: &Value) -> Option<String> {
	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}
