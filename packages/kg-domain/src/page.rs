use std::cmp::Ordering;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::{Association, AssociationScore, EntityId, Error, Result};

const CURSOR_VERSION: u8 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOrder {
	Asc,
	#[default]
	Desc,
}
impl ScoreOrder {
	pub fn parse(raw: &str) -> Result<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"asc" => Ok(Self::Asc),
			"desc" => Ok(Self::Desc),
			other => Err(Error::validation(format!(
				"orderByScore must be one of asc or desc, got '{other}'."
			))),
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Asc => "asc",
			Self::Desc => "desc",
		}
	}
}

/// Total order over associations: score in the requested direction, then source id and
/// destination id ascending.
pub fn compare(order: ScoreOrder, a: &AssociationScore, b: &AssociationScore) -> Ordering {
	let a_key = (a.score(), a.source_id(), a.destination_id());
	let b_key = (b.score(), b.source_id(), b.destination_id());

	compare_key(order, a_key, b_key)
}

pub fn sort(associations: &mut [Association], order: ScoreOrder) {
	associations.sort_by(|a, b| compare(order, &a.score, &b.score));
}

fn compare_key(
	order: ScoreOrder,
	(a_score, a_source, a_destination): (f64, &EntityId, &EntityId),
	(b_score, b_source, b_destination): (f64, &EntityId, &EntityId),
) -> Ordering {
	let by_score = match order {
		ScoreOrder::Desc => b_score.total_cmp(&a_score),
		ScoreOrder::Asc => a_score.total_cmp(&b_score),
	};

	by_score.then_with(|| a_source.cmp(b_source)).then_with(|| a_destination.cmp(b_destination))
}

/// Validated page size, clamped to the configured maximum.
pub fn page_size(size: i64, max_size: u32) -> Result<usize> {
	if size <= 0 {
		return Err(Error::validation("page size must be greater than zero."));
	}

	Ok(size.min(i64::from(max_size)) as usize)
}

/// Offset-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
	index: usize,
	size: usize,
}
impl Pagination {
	pub fn new(index: i64, size: i64, max_size: u32) -> Result<Self> {
		if index < 0 {
			return Err(Error::validation("page index must be zero or greater."));
		}

		let size = page_size(size, max_size)?;
		let index = usize::try_from(index)
			.map_err(|_| Error::validation("page index is out of range."))?;

		Ok(Self { index, size })
	}

	pub fn size(&self) -> usize {
		self.size
	}

	fn offset(&self) -> Option<usize> {
		self.index.checked_mul(self.size)
	}
}

/// Sorts and returns the requested page. Pages past the end are empty.
pub fn paginate(
	mut associations: Vec<Association>,
	pagination: &Pagination,
	order: ScoreOrder,
) -> Vec<Association> {
	let Some(offset) = pagination.offset().filter(|offset| *offset < associations.len()) else {
		return Vec::new();
	};

	sort(&mut associations, order);

	associations.into_iter().skip(offset).take(pagination.size()).collect()
}

/// Resume position: the sort key of the last row handed out.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
	order: ScoreOrder,
	score: f64,
	source_id: EntityId,
	destination_id: EntityId,
}

#[derive(Serialize, Deserialize)]
struct CursorPayload {
	v: u8,
	order: ScoreOrder,
	/// IEEE-754 bits, so the key survives the round trip exactly.
	score_bits: u64,
	source_id: String,
	destination_id: String,
}

impl Cursor {
	pub fn after(association: &AssociationScore, order: ScoreOrder) -> Self {
		Self {
			order,
			score: association.score(),
			source_id: association.source_id().clone(),
			destination_id: association.destination_id().clone(),
		}
	}

	pub fn encode(&self) -> String {
		let payload = CursorPayload {
			v: CURSOR_VERSION,
			order: self.order,
			score_bits: self.score.to_bits(),
			source_id: self.source_id.as_str().to_string(),
			destination_id: self.destination_id.as_str().to_string(),
		};
		// Serializing a struct of plain strings and integers cannot fail.
		let raw = serde_json::to_vec(&payload).unwrap_or_default();

		URL_SAFE_NO_PAD.encode(raw)
	}

	/// Decodes a token and checks it was issued for `order`.
	pub fn decode(token: &str, order: ScoreOrder) -> Result<Self> {
		let raw = URL_SAFE_NO_PAD
			.decode(token.trim())
			.map_err(|_| Error::invalid_cursor("cursor is not valid base64."))?;
		let payload: CursorPayload = serde_json::from_slice(&raw)
			.map_err(|_| Error::invalid_cursor("cursor payload is malformed."))?;

		if payload.v != CURSOR_VERSION {
			return Err(Error::invalid_cursor(format!(
				"cursor version {} is not supported.",
				payload.v
			)));
		}
		if payload.order != order {
			return Err(Error::invalid_cursor(format!(
				"cursor was issued for score order {}, request uses {}.",
				payload.order.as_str(),
				order.as_str()
			)));
		}

		let score = f64::from_bits(payload.score_bits);

		if !score.is_finite() {
			return Err(Error::invalid_cursor("cursor score is not finite."));
		}

		let source_id = EntityId::parse(&payload.source_id)
			.map_err(|_| Error::invalid_cursor("cursor source id is invalid."))?;
		let destination_id = EntityId::parse(&payload.destination_id)
			.map_err(|_| Error::invalid_cursor("cursor destination id is invalid."))?;

		Ok(Self { order, score, source_id, destination_id })
	}
}

/// Sorts and returns up to `size` rows strictly after `cursor`, plus the cursor for the next page.
/// No next cursor means the listing is exhausted.
pub fn next_cursor(
	mut associations: Vec<Association>,
	cursor: Option<&Cursor>,
	size: usize,
	order: ScoreOrder,
) -> (Vec<Association>, Option<Cursor>) {
	sort(&mut associations, order);

	let start = match cursor {
		None => 0,
		Some(cursor) => associations.partition_point(|association| {
			let row = &association.score;

			compare_key(
				order,
				(row.score(), row.source_id(), row.destination_id()),
				(cursor.score, &cursor.source_id, &cursor.destination_id),
			) != Ordering::Greater
		}),
	};
	let end = start.saturating_add(size).min(associations.len());
	let has_more = end < associations.len();
	let page: Vec<Association> = associations.drain(start..end).collect();
	let next =
		if has_more { page.last().map(|last| Cursor::after(&last.score, order)) } else { None };

	(page, next)
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use proptest::prelude::*;

	use super::*;
	use crate::{DatasourceId, DatasourceSetting, ResolvedWeights, ScoreCombiner};

	fn association(source: &str, destination: &str, score: f64) -> Association {
		let ds = DatasourceId::parse("chembl").expect("valid datasource id");
		let weights = ResolvedWeights::from_settings([
			DatasourceSetting::new(ds.clone(), 1.0, false).expect("valid setting")
		]);
		let score = AssociationScore::combine(
			EntityId::parse(source).expect("valid id"),
			EntityId::parse(destination).expect("valid id"),
			BTreeMap::from([(ds, score)]),
			&weights,
			&ScoreCombiner::default(),
		)
		.expect("pair is kept");

		Association::new(score)
	}

	fn keys(associations: &[Association]) -> Vec<(String, String)> {
		associations
			.iter()
			.map(|association| {
				(
					association.score.source_id().to_string(),
					association.score.destination_id().to_string(),
				)
			})
			.collect()
	}

	fn sample() -> Vec<Association> {
		vec![
			association("ENSG2", "EFO1", 0.5),
			association("ENSG1", "EFO2", 0.5),
			association("ENSG1", "EFO1", 0.9),
			association("ENSG3", "EFO3", 0.1),
			association("ENSG1", "EFO3", 0.5),
		]
	}

	#[test]
	fn ties_break_on_source_then_destination() {
		let pagination = Pagination::new(0, 10, 100).expect("valid page");
		let page = paginate(sample(), &pagination, ScoreOrder::Desc);

		assert_eq!(
			keys(&page),
			vec![
				("ENSG1".to_string(), "EFO1".to_string()),
				("ENSG1".to_string(), "EFO2".to_string()),
				("ENSG1".to_string(), "EFO3".to_string()),
				("ENSG2".to_string(), "EFO1".to_string()),
				("ENSG3".to_string(), "EFO3".to_string()),
			]
		);
	}

	#[test]
	fn ascending_order_flips_score_only() {
		let pagination = Pagination::new(0, 2, 100).expect("valid page");
		let page = paginate(sample(), &pagination, ScoreOrder::Asc);

		assert_eq!(
			keys(&page),
			vec![
				("ENSG3".to_string(), "EFO3".to_string()),
				("ENSG1".to_string(), "EFO2".to_string()),
			]
		);
	}

	#[test]
	fn page_past_end_is_empty() {
		let pagination = Pagination::new(10, 5, 100).expect("valid page");

		assert!(paginate(sample(), &pagination, ScoreOrder::Desc).is_empty());
	}

	#[test]
	fn page_bounds_are_validated_and_clamped() {
		assert!(matches!(Pagination::new(0, 0, 100), Err(Error::Validation { .. })));
		assert!(matches!(Pagination::new(0, -3, 100), Err(Error::Validation { .. })));
		assert!(matches!(Pagination::new(-1, 10, 100), Err(Error::Validation { .. })));
		assert_eq!(Pagination::new(0, 10_000, 100).expect("valid page").size(), 100);
	}

	#[test]
	fn huge_index_does_not_overflow() {
		let pagination = Pagination::new(i64::MAX, 100, 100).expect("valid page");

		assert!(paginate(sample(), &pagination, ScoreOrder::Desc).is_empty());
	}

	#[test]
	fn cursor_resumes_after_last_row() {
		let (first, cursor) = next_cursor(sample(), None, 2, ScoreOrder::Desc);
		let cursor = cursor.expect("more rows remain");
		let token = cursor.encode();
		let decoded = Cursor::decode(&token, ScoreOrder::Desc).expect("valid cursor");
		let (second, _) = next_cursor(sample(), Some(&decoded), 2, ScoreOrder::Desc);

		assert_eq!(keys(&first)[1], ("ENSG1".to_string(), "EFO2".to_string()));
		assert_eq!(keys(&second)[0], ("ENSG1".to_string(), "EFO3".to_string()));
	}

	#[test]
	fn last_page_has_no_cursor() {
		let (page, cursor) = next_cursor(sample(), None, 5, ScoreOrder::Desc);

		assert_eq!(page.len(), 5);
		assert!(cursor.is_none());
	}

	#[test]
	fn foreign_cursor_is_rejected() {
		let (_, cursor) = next_cursor(sample(), None, 1, ScoreOrder::Desc);
		let token = cursor.expect("more rows remain").encode();

		assert!(matches!(
			Cursor::decode(&token, ScoreOrder::Asc),
			Err(Error::InvalidCursor { .. })
		));
		assert!(matches!(
			Cursor::decode("not a cursor", ScoreOrder::Desc),
			Err(Error::InvalidCursor { .. })
		));
		assert!(matches!(
			Cursor::decode(&URL_SAFE_NO_PAD.encode(b"{\"v\":9}"), ScoreOrder::Desc),
			Err(Error::InvalidCursor { .. })
		));
	}

	fn arbitrary_associations() -> impl Strategy<Value = Vec<Association>> {
		proptest::collection::btree_map((0_u8..6, 0_u8..6), 1_u8..=4, 0..30).prop_map(|pairs| {
			pairs
				.into_iter()
				.map(|((source, destination), bucket)| {
					association(
						&format!("ENSG{source}"),
						&format!("EFO{destination}"),
						f64::from(bucket) / 4.0,
					)
				})
				.collect()
		})
	}

	proptest! {
		#[test]
		fn offset_pages_cover_sorted_sequence_exactly_once(
			associations in arbitrary_associations(),
			size in 1_i64..7,
		) {
			let mut expected = associations.clone();

			sort(&mut expected, ScoreOrder::Desc);

			let mut collected = Vec::new();

			for index in 0.. {
				let pagination = Pagination::new(index, size, 100).expect("valid page");
				let page = paginate(associations.clone(), &pagination, ScoreOrder::Desc);

				if page.is_empty() {
					break;
				}

				collected.extend(page);
			}

			prop_assert_eq!(keys(&collected), keys(&expected));
		}

		#[test]
		fn cursor_walk_has_no_repeats_or_gaps(
			associations in arbitrary_associations(),
			size in 1_usize..7,
		) {
			let mut expected = associations.clone();

			sort(&mut expected, ScoreOrder::Desc);

			let mut collected = Vec::new();
			let mut cursor: Option<Cursor> = None;

			loop {
				let decoded = cursor.as_ref().map(|cursor| {
					Cursor::decode(&cursor.encode(), ScoreOrder::Desc).expect("valid cursor")
				});
				let (page, next) =
					next_cursor(associations.clone(), decoded.as_ref(), size, ScoreOrder::Desc);

				collected.extend(page);

				match next {
					Some(next) => cursor = Some(next),
					None => break,
				}
			}

			prop_assert_eq!(keys(&collected), keys(&expected));
		}
	}
}
