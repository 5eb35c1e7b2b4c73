use std::{
	collections::HashSet,
	fmt::{Display, Formatter},
};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const MAX_ENTITY_ID_BYTES: usize = 512;
const MAX_DATASOURCE_ID_BYTES: usize = 128;

/// Namespaced graph entity identifier. Equality is exact and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);
impl EntityId {
	pub fn parse(raw: &str) -> Result<Self> {
		let trimmed = raw.trim();

		if trimmed.is_empty() {
			return Err(Error::validation("entity id must be non-empty."));
		}
		if trimmed.len() > MAX_ENTITY_ID_BYTES {
			return Err(Error::validation(format!(
				"entity id must be at most {MAX_ENTITY_ID_BYTES} bytes."
			)));
		}

		Ok(Self(trimmed.to_string()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Display for EntityId {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}
impl TryFrom<String> for EntityId {
	type Error = Error;

	fn try_from(value: String) -> Result<Self> {
		Self::parse(&value)
	}
}
impl From<EntityId> for String {
	fn from(value: EntityId) -> Self {
		value.0
	}
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasourceId(String);
impl DatasourceId {
	pub fn parse(raw: &str) -> Result<Self> {
		let trimmed = raw.trim();

		if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
			return Err(Error::validation(
				"datasource id must be non-empty and contain no whitespace.",
			));
		}
		if trimmed.len() > MAX_DATASOURCE_ID_BYTES {
			return Err(Error::validation(format!(
				"datasource id must be at most {MAX_DATASOURCE_ID_BYTES} bytes."
			)));
		}

		Ok(Self(trimmed.to_string()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Display for DatasourceId {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}
impl TryFrom<String> for DatasourceId {
	type Error = Error;

	fn try_from(value: String) -> Result<Self> {
		Self::parse(&value)
	}
}
impl From<DatasourceId> for String {
	fn from(value: DatasourceId) -> Self {
		value.0
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
	Target,
	Disease,
	Drug,
}
impl EntityKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Target => "target",
			Self::Disease => "disease",
			Self::Drug => "drug",
		}
	}

	/// Which precomputed one-hop relation indirect expansion follows for this kind.
	pub fn closure_relation(self) -> ClosureRelation {
		match self {
			Self::Disease => ClosureRelation::Descendants,
			Self::Target => ClosureRelation::InteractionPartners,
			Self::Drug => ClosureRelation::None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosureRelation {
	Descendants,
	InteractionPartners,
	None,
}

/// Deduplicated id sequence that keeps first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierSet {
	ids: Vec<EntityId>,
	seen: HashSet<EntityId>,
}
impl IdentifierSet {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn parse<S>(raw: &[S]) -> Result<Self>
	where
		S: AsRef<str>,
	{
		let mut set = Self::new();

		for value in raw {
			set.insert(EntityId::parse(value.as_ref())?);
		}

		Ok(set)
	}

	/// Returns `true` when the id was not present before.
	pub fn insert(&mut self, id: EntityId) -> bool {
		if self.seen.contains(&id) {
			return false;
		}

		self.seen.insert(id.clone());
		self.ids.push(id);

		true
	}

	pub fn contains(&self, id: &EntityId) -> bool {
		self.seen.contains(id)
	}

	pub fn is_subset(&self, other: &Self) -> bool {
		self.ids.iter().all(|id| other.contains(id))
	}

	pub fn len(&self) -> usize {
		self.ids.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ids.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &EntityId> {
		self.ids.iter()
	}

	pub fn as_slice(&self) -> &[EntityId] {
		&self.ids
	}
}
impl FromIterator<EntityId> for IdentifierSet {
	fn from_iter<T: IntoIterator<Item = EntityId>>(iter: T) -> Self {
		let mut set = Self::new();

		for id in iter {
			set.insert(id);
		}

		set
	}
}
impl<'a> IntoIterator for &'a IdentifierSet {
	type IntoIter = std::slice::Iter<'a, EntityId>;
	type Item = &'a EntityId;

	fn into_iter(self) -> Self::IntoIter {
		self.ids.iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn id(raw: &str) -> EntityId {
		EntityId::parse(raw).expect("valid id")
	}

	#[test]
	fn identifier_set_keeps_first_insertion_order() {
		let set = IdentifierSet::parse(&["EFO_2", "EFO_1", "EFO_2", "EFO_3"]).expect("valid ids");
		let ids: Vec<_> = set.iter().map(EntityId::as_str).collect();

		assert_eq!(ids, vec!["EFO_2", "EFO_1", "EFO_3"]);
	}

	#[test]
	fn entity_ids_are_case_sensitive() {
		let set: IdentifierSet = [id("ENSG1"), id("ensg1")].into_iter().collect();

		assert_eq!(set.len(), 2);
	}

	#[test]
	fn entity_id_rejects_blank() {
		assert!(EntityId::parse("   ").is_err());
		assert_eq!(id(" EFO_1 ").as_str(), "EFO_1");
	}

	#[test]
	fn datasource_id_rejects_inner_whitespace() {
		assert!(DatasourceId::parse("chembl v2").is_err());
		assert!(DatasourceId::parse("chembl").is_ok());
	}

	#[test]
	fn kinds_map_to_closure_relations() {
		assert_eq!(EntityKind::Disease.closure_relation(), ClosureRelation::Descendants);
		assert_eq!(EntityKind::Target.closure_relation(), ClosureRelation::InteractionPartners);
		assert_eq!(EntityKind::Drug.closure_relation(), ClosureRelation::None);
	}
}
