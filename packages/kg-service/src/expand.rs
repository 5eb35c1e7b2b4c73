use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
};

use kg_domain::{ClosureRelation, EntityId, EntityKind, IdentifierSet};

use crate::{BoxFuture, ClosureMap, ClosureProvider, Result};

/// Result of indirect expansion over one id set.
///
/// `direct` is always a subset of `expanded`. Every expanded id remembers the direct ids it was
/// reached from so evidence found on it can be credited back to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndirectExpansion {
	pub direct: IdentifierSet,
	pub expanded: IdentifierSet,
	origins: HashMap<EntityId, Vec<EntityId>>,
}
impl IndirectExpansion {
	pub fn identity(ids: IdentifierSet) -> Self {
		let origins = ids.iter().map(|id| (id.clone(), vec![id.clone()])).collect();

		Self { direct: ids.clone(), expanded: ids, origins }
	}

	/// Direct ids credited with evidence found on `id`. Empty for ids outside the expansion.
	pub fn origins_of(&self, id: &EntityId) -> &[EntityId] {
		self.origins.get(id).map(Vec::as_slice).unwrap_or(&[])
	}

	pub fn is_indirect(&self) -> bool {
		self.expanded.len() > self.direct.len()
	}

	fn add_origin(&mut self, id: EntityId, origin: &EntityId) {
		let origins = self.origins.entry(id.clone()).or_default();

		if !origins.contains(origin) {
			origins.push(origin.clone());
		}

		self.expanded.insert(id);
	}
}

/// Expands `ids` by their one-hop closures when `enable_indirect` is set.
///
/// Closure members follow the direct ids in the order the provider returns them. Ids without a
/// stored closure stay in `direct` and add nothing.
pub async fn expand(
	provider: &dyn ClosureProvider,
	ids: IdentifierSet,
	enable_indirect: bool,
	kind: EntityKind,
) -> Result<IndirectExpansion> {
	let mut expansion = IndirectExpansion::identity(ids);

	if !enable_indirect
		|| expansion.direct.is_empty()
		|| kind.closure_relation() == ClosureRelation::None
	{
		return Ok(expansion);
	}

	let closures = provider.closures(kind, expansion.direct.as_slice()).await?;
	let direct = expansion.direct.clone();

	for origin in &direct {
		let Some(members) = closures.get(origin) else {
			continue;
		};

		for member in members {
			expansion.add_origin(member.clone(), origin);
		}
	}

	tracing::debug!(
		kind = kind.as_str(),
		direct = expansion.direct.len(),
		expanded = expansion.expanded.len(),
		"Identifier set expanded."
	);

	Ok(expansion)
}

/// Read-through cache over another closure provider.
///
/// Closures are precomputed offline, so cached entries are never invalidated. Misses are cached
/// as empty closures.
pub struct CachedClosureProvider {
	inner: Arc<dyn ClosureProvider>,
	cache: Mutex<HashMap<(EntityKind, EntityId), Vec<EntityId>>>,
}
impl CachedClosureProvider {
	pub fn new(inner: Arc<dyn ClosureProvider>) -> Self {
		Self { inner, cache: Mutex::new(HashMap::new()) }
	}

	pub fn len(&self) -> usize {
		self.cache.lock().unwrap_or_else(|err| err.into_inner()).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
impl ClosureProvider for CachedClosureProvider {
	fn closures<'a>(
		&'a self,
		kind: EntityKind,
		ids: &'a [EntityId],
	) -> BoxFuture<'a, Result<ClosureMap>> {
		Box::pin(async move {
			let mut out = ClosureMap::new();
			let mut missing = Vec::new();

			{
				let cache = self.cache.lock().unwrap_or_else(|err| err.into_inner());

				for id in ids {
					match cache.get(&(kind, id.clone())) {
						Some(members) if !members.is_empty() => {
							out.insert(id.clone(), members.clone());
						},
						Some(_) => {},
						None => missing.push(id.clone()),
					}
				}
			}

			if missing.is_empty() {
				return Ok(out);
			}

			let fetched = self.inner.closures(kind, &missing).await?;
			let mut cache = self.cache.lock().unwrap_or_else(|err| err.into_inner());

			for id in missing {
				let members = fetched.get(&id).cloned().unwrap_or_default();

				if !members.is_empty() {
					out.insert(id.clone(), members.clone());
				}

				cache.insert((kind, id), members);
			}

			Ok(out)
		})
	}
}
