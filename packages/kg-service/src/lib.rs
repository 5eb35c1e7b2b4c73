pub mod associations;
pub mod expand;
pub mod planner;
pub mod stores;

mod error;

pub use associations::{
	AssociationRow, AssociationsRequest, AssociationsResponse, DatasourceRequest, PageRequest,
};
pub use error::{Error, ErrorKind, Result};
pub use expand::{CachedClosureProvider, IndirectExpansion};
pub use stores::{PgEvidenceStore, QdrantClosureStore};

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use tokio::sync::Semaphore;

use kg_config::Config;
use kg_domain::{EntityId, EntityKind, FacetCatalog, ResolvedWeights, ScoreCombiner};
use kg_storage::{
	db::Db,
	models::{AnnotationRow, EvidenceRow},
	qdrant::QdrantStore,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Closures keyed by entity id. Ids without a stored closure are absent.
pub type ClosureMap = HashMap<EntityId, Vec<EntityId>>;

/// Read access to per-datasource evidence and entity annotations.
pub trait EvidenceStore
where
	Self: Send + Sync,
{
	/// Evidence of one datasource for `source_ids`, restricted to `destination_ids` when given.
	fn fetch_evidence<'a>(
		&'a self,
		datasource_id: &'a str,
		source_ids: &'a [String],
		destination_ids: Option<&'a [String]>,
	) -> BoxFuture<'a, Result<Vec<EvidenceRow>>>;

	fn fetch_annotations<'a>(
		&'a self,
		entity_ids: &'a [String],
		dimensions: &'a [String],
	) -> BoxFuture<'a, Result<Vec<AnnotationRow>>>;
}

/// Precomputed one-hop closures used for indirect expansion.
pub trait ClosureProvider
where
	Self: Send + Sync,
{
	fn closures<'a>(
		&'a self,
		kind: EntityKind,
		ids: &'a [EntityId],
	) -> BoxFuture<'a, Result<ClosureMap>>;
}

#[derive(Clone)]
pub struct Stores {
	pub evidence: Arc<dyn EvidenceStore>,
	pub closures: Arc<dyn ClosureProvider>,
}

pub struct KgService {
	pub cfg: Config,
	pub stores: Stores,
	defaults: Arc<ResolvedWeights>,
	catalog: FacetCatalog,
	combiner: ScoreCombiner,
	fetch_permits: Arc<Semaphore>,
}
impl KgService {
	pub fn new(cfg: Config, db: Db, qdrant: QdrantStore) -> Result<Self> {
		let closures: Arc<dyn ClosureProvider> = if cfg.association.closure_cache {
			Arc::new(CachedClosureProvider::new(Arc::new(QdrantClosureStore::new(qdrant))))
		} else {
			Arc::new(QdrantClosureStore::new(qdrant))
		};
		let stores = Stores { evidence: Arc::new(PgEvidenceStore::new(db)), closures };

		Self::with_stores(cfg, stores)
	}

	pub fn with_stores(cfg: Config, stores: Stores) -> Result<Self> {
		let defaults = Arc::new(ResolvedWeights::from_config(&cfg.datasources)?);
		let catalog = FacetCatalog::from_config(&cfg.facets);
		let combiner = ScoreCombiner::new(cfg.association.rank_damping_exponent);
		let permits = usize::try_from(cfg.association.max_concurrent_fetches)
			.unwrap_or(Semaphore::MAX_PERMITS)
			.min(Semaphore::MAX_PERMITS);
		let fetch_permits = Arc::new(Semaphore::new(permits));

		Ok(Self { cfg, stores, defaults, catalog, combiner, fetch_permits })
	}

	pub fn defaults(&self) -> &ResolvedWeights {
		&self.defaults
	}

	pub fn catalog(&self) -> &FacetCatalog {
		&self.catalog
	}
}
