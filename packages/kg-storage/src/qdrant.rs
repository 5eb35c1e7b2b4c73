use crate::Result;

pub const ENTITY_ID_FIELD: &str = "entity_id";
pub const KIND_FIELD: &str = "kind";
pub const CLOSURE_FIELD: &str = "closure";

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
}
impl QdrantStore {
	pub fn new(cfg: &kg_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone() })
	}
}
