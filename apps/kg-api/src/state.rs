use std::sync::Arc;

use kg_service::KgService;
use kg_storage::{db::Db, qdrant::QdrantStore};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<KgService>,
}
impl AppState {
	pub async fn new(config: kg_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let qdrant = QdrantStore::new(&config.storage.qdrant)?;
		let service = KgService::new(config, db, qdrant)?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: KgService) -> Self {
		Self { service: Arc::new(service) }
	}
}
