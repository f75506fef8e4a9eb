use std::sync::Arc;

use mindmate_service::{ChatService, DefaultProviders, PgStores, Stores};
use mindmate_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<ChatService>,
}
impl AppState {
	pub async fn new(config: mindmate_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let stores = Stores::postgres(Arc::new(PgStores::new(db)));
		let service = ChatService::new(config, Arc::new(DefaultProviders), stores);

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: ChatService) -> Self {
		Self { service: Arc::new(service) }
	}
}
