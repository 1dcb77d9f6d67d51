use std::sync::Arc;

use canary_service::CanaryService;
use canary_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<CanaryService>,
}
impl AppState {
	pub async fn new(config: canary_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let service = CanaryService::new(config, db);

		service.seed_experiments().await?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: CanaryService) -> Self {
		Self { service: Arc::new(service) }
	}

	pub(crate) fn admin_auth_token(&self) -> Option<&str> {
		self.service.cfg.security.admin_auth_token.as_deref()
	}
}
