pub mod admin;
pub mod bulk;
pub mod resolve;
pub mod store;
pub mod time_serde;

mod error;

use std::{future::Future, pin::Pin, sync::Arc};

use time::OffsetDateTime;
use uuid::Uuid;

pub use admin::{
	CreateExperimentRequest, DeleteExperimentResponse, ExperimentRecord, ExperimentStats,
	ResetReport, SeedReport, VariantCountRecord,
};
use canary_config::Config;
use canary_storage::{
	db::Db,
	models::{Assignment, Experiment, VariantCount},
};
pub use error::{Error, Result};
pub use resolve::{Evaluation, Reason};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type StoreResult<T> = canary_storage::Result<T>;

/// Persistence for experiment definitions and per-user assignments.
///
/// `insert_assignment` must report an already-assigned pair as
/// [`canary_storage::Error::Conflict`]; `insert_assignments` must skip such pairs silently.
pub trait ExperimentStore
where
	Self: Send + Sync,
{
	fn find_experiment_by_key<'a>(
		&'a self,
		key: &'a str,
	) -> BoxFuture<'a, StoreResult<Option<Experiment>>>;

	fn find_experiment<'a>(
		&'a self,
		experiment_id: Uuid,
	) -> BoxFuture<'a, StoreResult<Option<Experiment>>>;

	fn list_experiments<'a>(&'a self) -> BoxFuture<'a, StoreResult<Vec<Experiment>>>;

	fn insert_experiment<'a>(&'a self, experiment: &'a Experiment) -> BoxFuture<'a, StoreResult<()>>;

	fn insert_experiment_if_absent<'a>(
		&'a self,
		experiment: &'a Experiment,
	) -> BoxFuture<'a, StoreResult<bool>>;

	fn update_rollout_percentage<'a>(
		&'a self,
		experiment_id: Uuid,
		rollout_percentage: i32,
		now: OffsetDateTime,
	) -> BoxFuture<'a, StoreResult<Experiment>>;

	fn update_enabled<'a>(
		&'a self,
		experiment_id: Uuid,
		enabled: bool,
		now: OffsetDateTime,
	) -> BoxFuture<'a, StoreResult<Experiment>>;

	fn delete_experiment<'a>(&'a self, experiment_id: Uuid) -> BoxFuture<'a, StoreResult<bool>>;

	fn find_assignment<'a>(
		&'a self,
		user_id: &'a str,
		experiment_id: Uuid,
	) -> BoxFuture<'a, StoreResult<Option<Assignment>>>;

	fn list_user_assignments<'a>(
		&'a self,
		user_id: &'a str,
	) -> BoxFuture<'a, StoreResult<Vec<Assignment>>>;

	fn insert_assignment<'a>(&'a self, assignment: &'a Assignment) -> BoxFuture<'a, StoreResult<()>>;

	fn insert_assignments<'a>(
		&'a self,
		assignments: &'a [Assignment],
	) -> BoxFuture<'a, StoreResult<u64>>;

	fn delete_assignments<'a>(&'a self, experiment_id: Uuid) -> BoxFuture<'a, StoreResult<u64>>;

	fn count_assignments_by_variant<'a>(
		&'a self,
		experiment_id: Uuid,
	) -> BoxFuture<'a, StoreResult<Vec<VariantCount>>>;
}

pub struct CanaryService {
	pub cfg: Config,
	pub store: Arc<dyn ExperimentStore>,
}
impl CanaryService {
	pub fn new(cfg: Config, db: Db) -> Self {
		Self { cfg, store: Arc::new(db) }
	}

	pub fn with_store(cfg: Config, store: Arc<dyn ExperimentStore>) -> Self {
		Self { cfg, store }
	}
}
