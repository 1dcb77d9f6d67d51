use time::OffsetDateTime;
use uuid::Uuid;

use crate::{BoxFuture, ExperimentStore, StoreResult};
use canary_storage::{
	db::Db,
	models::{Assignment, Experiment, VariantCount},
	queries,
};

impl ExperimentStore for Db {
	fn find_experiment_by_key<'a>(
		&'a self,
		key: &'a str,
	) -> BoxFuture<'a, StoreResult<Option<Experiment>>> {
		Box::pin(queries::find_experiment_by_key(&self.pool, key))
	}

	fn find_experiment<'a>(
		&'a self,
		experiment_id: Uuid,
	) -> BoxFuture<'a, StoreResult<Option<Experiment>>> {
		Box::pin(queries::find_experiment(&self.pool, experiment_id))
	}

	fn list_experiments<'a>(&'a self) -> BoxFuture<'a, StoreResult<Vec<Experiment>>> {
		Box::pin(queries::list_experiments(&self.pool))
	}

	fn insert_experiment<'a>(&'a self, experiment: &'a Experiment) -> BoxFuture<'a, StoreResult<()>> {
		Box::pin(queries::insert_experiment(&self.pool, experiment))
	}

	fn insert_experiment_if_absent<'a>(
		&'a self,
		experiment: &'a Experiment,
	) -> BoxFuture<'a, StoreResult<bool>> {
		Box::pin(queries::insert_experiment_if_absent(&self.pool, experiment))
	}

	fn update_rollout_percentage<'a>(
		&'a self,
		experiment_id: Uuid,
		rollout_percentage: i32,
		now: OffsetDateTime,
	) -> BoxFuture<'a, StoreResult<Experiment>> {
		Box::pin(queries::update_rollout_percentage(
			&self.pool,
			experiment_id,
			rollout_percentage,
			now,
		))
	}

	fn update_enabled<'a>(
		&'a self,
		experiment_id: Uuid,
		enabled: bool,
		now: OffsetDateTime,
	) -> BoxFuture<'a, StoreResult<Experiment>> {
		Box::pin(queries::update_enabled(&self.pool, experiment_id, enabled, now))
	}

	fn delete_experiment<'a>(&'a self, experiment_id: Uuid) -> BoxFuture<'a, StoreResult<bool>> {
		Box::pin(queries::delete_experiment(&self.pool, experiment_id))
	}

	fn find_assignment<'a>(
		&'a self,
		user_id: &'a str,
		experiment_id: Uuid,
	) -> BoxFuture<'a, StoreResult<Option<Assignment>>> {
		Box::pin(queries::find_assignment(&self.pool, user_id, experiment_id))
	}

	fn list_user_assignments<'a>(
		&'a self,
		user_id: &'a str,
	) -> BoxFuture<'a, StoreResult<Vec<Assignment>>> {
		Box::pin(queries::list_user_assignments(&self.pool, user_id))
	}

	fn insert_assignment<'a>(&'a self, assignment: &'a Assignment) -> BoxFuture<'a, StoreResult<()>> {
		Box::pin(queries::insert_assignment(&self.pool, assignment))
	}

	fn insert_assignments<'a>(
		&'a self,
		assignments: &'a [Assignment],
	) -> BoxFuture<'a, StoreResult<u64>> {
		Box::pin(queries::insert_assignments(&self.pool, assignments))
	}

	fn delete_assignments<'a>(&'a self, experiment_id: Uuid) -> BoxFuture<'a, StoreResult<u64>> {
		Box::pin(queries::delete_assignments(&self.pool, experiment_id))
	}

	fn count_assignments_by_variant<'a>(
		&'a self,
		experiment_id: Uuid,
	) -> BoxFuture<'a, StoreResult<Vec<VariantCount>>> {
		Box::pin(queries::count_assignments_by_variant(&self.pool, experiment_id))
	}
}
