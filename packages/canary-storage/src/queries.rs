use sqlx::{Executor, Postgres};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Error, Result,
	models::{Assignment, Experiment, VariantCount},
};

pub async fn insert_experiment<'e, E>(executor: E, experiment: &Experiment) -> Result<()>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query(
		"\
INSERT INTO experiments (
	experiment_id,
	key,
	description,
	enabled,
	rollout_percentage,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7)",
	)
	.bind(experiment.experiment_id)
	.bind(experiment.key.as_str())
	.bind(experiment.description.as_str())
	.bind(experiment.enabled)
	.bind(experiment.rollout_percentage)
	.bind(experiment.created_at)
	.bind(experiment.updated_at)
	.execute(executor)
	.await
	.map_err(|err| {
		Error::from_insert(err, || format!("Experiment key {:?} already exists.", experiment.key))
	})?;

	Ok(())
}

/// Returns whether a row was written; an existing key is left untouched.
pub async fn insert_experiment_if_absent<'e, E>(executor: E, experiment: &Experiment) -> Result<bool>
where
	E: Executor<'e, Database = Postgres>,
{
	let result = sqlx::query(
		"\
INSERT INTO experiments (
	experiment_id,
	key,
	description,
	enabled,
	rollout_percentage,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT (key) DO NOTHING",
	)
	.bind(experiment.experiment_id)
	.bind(experiment.key.as_str())
	.bind(experiment.description.as_str())
	.bind(experiment.enabled)
	.bind(experiment.rollout_percentage)
	.bind(experiment.created_at)
	.bind(experiment.updated_at)
	.execute(executor)
	.await?;

	Ok(result.rows_affected() > 0)
}

pub async fn find_experiment_by_key<'e, E>(executor: E, key: &str) -> Result<Option<Experiment>>
where
	E: Executor<'e, Database = Postgres>,
{
	let experiment = sqlx::query_as::<_, Experiment>("SELECT * FROM experiments WHERE key = $1")
		.bind(key)
		.fetch_optional(executor)
		.await?;

	Ok(experiment)
}

pub async fn find_experiment<'e, E>(executor: E, experiment_id: Uuid) -> Result<Option<Experiment>>
where
	E: Executor<'e, Database = Postgres>,
{
	let experiment =
		sqlx::query_as::<_, Experiment>("SELECT * FROM experiments WHERE experiment_id = $1")
			.bind(experiment_id)
			.fetch_optional(executor)
			.await?;

	Ok(experiment)
}

pub async fn list_experiments<'e, E>(executor: E) -> Result<Vec<Experiment>>
where
	E: Executor<'e, Database = Postgres>,
{
	let experiments = sqlx::query_as::<_, Experiment>("SELECT * FROM experiments ORDER BY key")
		.fetch_all(executor)
		.await?;

	Ok(experiments)
}

pub async fn update_rollout_percentage<'e, E>(
	executor: E,
	experiment_id: Uuid,
	rollout_percentage: i32,
	now: OffsetDateTime,
) -> Result<Experiment>
where
	E: Executor<'e, Database = Postgres>,
{
	if !(0..=100).contains(&rollout_percentage) {
		return Err(Error::InvalidArgument(format!(
			"rollout_percentage {rollout_percentage} is outside 0-100."
		)));
	}

	sqlx::query_as::<_, Experiment>(
		"\
UPDATE experiments
SET rollout_percentage = $1, updated_at = $2
WHERE experiment_id = $3
RETURNING *",
	)
	.bind(rollout_percentage)
	.bind(now)
	.bind(experiment_id)
	.fetch_optional(executor)
	.await?
	.ok_or_else(|| Error::NotFound(format!("Experiment {experiment_id} not found.")))
}

pub async fn update_enabled<'e, E>(
	executor: E,
	experiment_id: Uuid,
	enabled: bool,
	now: OffsetDateTime,
) -> Result<Experiment>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query_as::<_, Experiment>(
		"\
UPDATE experiments
SET enabled = $1, updated_at = $2
WHERE experiment_id = $3
RETURNING *",
	)
	.bind(enabled)
	.bind(now)
	.bind(experiment_id)
	.fetch_optional(executor)
	.await?
	.ok_or_else(|| Error::NotFound(format!("Experiment {experiment_id} not found.")))
}

/// Assignments go with the experiment through `ON DELETE CASCADE`.
pub async fn delete_experiment<'e, E>(executor: E, experiment_id: Uuid) -> Result<bool>
where
	E: Executor<'e, Database = Postgres>,
{
	let result = sqlx::query("DELETE FROM experiments WHERE experiment_id = $1")
		.bind(experiment_id)
		.execute(executor)
		.await?;

	Ok(result.rows_affected() > 0)
}

pub async fn find_assignment<'e, E>(
	executor: E,
	user_id: &str,
	experiment_id: Uuid,
) -> Result<Option<Assignment>>
where
	E: Executor<'e, Database = Postgres>,
{
	let assignment = sqlx::query_as::<_, Assignment>(
		"\
SELECT *
FROM experiment_assignments
WHERE user_id = $1 AND experiment_id = $2",
	)
	.bind(user_id)
	.bind(experiment_id)
	.fetch_optional(executor)
	.await?;

	Ok(assignment)
}

pub async fn list_user_assignments<'e, E>(executor: E, user_id: &str) -> Result<Vec<Assignment>>
where
	E: Executor<'e, Database = Postgres>,
{
	let assignments = sqlx::query_as::<_, Assignment>(
		"SELECT * FROM experiment_assignments WHERE user_id = $1",
	)
	.bind(user_id)
	.fetch_all(executor)
	.await?;

	Ok(assignments)
}

/// Fails with [`Error::Conflict`] when the pair is already assigned.
pub async fn insert_assignment<'e, E>(executor: E, assignment: &Assignment) -> Result<()>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query(
		"\
INSERT INTO experiment_assignments (user_id, experiment_id, variant, assigned_at)
VALUES ($1, $2, $3, $4)",
	)
	.bind(assignment.user_id.as_str())
	.bind(assignment.experiment_id)
	.bind(assignment.variant.as_str())
	.bind(assignment.assigned_at)
	.execute(executor)
	.await
	.map_err(|err| {
		Error::from_insert(err, || {
			format!(
				"Assignment for user {:?} in experiment {} already exists.",
				assignment.user_id, assignment.experiment_id
			)
		})
	})?;

	Ok(())
}

/// One statement for the whole batch. Pairs that already exist are skipped, and the number of
/// rows actually written is returned.
pub async fn insert_assignments<'e, E>(executor: E, assignments: &[Assignment]) -> Result<u64>
where
	E: Executor<'e, Database = Postgres>,
{
	if assignments.is_empty() {
		return Ok(0);
	}

	let mut user_ids = Vec::with_capacity(assignments.len());
	let mut experiment_ids = Vec::with_capacity(assignments.len());
	let mut variants = Vec::with_capacity(assignments.len());
	let mut assigned_ats = Vec::with_capacity(assignments.len());

	for assignment in assignments {
		user_ids.push(assignment.user_id.as_str());
		experiment_ids.push(assignment.experiment_id);
		variants.push(assignment.variant.as_str());
		assigned_ats.push(assignment.assigned_at);
	}

	let result = sqlx::query(
		"\
INSERT INTO experiment_assignments (user_id, experiment_id, variant, assigned_at)
SELECT *
FROM UNNEST($1::text[], $2::uuid[], $3::text[], $4::timestamptz[])
ON CONFLICT (user_id, experiment_id) DO NOTHING",
	)
	.bind(user_ids)
	.bind(experiment_ids)
	.bind(variants)
	.bind(assigned_ats)
	.execute(executor)
	.await?;

	Ok(result.rows_affected())
}

pub async fn delete_assignments<'e, E>(executor: E, experiment_id: Uuid) -> Result<u64>
where
	E: Executor<'e, Database = Postgres>,
{
	let result = sqlx::query("DELETE FROM experiment_assignments WHERE experiment_id = $1")
		.bind(experiment_id)
		.execute(executor)
		.await?;

	Ok(result.rows_affected())
}

pub async fn count_assignments_by_variant<'e, E>(
	executor: E,
	experiment_id: Uuid,
) -> Result<Vec<VariantCount>>
where
	E: Executor<'e, Database = Postgres>,
{
	let counts = sqlx::query_as::<_, VariantCount>(
		"\
SELECT variant, count(*) AS assignment_count
FROM experiment_assignments
WHERE experiment_id = $1
GROUP BY variant
ORDER BY variant",
	)
	.bind(experiment_id)
	.fetch_all(executor)
	.await?;

	Ok(counts)
}
