//! In-process [`ExperimentStore`] for service and HTTP tests.
//!
//! Besides holding rows it can fail chosen operations, count calls, and plant a competing
//! assignment that lands just before the next insert for a pair.

use std::{
	collections::{BTreeMap, HashMap},
	future,
	sync::{Mutex, MutexGuard},
};

use time::OffsetDateTime;
use uuid::Uuid;

use canary_service::{BoxFuture, ExperimentStore, StoreResult};
use canary_storage::{
	Error as StorageError,
	models::{Assignment, Experiment, VariantCount},
};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Operation {
	FindExperimentByKey,
	FindExperiment,
	ListExperiments,
	InsertExperiment,
	UpdateExperiment,
	DeleteExperiment,
	FindAssignment,
	ListUserAssignments,
	InsertAssignment,
	InsertAssignments,
	DeleteAssignments,
	CountAssignments,
}

/// When an injected failure starts.
#[derive(Clone, Copy, Debug)]
pub enum Failure {
	Always,
	/// Let this many calls succeed, then fail every later one.
	After(usize),
}

#[derive(Default)]
pub struct MemoryStore {
	state: Mutex<State>,
}

#[derive(Default)]
struct State {
	experiments: BTreeMap<Uuid, Experiment>,
	assignments: HashMap<(String, Uuid), Assignment>,
	racers: HashMap<(String, Uuid), String>,
	failures: HashMap<Operation, Failure>,
	calls: HashMap<Operation, usize>,
}
impl State {
	/// Counts the call and reports whether it should fail.
	fn enter(&mut self, operation: Operation) -> StoreResult<()> {
		let calls = self.calls.entry(operation).or_default();

		*calls += 1;

		let failed = match self.failures.get(&operation) {
			Some(Failure::Always) => true,
			Some(Failure::After(successes)) => *calls > *successes,
			None => false,
		};

		if failed { Err(StorageError::Sqlx(sqlx::Error::PoolTimedOut)) } else { Ok(()) }
	}

	fn land_racer(&mut self, user_id: &str, experiment_id: Uuid) {
		let pair = (user_id.to_string(), experiment_id);

		if let Some(variant) = self.racers.remove(&pair) {
			self.assignments.entry(pair).or_insert_with(|| Assignment {
				user_id: user_id.to_string(),
				experiment_id,
				variant,
				assigned_at: OffsetDateTime::now_utc(),
			});
		}
	}

	fn update(
		&mut self,
		experiment_id: Uuid,
		apply: impl FnOnce(&mut Experiment),
	) -> StoreResult<Experiment> {
		self.enter(Operation::UpdateExperiment)?;

		let experiment = self.experiments.get_mut(&experiment_id).ok_or_else(|| {
			StorageError::NotFound(format!("Experiment {experiment_id} not found."))
		})?;

		apply(experiment);

		Ok(experiment.clone())
	}
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores an experiment directly, bypassing call counting and failures.
	pub fn add_experiment(&self, key: &str, enabled: bool, rollout_percentage: i32) -> Experiment {
		let now = OffsetDateTime::now_utc();
		let experiment = Experiment {
			experiment_id: Uuid::new_v4(),
			key: key.to_string(),
			description: String::new(),
			enabled,
			rollout_percentage,
			created_at: now,
			updated_at: now,
		};

		self.lock().experiments.insert(experiment.experiment_id, experiment.clone());

		experiment
	}

	/// Stores an assignment directly, bypassing call counting and failures.
	pub fn add_assignment(&self, user_id: &str, experiment_id: Uuid, variant: &str) {
		self.lock().assignments.insert(
			(user_id.to_string(), experiment_id),
			Assignment {
				user_id: user_id.to_string(),
				experiment_id,
				variant: variant.to_string(),
				assigned_at: OffsetDateTime::now_utc(),
			},
		);
	}

	/// Plants a competing writer whose assignment commits right before the next insert of this
	/// pair.
	pub fn race_assignment(&self, user_id: &str, experiment_id: Uuid, variant: &str) {
		self.lock().racers.insert((user_id.to_string(), experiment_id), variant.to_string());
	}

	pub fn fail(&self, operation: Operation, failure: Failure) {
		self.lock().failures.insert(operation, failure);
	}

	pub fn clear_failures(&self) {
		self.lock().failures.clear();
	}

	pub fn calls(&self, operation: Operation) -> usize {
		self.lock().calls.get(&operation).copied().unwrap_or(0)
	}

	pub fn reset_calls(&self) {
		self.lock().calls.clear();
	}

	pub fn assignment(&self, user_id: &str, experiment_id: Uuid) -> Option<Assignment> {
		self.lock().assignments.get(&(user_id.to_string(), experiment_id)).cloned()
	}

	pub fn assignment_count(&self, experiment_id: Uuid) -> usize {
		self.lock()
			.assignments
			.values()
			.filter(|assignment| assignment.experiment_id == experiment_id)
			.count()
	}

	pub fn experiment(&self, experiment_id: Uuid) -> Option<Experiment> {
		self.lock().experiments.get(&experiment_id).cloned()
	}

	fn lock(&self) -> MutexGuard<'_, State> {
		self.state.lock().unwrap_or_else(|err| err.into_inner())
	}

	fn with_state<'a, T>(&self, f: impl FnOnce(&mut State) -> StoreResult<T>) -> BoxFuture<'a, StoreResult<T>>
	where
		T: Send + 'a,
	{
		let result = f(&mut self.lock());

		Box::pin(future::ready(result))
	}
}

impl ExperimentStore for MemoryStore {
	fn find_experiment_by_key<'a>(
		&'a self,
		key: &'a str,
	) -> BoxFuture<'a, StoreResult<Option<Experiment>>> {
		self.with_state(|state| {
			state.enter(Operation::FindExperimentByKey)?;

			Ok(state.experiments.values().find(|experiment| experiment.key == key).cloned())
		})
	}

	fn find_experiment<'a>(
		&'a self,
		experiment_id: Uuid,
	) -> BoxFuture<'a, StoreResult<Option<Experiment>>> {
		self.with_state(|state| {
			state.enter(Operation::FindExperiment)?;

			Ok(state.experiments.get(&experiment_id).cloned())
		})
	}

	fn list_experiments<'a>(&'a self) -> BoxFuture<'a, StoreResult<Vec<Experiment>>> {
		self.with_state(|state| {
			state.enter(Operation::ListExperiments)?;

			let mut experiments = state.experiments.values().cloned().collect::<Vec<_>>();

			experiments.sort_by(|a, b| a.key.cmp(&b.key));

			Ok(experiments)
		})
	}

	fn insert_experiment<'a>(&'a self, experiment: &'a Experiment) -> BoxFuture<'a, StoreResult<()>> {
		self.with_state(|state| {
			state.enter(Operation::InsertExperiment)?;

			if state.experiments.values().any(|existing| existing.key == experiment.key) {
				return Err(StorageError::Conflict(format!(
					"Experiment key {:?} already exists.",
					experiment.key
				)));
			}

			state.experiments.insert(experiment.experiment_id, experiment.clone());

			Ok(())
		})
	}

	fn insert_experiment_if_absent<'a>(
		&'a self,
		experiment: &'a Experiment,
	) -> BoxFuture<'a, StoreResult<bool>> {
		self.with_state(|state| {
			state.enter(Operation::InsertExperiment)?;

			if state.experiments.values().any(|existing| existing.key == experiment.key) {
				return Ok(false);
			}

			state.experiments.insert(experiment.experiment_id, experiment.clone());

			Ok(true)
		})
	}

	fn update_rollout_percentage<'a>(
		&'a self,
		experiment_id: Uuid,
		rollout_percentage: i32,
		now: OffsetDateTime,
	) -> BoxFuture<'a, StoreResult<Experiment>> {
		self.with_state(|state| {
			if !(0..=100).contains(&rollout_percentage) {
				return Err(StorageError::InvalidArgument(format!(
					"rollout_percentage {rollout_percentage} is outside 0-100."
				)));
			}

			state.update(experiment_id, |experiment| {
				experiment.rollout_percentage = rollout_percentage;
				experiment.updated_at = now;
			})
		})
	}

	fn update_enabled<'a>(
		&'a self,
		experiment_id: Uuid,
		enabled: bool,
		now: OffsetDateTime,
	) -> BoxFuture<'a, StoreResult<Experiment>> {
		self.with_state(|state| {
			state.update(experiment_id, |experiment| {
				experiment.enabled = enabled;
				experiment.updated_at = now;
			})
		})
	}

	fn delete_experiment<'a>(&'a self, experiment_id: Uuid) -> BoxFuture<'a, StoreResult<bool>> {
		self.with_state(|state| {
			state.enter(Operation::DeleteExperiment)?;

			let removed = state.experiments.remove(&experiment_id).is_some();

			state.assignments.retain(|(_, id), _| *id != experiment_id);

			Ok(removed)
		})
	}

	fn find_assignment<'a>(
		&'a self,
		user_id: &'a str,
		experiment_id: Uuid,
	) -> BoxFuture<'a, StoreResult<Option<Assignment>>> {
		self.with_state(|state| {
			state.enter(Operation::FindAssignment)?;

			Ok(state.assignments.get(&(user_id.to_string(), experiment_id)).cloned())
		})
	}

	fn list_user_assignments<'a>(
		&'a self,
		user_id: &'a str,
	) -> BoxFuture<'a, StoreResult<Vec<Assignment>>> {
		self.with_state(|state| {
			state.enter(Operation::ListUserAssignments)?;

			Ok(state
				.assignments
				.values()
				.filter(|assignment| assignment.user_id == user_id)
				.cloned()
				.collect())
		})
	}

	fn insert_assignment<'a>(&'a self, assignment: &'a Assignment) -> BoxFuture<'a, StoreResult<()>> {
		self.with_state(|state| {
			state.land_racer(&assignment.user_id, assignment.experiment_id);
			state.enter(Operation::InsertAssignment)?;

			let pair = (assignment.user_id.clone(), assignment.experiment_id);

			if state.assignments.contains_key(&pair) {
				return Err(StorageError::Conflict(format!(
					"Assignment for user {:?} in experiment {} already exists.",
					assignment.user_id, assignment.experiment_id
				)));
			}

			state.assignments.insert(pair, assignment.clone());

			Ok(())
		})
	}

	fn insert_assignments<'a>(
		&'a self,
		assignments: &'a [Assignment],
	) -> BoxFuture<'a, StoreResult<u64>> {
		self.with_state(|state| {
			for assignment in assignments {
				state.land_racer(&assignment.user_id, assignment.experiment_id);
			}

			state.enter(Operation::InsertAssignments)?;

			let mut written = 0;

			for assignment in assignments {
				let pair = (assignment.user_id.clone(), assignment.experiment_id);

				if !state.assignments.contains_key(&pair) {
					state.assignments.insert(pair, assignment.clone());

					written += 1;
				}
			}

			Ok(written)
		})
	}

	fn delete_assignments<'a>(&'a self, experiment_id: Uuid) -> BoxFuture<'a, StoreResult<u64>> {
		self.with_state(|state| {
			state.enter(Operation::DeleteAssignments)?;

			let before = state.assignments.len();

			state.assignments.retain(|(_, id), _| *id != experiment_id);

			Ok((before - state.assignments.len()) as u64)
		})
	}

	fn count_assignments_by_variant<'a>(
		&'a self,
		experiment_id: Uuid,
	) -> BoxFuture<'a, StoreResult<Vec<VariantCount>>> {
		self.with_state(|state| {
			state.enter(Operation::CountAssignments)?;

			let mut counts = BTreeMap::<String, i64>::new();

			for assignment in state.assignments.values() {
				if assignment.experiment_id == experiment_id {
					*counts.entry(assignment.variant.clone()).or_default() += 1;
				}
			}

			Ok(counts
				.into_iter()
				.map(|(variant, assignment_count)| VariantCount { variant, assignment_count })
				.collect())
		})
	}
}
