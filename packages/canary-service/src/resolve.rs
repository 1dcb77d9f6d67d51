//! Per-experiment resolution.
//!
//! Resolution never fails from the caller's point of view. Anything that goes wrong on the way
//! to a decision resolves to the control variant so that the page gated by the flag still
//! renders.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::CanaryService;
use canary_domain::{CONTROL, Gate, TREATMENT, bucket, gate, rollout_variant};
use canary_storage::{Error as StorageError, models::Assignment};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
	InvalidInput,
	NotFound,
	Disabled,
	FullyRolledOut,
	NotRolledOut,
	ExistingAssignment,
	NewAssignment,
	/// Another evaluator stored the assignment first; its variant is returned.
	ConflictWinner,
	/// The variant was computed but could not be stored.
	Unpersisted,
	StorageError,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
	pub experiment_key: String,
	pub variant: String,
	pub reason: Reason,
}
impl Evaluation {
	fn new(experiment_key: &str, variant: impl Into<String>, reason: Reason) -> Self {
		Self { experiment_key: experiment_key.to_string(), variant: variant.into(), reason }
	}
}

impl CanaryService {
	pub async fn get_variant(&self, user_id: &str, experiment_key: &str) -> String {
		self.evaluate(user_id, experiment_key).await.variant
	}

	/// Yes/no form of [`CanaryService::get_variant`] for gated pages.
	pub async fn is_feature_enabled(&self, user_id: &str, flag_key: &str) -> bool {
		self.get_variant(user_id, flag_key).await == TREATMENT
	}

	pub async fn evaluate(&self, user_id: &str, experiment_key: &str) -> Evaluation {
		let evaluation = self.evaluate_inner(user_id, experiment_key).await;

		tracing::debug!(
			user_id,
			experiment_key,
			variant = evaluation.variant.as_str(),
			reason = ?evaluation.reason,
			"Experiment evaluated."
		);

		evaluation
	}

	async fn evaluate_inner(&self, user_id: &str, experiment_key: &str) -> Evaluation {
		if user_id.trim().is_empty() || experiment_key.trim().is_empty() {
			return Evaluation::new(experiment_key, CONTROL, Reason::InvalidInput);
		}

		let experiment = match self.store.find_experiment_by_key(experiment_key).await {
			Ok(Some(experiment)) => experiment,
			Ok(None) => return Evaluation::new(experiment_key, CONTROL, Reason::NotFound),
			Err(err) => {
				tracing::warn!(
					error = %err,
					experiment_key,
					"Experiment lookup failed. Serving control."
				);

				return Evaluation::new(experiment_key, CONTROL, Reason::StorageError);
			},
		};
		let rollout_percentage = match gate(experiment.enabled, experiment.rollout_percentage) {
			Gate::Disabled => return Evaluation::new(experiment_key, CONTROL, Reason::Disabled),
			Gate::FullyRolledOut =>
				return Evaluation::new(experiment_key, TREATMENT, Reason::FullyRolledOut),
			Gate::NotRolledOut =>
				return Evaluation::new(experiment_key, CONTROL, Reason::NotRolledOut),
			Gate::Bucketed { rollout_percentage } => rollout_percentage,
		};

		match self.store.find_assignment(user_id, experiment.experiment_id).await {
			Ok(Some(existing)) =>
				return Evaluation::new(experiment_key, existing.variant, Reason::ExistingAssignment),
			Ok(None) => {},
			Err(err) => {
				tracing::warn!(
					error = %err,
					user_id,
					experiment_key,
					"Assignment lookup failed. Serving control."
				);

				return Evaluation::new(experiment_key, CONTROL, Reason::StorageError);
			},
		}

		let variant = rollout_variant(bucket(user_id, experiment_key), rollout_percentage);
		let assignment = Assignment {
			user_id: user_id.to_string(),
			experiment_id: experiment.experiment_id,
			variant: variant.to_string(),
			assigned_at: OffsetDateTime::now_utc(),
		};

		match self.store.insert_assignment(&assignment).await {
			Ok(()) => Evaluation::new(experiment_key, variant, Reason::NewAssignment),
			Err(StorageError::Conflict(_)) => {
				// One re-read settles the race; the first committed insert is authoritative.
				match self.store.find_assignment(user_id, experiment.experiment_id).await {
					Ok(Some(winner)) =>
						Evaluation::new(experiment_key, winner.variant, Reason::ConflictWinner),
					Ok(None) => Evaluation::new(experiment_key, variant, Reason::Unpersisted),
					Err(err) => {
						tracing::warn!(
							error = %err,
							user_id,
							experiment_key,
							"Assignment re-read after conflict failed. Serving the computed variant."
						);

						Evaluation::new(experiment_key, variant, Reason::Unpersisted)
					},
				}
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					user_id,
					experiment_key,
					variant,
					"Assignment write failed. Serving the computed variant unpersisted."
				);

				Evaluation::new(experiment_key, variant, Reason::Unpersisted)
			},
		}
	}
}
