use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{CanaryService, Error, Result};
use canary_domain::{experiment_key, normalize_percentage};
use canary_storage::models::{Experiment, VariantCount};

#[derive(Clone, Debug, Serialize)]
pub struct ExperimentRecord {
	pub experiment_id: Uuid,
	pub key: String,
	pub description: String,
	pub enabled: bool,
	pub rollout_percentage: i32,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
}
impl From<Experiment> for ExperimentRecord {
	fn from(experiment: Experiment) -> Self {
		Self {
			experiment_id: experiment.experiment_id,
			key: experiment.key,
			description: experiment.description,
			enabled: experiment.enabled,
			rollout_percentage: experiment.rollout_percentage,
			created_at: experiment.created_at,
			updated_at: experiment.updated_at,
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateExperimentRequest {
	pub key: String,
	#[serde(default)]
	pub description: String,
	#[serde(default = "default_enabled")]
	pub enabled: bool,
	pub rollout_percentage: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResetReport {
	pub experiment_id: Uuid,
	pub deleted_count: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeleteExperimentResponse {
	pub experiment_id: Uuid,
	pub key: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariantCountRecord {
	pub variant: String,
	pub assignment_count: i64,
}
impl From<VariantCount> for VariantCountRecord {
	fn from(count: VariantCount) -> Self {
		Self { variant: count.variant, assignment_count: count.assignment_count }
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct ExperimentStats {
	pub experiment: ExperimentRecord,
	pub total_assignments: i64,
	pub assignments: Vec<VariantCountRecord>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SeedReport {
	pub inserted: Vec<String>,
	pub skipped: Vec<String>,
}

impl CanaryService {
	pub async fn create_experiment(&self, req: CreateExperimentRequest) -> Result<ExperimentRecord> {
		let key = req.key.trim();

		experiment_key::validate_key(key)
			.map_err(|err| Error::InvalidRequest { message: format!("{err}.") })?;

		let rollout_percentage = checked_percentage(req.rollout_percentage)?;
		let now = OffsetDateTime::now_utc();
		let experiment = Experiment {
			experiment_id: Uuid::new_v4(),
			key: key.to_string(),
			description: req.description.trim().to_string(),
			enabled: req.enabled,
			rollout_percentage,
			created_at: now,
			updated_at: now,
		};

		self.store.insert_experiment(&experiment).await?;

		tracing::info!(
			experiment_id = %experiment.experiment_id,
			experiment_key = experiment.key.as_str(),
			enabled = experiment.enabled,
			rollout_percentage,
			"Experiment created."
		);

		Ok(experiment.into())
	}

	pub async fn list_experiments(&self) -> Result<Vec<ExperimentRecord>> {
		let experiments = self.store.list_experiments().await?;

		Ok(experiments.into_iter().map(ExperimentRecord::from).collect())
	}

	/// Existing assignments keep their variant; only fresh users see the new percentage.
	pub async fn update_rollout_percentage(
		&self,
		experiment_id: Uuid,
		percentage: f64,
	) -> Result<ExperimentRecord> {
		let rollout_percentage = checked_percentage(percentage)?;
		let experiment = self
			.store
			.update_rollout_percentage(experiment_id, rollout_percentage, OffsetDateTime::now_utc())
			.await?;

		tracing::info!(
			%experiment_id,
			experiment_key = experiment.key.as_str(),
			rollout_percentage,
			"Experiment rollout updated."
		);

		Ok(experiment.into())
	}

	/// Disabling leaves assignment rows in place; they are ignored while the flag is off.
	pub async fn toggle_feature_flag(
		&self,
		experiment_id: Uuid,
		enabled: bool,
	) -> Result<ExperimentRecord> {
		let experiment =
			self.store.update_enabled(experiment_id, enabled, OffsetDateTime::now_utc()).await?;

		tracing::info!(
			%experiment_id,
			experiment_key = experiment.key.as_str(),
			enabled,
			"Experiment toggled."
		);

		Ok(experiment.into())
	}

	/// Forces the whole population to be bucketed again on next evaluation.
	pub async fn reset_assignments(&self, experiment_id: Uuid) -> Result<ResetReport> {
		let experiment = self.require_experiment(experiment_id).await?;
		let deleted_count = self.store.delete_assignments(experiment_id).await?;

		tracing::info!(
			%experiment_id,
			experiment_key = experiment.key.as_str(),
			deleted_count,
			"Experiment assignments reset."
		);

		Ok(ResetReport { experiment_id, deleted_count })
	}

	pub async fn experiment_stats(&self, experiment_id: Uuid) -> Result<ExperimentStats> {
		let experiment = self.require_experiment(experiment_id).await?;
		let assignments: Vec<VariantCountRecord> = self
			.store
			.count_assignments_by_variant(experiment_id)
			.await?
			.into_iter()
			.map(VariantCountRecord::from)
			.collect();
		let total_assignments = assignments.iter().map(|count| count.assignment_count).sum();

		Ok(ExperimentStats { experiment: experiment.into(), total_assignments, assignments })
	}

	pub async fn delete_experiment(&self, experiment_id: Uuid) -> Result<DeleteExperimentResponse> {
		let experiment = self.require_experiment(experiment_id).await?;

		if !self.store.delete_experiment(experiment_id).await? {
			return Err(Error::NotFound { message: format!("Experiment {experiment_id} not found.") });
		}

		tracing::info!(%experiment_id, experiment_key = experiment.key.as_str(), "Experiment deleted.");

		Ok(DeleteExperimentResponse { experiment_id, key: experiment.key })
	}

	/// Inserts configured seed experiments whose key is not taken yet. Existing definitions are
	/// never overwritten, so operator edits survive restarts.
	pub async fn seed_experiments(&self) -> Result<SeedReport> {
		let mut report = SeedReport::default();

		for seed in &self.cfg.experiments.seed {
			let now = OffsetDateTime::now_utc();
			let experiment = Experiment {
				experiment_id: Uuid::new_v4(),
				key: seed.key.clone(),
				description: seed.description.clone(),
				enabled: seed.enabled,
				rollout_percentage: seed.rollout_percentage,
				created_at: now,
				updated_at: now,
			};

			if self.store.insert_experiment_if_absent(&experiment).await? {
				report.inserted.push(experiment.key);
			} else {
				report.skipped.push(experiment.key);
			}
		}

		tracing::info!(
			inserted = report.inserted.len(),
			skipped = report.skipped.len(),
			"Seed experiments applied."
		);

		Ok(report)
	}

	async fn require_experiment(&self, experiment_id: Uuid) -> Result<Experiment> {
		self.store
			.find_experiment(experiment_id)
			.await?
			.ok_or_else(|| Error::NotFound { message: format!("Experiment {experiment_id} not found.") })
	}
}

fn checked_percentage(value: f64) -> Result<i32> {
	normalize_percentage(value).ok_or_else(|| Error::InvalidRequest {
		message: "rollout_percentage must be a finite number.".to_string(),
	})
}

fn default_enabled() -> bool {
	true
}
