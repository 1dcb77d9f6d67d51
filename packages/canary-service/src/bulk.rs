use std::collections::{BTreeMap, HashMap};

use time::OffsetDateTime;

use crate::CanaryService;
use canary_domain::{CONTROL, Gate, bucket, gate, rollout_variant};
use canary_storage::models::Assignment;

impl CanaryService {
	/// Resolves every experiment for one user with two reads and at most one batched write.
	///
	/// Conflicts in the batch are skipped by the store and not re-read, so a user racing a
	/// concurrent evaluation may see a variant here that differs from the stored one. Every later
	/// call returns the stored one.
	pub async fn get_all_variants(&self, user_id: &str) -> BTreeMap<String, String> {
		if user_id.trim().is_empty() {
			return BTreeMap::new();
		}

		let experiments = match self.store.list_experiments().await {
			Ok(experiments) => experiments,
			Err(err) => {
				tracing::warn!(error = %err, user_id, "Experiment listing failed. Serving defaults.");

				return BTreeMap::new();
			},
		};
		let mut existing: HashMap<_, _> = match self.store.list_user_assignments(user_id).await {
			Ok(assignments) => assignments
				.into_iter()
				.map(|assignment| (assignment.experiment_id, assignment.variant))
				.collect(),
			Err(err) => {
				tracing::warn!(error = %err, user_id, "Assignment listing failed. Serving defaults.");

				return BTreeMap::new();
			},
		};
		let now = OffsetDateTime::now_utc();
		let mut variants = BTreeMap::new();
		let mut fresh = Vec::new();

		for experiment in experiments {
			let variant = match gate(experiment.enabled, experiment.rollout_percentage) {
				Gate::Bucketed { rollout_percentage } =>
					match existing.remove(&experiment.experiment_id) {
						Some(variant) => variant,
						None => {
							let variant = rollout_variant(
								bucket(user_id, &experiment.key),
								rollout_percentage,
							)
							.to_string();

							fresh.push(Assignment {
								user_id: user_id.to_string(),
								experiment_id: experiment.experiment_id,
								variant: variant.clone(),
								assigned_at: now,
							});

							variant
						},
					},
				short_circuit => short_circuit.short_circuit().unwrap_or(CONTROL).to_string(),
			};

			variants.insert(experiment.key, variant);
		}

		if !fresh.is_empty() {
			match self.store.insert_assignments(&fresh).await {
				Ok(written) => tracing::debug!(
					user_id,
					computed = fresh.len(),
					written,
					"Bulk assignments stored."
				),
				Err(err) => tracing::warn!(
					error = %err,
					user_id,
					computed = fresh.len(),
					"Bulk assignment write failed. Serving computed variants unpersisted."
				),
			}
		}

		variants
	}
}
