use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Experiment {
	pub experiment_id: Uuid,
	pub key: String,
	pub description: String,
	pub enabled: bool,
	pub rollout_percentage: i32,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Assignment {
	pub user_id: String,
	pub experiment_id: Uuid,
	pub variant: String,
	pub assigned_at: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct VariantCount {
	pub variant: String,
	pub assignment_count: i64,
}
