use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub security: Security,
	#[serde(default)]
	pub experiments: Experiments,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Security {
	pub bind_localhost_only: bool,
	/// Optional. When set, admin routes require `Authorization: Bearer <token>`.
	pub admin_auth_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Experiments {
	/// Definitions inserted at startup when their key does not exist yet.
	#[serde(default)]
	pub seed: Vec<ExperimentSeed>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ExperimentSeed {
	pub key: String,
	#[serde(default)]
	pub description: String,
	#[serde(default = "default_seed_enabled")]
	pub enabled: bool,
	pub rollout_percentage: i32,
}

fn default_seed_enabled() -> bool {
	true
}
