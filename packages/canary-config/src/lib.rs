mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Config, ExperimentSeed, Experiments, Postgres, Security, Service, Storage};

use std::{collections::HashSet, fs, path::Path};

use canary_domain::experiment_key;

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	for (label, value) in [
		("service.http_bind", &cfg.service.http_bind),
		("service.admin_bind", &cfg.service.admin_bind),
		("service.log_level", &cfg.service.log_level),
		("storage.postgres.dsn", &cfg.storage.postgres.dsn),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}

	let mut seen = HashSet::new();

	for seed in &cfg.experiments.seed {
		if let Err(err) = experiment_key::validate_key(&seed.key) {
			return Err(Error::Validation {
				message: format!("experiments.seed key {:?} is invalid: {err}.", seed.key),
			});
		}
		if !seen.insert(seed.key.as_str()) {
			return Err(Error::Validation {
				message: format!("experiments.seed key {:?} is duplicated.", seed.key),
			});
		}
		if !(0..=100).contains(&seed.rollout_percentage) {
			return Err(Error::Validation {
				message: format!(
					"experiments.seed {:?} rollout_percentage must be in the range 0-100.",
					seed.key
				),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg
		.security
		.admin_auth_token
		.as_deref()
		.map(|token| token.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.security.admin_auth_token = None;
	}

	for seed in &mut cfg.experiments.seed {
		seed.key = seed.key.trim().to_string();
	}
}
