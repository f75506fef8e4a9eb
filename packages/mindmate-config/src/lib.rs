mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Chat, Config, Consolidation, LlmProviderConfig, Postgres, Providers, Service, Storage,
};

use std::{fs, path::Path};

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
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}

	let llm = &cfg.providers.llm;

	if llm.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider llm api_key must be non-empty.".to_string(),
		});
	}
	if llm.model.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.llm.model must be non-empty.".to_string(),
		});
	}
	if !llm.temperature.is_finite() {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be a finite number.".to_string(),
		});
	}
	if !(0.0..=2.0).contains(&llm.temperature) {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be in the range 0.0-2.0.".to_string(),
		});
	}
	if llm.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.llm.timeout_ms must be greater than zero.".to_string(),
		});
	}

	for (key, value) in &llm.default_headers {
		if !value.is_string() {
			return Err(Error::Validation {
				message: format!("providers.llm.default_headers.{key} must be a string."),
			});
		}
	}

	let consolidation = &cfg.consolidation;

	if consolidation.trigger_every == 0 {
		return Err(Error::Validation {
			message: "consolidation.trigger_every must be greater than zero.".to_string(),
		});
	}
	if consolidation.batch_limit == 0 {
		return Err(Error::Validation {
			message: "consolidation.batch_limit must be greater than zero.".to_string(),
		});
	}
	if consolidation.max_attempts == 0 {
		return Err(Error::Validation {
			message: "consolidation.max_attempts must be greater than zero.".to_string(),
		});
	}
	if consolidation.count_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "consolidation.count_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.chat.recent_turns == 0 {
		return Err(Error::Validation {
			message: "chat.recent_turns must be greater than zero.".to_string(),
		});
	}
	if cfg.chat.max_message_chars == 0 {
		return Err(Error::Validation {
			message: "chat.max_message_chars must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	let trimmed = cfg.providers.llm.api_base.trim().trim_end_matches('/').to_string();

	cfg.providers.llm.api_base = trimmed;

	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}
}
