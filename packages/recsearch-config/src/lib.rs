mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Backend, Config, Pagination, Service, SortConfig, SourceConfig};

use std::{collections::HashSet, fs, path::Path};

/// Prefix reserved for aggregation names generated by the query builder.
pub const RESERVED_AGGREGATION_PREFIX: char = '_';

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
	if cfg.backend.api_base.trim().is_empty() {
		return Err(Error::Validation { message: "backend.api_base must be non-empty.".to_string() });
	}
	if cfg.backend.path.trim().is_empty() {
		return Err(Error::Validation { message: "backend.path must be non-empty.".to_string() });
	}
	if cfg.backend.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "backend.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if !matches!(cfg.backend.es_version, 6 | 7) {
		return Err(Error::Validation {
			message: "backend.es_version must be one of 6 or 7.".to_string(),
		});
	}

	for (key, value) in &cfg.backend.default_headers {
		if !value.is_string() {
			return Err(Error::Validation {
				message: format!("backend.default_headers.{key} must be a string."),
			});
		}
	}

	let mut seen = HashSet::new();

	for source in &cfg.sources {
		validate_source(source)?;

		if !seen.insert(source.id.as_str()) {
			return Err(Error::DuplicateSource { id: source.id.clone() });
		}
	}

	Ok(())
}

pub fn validate_source(source: &SourceConfig) -> Result<()> {
	if source.id.trim().is_empty() {
		return Err(Error::Validation { message: "sources.id must be non-empty.".to_string() });
	}

	let label = format!("sources.{}", source.id);

	if !matches!(source.mode.as_str(), "docs" | "compositeAggregation" | "termAggregation") {
		return Err(Error::Validation {
			message: format!(
				"{label}.mode must be one of docs, compositeAggregation, or termAggregation."
			),
		});
	}
	if source.unique_field.trim().is_empty() {
		return Err(Error::Validation {
			message: format!("{label}.unique_field must be non-empty."),
		});
	}
	if source.fields.iter().any(|field| field.trim().is_empty()) {
		return Err(Error::Validation {
			message: format!("{label}.fields must not contain blank entries."),
		});
	}
	if source.size == Some(0) {
		return Err(Error::Validation {
			message: format!("{label}.size must be greater than zero."),
		});
	}
	if source.aggregation_size == Some(0) {
		return Err(Error::Validation {
			message: format!("{label}.aggregation_size must be greater than zero."),
		});
	}

	for sort in &source.sort {
		if sort.field.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("{label}.sort.field must be non-empty."),
			});
		}
		if !matches!(sort.direction.as_str(), "asc" | "desc") {
			return Err(Error::Validation {
				message: format!("{label}.sort.direction must be one of asc or desc."),
			});
		}
	}
	for (name, body) in &source.aggregation {
		if name.starts_with(RESERVED_AGGREGATION_PREFIX) {
			return Err(Error::Validation {
				message: format!(
					"{label}.aggregation.{name} uses the reserved prefix '{RESERVED_AGGREGATION_PREFIX}'."
				),
			});
		}
		if !body.is_object() {
			return Err(Error::Validation {
				message: format!("{label}.aggregation.{name} must be a table."),
			});
		}
	}
	for (name, body) in &source.sort_aggregation {
		if !body.is_object() {
			return Err(Error::Validation {
				message: format!("{label}.sort_aggregation.{name} must be a table."),
			});
		}
	}

	if let Some(filter) = source.filter.as_ref()
		&& !filter.is_object()
	{
		return Err(Error::Validation { message: format!("{label}.filter must be a table.") });
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.backend.api_key.as_deref().map(|key| key.trim().is_empty()).unwrap_or(false) {
		cfg.backend.api_key = None;
	}

	cfg.backend.api_base = cfg.backend.api_base.trim_end_matches('/').to_string();

	for source in &mut cfg.sources {
		if source.filter_path.as_deref().map(|path| path.trim().is_empty()).unwrap_or(false) {
			source.filter_path = None;
		}
	}
}
