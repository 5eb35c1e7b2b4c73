mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Association, Config, Datasource, Facet, FacetSide, Postgres, Qdrant, Service, Storage,
};

use std::{collections::HashSet, fs, path::Path};

/// Facet dimension derived from the contributing datasources of each pair. Always available and
/// therefore not configurable.
pub const DATASOURCE_DIMENSION: &str = "datasource";

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
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection.is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}

	validate_association(&cfg.association)?;

	let mut seen = HashSet::new();

	for datasource in &cfg.datasources {
		if datasource.id.is_empty() || datasource.id.chars().any(char::is_whitespace) {
			return Err(Error::Validation {
				message: "datasources.id must be non-empty and contain no whitespace.".to_string(),
			});
		}
		if !datasource.weight.is_finite() {
			return Err(Error::Validation {
				message: format!("datasources.{}.weight must be a finite number.", datasource.id),
			});
		}
		if datasource.weight < 0.0 {
			return Err(Error::Validation {
				message: format!("datasources.{}.weight must be zero or greater.", datasource.id),
			});
		}
		if !seen.insert(datasource.id.as_str()) {
			return Err(Error::Validation {
				message: format!("datasources.{} is declared more than once.", datasource.id),
			});
		}
	}

	let mut seen = HashSet::new();

	for facet in &cfg.facets {
		if facet.dimension.is_empty() {
			return Err(Error::Validation {
				message: "facets.dimension must be non-empty.".to_string(),
			});
		}
		if facet.dimension == DATASOURCE_DIMENSION {
			return Err(Error::Validation {
				message: format!("facets.dimension '{DATASOURCE_DIMENSION}' is reserved."),
			});
		}
		if !seen.insert(facet.dimension.as_str()) {
			return Err(Error::Validation {
				message: format!("facets.{} is declared more than once.", facet.dimension),
			});
		}
	}

	Ok(())
}

fn validate_association(association: &Association) -> Result<()> {
	if association.max_page_size == 0 {
		return Err(Error::Validation {
			message: "association.max_page_size must be greater than zero.".to_string(),
		});
	}
	if association.default_page_size == 0 {
		return Err(Error::Validation {
			message: "association.default_page_size must be greater than zero.".to_string(),
		});
	}
	if association.default_page_size > association.max_page_size {
		return Err(Error::Validation {
			message:
				"association.default_page_size must be less than or equal to association.max_page_size."
					.to_string(),
		});
	}
	if association.max_concurrent_fetches == 0 {
		return Err(Error::Validation {
			message: "association.max_concurrent_fetches must be greater than zero.".to_string(),
		});
	}
	if association.fetch_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "association.fetch_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if !association.rank_damping_exponent.is_finite() {
		return Err(Error::Validation {
			message: "association.rank_damping_exponent must be a finite number.".to_string(),
		});
	}
	if association.rank_damping_exponent < 0.0 {
		return Err(Error::Validation {
			message: "association.rank_damping_exponent must be zero or greater.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.storage.qdrant.collection = cfg.storage.qdrant.collection.trim().to_string();

	for datasource in &mut cfg.datasources {
		datasource.id = datasource.id.trim().to_string();
	}
	for facet in &mut cfg.facets {
		facet.dimension = facet.dimension.trim().to_string();
	}
}
