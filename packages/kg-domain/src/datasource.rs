use std::collections::BTreeMap;

use crate::{DatasourceId, Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct DatasourceSetting {
	pub id: DatasourceId,
	pub weight: f64,
	pub required: bool,
}
impl DatasourceSetting {
	pub fn new(id: DatasourceId, weight: f64, required: bool) -> Result<Self> {
		if !weight.is_finite() || weight < 0.0 {
			return Err(Error::validation(format!(
				"datasource '{id}' weight must be a finite number, zero or greater."
			)));
		}

		Ok(Self { id, weight, required })
	}

	/// A required datasource with zero weight never contributes, so it cannot exclude pairs.
	pub fn is_effectively_required(&self) -> bool {
		self.required && self.weight > 0.0
	}
}

/// Datasource settings keyed by id. Iteration is ordered by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedWeights {
	settings: BTreeMap<DatasourceId, DatasourceSetting>,
}
impl ResolvedWeights {
	pub fn from_settings(settings: impl IntoIterator<Item = DatasourceSetting>) -> Self {
		let settings = settings.into_iter().map(|setting| (setting.id.clone(), setting)).collect();

		Self { settings }
	}

	pub fn from_config(datasources: &[kg_config::Datasource]) -> Result<Self> {
		let mut settings = Vec::with_capacity(datasources.len());

		for datasource in datasources {
			settings.push(DatasourceSetting::new(
				DatasourceId::parse(&datasource.id)?,
				datasource.weight,
				datasource.required,
			)?);
		}

		Ok(Self::from_settings(settings))
	}

	/// Unknown ids weigh 0.
	pub fn weight(&self, id: &DatasourceId) -> f64 {
		self.settings.get(id).map(|setting| setting.weight).unwrap_or(0.0)
	}

	/// Datasources worth fetching: anything that can contribute.
	pub fn contributing(&self) -> impl Iterator<Item = &DatasourceSetting> {
		self.settings.values().filter(|setting| setting.weight > 0.0)
	}

	pub fn required(&self) -> impl Iterator<Item = &DatasourceSetting> {
		self.settings.values().filter(|setting| setting.is_effectively_required())
	}

	pub fn len(&self) -> usize {
		self.settings.len()
	}

	pub fn is_empty(&self) -> bool {
		self.settings.is_empty()
	}
}

/// Applies request-level datasource settings on top of the configured defaults.
///
/// A requested setting replaces the default for the same id as a whole; weight and required are
/// never merged field by field. When the same id is requested twice the later entry wins.
pub fn resolve(
	requested: Option<&[DatasourceSetting]>,
	defaults: &ResolvedWeights,
) -> ResolvedWeights {
	let Some(requested) = requested else {
		return defaults.clone();
	};
	let mut settings = defaults.settings.clone();

	for setting in requested {
		settings.insert(setting.id.clone(), setting.clone());
	}

	ResolvedWeights { settings }
}
