use std::{collections::BTreeMap, sync::Arc};

use recsearch_config::Config;
use recsearch_query::{KeywordFields, QueryRequestBuilder, QuerySettings};

use crate::{DataSource, Error, OutputConsumer, PopulateOutcome, Result, SearchTransport};

/// Every configured data source, keyed by id.
#[derive(Debug, Default)]
pub struct SourceRegistry {
	sources: BTreeMap<String, DataSource>,
}
impl SourceRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_config(cfg: &Config, transport: Arc<dyn SearchTransport>) -> Result<Self> {
		let keywords = KeywordFields::new(cfg.backend.text_fields.iter().cloned());
		let mut registry = Self::new();

		for source in &cfg.sources {
			let settings = QuerySettings::from_config(source)?;
			let builder = QueryRequestBuilder::new(keywords.clone());
			let source = DataSource::new(
				settings,
				builder,
				transport.clone(),
				cfg.pagination.discard_stale_responses,
			)?;

			registry.insert(source)?;
		}

		tracing::info!(sources = registry.sources.len(), "Data sources registered.");

		Ok(registry)
	}

	pub fn insert(&mut self, source: DataSource) -> Result<()> {
		let id = source.id().to_string();

		if self.sources.contains_key(&id) {
			return Err(Error::Configuration {
				message: format!("Data source {id:?} is already registered."),
			});
		}

		self.sources.insert(id, source);

		Ok(())
	}

	pub fn ids(&self) -> impl Iterator<Item = &str> {
		self.sources.keys().map(String::as_str)
	}

	pub fn get(&self, id: &str) -> Result<&DataSource> {
		self.sources.get(id).ok_or_else(|| not_found(id))
	}

	pub fn get_mut(&mut self, id: &str) -> Result<&mut DataSource> {
		self.sources.get_mut(id).ok_or_else(|| not_found(id))
	}

	pub fn register_output(
		&mut self,
		source_id: &str,
		output_id: impl Into<String>,
		output: Arc<dyn OutputConsumer>,
	) -> Result<()> {
		self.get_mut(source_id)?.register_output(output_id, output);

		Ok(())
	}

	pub fn force_recount(&mut self, id: &str) -> Result<()> {
		self.get_mut(id)?.force_recount();

		Ok(())
	}

	pub async fn populate(&mut self, id: &str, force: bool) -> Result<PopulateOutcome> {
		self.get_mut(id)?.populate(force).await
	}
}

fn not_found(id: &str) -> Error {
	Error::NotFound { message: format!("Unknown data source {id:?}.") }
}
