pub mod pagination;
pub mod registry;
pub mod source;

mod error;

pub use error::{Error, Result};
pub use pagination::{
	Applied, PageDirection, PageMove, PaginationCoordinator, PendingRequest, Prepared, SourceState,
};
pub use registry::SourceRegistry;
pub use source::{DataSource, PopulateOutcome};

use std::{future::Future, pin::Pin};

use serde_json::Value;

use recsearch_query::{QuerySettings, SearchResponse};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Sends a built request body to the search proxy.
pub trait SearchTransport
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		body: &'a Value,
		filter_path: Option<&'a str>,
	) -> BoxFuture<'a, Result<SearchResponse>>;
}

/// A grid, map, chart or report fed by a data source.
pub trait OutputConsumer
where
	Self: Send + Sync,
{
	/// Receives the raw response along with the settings and body that produced it.
	fn populate(&self, settings: &QuerySettings, response: &Value, request: &Value);

	/// Outputs hidden from view may decline; a source with no willing output sends nothing.
	fn needs_population(&self, _source_id: &str) -> bool {
		true
	}

	fn loading_finished(&self) {}
}

pub struct HttpTransport {
	backend: recsearch_config::Backend,
}
impl HttpTransport {
	pub fn new(backend: recsearch_config::Backend) -> Self {
		Self { backend }
	}
}

impl SearchTransport for HttpTransport {
	fn search<'a>(
		&'a self,
		body: &'a Value,
		filter_path: Option<&'a str>,
	) -> BoxFuture<'a, Result<SearchResponse>> {
		Box::pin(async move {
			recsearch_providers::search::search(&self.backend, filter_path, body)
				.await
				.map_err(Error::from)
		})
	}
}
