use std::sync::Arc;

use recsearch_query::{
	Bounds, Filter, QueryRequestBuilder, QuerySettings, RowFilter, SearchResponse, SortField,
};

use crate::{
	Error, OutputConsumer, Result, SearchTransport,
	pagination::{
		Applied, PageDirection, PageMove, PaginationCoordinator, PendingRequest, Prepared,
		SourceState,
	},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulateOutcome {
	/// No linked output wanted data.
	Skipped,
	/// Same request as last time; nothing was sent.
	Deduplicated,
	Populated { rows: usize },
	/// The response arrived after a newer request was issued and was dropped.
	Superseded,
	/// The requested composite page was empty; the previous page stays on screen.
	PastLastPage,
}

/// One data source: its query settings, paging state and the outputs it feeds.
pub struct DataSource {
	settings: QuerySettings,
	coordinator: PaginationCoordinator,
	outputs: Vec<(String, Arc<dyn OutputConsumer>)>,
	transport: Arc<dyn SearchTransport>,
}
impl DataSource {
	pub fn new(
		settings: QuerySettings,
		builder: QueryRequestBuilder,
		transport: Arc<dyn SearchTransport>,
		discard_stale: bool,
	) -> Result<Self> {
		settings.validate()?;

		Ok(Self {
			settings,
			coordinator: PaginationCoordinator::new(builder, discard_stale),
			outputs: Vec::new(),
			transport,
		})
	}

	pub fn id(&self) -> &str {
		&self.settings.id
	}

	pub fn settings(&self) -> &QuerySettings {
		&self.settings
	}

	/// Direct access for changes the dedicated setters do not cover. Paging resets on its own
	/// when the filter or sort differ at the next populate.
	pub fn settings_mut(&mut self) -> &mut QuerySettings {
		&mut self.settings
	}

	pub fn coordinator(&self) -> &PaginationCoordinator {
		&self.coordinator
	}

	pub fn state(&self) -> SourceState {
		self.coordinator.state()
	}

	pub fn register_output(&mut self, output_id: impl Into<String>, output: Arc<dyn OutputConsumer>) {
		let output_id = output_id.into();

		self.outputs.retain(|(id, _)| id != &output_id);
		self.outputs.push((output_id, output));
	}

	pub fn set_sort(&mut self, sort: Vec<SortField>) {
		self.settings.sort = sort;
		self.reset_paging();
	}

	pub fn set_filter(&mut self, filter: Filter) {
		self.settings.filter = filter;
		self.reset_paging();
	}

	pub fn set_row_filter(&mut self, row_filter: Option<RowFilter>) {
		self.settings.filter.row_filter = row_filter;
		self.reset_paging();
	}

	pub fn set_bounds(&mut self, bounds: Option<Bounds>) {
		self.settings.filter.bounds = bounds;
		self.reset_paging();
	}

	pub fn force_recount(&mut self) {
		self.coordinator.force_recount();
	}

	pub fn advance_page(&mut self, direction: PageDirection) -> PageMove {
		self.coordinator.advance_page(&mut self.settings, direction)
	}

	/// Moves one page and fetches it. A refused move issues no request.
	pub async fn turn_page(&mut self, direction: PageDirection) -> Result<Option<PopulateOutcome>> {
		match self.advance_page(direction) {
			PageMove::Moved => self.populate(false).await.map(Some),
			PageMove::Refused => Ok(None),
		}
	}

	pub async fn populate(&mut self, force: bool) -> Result<PopulateOutcome> {
		self.populate_outputs(force, None).await
	}

	/// Populates a single linked output instead of all of them.
	pub async fn populate_for(&mut self, force: bool, output_id: &str) -> Result<PopulateOutcome> {
		if !self.outputs.iter().any(|(id, _)| id == output_id) {
			return Err(Error::NotFound {
				message: format!("Output {output_id:?} is not linked to source {:?}.", self.id()),
			});
		}

		self.populate_outputs(force, Some(output_id)).await
	}

	/// First half of a populate: build and register the request without awaiting it. Several
	/// requests may be outstanding at once; finish each with [`DataSource::finish_populate`].
	pub fn begin_populate(&mut self, force: bool) -> Result<Option<PendingRequest>> {
		self.prepare(force, None)
	}

	/// Second half of a populate: apply the transport result and feed the outputs.
	pub fn finish_populate(
		&mut self,
		pending: &PendingRequest,
		result: Result<SearchResponse>,
	) -> Result<PopulateOutcome> {
		self.finish(pending, result, None)
	}

	async fn populate_outputs(
		&mut self,
		force: bool,
		only_for: Option<&str>,
	) -> Result<PopulateOutcome> {
		let source_id = self.settings.id.clone();
		let needs_population = self
			.targets(only_for)
			.any(|(_, output)| output.needs_population(&source_id));

		if !needs_population {
			return Ok(PopulateOutcome::Skipped);
		}

		let Some(pending) = self.prepare(force, only_for)? else {
			return Ok(PopulateOutcome::Deduplicated);
		};
		let transport = self.transport.clone();
		let result = transport.search(&pending.body, pending.filter_path.as_deref()).await;

		self.finish(&pending, result, only_for)
	}

	fn prepare(&mut self, force: bool, only_for: Option<&str>) -> Result<Option<PendingRequest>> {
		match self.coordinator.prepare_request(&mut self.settings, force)? {
			Prepared::Duplicate => {
				self.notify_loading_finished(only_for);

				Ok(None)
			},
			Prepared::Issue(pending) => {
				tracing::info!(
					source_id = %self.settings.id,
					mode = %self.settings.mode,
					generation = pending.generation,
					from = self.settings.from,
					page = self.settings.page,
					includes_count = pending.includes_count,
					"Issuing search request."
				);

				Ok(Some(pending))
			},
		}
	}

	fn finish(
		&mut self,
		pending: &PendingRequest,
		result: Result<SearchResponse>,
		only_for: Option<&str>,
	) -> Result<PopulateOutcome> {
		let applied = self.coordinator.apply_response(&mut self.settings, pending, result);
		let outcome = match applied {
			Ok(Applied::Render(response)) => {
				for (_, output) in self.targets(only_for) {
					output.populate(&self.settings, response.raw(), &pending.body);
				}

				Ok(PopulateOutcome::Populated { rows: self.coordinator.rendered_rows() })
			},
			Ok(Applied::Superseded) => Ok(PopulateOutcome::Superseded),
			Ok(Applied::PastLastPage) => Ok(PopulateOutcome::PastLastPage),
			Err(err) => {
				tracing::warn!(
					source_id = %self.settings.id,
					generation = pending.generation,
					error = %err,
					"Search request failed; keeping previous results."
				);

				Err(err)
			},
		};

		self.notify_loading_finished(only_for);

		outcome
	}

	fn targets<'a>(
		&'a self,
		only_for: Option<&'a str>,
	) -> impl Iterator<Item = &'a (String, Arc<dyn OutputConsumer>)> + 'a {
		self.outputs.iter().filter(move |(id, _)| only_for.is_none_or(|only| only == id.as_str()))
	}

	fn notify_loading_finished(&self, only_for: Option<&str>) {
		for (_, output) in self.targets(only_for) {
			output.loading_finished();
		}
	}

	fn reset_paging(&mut self) {
		self.settings.from = 0;
		self.settings.page = 0;
		self.settings.after_key = None;
		self.settings.page_after_keys.clear();
	}
}

impl std::fmt::Debug for DataSource {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DataSource")
			.field("settings", &self.settings)
			.field("coordinator", &self.coordinator)
			.field("outputs", &self.outputs.iter().map(|(id, _)| id).collect::<Vec<_>>())
			.finish()
	}
}
