use serde_json::Value;

use recsearch_query::{
	COUNT_AGG, Mode, QueryRequestBuilder, QuerySettings, RequestSnapshot, SearchResponse,
};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
	Idle,
	/// One or more requests are in flight. New requests may still be issued.
	Loading,
	Populated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
	Forward,
	Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMove {
	Moved,
	/// Nothing to move to; settings are unchanged.
	Refused,
}

/// A request the coordinator has committed to sending.
#[derive(Debug, Clone)]
pub struct PendingRequest {
	pub generation: u64,
	pub body: Value,
	pub filter_path: Option<String>,
	pub includes_count: bool,
}

#[derive(Debug, Clone)]
pub enum Prepared {
	/// Identical to the last request sent; no I/O needed.
	Duplicate,
	Issue(PendingRequest),
}

#[derive(Debug, Clone)]
pub enum Applied {
	/// Hand the response to the outputs.
	Render(SearchResponse),
	/// A newer request was issued after this one; the response was dropped.
	Superseded,
	/// A composite page past the end came back empty; paging was rolled back.
	PastLastPage,
}

/// Paging and request de-duplication for one data source.
#[derive(Debug)]
pub struct PaginationCoordinator {
	builder: QueryRequestBuilder,
	last_request: Option<RequestSnapshot>,
	paging_basis: Option<RequestSnapshot>,
	state: SourceState,
	populated_once: bool,
	in_flight: usize,
	issued: u64,
	/// Whether the newest issued request carries the count aggregation.
	latest_counted: bool,
	discard_stale: bool,
	rendered_rows: usize,
	has_next: bool,
}
impl PaginationCoordinator {
	pub fn new(builder: QueryRequestBuilder, discard_stale: bool) -> Self {
		Self {
			builder,
			last_request: None,
			paging_basis: None,
			state: SourceState::Idle,
			populated_once: false,
			in_flight: 0,
			issued: 0,
			latest_counted: false,
			discard_stale,
			rendered_rows: 0,
			has_next: false,
		}
	}

	pub fn state(&self) -> SourceState {
		self.state
	}

	pub fn rendered_rows(&self) -> usize {
		self.rendered_rows
	}

	/// Whether the last response suggests a further page exists.
	pub fn has_next_page(&self) -> bool {
		self.has_next
	}

	pub fn in_flight(&self) -> usize {
		self.in_flight
	}

	/// Makes the next aggregation request carry a count, for changes the filter cannot show,
	/// such as a bulk status update.
	pub fn force_recount(&mut self) {
		self.builder.force_recount();
	}

	/// Builds the request for the current settings and decides whether it must be sent.
	pub fn prepare_request(
		&mut self,
		settings: &mut QuerySettings,
		force: bool,
	) -> Result<Prepared> {
		self.reset_paging_if_basis_changed(settings)?;

		let built = self.builder.build_request(settings)?;
		let key = dedup_key(&built.body, settings.filter_path.as_deref())?;

		if !force && !built.includes_count && self.last_request.as_ref() == Some(&key) {
			tracing::debug!(
				source_id = %settings.id,
				request_key_prefix = key.prefix(),
				"Skipping duplicate request."
			);

			return Ok(Prepared::Duplicate);
		}

		self.issued += 1;
		self.latest_counted = built.includes_count;
		self.in_flight += 1;
		self.state = SourceState::Loading;
		self.last_request = Some(key);

		Ok(Prepared::Issue(PendingRequest {
			generation: self.issued,
			body: built.body,
			filter_path: settings.filter_path.clone(),
			includes_count: built.includes_count,
		}))
	}

	/// Folds a response (or failure) for `request` into the paging state.
	pub fn apply_response(
		&mut self,
		settings: &mut QuerySettings,
		request: &PendingRequest,
		result: Result<SearchResponse>,
	) -> Result<Applied> {
		self.in_flight = self.in_flight.saturating_sub(1);

		if self.discard_stale && request.generation < self.issued {
			tracing::debug!(
				source_id = %settings.id,
				generation = request.generation,
				latest = self.issued,
				"Dropping response superseded by a newer request."
			);

			// The dropped request was the only one counting the current filter.
			if request.includes_count && !self.latest_counted {
				self.builder.force_recount();
			}

			self.settle();

			return Ok(Applied::Superseded);
		}

		let response = match result {
			Ok(response) => response,
			Err(err) => {
				// Forget what was sent so an explicit retry is not de-duplicated away.
				self.last_request = None;
				self.builder.force_recount();
				self.settle();

				return Err(err);
			},
		};

		match settings.mode {
			Mode::CompositeAggregation => {
				let after_key = response.after_key().cloned();

				if after_key.is_none() && settings.page > 0 {
					settings.page -= 1;
					settings.after_key = settings.page_after_keys.get(&settings.page).cloned();
					settings.page_after_keys.remove(&(settings.page + 1));
					self.has_next = false;
					self.last_request = None;
					self.settle();

					tracing::debug!(
						source_id = %settings.id,
						page = settings.page,
						"Moved past the last composite page."
					);

					return Ok(Applied::PastLastPage);
				}

				self.has_next = after_key.is_some();

				if let Some(after_key) = after_key {
					settings.page_after_keys.insert(settings.page + 1, after_key);
				}
			},
			Mode::Documents => {
				let rows = response.hits().len() as u64;

				self.has_next = match response.total() {
					Some(total) => u64::from(settings.from) + rows < total,
					None => rows >= u64::from(settings.page_size()),
				};
			},
			Mode::TermAggregation => self.has_next = false,
		}

		self.rendered_rows = response.row_count(settings.mode);
		self.populated_once = true;
		self.settle();

		Ok(Applied::Render(response))
	}

	/// Moves to the adjacent page. The caller populates afterwards.
	pub fn advance_page(
		&mut self,
		settings: &mut QuerySettings,
		direction: PageDirection,
	) -> PageMove {
		match (settings.mode, direction) {
			(Mode::Documents, PageDirection::Forward) => {
				// Step by what is on screen rather than the page size; rows may have been removed.
				if self.rendered_rows == 0 {
					return PageMove::Refused;
				}

				let step = u32::try_from(self.rendered_rows).unwrap_or(u32::MAX);

				settings.from = settings.from.saturating_add(step);

				PageMove::Moved
			},
			(Mode::Documents, PageDirection::Backward) => {
				if settings.from == 0 {
					return PageMove::Refused;
				}

				settings.from = settings.from.saturating_sub(settings.page_size());

				PageMove::Moved
			},
			(Mode::CompositeAggregation, PageDirection::Forward) => {
				let target = settings.page + 1;
				let Some(after_key) = settings.page_after_keys.get(&target).cloned() else {
					return PageMove::Refused;
				};

				settings.page = target;
				settings.after_key = Some(after_key);

				PageMove::Moved
			},
			(Mode::CompositeAggregation, PageDirection::Backward) => {
				if settings.page == 0 {
					return PageMove::Refused;
				}

				settings.page -= 1;
				settings.after_key = settings.page_after_keys.get(&settings.page).cloned();
				self.has_next = true;

				PageMove::Moved
			},
			(Mode::TermAggregation, _) => PageMove::Refused,
		}
	}

	/// Resets to the first page when the filter, sort or mode changed since the last request.
	fn reset_paging_if_basis_changed(&mut self, settings: &mut QuerySettings) -> Result<()> {
		let sort: Vec<Value> = settings
			.sort
			.iter()
			.map(|sort| serde_json::json!([sort.field, sort.direction.as_str()]))
			.collect();
		let basis = RequestSnapshot::of(&serde_json::json!({
			"mode": settings.mode.as_str(),
			"query": settings.filter.to_query(),
			"sort": sort,
		}))?;

		if self.paging_basis.as_ref().is_some_and(|previous| previous != &basis) {
			tracing::debug!(source_id = %settings.id, "Filter or sort changed; back to first page.");

			settings.from = 0;
			settings.page = 0;
			settings.after_key = None;
			settings.page_after_keys.clear();
		}

		self.paging_basis = Some(basis);

		Ok(())
	}

	fn settle(&mut self) {
		self.state = if self.in_flight > 0 {
			SourceState::Loading
		} else if self.populated_once {
			SourceState::Populated
		} else {
			SourceState::Idle
		};
	}
}

/// De-duplication key: the body without the count aggregation, plus the response filter. The
/// count only rides along when the filter changed, and a filter change alters the body anyway.
fn dedup_key(body: &Value, filter_path: Option<&str>) -> Result<RequestSnapshot> {
	let mut body = body.clone();

	if let Some(aggregation) = body.get_mut("aggregation").and_then(Value::as_object_mut) {
		aggregation.remove(COUNT_AGG);
	}

	RequestSnapshot::of(&serde_json::json!({ "body": body, "filter_path": filter_path }))
		.map_err(Error::from)
}

#[cfg(test)]
mod tests {
	use recsearch_query::{Direction, SortField};

	use super::*;

	fn composite() -> QuerySettings {
		QuerySettings::new("grid", Mode::CompositeAggregation, "id")
			.with_fields(["id", "name"])
			.with_sort(vec![SortField::new("name", Direction::Asc)])
	}

	fn issue(coordinator: &mut PaginationCoordinator, settings: &mut QuerySettings) -> PendingRequest {
		match coordinator.prepare_request(settings, false).expect("Prepare failed.") {
			Prepared::Issue(pending) => pending,
			Prepared::Duplicate => panic!("Expected a request to be issued."),
		}
	}

	fn composite_page(after_key: Option<Value>) -> SearchResponse {
		let mut rows = serde_json::json!({ "buckets": [{ "key": { "id": "1", "name": "a" }, "doc_count": 1 }] });

		if let Some(after_key) = after_key {
			rows["after_key"] = after_key;
		}

		SearchResponse::new(serde_json::json!({ "aggregations": { "_rows": rows } }))
	}

	#[test]
	fn filter_change_returns_to_first_page() {
		let mut coordinator = PaginationCoordinator::new(QueryRequestBuilder::default(), true);
		let mut settings = composite();
		let pending = issue(&mut coordinator, &mut settings);

		coordinator
			.apply_response(
				&mut settings,
				&pending,
				Ok(composite_page(Some(serde_json::json!({ "name": "a", "id": "1" })))),
			)
			.expect("Apply failed.");

		assert_eq!(coordinator.advance_page(&mut settings, PageDirection::Forward), PageMove::Moved);
		assert_eq!(settings.page, 1);

		settings.filter.must.push(recsearch_query::FilterClause::QueryString {
			query: "bombus".to_string(),
		});

		let pending = issue(&mut coordinator, &mut settings);

		assert_eq!(settings.page, 0);
		assert!(settings.after_key.is_none());
		assert!(pending.body["aggregation"]["_rows"]["composite"].get("after").is_none());
		assert!(pending.includes_count);
	}

	#[test]
	fn state_moves_from_idle_through_loading_to_populated() {
		let mut coordinator = PaginationCoordinator::new(QueryRequestBuilder::default(), true);
		let mut settings = composite();

		assert_eq!(coordinator.state(), SourceState::Idle);

		let pending = issue(&mut coordinator, &mut settings);

		assert_eq!(coordinator.state(), SourceState::Loading);

		coordinator
			.apply_response(&mut settings, &pending, Ok(composite_page(None)))
			.expect("Apply failed.");

		assert_eq!(coordinator.state(), SourceState::Populated);
		assert!(!coordinator.has_next_page());
	}

	#[test]
	fn document_offset_saturates_instead_of_wrapping() {
		let mut coordinator = PaginationCoordinator::new(QueryRequestBuilder::default(), true);
		let mut settings = QuerySettings::new("records", Mode::Documents, "id").with_size(20);

		settings.from = 40;
		coordinator.rendered_rows = usize::MAX;

		assert_eq!(coordinator.advance_page(&mut settings, PageDirection::Forward), PageMove::Moved);
		assert_eq!(settings.from, u32::MAX);
	}

	#[test]
	fn failed_request_returns_to_idle_and_allows_retry() {
		let mut coordinator = PaginationCoordinator::new(QueryRequestBuilder::default(), true);
		let mut settings = composite();
		let pending = issue(&mut coordinator, &mut settings);
		let err = coordinator
			.apply_response(
				&mut settings,
				&pending,
				Err(Error::Transport { message: "connection refused".to_string() }),
			)
			.expect_err("Expected the failure to surface.");

		assert!(err.is_recoverable());
		assert_eq!(coordinator.state(), SourceState::Idle);

		let retry = issue(&mut coordinator, &mut settings);

		assert!(retry.includes_count);
	}
}
