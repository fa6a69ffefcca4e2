use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::{
	COUNT_AGG, FIELD_LIST_AGG, ID_FIELD_AGG, ORDER_BY_PREFIX, ROWS_AGG, Result, SORT_FIELD_AGG,
	field::{self, FieldSpec, KeywordFields},
	settings::{Direction, Mode, QuerySettings, SortField},
	snapshot::RequestSnapshot,
};

/// A request body ready to post to the search proxy.
#[derive(Debug, Clone)]
pub struct BuiltRequest {
	pub body: Value,
	/// True when the body carries the `_count` cardinality aggregation.
	pub includes_count: bool,
}

/// Turns [`QuerySettings`] into request bodies. Holds the filter snapshot of the last counted
/// request so the count aggregation is only paid for when the filter changes.
#[derive(Debug, Default)]
pub struct QueryRequestBuilder {
	keywords: KeywordFields,
	last_count: Option<RequestSnapshot>,
}
impl QueryRequestBuilder {
	pub fn new(keywords: KeywordFields) -> Self {
		Self { keywords, last_count: None }
	}

	pub fn validate(&self, settings: &QuerySettings) -> Result<()> {
		settings.validate()
	}

	/// Guarantees the next aggregation request includes a count, even if the filter is unchanged.
	pub fn force_recount(&mut self) {
		self.last_count = None;
	}

	pub fn build_request(&mut self, settings: &mut QuerySettings) -> Result<BuiltRequest> {
		self.validate(settings)?;

		let body = match settings.mode {
			Mode::Documents => {
				settings.needs_recount = false;

				self.build_documents_body(settings)
			},
			Mode::CompositeAggregation => {
				self.prepare_aggregation_common(settings)?;

				self.aggregation_body(settings, self.build_composite_aggregation(settings))
			},
			Mode::TermAggregation => {
				self.prepare_aggregation_common(settings)?;

				self.aggregation_body(settings, self.build_term_aggregation(settings))
			},
		};

		Ok(BuiltRequest { body, includes_count: settings.needs_recount })
	}

	/// Shared setup for both aggregation modes.
	pub fn prepare_aggregation_common(&mut self, settings: &mut QuerySettings) -> Result<()> {
		settings.ensure_unique_field();
		settings.aggregation_size = Some(settings.effective_aggregation_size());
		settings.size = Some(0);

		let counting = RequestSnapshot::of(&settings.filter.to_query())?;

		settings.needs_recount = self.last_count.as_ref() != Some(&counting);
		self.last_count = Some(counting);

		Ok(())
	}

	/// Composite sources in request order: sorted fields first, in sort priority, then the
	/// remaining fields in configured order.
	pub fn build_composite_sources(&self, fields: &[String], sort: &[SortField]) -> Vec<Value> {
		let mut sources = Vec::with_capacity(fields.len());

		for entry in sort {
			if fields.contains(&entry.field)
				&& let Some(source) = self.composite_source(&entry.field, Some(entry.direction))
			{
				sources.push(source);
			}
		}
		for raw in fields {
			if sort.iter().any(|entry| &entry.field == raw) {
				continue;
			}
			if let Some(source) = self.composite_source(raw, None) {
				sources.push(source);
			}
		}

		sources
	}

	pub fn build_composite_aggregation(&self, settings: &QuerySettings) -> Value {
		let mut composite = Map::new();

		composite.insert("size".to_string(), settings.effective_aggregation_size().into());
		composite.insert(
			"sources".to_string(),
			Value::Array(self.build_composite_sources(&settings.fields, &settings.sort)),
		);

		if let Some(after) = settings.after_key.as_ref() {
			composite.insert("after".to_string(), after.clone());
		}

		let mut rows = Map::new();

		rows.insert("composite".to_string(), Value::Object(composite));

		if !settings.supplied_aggregation.is_empty() {
			rows.insert("aggs".to_string(), Value::Object(settings.supplied_aggregation.clone()));
		}

		let mut aggregation = Map::new();

		aggregation.insert(ROWS_AGG.to_string(), Value::Object(rows));

		if settings.needs_recount {
			aggregation.insert(COUNT_AGG.to_string(), self.count_aggregation(settings));
		}

		Value::Object(aggregation)
	}

	pub fn build_term_aggregation(&self, settings: &QuerySettings) -> Value {
		let mut sub_aggs = Map::new();

		sub_aggs.insert(
			FIELD_LIST_AGG.to_string(),
			serde_json::json!({
				"top_hits": {
					"size": 1,
					"_source": { "includes": self.top_hit_includes(settings) },
				}
			}),
		);

		// Term aggregations order on the primary sort field only.
		let primary = settings.sort.first();
		let mut sort_override = None;

		for (name, body) in &settings.supplied_aggregation {
			sub_aggs.insert(name.clone(), body.clone());

			if primary.is_some_and(|sort| &sort.field == name)
				&& let Some(cheaper) = settings.sort_aggregation.get(name)
			{
				let key = format!("{ORDER_BY_PREFIX}{name}");

				sub_aggs.insert(key.clone(), cheaper.clone());

				sort_override = Some(key);
			}
		}

		let order = primary.map(|sort| {
			let key = if let Some(key) = sort_override {
				key
			} else if sort.field == settings.unique_field {
				"_key".to_string()
			} else if settings.fields.contains(&sort.field)
				&& matches!(FieldSpec::parse(&sort.field), FieldSpec::Path(_))
			{
				sub_aggs.insert(
					SORT_FIELD_AGG.to_string(),
					serde_json::json!({ "max": { "field": sort.field } }),
				);

				SORT_FIELD_AGG.to_string()
			} else if sort.field == "doc_count" {
				"_count".to_string()
			} else {
				// Assumed to name an aggregation; unknown names are passed through unchecked.
				sort.field.clone()
			};

			(key, sort.direction)
		});
		let mut terms = Map::new();

		terms.insert("size".to_string(), settings.effective_aggregation_size().into());
		terms.insert("field".to_string(), self.keywords.resolve(&settings.unique_field).into());

		if let Some((key, direction)) = order {
			terms.insert("order".to_string(), serde_json::json!({ key: direction.as_str() }));
		}

		let mut aggregation = Map::new();

		aggregation.insert(
			ID_FIELD_AGG.to_string(),
			serde_json::json!({ "terms": terms, "aggs": sub_aggs }),
		);

		if settings.needs_recount {
			aggregation.insert(COUNT_AGG.to_string(), self.count_aggregation(settings));
		}

		Value::Object(aggregation)
	}

	fn build_documents_body(&self, settings: &QuerySettings) -> Value {
		let mut body = Map::new();

		body.insert("query".to_string(), settings.filter.to_query());
		body.insert("from".to_string(), settings.from.into());
		body.insert("size".to_string(), settings.page_size().into());

		let sort: Vec<Value> = settings
			.sort
			.iter()
			.filter_map(|entry| match FieldSpec::parse(&entry.field) {
				FieldSpec::Path(path) => Some(serde_json::json!({
					self.keywords.resolve(&path): { "order": entry.direction.as_str() }
				})),
				_ => None,
			})
			.collect();

		if !sort.is_empty() {
			body.insert("sort".to_string(), Value::Array(sort));
		}

		Value::Object(body)
	}

	fn aggregation_body(&self, settings: &QuerySettings, aggregation: Value) -> Value {
		serde_json::json!({
			"query": settings.filter.to_query(),
			"size": 0,
			"aggregation": aggregation,
		})
	}

	fn composite_source(&self, raw: &str, direction: Option<Direction>) -> Option<Value> {
		let mut terms = match FieldSpec::parse(raw) {
			FieldSpec::Path(path) => {
				let mut terms = Map::new();

				terms.insert("field".to_string(), self.keywords.resolve(&path).into());
				terms.insert("missing_bucket".to_string(), Value::Bool(true));

				terms
			},
			FieldSpec::AttrValue { entity, attr_id } => {
				let mut terms = Map::new();

				terms.insert("script".to_string(), field::attr_value_script(&entity, &attr_id));

				terms
			},
			FieldSpec::Special(token) => {
				tracing::debug!(field = %token, "Skipping field with no composite source.");

				return None;
			},
		};

		if let Some(direction) = direction {
			terms.insert("order".to_string(), direction.as_str().into());
		}

		let mut source = Map::new();

		source.insert(field::composite_key_name(raw), serde_json::json!({ "terms": terms }));

		Some(Value::Object(source))
	}

	fn top_hit_includes(&self, settings: &QuerySettings) -> Vec<String> {
		let mut seen = HashSet::new();

		settings
			.field_specs()
			.filter_map(|(_, spec)| spec.source_path())
			.filter(|path| seen.insert(path.clone()))
			.collect()
	}

	fn count_aggregation(&self, settings: &QuerySettings) -> Value {
		serde_json::json!({
			"cardinality": { "field": self.keywords.resolve(&settings.unique_field) }
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn composite_settings() -> QuerySettings {
		QuerySettings::new("grid", Mode::CompositeAggregation, "id")
			.with_fields(["id", "name"])
			.with_sort(vec![SortField::new("name", Direction::Asc)])
	}

	#[test]
	fn sorted_fields_lead_composite_sources() {
		let builder = QueryRequestBuilder::default();
		let settings = composite_settings();
		let sources = builder.build_composite_sources(&settings.fields, &settings.sort);

		assert_eq!(
			sources,
			vec![
				serde_json::json!({ "name": { "terms": { "field": "name", "missing_bucket": true, "order": "asc" } } }),
				serde_json::json!({ "id": { "terms": { "field": "id", "missing_bucket": true } } }),
			]
		);
	}

	#[test]
	fn attr_value_fields_become_scripted_sources() {
		let builder = QueryRequestBuilder::default();
		let fields = vec!["id".to_string(), "#attr_value:sample:4#".to_string()];
		let sources = builder.build_composite_sources(&fields, &[]);
		let scripted = &sources[1]["attr_value-sample-4"]["terms"];

		assert_eq!(scripted["script"]["lang"], "painless");
		assert!(scripted.get("missing_bucket").is_none());
		assert!(
			scripted["script"]["source"]
				.as_str()
				.is_some_and(|source| source.contains("params._source.event.attributes"))
		);
	}

	#[test]
	fn special_tokens_are_left_out_of_composite_sources() {
		let builder = QueryRequestBuilder::default();
		let fields = vec!["id".to_string(), "#occurrence_media#".to_string()];

		assert_eq!(builder.build_composite_sources(&fields, &[]).len(), 1);
	}

	#[test]
	fn sort_fields_outside_the_field_list_are_ignored() {
		let builder = QueryRequestBuilder::default();
		let fields = vec!["id".to_string()];
		let sort = vec![SortField::new("event.date_start", Direction::Desc)];

		assert_eq!(
			builder.build_composite_sources(&fields, &sort),
			vec![serde_json::json!({ "id": { "terms": { "field": "id", "missing_bucket": true } } })]
		);
	}

	#[test]
	fn count_aggregation_only_when_filter_changes() {
		let mut builder = QueryRequestBuilder::default();
		let mut settings = composite_settings();
		let first = builder.build_request(&mut settings).expect("Build failed.");

		assert!(first.includes_count);
		assert!(first.body["aggregation"].get(COUNT_AGG).is_some());

		let second = builder.build_request(&mut settings).expect("Build failed.");

		assert!(!second.includes_count);
		assert!(second.body["aggregation"].get(COUNT_AGG).is_none());

		settings.filter.must.push(crate::FilterClause::QueryString { query: "bee".to_string() });

		let third = builder.build_request(&mut settings).expect("Build failed.");

		assert!(third.includes_count);
	}

	#[test]
	fn aggregation_modes_zero_the_hit_size() {
		let mut builder = QueryRequestBuilder::default();
		let mut settings = composite_settings().with_size(25);
		let built = builder.build_request(&mut settings).expect("Build failed.");

		assert_eq!(settings.size, Some(0));
		assert_eq!(settings.aggregation_size, Some(25));
		assert_eq!(built.body["size"], 0);
		assert_eq!(built.body["aggregation"][ROWS_AGG]["composite"]["size"], 25);
	}
}
