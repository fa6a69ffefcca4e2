use serde_json::Value;

use crate::{COUNT_AGG, ID_FIELD_AGG, ROWS_AGG, settings::Mode};

/// Read-only view over a search proxy response.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
	raw: Value,
}
impl SearchResponse {
	pub fn new(raw: Value) -> Self {
		Self { raw }
	}

	pub fn raw(&self) -> &Value {
		&self.raw
	}

	pub fn into_raw(self) -> Value {
		self.raw
	}

	/// Error reported inside an otherwise successful HTTP exchange: an `error` member, or a
	/// `code` other than 200.
	pub fn backend_error(&self) -> Option<String> {
		if let Some(error) = self.raw.get("error").filter(|error| !error.is_null()) {
			return Some(match error {
				Value::String(message) => message.clone(),
				other => other
					.get("reason")
					.and_then(Value::as_str)
					.map(str::to_string)
					.unwrap_or_else(|| other.to_string()),
			});
		}

		match self.raw.get("code").and_then(Value::as_i64) {
			Some(200) | None => None,
			Some(code) => Some(format!("Search backend returned code {code}.")),
		}
	}

	/// Rewrites a bare numeric `hits.total` (version 6 engines) into the `{value, relation}` form.
	pub fn normalize_total(&mut self, es_version: u8) {
		if es_version != 6 {
			return;
		}

		if let Some(hits) = self.raw.get_mut("hits").and_then(Value::as_object_mut)
			&& let Some(total) = hits.get("total").and_then(Value::as_u64)
		{
			hits.insert(
				"total".to_string(),
				serde_json::json!({ "value": total, "relation": "eq" }),
			);
		}
	}

	pub fn hits(&self) -> &[Value] {
		self.raw
			.pointer("/hits/hits")
			.and_then(Value::as_array)
			.map(Vec::as_slice)
			.unwrap_or_default()
	}

	pub fn total(&self) -> Option<u64> {
		self.raw.pointer("/hits/total/value").and_then(Value::as_u64)
	}

	pub fn composite_buckets(&self) -> &[Value] {
		self.buckets(ROWS_AGG)
	}

	pub fn term_buckets(&self) -> &[Value] {
		self.buckets(ID_FIELD_AGG)
	}

	/// Cardinality of the unique field, present only on counted requests.
	pub fn count(&self) -> Option<u64> {
		self.raw
			.get("aggregations")
			.and_then(|aggs| aggs.get(COUNT_AGG))
			.and_then(|count| count.get("value"))
			.and_then(Value::as_u64)
	}

	pub fn after_key(&self) -> Option<&Value> {
		self.raw
			.get("aggregations")
			.and_then(|aggs| aggs.get(ROWS_AGG))
			.and_then(|rows| rows.get("after_key"))
			.filter(|key| !key.is_null())
	}

	/// Rows an output would render for this response.
	pub fn row_count(&self, mode: Mode) -> usize {
		match mode {
			Mode::Documents => self.hits().len(),
			Mode::CompositeAggregation => self.composite_buckets().len(),
			Mode::TermAggregation => self.term_buckets().len(),
		}
	}

	fn buckets(&self, name: &str) -> &[Value] {
		self.raw
			.get("aggregations")
			.and_then(|aggs| aggs.get(name))
			.and_then(|agg| agg.get("buckets"))
			.and_then(Value::as_array)
			.map(Vec::as_slice)
			.unwrap_or_default()
	}
}
