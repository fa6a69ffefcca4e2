use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The filter portion of a request. Everything that decides which records match lives here;
/// fields, sorting and paging do not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
	#[serde(default)]
	pub must: Vec<FilterClause>,
	#[serde(default)]
	pub must_not: Vec<FilterClause>,
	/// Restricts to records sharing a value with a row selected elsewhere.
	pub row_filter: Option<RowFilter>,
	/// Restricts to a visible map extent.
	pub bounds: Option<Bounds>,
}
impl Filter {
	pub fn is_empty(&self) -> bool {
		self.must.is_empty()
			&& self.must_not.is_empty()
			&& self.row_filter.is_none()
			&& self.bounds.is_none()
	}

	pub fn to_query(&self) -> Value {
		if self.is_empty() {
			return serde_json::json!({ "match_all": {} });
		}

		let mut must: Vec<Value> = self.must.iter().map(FilterClause::to_query).collect();

		if let Some(row) = self.row_filter.as_ref() {
			must.push(serde_json::json!({ "term": { row.field.as_str(): row.value } }));
		}
		if let Some(bounds) = self.bounds.as_ref() {
			must.push(bounds.to_query());
		}

		let must_not: Vec<Value> = self.must_not.iter().map(FilterClause::to_query).collect();

		serde_json::json!({ "bool": { "must": must, "must_not": must_not } })
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterClause {
	Term { field: String, value: Value },
	Terms { field: String, values: Vec<Value> },
	Match { field: String, query: String },
	QueryString { query: String },
	Range { field: String, gte: Option<Value>, lte: Option<Value> },
	Exists { field: String },
	/// Passed through untouched.
	Raw(Value),
}
impl FilterClause {
	pub fn to_query(&self) -> Value {
		match self {
			Self::Term { field, value } => {
				serde_json::json!({ "term": { field.as_str(): value } })
			},
			Self::Terms { field, values } => {
				serde_json::json!({ "terms": { field.as_str(): values } })
			},
			Self::Match { field, query } => {
				serde_json::json!({ "match": { field.as_str(): { "query": query, "operator": "AND" } } })
			},
			Self::QueryString { query } => {
				serde_json::json!({ "query_string": { "query": query, "analyze_wildcard": true } })
			},
			Self::Range { field, gte, lte } => {
				let mut range = serde_json::Map::new();

				if let Some(gte) = gte {
					range.insert("gte".to_string(), gte.clone());
				}
				if let Some(lte) = lte {
					range.insert("lte".to_string(), lte.clone());
				}

				serde_json::json!({ "range": { field.as_str(): range } })
			},
			Self::Exists { field } => serde_json::json!({ "exists": { "field": field } }),
			Self::Raw(value) => value.clone(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowFilter {
	pub field: String,
	pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
	#[serde(default = "default_location_field")]
	pub field: String,
	pub top_left: GeoPoint,
	pub bottom_right: GeoPoint,
}
impl Bounds {
	fn to_query(&self) -> Value {
		serde_json::json!({
			"geo_bounding_box": {
				self.field.as_str(): {
					"top_left": { "lat": self.top_left.lat, "lon": self.top_left.lon },
					"bottom_right": { "lat": self.bottom_right.lat, "lon": self.bottom_right.lon },
				}
			}
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
	pub lat: f64,
	pub lon: f64,
}

fn default_location_field() -> String {
	"location.point".to_string()
}
