use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub backend: Backend,
	#[serde(default)]
	pub pagination: Pagination,
	#[serde(default)]
	pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Backend {
	pub api_base: String,
	pub path: String,
	#[serde(default = "default_node_id")]
	pub node_id: String,
	/// Optional. Sent as a bearer token when present.
	pub api_key: Option<String>,
	pub timeout_ms: u64,
	/// Major version of the search engine behind the proxy. Version 6 reports `hits.total` as a
	/// bare number.
	#[serde(default = "default_es_version")]
	pub es_version: u8,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
	/// Fields mapped as analyzed text; terms and cardinality requests address their `.keyword`
	/// sub-field instead.
	#[serde(default)]
	pub text_fields: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
	#[serde(default = "default_true")]
	pub discard_stale_responses: bool,
}
impl Default for Pagination {
	fn default() -> Self {
		Self { discard_stale_responses: true }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
	pub id: String,
	#[serde(default = "default_mode")]
	pub mode: String,
	pub unique_field: String,
	#[serde(default)]
	pub fields: Vec<String>,
	#[serde(default)]
	pub sort: Vec<SortConfig>,
	pub size: Option<u32>,
	pub aggregation_size: Option<u32>,
	pub filter_path: Option<String>,
	/// Caller-supplied aggregations, keyed by name. Names starting with `_` are reserved.
	#[serde(default)]
	pub aggregation: Map<String, Value>,
	/// Cheaper stand-ins used when a term aggregation sorts on a supplied aggregation.
	#[serde(default)]
	pub sort_aggregation: Map<String, Value>,
	pub filter: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SortConfig {
	pub field: String,
	#[serde(default = "default_direction")]
	pub direction: String,
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_node_id() -> String {
	"0".to_string()
}

fn default_es_version() -> u8 {
	7
}

fn default_true() -> bool {
	true
}

fn default_mode() -> String {
	"docs".to_string()
}

fn default_direction() -> String {
	"asc".to_string()
}
