use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use recsearch_query::SearchResponse;

use crate::{Error, Result};

/// Posts one request body to the search proxy and returns the decoded response.
pub async fn search(
	cfg: &recsearch_config::Backend,
	filter_path: Option<&str>,
	body: &Value,
) -> Result<SearchResponse> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = search_url(cfg);

	tracing::debug!(%url, filter_path = filter_path.unwrap_or_default(), "Posting search request.");

	let mut request = client
		.post(url.as_str())
		.headers(crate::auth_headers(cfg.api_key.as_deref(), &cfg.default_headers)?)
		.json(body);

	if let Some(filter_path) = filter_path {
		request = request.query(&[("filter_path", filter_path)]);
	}

	let res = request.send().await?;
	let status = res.status();

	if !status.is_success() {
		return Err(Error::Status { status: status.as_u16() });
	}

	let json: Value = res.json().await.map_err(|err| Error::InvalidResponse {
		message: format!("Search response is not valid JSON: {err}"),
	})?;

	parse_search_response(json, cfg.es_version)
}

pub fn search_url(cfg: &recsearch_config::Backend) -> String {
	format!("{}{}/{}", cfg.api_base, cfg.path, cfg.node_id)
}

fn parse_search_response(json: Value, es_version: u8) -> Result<SearchResponse> {
	if !json.is_object() {
		return Err(Error::InvalidResponse {
			message: "Search response must be a JSON object.".to_string(),
		});
	}

	let mut response = SearchResponse::new(json);

	if let Some(message) = response.backend_error() {
		return Err(Error::Backend { message });
	}

	response.normalize_total(es_version);

	Ok(response)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn error_bodies_become_backend_errors() {
		let err = parse_search_response(serde_json::json!({ "code": 500 }), 7)
			.expect_err("Expected backend error.");

		assert!(err.is_backend());
		assert!(matches!(err, Error::Backend { .. }));
	}

	#[test]
	fn version_six_totals_are_normalized() {
		let response =
			parse_search_response(serde_json::json!({ "hits": { "total": 5, "hits": [] } }), 6)
				.expect("parse failed");

		assert_eq!(response.total(), Some(5));
	}

	#[test]
	fn non_object_bodies_are_rejected() {
		let err = parse_search_response(serde_json::json!([1, 2]), 7)
			.expect_err("Expected invalid response.");

		assert!(matches!(err, Error::InvalidResponse { .. }));
	}
}
