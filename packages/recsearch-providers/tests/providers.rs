use std::{
	collections::HashMap,
	future::IntoFuture,
	sync::{Arc, Mutex},
};

use axum::{
	Json, Router,
	extract::{Path, Query, State},
	http::{HeaderMap, StatusCode},
	response::IntoResponse,
	routing,
};
use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value};
use tokio::{
	net::TcpListener,
	sync::{oneshot, oneshot::Sender},
};

use recsearch_config::Backend;
use recsearch_providers::Error;

#[derive(Clone, Default)]
struct Captured {
	node: Option<String>,
	filter_path: Option<String>,
	authorization: Option<String>,
	body: Option<Value>,
}

#[derive(Clone)]
struct ProxyState {
	captured: Arc<Mutex<Captured>>,
	status: StatusCode,
	reply: Value,
}

async fn start_proxy(status: StatusCode, reply: Value) -> (String, Arc<Mutex<Captured>>, Sender<()>) {
	let captured = Arc::new(Mutex::new(Captured::default()));
	let state = ProxyState { captured: captured.clone(), status, reply };
	let app = Router::new()
		.route("/searchbyparams/{node}", routing::post(search_handler))
		.with_state(state);
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind proxy server.");
	let addr = listener.local_addr().expect("Failed to read proxy server address.");
	let (tx, rx) = oneshot::channel();
	let server = axum::serve(listener, app).with_graceful_shutdown(async move {
		let _ = rx.await;
	});

	tokio::spawn(async move {
		let _ = server.into_future().await;
	});

	(format!("http://{addr}"), captured, tx)
}

async fn search_handler(
	State(state): State<ProxyState>,
	Path(node): Path<String>,
	Query(query): Query<HashMap<String, String>>,
	headers: HeaderMap,
	Json(body): Json<Value>,
) -> impl IntoResponse {
	{
		let mut captured = state.captured.lock().expect("Capture lock poisoned.");

		captured.node = Some(node);
		captured.filter_path = query.get("filter_path").cloned();
		captured.authorization = headers
			.get(AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.map(str::to_string);
		captured.body = Some(body);
	}

	(state.status, Json(state.reply)).into_response()
}

fn backend(api_base: String, api_key: Option<&str>, es_version: u8) -> Backend {
	Backend {
		api_base,
		path: "/searchbyparams".to_string(),
		node_id: "42".to_string(),
		api_key: api_key.map(str::to_string),
		timeout_ms: 5_000,
		es_version,
		default_headers: Map::new(),
		text_fields: Vec::new(),
	}
}

#[test]
fn builds_bearer_auth_header() {
	let headers = recsearch_providers::auth_headers(Some("secret"), &Map::new())
		.expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn omits_auth_header_without_key() {
	let mut defaults = Map::new();

	defaults.insert("x-client".to_string(), Value::String("recsearch".to_string()));

	let headers =
		recsearch_providers::auth_headers(None, &defaults).expect("Failed to build headers.");

	assert!(headers.get(AUTHORIZATION).is_none());
	assert_eq!(headers.get("x-client").expect("Missing default header."), "recsearch");
}

#[tokio::test]
async fn posts_body_with_filter_path_and_node() {
	let reply = serde_json::json!({ "hits": { "total": 3, "hits": [{ "_id": "1", "_source": {} }] } });
	let (api_base, captured, shutdown) = start_proxy(StatusCode::OK, reply).await;
	let cfg = backend(api_base, Some("token"), 6);
	let body = serde_json::json!({ "query": { "match_all": {} }, "from": 0, "size": 10 });
	let response = recsearch_providers::search::search(&cfg, Some("hits.total,hits.hits"), &body)
		.await
		.expect("Search failed.");

	let _ = shutdown.send(());

	assert_eq!(response.total(), Some(3));
	assert_eq!(response.hits().len(), 1);

	let captured = captured.lock().expect("Capture lock poisoned.").clone();

	assert_eq!(captured.node.as_deref(), Some("42"));
	assert_eq!(captured.filter_path.as_deref(), Some("hits.total,hits.hits"));
	assert_eq!(captured.authorization.as_deref(), Some("Bearer token"));
	assert_eq!(captured.body, Some(body));
}

#[tokio::test]
async fn http_failures_are_status_errors() {
	let (api_base, _captured, shutdown) =
		start_proxy(StatusCode::BAD_GATEWAY, serde_json::json!({})).await;
	let cfg = backend(api_base, None, 7);
	let err = recsearch_providers::search::search(&cfg, None, &serde_json::json!({}))
		.await
		.expect_err("Expected HTTP failure.");

	let _ = shutdown.send(());

	assert!(matches!(err, Error::Status { status: 502 }));
	assert!(!err.is_backend());
}

#[tokio::test]
async fn error_payloads_are_backend_errors() {
	let reply = serde_json::json!({ "error": "Elasticsearch query failed" });
	let (api_base, _captured, shutdown) = start_proxy(StatusCode::OK, reply).await;
	let cfg = backend(api_base, None, 7);
	let err = recsearch_providers::search::search(&cfg, None, &serde_json::json!({}))
		.await
		.expect_err("Expected backend failure.");

	let _ = shutdown.send(());

	assert!(err.is_backend());
	assert!(err.to_string().contains("Elasticsearch query failed"));
}
