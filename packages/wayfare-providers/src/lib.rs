//! HTTP clients for the collaborators the search pipeline consumes.

pub mod completion;
pub mod details;
pub mod directory;
pub mod query_parser;
pub mod rates;

mod error;

pub use error::{Error, Result};

use std::time::Duration;

use reqwest::{
	Client, RequestBuilder,
	header::{AUTHORIZATION, HeaderMap, HeaderName},
};
use serde_json::{Map, Value};

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: format!("Default header {key} must be a string."),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

pub(crate) fn client(timeout_ms: u64) -> Result<Client> {
	Ok(Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?)
}

pub(crate) fn endpoint(api_base: &str, path: &str) -> String {
	format!("{api_base}{path}")
}

/// Sends the request and decodes the body, mapping 429 to [`Error::RateLimited`].
pub(crate) async fn send_json(request: RequestBuilder) -> Result<Value> {
	let res = request.send().await?;
	let status = res.status();

	if !status.is_success() {
		return Err(error::classify_status(status.as_u16()));
	}

	Ok(res.json().await?)
}

/// Unwraps the conventional `{ "data": ... }` envelope when present.
pub(crate) fn unwrap_data(json: &Value) -> &Value {
	json.get("data").unwrap_or(json)
}

pub(crate) fn string_list(value: Option<&Value>) -> Vec<String> {
	let Some(items) = value.and_then(Value::as_array) else {
		return Vec::new();
	};

	items
		.iter()
		.filter_map(|item| match item {
			Value::String(text) => Some(text.trim().to_string()),
			Value::Object(map) => map
				.get("url")
				.or_else(|| map.get("name"))
				.and_then(Value::as_str)
				.map(|text| text.trim().to_string()),
			_ => None,
		})
		.filter(|text| !text.is_empty())
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_headers_must_be_strings() {
		let mut headers = Map::new();

		headers.insert("x-client".to_string(), Value::from(7));

		let err = auth_headers("key", &headers).expect_err("Numeric headers are rejected.");

		assert!(matches!(err, Error::InvalidConfig { .. }));
	}

	#[test]
	fn string_lists_accept_plain_and_object_items() {
		let json = serde_json::json!(["pool", { "url": "https://img/1.jpg" }, 4, " ", { "name": "spa" }]);

		assert_eq!(string_list(Some(&json)), vec!["pool", "https://img/1.jpg", "spa"]);
	}
}
