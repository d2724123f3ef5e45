use serde_json::Value;
use time::Date;

use crate::{Error, Result, completion};
use wayfare_domain::{ParsedQuery, time_serde};

const SYSTEM_PROMPT: &str = "You turn hotel search requests into JSON. Reply with one JSON object \
and nothing else, using the keys destination, country_code (ISO 3166-1 alpha-2), check_in and \
check_out (YYYY-MM-DD), adults, children, budget_min, budget_max (per night), currency (ISO 4217) \
and preferences (everything that does not fit another key). Use null for anything the request \
does not state. Resolve relative dates against the given current date.";

pub async fn parse_query(
	cfg: &wayfare_config::LlmProviderConfig,
	query: &str,
	today: Date,
) -> Result<ParsedQuery> {
	let messages = vec![
		serde_json::json!({ "role": "system", "content": SYSTEM_PROMPT }),
		serde_json::json!({
			"role": "user",
			"content": format!("Current date: {}\nRequest: {query}", time_serde::date::format(today)),
		}),
	];
	let content = completion::complete(cfg, &messages).await?;
	let json = completion::extract_json(&content).ok_or_else(|| Error::InvalidResponse {
		message: "Query parser output is not JSON.".to_string(),
	})?;

	parse_query_response(json)
}

/// Decodes parser output, dropping blank strings so they read as missing.
pub fn parse_query_response(json: Value) -> Result<ParsedQuery> {
	if !json.is_object() {
		return Err(Error::InvalidResponse {
			message: "Query parser output must be a JSON object.".to_string(),
		});
	}

	let mut parsed: ParsedQuery = serde_json::from_value(json)?;

	for field in [
		&mut parsed.destination,
		&mut parsed.country_code,
		&mut parsed.check_in,
		&mut parsed.check_out,
		&mut parsed.currency,
	] {
		*field = field.take().map(|text| text.trim().to_string()).filter(|text| !text.is_empty());
	}

	parsed.preferences = parsed.preferences.trim().to_string();

	Ok(parsed)
}
