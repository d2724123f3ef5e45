use serde_json::Value;

use crate::{Error, Result};

/// Sends a chat completion request and returns the first choice's text.
pub async fn complete(cfg: &wayfare_config::LlmProviderConfig, messages: &[Value]) -> Result<String> {
	let client = crate::client(cfg.timeout_ms)?;
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
	});
	let json = crate::send_json(
		client
			.post(crate::endpoint(&cfg.api_base, &cfg.path))
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body),
	)
	.await?;

	parse_completion_content(&json)
}

pub fn parse_completion_content(json: &Value) -> Result<String> {
	json.get("choices")
		.and_then(Value::as_array)
		.and_then(|choices| choices.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|message| message.get("content"))
		.and_then(Value::as_str)
		.map(str::to_string)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Completion response is missing choice content.".to_string(),
		})
}

/// Pulls the first JSON object or array out of model output.
///
/// Markdown fences and surrounding prose are ignored. Returns `None` when no balanced JSON value
/// can be found or the candidate text does not decode.
pub fn extract_json(text: &str) -> Option<Value> {
	let trimmed = strip_fence(text.trim());

	if let Ok(value) = serde_json::from_str::<Value>(trimmed)
		&& (value.is_object() || value.is_array())
	{
		return Some(value);
	}

	let start = trimmed.find(['{', '['])?;
	let end = balanced_end(&trimmed[start..])?;

	serde_json::from_str(&trimmed[start..start + end]).ok()
}

fn strip_fence(text: &str) -> &str {
	let Some(rest) = text.strip_prefix("```") else {
		return text;
	};
	// Drop the info string, e.g. "json".
	let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);

	rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn balanced_end(text: &str) -> Option<usize> {
	let mut depth = 0_usize;
	let mut in_string = false;
	let mut escaped = false;

	for (idx, ch) in text.char_indices() {
		if in_string {
			match ch {
				_ if escaped => escaped = false,
				'\\' => escaped = true,
				'"' => in_string = false,
				_ => {},
			}

			continue;
		}

		match ch {
			'"' => in_string = true,
			'{' | '[' => depth += 1,
			'}' | ']' => {
				depth = depth.checked_sub(1)?;

				if depth == 0 {
					return Some(idx + ch.len_utf8());
				}
			},
			_ => {},
		}
	}

	None
}
