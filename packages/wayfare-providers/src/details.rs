use std::collections::BTreeMap;

use serde_json::Value;

use crate::{Error, Result};
use wayfare_domain::{HotelDetail, SentimentAnalysis};

pub async fn fetch_detail(
	cfg: &wayfare_config::ProviderConfig,
	hotel_id: &str,
) -> Result<HotelDetail> {
	let json = get_for_hotel(cfg, hotel_id).await?;

	parse_detail_response(hotel_id, &json)
}

pub async fn fetch_sentiment(
	cfg: &wayfare_config::ProviderConfig,
	hotel_id: &str,
) -> Result<SentimentAnalysis> {
	let json = get_for_hotel(cfg, hotel_id).await?;

	parse_sentiment_response(hotel_id, &json)
}

async fn get_for_hotel(cfg: &wayfare_config::ProviderConfig, hotel_id: &str) -> Result<Value> {
	let client = crate::client(cfg.timeout_ms)?;

	crate::send_json(
		client
			.get(crate::endpoint(&cfg.api_base, &cfg.path))
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.query(&[("hotel_id", hotel_id)]),
	)
	.await
}

pub fn parse_detail_response(hotel_id: &str, json: &Value) -> Result<HotelDetail> {
	let data = crate::unwrap_data(json);

	if !data.is_object() {
		return Err(Error::InvalidResponse {
			message: format!("Detail response for {hotel_id} is not an object."),
		});
	}

	Ok(HotelDetail {
		hotel_id: hotel_id.to_string(),
		description: data
			.get("description")
			.or_else(|| data.get("hotel_description"))
			.and_then(Value::as_str)
			.map(str::trim)
			.filter(|text| !text.is_empty())
			.map(str::to_string),
		images: crate::string_list(data.get("images").or_else(|| data.get("hotel_images"))),
		facilities: crate::string_list(data.get("facilities")),
	})
}

/// Category ratings arrive either as an object or as `[{ "name", "rating" }]`; both are accepted.
pub fn parse_sentiment_response(hotel_id: &str, json: &Value) -> Result<SentimentAnalysis> {
	let data = crate::unwrap_data(json);

	if !data.is_object() {
		return Err(Error::InvalidResponse {
			message: format!("Sentiment response for {hotel_id} is not an object."),
		});
	}

	let mut categories = BTreeMap::new();

	match data.get("categories") {
		Some(Value::Object(map)) =>
			for (name, rating) in map {
				if let Some(rating) = rating.as_f64() {
					categories.insert(name.clone(), rating as f32);
				}
			},
		Some(Value::Array(items)) =>
			for item in items {
				if let Some(name) = item.get("name").and_then(Value::as_str)
					&& let Some(rating) = item.get("rating").and_then(Value::as_f64)
				{
					categories.insert(name.to_string(), rating as f32);
				}
			},
		_ => {},
	}

	Ok(SentimentAnalysis {
		hotel_id: hotel_id.to_string(),
		overall_score: data.get("overall_score").and_then(Value::as_f64).map(|score| score as f32),
		categories,
		pros: crate::string_list(data.get("pros")),
		cons: crate::string_list(data.get("cons")),
		review_count: data
			.get("review_count")
			.and_then(Value::as_u64)
			.map(|count| count.min(u64::from(u32::MAX)) as u32)
			.unwrap_or(0),
	})
}
