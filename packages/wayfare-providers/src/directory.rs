use serde_json::Value;

use crate::{Error, Result};
use wayfare_domain::HotelCandidate;

pub struct DirectoryQuery<'a> {
	pub destination: &'a str,
	pub country_code: Option<&'a str>,
	pub language: &'a str,
	pub limit: u32,
}

pub async fn fetch_candidates(
	cfg: &wayfare_config::ProviderConfig,
	query: &DirectoryQuery<'_>,
) -> Result<Vec<HotelCandidate>> {
	let client = crate::client(cfg.timeout_ms)?;
	let body = serde_json::json!({
		"destination": query.destination,
		"country_code": query.country_code,
		"language": query.language,
		"limit": query.limit,
	});
	let json = crate::send_json(
		client
			.post(crate::endpoint(&cfg.api_base, &cfg.path))
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body),
	)
	.await?;
	let mut candidates = parse_directory_response(&json)?;

	candidates.truncate(query.limit as usize);

	Ok(candidates)
}

/// Reads directory listings; entries without an id or a name are skipped.
pub fn parse_directory_response(json: &Value) -> Result<Vec<HotelCandidate>> {
	let items = crate::unwrap_data(json).as_array().ok_or_else(|| Error::InvalidResponse {
		message: "Directory response is missing a hotel array.".to_string(),
	})?;

	Ok(items.iter().filter_map(parse_candidate).collect())
}

fn parse_candidate(item: &Value) -> Option<HotelCandidate> {
	let hotel_id = text(item, &["id", "hotel_id"])?;
	let name = text(item, &["name"])?;
	let star_rating = item
		.get("stars")
		.or_else(|| item.get("star_rating"))
		.and_then(Value::as_f64)
		.map(|stars| stars.clamp(0.0, 5.0) as f32)
		.unwrap_or(0.0);
	let main_image = text(item, &["main_photo", "main_image"]);
	let mut images = crate::string_list(item.get("images"));

	if let Some(main) = &main_image
		&& !images.contains(main)
	{
		images.insert(0, main.clone());
	}

	Some(HotelCandidate {
		hotel_id,
		name,
		star_rating,
		city: text(item, &["city"]).unwrap_or_default(),
		country: text(item, &["country"]).unwrap_or_default(),
		address: text(item, &["address"]).unwrap_or_default(),
		latitude: item.get("latitude").and_then(Value::as_f64),
		longitude: item.get("longitude").and_then(Value::as_f64),
		amenities: crate::string_list(item.get("amenities").or_else(|| item.get("facilities"))),
		main_image,
		images,
		price_from: item
			.get("price_from")
			.or_else(|| item.get("min_rate"))
			.and_then(Value::as_f64)
			.filter(|price| price.is_finite() && *price > 0.0),
	})
}

fn text(item: &Value, keys: &[&str]) -> Option<String> {
	keys.iter()
		.find_map(|key| item.get(*key).and_then(Value::as_str))
		.map(str::trim)
		.filter(|text| !text.is_empty())
		.map(str::to_string)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_listings_and_skips_incomplete_entries() {
		let json = serde_json::json!({
			"data": [
				{
					"id": "H1",
					"name": "Casa Azul",
					"stars": 3,
					"city": "Lisbon",
					"facilities": ["Pool", { "name": "Free WiFi" }],
					"main_photo": "https://img/h1-main.jpg",
					"images": ["https://img/h1-a.jpg"]
				},
				{ "id": "H2" },
				{ "hotel_id": "H3", "name": "Alfama Loft", "stars": 9, "price_from": 88.0 }
			]
		});
		let candidates = parse_directory_response(&json).expect("parse failed");

		assert_eq!(candidates.len(), 2);
		assert_eq!(candidates[0].amenities, vec!["Pool", "Free WiFi"]);
		assert_eq!(candidates[0].images, vec!["https://img/h1-main.jpg", "https://img/h1-a.jpg"]);
		assert_eq!(candidates[1].hotel_id, "H3");
		assert_eq!(candidates[1].star_rating, 5.0);
		assert_eq!(candidates[1].price_from, Some(88.0));
		assert_eq!(candidates[0].price_from, None);
	}

	#[test]
	fn non_array_payload_is_invalid() {
		let err = parse_directory_response(&serde_json::json!({ "data": {} }))
			.expect_err("Objects must be rejected.");

		assert!(matches!(err, Error::InvalidResponse { .. }));
	}
}
