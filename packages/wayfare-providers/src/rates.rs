use serde_json::Value;

use crate::{Error, Result};
use wayfare_domain::{HotelRates, RateOffer, SearchParams, time_serde};

pub async fn fetch_rates(
	cfg: &wayfare_config::ProviderConfig,
	hotel_ids: &[String],
	params: &SearchParams,
) -> Result<Vec<HotelRates>> {
	if hotel_ids.is_empty() {
		return Ok(Vec::new());
	}

	let client = crate::client(cfg.timeout_ms)?;
	let body = serde_json::json!({
		"hotel_ids": hotel_ids,
		"check_in": time_serde::date::format(params.check_in),
		"check_out": time_serde::date::format(params.check_out),
		"adults": params.adults,
		"children": params.children,
		"currency": params.currency,
	});
	let json = crate::send_json(
		client
			.post(crate::endpoint(&cfg.api_base, &cfg.path))
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body),
	)
	.await?;

	parse_rates_response(&json, &params.currency)
}

/// Reads per-hotel offers. Offers without a positive finite amount are dropped; a hotel may end up
/// with no offers at all.
pub fn parse_rates_response(json: &Value, default_currency: &str) -> Result<Vec<HotelRates>> {
	let items = crate::unwrap_data(json).as_array().ok_or_else(|| Error::InvalidResponse {
		message: "Rates response is missing a hotel array.".to_string(),
	})?;
	let mut out = Vec::with_capacity(items.len());

	for item in items {
		let Some(hotel_id) = item.get("hotel_id").and_then(Value::as_str) else {
			continue;
		};
		let offers = item
			.get("offers")
			.and_then(Value::as_array)
			.map(|offers| {
				offers.iter().filter_map(|offer| parse_offer(offer, default_currency)).collect()
			})
			.unwrap_or_default();

		out.push(HotelRates { hotel_id: hotel_id.to_string(), offers });
	}

	Ok(out)
}

fn parse_offer(offer: &Value, default_currency: &str) -> Option<RateOffer> {
	let amount = offer
		.get("amount")
		.or_else(|| offer.get("total"))
		.and_then(Value::as_f64)
		.filter(|amount| amount.is_finite() && *amount > 0.0)?;

	Some(RateOffer {
		room_name: offer
			.get("room_name")
			.and_then(Value::as_str)
			.unwrap_or("Standard room")
			.to_string(),
		board: offer.get("board").and_then(Value::as_str).map(str::to_string),
		amount,
		currency: offer
			.get("currency")
			.and_then(Value::as_str)
			.unwrap_or(default_currency)
			.to_string(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn keeps_hotels_without_offers_and_drops_bad_amounts() {
		let json = serde_json::json!({
			"data": [
				{
					"hotel_id": "H1",
					"offers": [
						{ "room_name": "Double", "board": "BB", "amount": 312.5 },
						{ "room_name": "Broken", "amount": -1 },
						{ "room_name": "Missing" }
					]
				},
				{ "hotel_id": "H2", "offers": [] },
				{ "offers": [{ "amount": 10 }] }
			]
		});
		let rates = parse_rates_response(&json, "EUR").expect("parse failed");

		assert_eq!(rates.len(), 2);
		assert_eq!(rates[0].offers.len(), 1);
		assert_eq!(rates[0].offers[0].currency, "EUR");
		assert!(!rates[1].is_bookable());
	}
}
