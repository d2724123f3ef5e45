use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

/// Raw parser output. Any field may be missing; the orchestrator decides which are required.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuery {
	pub destination: Option<String>,
	pub country_code: Option<String>,
	/// `YYYY-MM-DD`.
	pub check_in: Option<String>,
	/// `YYYY-MM-DD`.
	pub check_out: Option<String>,
	pub adults: Option<u32>,
	pub children: Option<u32>,
	pub budget_min: Option<f64>,
	pub budget_max: Option<f64>,
	pub currency: Option<String>,
	#[serde(default)]
	pub preferences: String,
}

/// Structured form of a free-text hotel query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
	pub destination: String,
	#[serde(default)]
	pub country_code: Option<String>,
	#[serde(with = "crate::time_serde::date")]
	pub check_in: Date,
	#[serde(with = "crate::time_serde::date")]
	pub check_out: Date,
	pub adults: u32,
	#[serde(default)]
	pub children: u32,
	#[serde(default)]
	pub budget_min: Option<f64>,
	#[serde(default)]
	pub budget_max: Option<f64>,
	#[serde(default = "default_currency")]
	pub currency: String,
	/// Whatever the parser could not map to a structured field.
	#[serde(default)]
	pub preferences: String,
}
impl SearchParams {
	pub fn nights(&self) -> u32 {
		(self.check_out - self.check_in).whole_days().max(1) as u32
	}
}

/// Static directory metadata for one hotel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HotelCandidate {
	pub hotel_id: String,
	pub name: String,
	#[serde(default)]
	pub star_rating: f32,
	#[serde(default)]
	pub city: String,
	#[serde(default)]
	pub country: String,
	#[serde(default)]
	pub address: String,
	#[serde(default)]
	pub latitude: Option<f64>,
	#[serde(default)]
	pub longitude: Option<f64>,
	#[serde(default)]
	pub amenities: Vec<String>,
	#[serde(default)]
	pub main_image: Option<String>,
	#[serde(default)]
	pub images: Vec<String>,
	/// Indicative nightly price published by the directory, if any.
	#[serde(default)]
	pub price_from: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateOffer {
	pub room_name: String,
	#[serde(default)]
	pub board: Option<String>,
	/// Total price for the whole stay.
	pub amount: f64,
	pub currency: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HotelRates {
	pub hotel_id: String,
	pub offers: Vec<RateOffer>,
}
impl HotelRates {
	pub fn is_bookable(&self) -> bool {
		self.offers.iter().any(|offer| offer.amount.is_finite() && offer.amount > 0.0)
	}

	pub fn cheapest(&self) -> Option<PriceSnapshot> {
		self.offers
			.iter()
			.filter(|offer| offer.amount.is_finite() && offer.amount > 0.0)
			.min_by(|a, b| a.amount.total_cmp(&b.amount))
			.map(|offer| PriceSnapshot {
				amount: offer.amount,
				currency: offer.currency.clone(),
				room_name: offer.room_name.clone(),
				board: offer.board.clone(),
			})
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
	pub amount: f64,
	pub currency: String,
	pub room_name: String,
	#[serde(default)]
	pub board: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceBracket {
	Budget,
	Midrange,
	Upscale,
	Luxury,
	Unknown,
}
impl PriceBracket {
	pub fn from_nightly(amount: Option<f64>) -> Self {
		match amount {
			Some(value) if !value.is_finite() || value <= 0.0 => Self::Unknown,
			Some(value) if value < 100.0 => Self::Budget,
			Some(value) if value < 200.0 => Self::Midrange,
			Some(value) if value < 350.0 => Self::Upscale,
			Some(_) => Self::Luxury,
			None => Self::Unknown,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Budget => "budget",
			Self::Midrange => "midrange",
			Self::Upscale => "upscale",
			Self::Luxury => "luxury",
			Self::Unknown => "unknown",
		}
	}
}

/// Compact candidate view sent to the match selector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateSummary {
	pub hotel_id: String,
	pub name: String,
	pub stars: f32,
	pub city: String,
	pub price_bracket: PriceBracket,
	pub amenities: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
	Llm,
	Heuristic,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HotelMatch {
	pub hotel_id: String,
	pub name: String,
	/// 0-100, strictly distinct within one shortlist.
	pub match_score: u8,
	pub star_rating: f32,
	#[serde(default)]
	pub price: Option<PriceSnapshot>,
	pub rationale: String,
	#[serde(default)]
	pub highlights: Vec<String>,
	#[serde(default)]
	pub gallery: Vec<String>,
	pub guest_insight: String,
	#[serde(default)]
	pub address: String,
	#[serde(default)]
	pub city: String,
	pub score_source: ScoreSource,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightSource {
	Llm,
	Template,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentPayload {
	pub guest_insight: String,
	#[serde(default)]
	pub sentiment_ratings: BTreeMap<String, f32>,
	pub insight_source: InsightSource,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPerformance {
	pub parse_ms: u64,
	pub candidate_ms: u64,
	pub rate_ms: u64,
	pub match_ms: u64,
	pub enrich_ms: u64,
	pub total_ms: u64,
	pub candidate_count: u32,
	pub bookable_count: u32,
	pub heuristic_batches: u32,
}

/// The cached, evolving result of one search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
	pub id: String,
	pub search_params: SearchParams,
	pub recommendations: Vec<HotelMatch>,
	pub insights_pending: bool,
	#[serde(default)]
	pub insights: Option<BTreeMap<String, EnrichmentPayload>>,
	#[serde(with = "crate::time_serde")]
	pub generated_at: OffsetDateTime,
	#[serde(with = "crate::time_serde::option", default)]
	pub updated_at: Option<OffsetDateTime>,
	#[serde(default)]
	pub performance: SearchPerformance,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HotelDetail {
	pub hotel_id: String,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub images: Vec<String>,
	#[serde(default)]
	pub facilities: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SentimentAnalysis {
	pub hotel_id: String,
	#[serde(default)]
	pub overall_score: Option<f32>,
	#[serde(default)]
	pub categories: BTreeMap<String, f32>,
	#[serde(default)]
	pub pros: Vec<String>,
	#[serde(default)]
	pub cons: Vec<String>,
	#[serde(default)]
	pub review_count: u32,
}

fn default_currency() -> String {
	"EUR".to_string()
}
