pub mod insight;
pub mod model;
pub mod scoring;
pub mod time_serde;

pub use model::{
	CandidateSummary, EnrichmentPayload, HotelCandidate, HotelDetail, HotelMatch, HotelRates,
	InsightSource, ParsedQuery, PriceBracket, PriceSnapshot, RateOffer, ScoreSource, SearchParams,
	SearchPerformance, SearchRecord, SentimentAnalysis,
};
