//! The staged search pipeline.
//!
//! parse → candidate fetch → { rate fetch ∥ match selection } → fast enrich → persist → respond,
//! with the background enrichment job dispatched last. Only parse and candidate failures and a
//! lack of availability are fatal; every other stage degrades.

use std::{
	collections::{HashMap, HashSet},
	sync::Arc,
};

use serde::Deserialize;
use time::OffsetDateTime;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
	EnrichmentJob, EnrichmentTarget, Error, Result, ScoredCandidate, Step, WayfareService,
	matching,
};
use wayfare_domain::{
	CandidateSummary, HotelCandidate, HotelMatch, ParsedQuery, PriceBracket, PriceSnapshot,
	SearchParams, SearchPerformance, SearchRecord, insight, time_serde,
};
use wayfare_providers::directory::DirectoryQuery;

const DEFAULT_ADULTS: u32 = 2;
const DEFAULT_CURRENCY: &str = "EUR";
const MAX_SUMMARY_AMENITIES: usize = 3;
const MAX_QUERY_CHARS: usize = 1_000;

#[derive(Clone, Debug, Deserialize)]
pub struct SearchRequest {
	pub query: String,
}

impl WayfareService {
	/// Runs the fast path and returns the persisted record with `insights_pending = true`.
	pub async fn search(&self, req: SearchRequest) -> Result<SearchRecord> {
		let total = Instant::now();
		let mut performance = SearchPerformance::default();
		let query = req.query.trim();

		if query.is_empty() {
			return Err(Error::invalid_query("query must be non-empty."));
		}
		if query.chars().count() > MAX_QUERY_CHARS {
			return Err(Error::invalid_query(format!(
				"query must be at most {MAX_QUERY_CHARS} characters."
			)));
		}

		let started = Instant::now();
		let today = OffsetDateTime::now_utc().date();
		let parsed = self
			.providers
			.query_parser
			.parse(&self.cfg.providers.query_parser, query, today)
			.await
			.map_err(|err| Error::upstream(Step::Parse, err))?;
		let params = build_params(parsed)?;

		performance.parse_ms = crate::elapsed_ms(started);

		tracing::info!(
			step = Step::Parse.as_str(),
			destination = %params.destination,
			nights = params.nights(),
			elapsed_ms = performance.parse_ms,
			"Query parsed."
		);

		let started = Instant::now();
		let candidates = self.fetch_candidates(&params).await?;

		performance.candidate_ms = crate::elapsed_ms(started);
		performance.candidate_count = candidates.len() as u32;

		let pool_size = candidates.len().min(self.cfg.search.max_match_pool as usize);
		let summaries: Vec<CandidateSummary> =
			candidates[..pool_size].iter().map(summarize).collect();
		let hotel_ids: Vec<String> =
			candidates.iter().map(|candidate| candidate.hotel_id.clone()).collect();
		let rate_fetch = async {
			let started = Instant::now();
			let rates =
				self.providers.rates.rates(&self.cfg.providers.rates, &hotel_ids, &params).await;

			(rates, crate::elapsed_ms(started))
		};
		let match_select = async {
			let started = Instant::now();
			let pool = self.score_candidates(&summaries, &params.preferences).await;

			(pool, crate::elapsed_ms(started))
		};
		let ((rates, rate_ms), (scored, match_ms)) = tokio::join!(rate_fetch, match_select);

		performance.rate_ms = rate_ms;
		performance.match_ms = match_ms;
		performance.heuristic_batches = scored.heuristic_batches;

		let requested: HashSet<&str> = hotel_ids.iter().map(String::as_str).collect();
		let prices: HashMap<String, PriceSnapshot> = rates
			.map_err(|err| Error::upstream(Step::RateFetch, err))?
			.into_iter()
			.filter(|rates| requested.contains(rates.hotel_id.as_str()))
			.filter_map(|rates| rates.cheapest().map(|price| (rates.hotel_id, price)))
			.collect();

		performance.bookable_count = prices.len() as u32;

		if prices.is_empty() {
			return Err(Error::NoAvailability {
				step: Step::RateFetch,
				message: format!(
					"No bookable hotels in {} between {} and {}.",
					params.destination,
					time_serde::date::format(params.check_in),
					time_serde::date::format(params.check_out)
				),
			});
		}

		// Bookable hotels past the match pool were never ranked; they compete on heuristic scores.
		let overflow: Vec<CandidateSummary> = candidates[pool_size..]
			.iter()
			.filter(|candidate| prices.contains_key(&candidate.hotel_id))
			.map(summarize)
			.collect();
		let mut ranked = scored.candidates;

		if !overflow.is_empty() {
			tracing::info!(
				step = Step::MatchSelect.as_str(),
				count = overflow.len(),
				"Scoring bookable hotels outside the match pool heuristically."
			);

			ranked.extend(self.score_heuristically(&overflow));
		}

		// Every bookable candidate is now scored, so the shortlist is non-empty.
		let picks = matching::shortlist(
			ranked,
			|candidate| prices.contains_key(&candidate.hotel_id),
			self.cfg.search.shortlist_size as usize,
		);

		tracing::info!(
			step = Step::MatchSelect.as_str(),
			candidates = summaries.len() + overflow.len(),
			bookable = prices.len(),
			heuristic_batches = performance.heuristic_batches,
			rate_ms = performance.rate_ms,
			match_ms = performance.match_ms,
			"Shortlist selected."
		);

		let started = Instant::now();
		let by_id: HashMap<&str, &HotelCandidate> =
			candidates.iter().map(|candidate| (candidate.hotel_id.as_str(), candidate)).collect();
		let recommendations = self.fast_enrich(picks, &by_id, &prices).await;

		performance.enrich_ms = crate::elapsed_ms(started);
		performance.total_ms = crate::elapsed_ms(total);

		let now = OffsetDateTime::now_utc();
		let record = SearchRecord {
			id: Uuid::new_v4().to_string(),
			search_params: params,
			recommendations,
			insights_pending: true,
			insights: None,
			generated_at: now,
			updated_at: None,
			performance,
		};

		if !self.cache.set_search_record(&record).await {
			// The caller still gets the shortlist; it will simply never complete.
			tracing::warn!(
				step = Step::Persist.as_str(),
				search_id = %record.id,
				"Search record could not be cached; background enrichment skipped."
			);

			return Ok(record);
		}

		self.dispatch_enrichment(&record);

		tracing::info!(
			search_id = %record.id,
			hotels = record.recommendations.len(),
			total_ms = record.performance.total_ms,
			"Search completed."
		);

		Ok(record)
	}

	/// Submits the background job for `record`. Called once per freshly generated search id.
	fn dispatch_enrichment(&self, record: &SearchRecord) {
		let targets = record
			.recommendations
			.iter()
			.map(|hotel| EnrichmentTarget {
				hotel_id: hotel.hotel_id.clone(),
				name: hotel.name.clone(),
			})
			.collect();
		let job = EnrichmentJob::new(
			record.id.clone(),
			targets,
			self.fetcher.clone(),
			self.providers.completion.clone(),
			Arc::new(self.cfg.providers.llm.clone()),
			self.cache.clone(),
			&self.cfg.enrichment,
		);

		self.tasks.spawn("search_enrichment", job.run());
	}

	async fn fetch_candidates(&self, params: &SearchParams) -> Result<Vec<HotelCandidate>> {
		let limit = self.cfg.search.candidate_limit;
		let query = DirectoryQuery {
			destination: &params.destination,
			country_code: params.country_code.as_deref(),
			language: &self.cfg.search.language,
			limit,
		};
		let fetched = self
			.providers
			.directory
			.candidates(&self.cfg.providers.directory, &query)
			.await
			.map_err(|err| Error::upstream(Step::CandidateFetch, err))?;
		let mut seen = HashSet::new();
		let candidates: Vec<HotelCandidate> = fetched
			.into_iter()
			.filter(|candidate| seen.insert(candidate.hotel_id.clone()))
			.take(limit as usize)
			.collect();

		if candidates.is_empty() {
			return Err(Error::NoAvailability {
				step: Step::CandidateFetch,
				message: format!("No hotels listed for {}.", params.destination),
			});
		}

		tracing::info!(
			step = Step::CandidateFetch.as_str(),
			count = candidates.len(),
			"Candidates fetched."
		);

		Ok(candidates)
	}

	/// Fetches detail for the shortlisted hotels only. A failed fetch falls back to the directory
	/// images for that hotel alone.
	async fn fast_enrich(
		&self,
		picks: Vec<ScoredCandidate>,
		by_id: &HashMap<&str, &HotelCandidate>,
		prices: &HashMap<String, PriceSnapshot>,
	) -> Vec<HotelMatch> {
		let details = futures::future::join_all(
			picks.iter().map(|pick| self.fetcher.hotel_detail(&pick.hotel_id)),
		)
		.await;
		let gallery_limit = self.cfg.enrichment.gallery_limit as usize;

		picks
			.into_iter()
			.zip(details)
			.map(|(pick, detail)| {
				let candidate = by_id.get(pick.hotel_id.as_str()).copied();
				let mut gallery = Vec::new();

				if let Some(detail) = &detail {
					gallery.extend(detail.images.iter().cloned());
				} else {
					tracing::warn!(
						step = Step::FastEnrich.as_str(),
						hotel_id = %pick.hotel_id,
						"Hotel detail unavailable; using directory images."
					);
				}
				if let Some(candidate) = candidate {
					gallery.extend(candidate.main_image.iter().cloned());
					gallery.extend(candidate.images.iter().cloned());
				}

				let mut seen = HashSet::new();

				gallery.retain(|image| seen.insert(image.clone()));
				gallery.truncate(gallery_limit);

				HotelMatch {
					price: prices.get(&pick.hotel_id).cloned(),
					star_rating: candidate.map(|candidate| candidate.star_rating).unwrap_or(0.0),
					address: candidate.map(|candidate| candidate.address.clone()).unwrap_or_default(),
					city: candidate.map(|candidate| candidate.city.clone()).unwrap_or_default(),
					hotel_id: pick.hotel_id,
					name: pick.name,
					match_score: pick.match_score,
					rationale: pick.rationale,
					highlights: pick.highlights,
					gallery,
					guest_insight: insight::PLACEHOLDER_INSIGHT.to_string(),
					score_source: pick.score_source,
				}
			})
			.collect()
	}
}

/// Turns parser output into validated search parameters.
pub fn build_params(parsed: ParsedQuery) -> Result<SearchParams> {
	let destination = parsed
		.destination
		.ok_or_else(|| Error::invalid_query("Could not tell where you want to stay."))?;
	let check_in = required_date(parsed.check_in.as_deref(), "check-in")?;
	let check_out = required_date(parsed.check_out.as_deref(), "check-out")?;

	if check_out <= check_in {
		return Err(Error::invalid_query("check-out must be after check-in."));
	}

	let adults = parsed.adults.unwrap_or(DEFAULT_ADULTS);

	if adults == 0 {
		return Err(Error::invalid_query("At least one adult is required."));
	}

	for (field, bound) in [("budget_min", parsed.budget_min), ("budget_max", parsed.budget_max)] {
		if let Some(bound) = bound
			&& (!bound.is_finite() || bound < 0.0)
		{
			return Err(Error::invalid_query(format!("{field} must be a non-negative number.")));
		}
	}

	if let (Some(min), Some(max)) = (parsed.budget_min, parsed.budget_max)
		&& min > max
	{
		return Err(Error::invalid_query("budget_min must not exceed budget_max."));
	}

	Ok(SearchParams {
		destination,
		country_code: parsed.country_code.map(|code| code.to_uppercase()),
		check_in,
		check_out,
		adults,
		children: parsed.children.unwrap_or(0),
		budget_min: parsed.budget_min,
		budget_max: parsed.budget_max,
		currency: parsed
			.currency
			.map(|currency| currency.to_uppercase())
			.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
		preferences: parsed.preferences,
	})
}

fn required_date(raw: Option<&str>, label: &str) -> Result<time::Date> {
	let raw = raw.ok_or_else(|| Error::invalid_query(format!("Could not tell the {label} date.")))?;

	time_serde::date::parse(raw).ok_or_else(|| {
		Error::invalid_query(format!("The {label} date {raw:?} is not a calendar date."))
	})
}

fn summarize(candidate: &HotelCandidate) -> CandidateSummary {
	CandidateSummary {
		hotel_id: candidate.hotel_id.clone(),
		name: candidate.name.clone(),
		stars: candidate.star_rating,
		city: candidate.city.clone(),
		price_bracket: PriceBracket::from_nightly(candidate.price_from),
		amenities: candidate.amenities.iter().take(MAX_SUMMARY_AMENITIES).cloned().collect(),
	}
}
