//! Match selection: LLM ranking in batches with a per-batch heuristic fallback, then a stable cut
//! to the shortlist and score spreading.

use std::{collections::HashMap, time::Duration};

use serde_json::Value;
use tokio::time::Instant;

use crate::WayfareService;
use wayfare_domain::{
	CandidateSummary, ScoreSource,
	scoring::{self, HeuristicScorer},
};
use wayfare_providers::completion;

const MAX_HIGHLIGHTS: usize = 3;
const MATCH_SYSTEM_PROMPT: &str = "You rank hotels for a traveller. You receive the traveller's \
preferences and a JSON array of hotels. Reply with one JSON object of the form {\"matches\": \
[{\"hotel_id\": string, \"match_score\": integer 0-100, \"rationale\": string (one sentence), \
\"highlights\": [string]}]} covering every hotel you were given. Use distinct scores.";

#[derive(Clone, Debug, PartialEq)]
pub struct ScoredCandidate {
	pub hotel_id: String,
	pub name: String,
	pub match_score: u8,
	pub rationale: String,
	pub highlights: Vec<String>,
	pub score_source: ScoreSource,
}

/// Every summary that went in, scored, in input order.
#[derive(Clone, Debug, Default)]
pub struct ScoredPool {
	pub candidates: Vec<ScoredCandidate>,
	pub heuristic_batches: u32,
}

#[derive(Debug)]
struct BatchPick {
	match_score: u8,
	rationale: String,
	highlights: Vec<String>,
}

impl WayfareService {
	/// Scores every summary. Batches go to the LLM concurrently; a batch whose call fails or
	/// whose output cannot be read is scored heuristically instead.
	pub async fn score_candidates(
		&self,
		summaries: &[CandidateSummary],
		preferences: &str,
	) -> ScoredPool {
		let batch_size = (self.cfg.search.match_batch_size as usize).max(1);
		let batches: Vec<&[CandidateSummary]> = summaries.chunks(batch_size).collect();
		let responses = futures::future::join_all(
			batches.iter().enumerate().map(|(idx, batch)| self.rank_batch(idx, batch, preferences)),
		)
		.await;
		let mut scorer = HeuristicScorer::new(self.cfg.search.scoring_seed);
		let mut pool = ScoredPool {
			candidates: Vec::with_capacity(summaries.len()),
			heuristic_batches: 0,
		};

		for (batch, response) in batches.into_iter().zip(responses) {
			let Some(mut picks) = response else {
				pool.heuristic_batches += 1;

				pool.candidates.extend(batch.iter().map(|summary| heuristic(&mut scorer, summary)));

				continue;
			};

			for summary in batch {
				let scored = match picks.remove(&summary.hotel_id) {
					Some(pick) => ScoredCandidate {
						hotel_id: summary.hotel_id.clone(),
						name: summary.name.clone(),
						match_score: pick.match_score,
						rationale: pick.rationale,
						highlights: pick.highlights,
						score_source: ScoreSource::Llm,
					},
					// Omitted by the model.
					None => heuristic(&mut scorer, summary),
				};

				pool.candidates.push(scored);
			}
		}

		pool
	}

	/// Heuristic scores for hotels that never went to the LLM.
	pub fn score_heuristically(&self, summaries: &[CandidateSummary]) -> Vec<ScoredCandidate> {
		let mut scorer = HeuristicScorer::new(self.cfg.search.scoring_seed);

		summaries.iter().map(|summary| heuristic(&mut scorer, summary)).collect()
	}

	/// Scores the pool and cuts it to the shortlist with no eligibility filter.
	pub async fn select_matches(
		&self,
		summaries: &[CandidateSummary],
		preferences: &str,
	) -> Vec<ScoredCandidate> {
		let pool = self.score_candidates(summaries, preferences).await;

		shortlist(pool.candidates, |_| true, self.cfg.search.shortlist_size as usize)
	}

	async fn rank_batch(
		&self,
		batch_idx: usize,
		batch: &[CandidateSummary],
		preferences: &str,
	) -> Option<HashMap<String, BatchPick>> {
		let cfg = &self.cfg.providers.llm;
		let messages = vec![
			serde_json::json!({ "role": "system", "content": MATCH_SYSTEM_PROMPT }),
			serde_json::json!({
				"role": "user",
				"content": serde_json::json!({
					"preferences": preferences,
					"hotels": batch,
				})
				.to_string(),
			}),
		];
		let started = Instant::now();
		let call = self.providers.completion.complete(cfg, &messages);
		let content = match tokio::time::timeout(Duration::from_millis(cfg.timeout_ms), call).await {
			Ok(Ok(content)) => content,
			Ok(Err(err)) => {
				tracing::warn!(
					batch = batch_idx,
					size = batch.len(),
					error = %err,
					"Match batch failed; falling back to heuristic scores."
				);

				return None;
			},
			Err(_) => {
				tracing::warn!(
					batch = batch_idx,
					size = batch.len(),
					"Match batch timed out; falling back to heuristic scores."
				);

				return None;
			},
		};
		let picks = parse_batch_response(&content, batch);

		if picks.is_none() {
			tracing::warn!(
				batch = batch_idx,
				size = batch.len(),
				"Match batch output is unreadable; falling back to heuristic scores."
			);
		} else {
			tracing::debug!(
				batch = batch_idx,
				size = batch.len(),
				elapsed_ms = crate::elapsed_ms(started),
				"Match batch ranked."
			);
		}

		picks
	}
}

/// Keeps eligible candidates, orders them best first (ties keep input order), cuts to `k` and
/// spreads the scores so they are pairwise distinct.
///
/// Returns exactly `min(k, eligible count)` items.
pub fn shortlist<P>(candidates: Vec<ScoredCandidate>, eligible: P, k: usize) -> Vec<ScoredCandidate>
where
	P: Fn(&ScoredCandidate) -> bool,
{
	let mut ranked: Vec<ScoredCandidate> =
		candidates.into_iter().filter(|candidate| eligible(candidate)).collect();

	ranked.sort_by(|a, b| b.match_score.cmp(&a.match_score));
	ranked.truncate(k);

	let scores: Vec<u8> = ranked.iter().map(|candidate| candidate.match_score).collect();

	if !scoring::is_strictly_decreasing(&scores) {
		let spread = scoring::spread_scores(&scores);

		tracing::debug!(before = ?scores, after = ?spread, "Spread duplicate match scores.");

		for (candidate, score) in ranked.iter_mut().zip(spread) {
			candidate.match_score = score;
		}
	}

	ranked
}

/// Reads model output for one batch. Entries for hotels outside the batch, duplicates and entries
/// without a usable score are ignored; `None` means nothing usable came back.
fn parse_batch_response(
	content: &str,
	batch: &[CandidateSummary],
) -> Option<HashMap<String, BatchPick>> {
	let json = completion::extract_json(content)?;
	let items = match &json {
		Value::Array(items) => items,
		Value::Object(map) => map.get("matches").and_then(Value::as_array)?,
		_ => return None,
	};
	let mut picks = HashMap::new();

	for item in items {
		let Some(hotel_id) = item.get("hotel_id").and_then(Value::as_str) else {
			continue;
		};

		if picks.contains_key(hotel_id) || !batch.iter().any(|summary| summary.hotel_id == hotel_id)
		{
			continue;
		}

		let Some(match_score) = item
			.get("match_score")
			.or_else(|| item.get("score"))
			.and_then(Value::as_f64)
			.and_then(scoring::clamp_score)
		else {
			continue;
		};
		let rationale = item
			.get("rationale")
			.and_then(Value::as_str)
			.map(str::trim)
			.unwrap_or_default()
			.to_string();
		let highlights = item
			.get("highlights")
			.and_then(Value::as_array)
			.map(|items| {
				items
					.iter()
					.filter_map(Value::as_str)
					.map(str::trim)
					.filter(|text| !text.is_empty())
					.take(MAX_HIGHLIGHTS)
					.map(str::to_string)
					.collect()
			})
			.unwrap_or_default();

		picks.insert(hotel_id.to_string(), BatchPick { match_score, rationale, highlights });
	}

	if picks.is_empty() { None } else { Some(picks) }
}

fn heuristic(scorer: &mut HeuristicScorer, summary: &CandidateSummary) -> ScoredCandidate {
	ScoredCandidate {
		hotel_id: summary.hotel_id.clone(),
		name: summary.name.clone(),
		match_score: scorer.score(summary.stars),
		rationale: heuristic_rationale(summary),
		highlights: summary.amenities.iter().take(MAX_HIGHLIGHTS).cloned().collect(),
		score_source: ScoreSource::Heuristic,
	}
}

fn heuristic_rationale(summary: &CandidateSummary) -> String {
	let place = if summary.city.is_empty() { String::new() } else { format!(" in {}", summary.city) };

	if summary.stars > 0.0 {
		format!("{:.0}-star stay{place}, ranked by rating.", summary.stars)
	} else {
		format!("Stay{place}, ranked by rating.")
	}
}
