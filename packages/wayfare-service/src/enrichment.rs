//! Background completion job: sentiment and guest insight for the shortlisted hotels, merged into
//! the already-returned search record in one write.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use time::OffsetDateTime;
use tokio::time::Instant;

use crate::{CompletionProvider, Error, HotelFetcher, Result};
use wayfare_cache::{CacheClient, MergeOutcome};
use wayfare_config::LlmProviderConfig;
use wayfare_domain::{EnrichmentPayload, InsightSource, SentimentAnalysis, insight};

const MAX_PROMPT_ITEMS: usize = 5;
const INSIGHT_SYSTEM_PROMPT: &str = "You summarize hotel guest reviews for travellers. Reply \
with one or two plain sentences, no lists, no markdown, no quotes.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnrichmentTarget {
	pub hotel_id: String,
	pub name: String,
}

pub struct EnrichmentJob {
	search_id: String,
	targets: Vec<EnrichmentTarget>,
	fetcher: HotelFetcher,
	completion: Arc<dyn CompletionProvider>,
	llm_cfg: Arc<LlmProviderConfig>,
	cache: Arc<CacheClient>,
	stagger: Duration,
	insight_max_chars: usize,
}
impl EnrichmentJob {
	pub fn new(
		search_id: String,
		targets: Vec<EnrichmentTarget>,
		fetcher: HotelFetcher,
		completion: Arc<dyn CompletionProvider>,
		llm_cfg: Arc<LlmProviderConfig>,
		cache: Arc<CacheClient>,
		cfg: &wayfare_config::Enrichment,
	) -> Self {
		Self {
			search_id,
			targets,
			fetcher,
			completion,
			llm_cfg,
			cache,
			stagger: Duration::from_millis(cfg.stagger_ms),
			insight_max_chars: cfg.insight_max_chars as usize,
		}
	}

	/// Produces a payload for every target, then merges them with a single read-modify-write.
	///
	/// A record that expired in the meantime is left alone.
	pub async fn run(self) -> Result<()> {
		let started = Instant::now();
		let payloads = futures::future::join_all(
			self.targets.iter().enumerate().map(|(idx, target)| self.enrich_one(idx, target)),
		)
		.await;
		let insights: BTreeMap<String, EnrichmentPayload> = self
			.targets
			.iter()
			.map(|target| target.hotel_id.clone())
			.zip(payloads)
			.collect();
		let value = wayfare_cache::normalize(&insights);
		let outcome = self
			.cache
			.update_search_enrichment(&self.search_id, &value)
			.await
			.map_err(|err| Error::Internal { message: err.to_string() })?;

		match outcome {
			MergeOutcome::Merged { hotel_count } => tracing::info!(
				search_id = %self.search_id,
				hotel_count,
				elapsed_ms = crate::elapsed_ms(started),
				"Search enrichment completed."
			),
			MergeOutcome::Missing => tracing::info!(
				search_id = %self.search_id,
				"Search record expired before enrichment finished."
			),
			MergeOutcome::Unavailable => {
				return Err(Error::Internal {
					message: format!("Enrichment for search {} could not be stored.", self.search_id),
				});
			},
		}

		Ok(())
	}

	async fn enrich_one(&self, idx: usize, target: &EnrichmentTarget) -> EnrichmentPayload {
		if idx > 0 {
			tokio::time::sleep(self.stagger * idx as u32).await;
		}

		let sentiment = self.fetcher.hotel_sentiment(&target.hotel_id).await;
		let generated = match &sentiment {
			Some(sentiment) => self.generate_insight(target, sentiment).await,
			None => None,
		};
		let (guest_insight, insight_source) = match generated {
			Some(text) => (text, InsightSource::Llm),
			None => {
				tracing::warn!(
					hotel_id = %target.hotel_id,
					has_sentiment = sentiment.is_some(),
					"Using template guest insight."
				);

				(
					insight::trim_text(
						&insight::template_insight(&target.name, sentiment.as_ref()),
						self.insight_max_chars,
					),
					InsightSource::Template,
				)
			},
		};

		EnrichmentPayload {
			guest_insight,
			sentiment_ratings: sentiment.map(|sentiment| sentiment.categories).unwrap_or_default(),
			insight_source,
			updated_at: OffsetDateTime::now_utc(),
		}
	}

	async fn generate_insight(
		&self,
		target: &EnrichmentTarget,
		sentiment: &SentimentAnalysis,
	) -> Option<String> {
		let messages = vec![
			serde_json::json!({ "role": "system", "content": INSIGHT_SYSTEM_PROMPT }),
			serde_json::json!({ "role": "user", "content": insight_prompt(&target.name, sentiment) }),
		];
		let call = self.completion.complete(&self.llm_cfg, &messages);

		match tokio::time::timeout(Duration::from_millis(self.llm_cfg.timeout_ms), call).await {
			Ok(Ok(text)) => {
				let text = insight::trim_text(text.trim().trim_matches('"'), self.insight_max_chars);

				if text.is_empty() { None } else { Some(text) }
			},
			Ok(Err(err)) => {
				tracing::warn!(hotel_id = %target.hotel_id, error = %err, "Insight generation failed.");

				None
			},
			Err(_) => {
				tracing::warn!(hotel_id = %target.hotel_id, "Insight generation timed out.");

				None
			},
		}
	}
}

fn insight_prompt(name: &str, sentiment: &SentimentAnalysis) -> String {
	let mut lines = vec![format!("Hotel: {name}")];

	if let Some(score) = sentiment.overall_score {
		lines.push(format!("Overall score: {score:.1}/10 from {} reviews", sentiment.review_count));
	}
	if !sentiment.categories.is_empty() {
		let ratings: Vec<String> = sentiment
			.categories
			.iter()
			.map(|(category, rating)| format!("{category} {rating:.1}"))
			.collect();

		lines.push(format!("Category ratings: {}", ratings.join(", ")));
	}
	if !sentiment.pros.is_empty() {
		lines.push(format!(
			"Guests liked: {}",
			sentiment.pros.iter().take(MAX_PROMPT_ITEMS).cloned().collect::<Vec<_>>().join("; ")
		));
	}
	if !sentiment.cons.is_empty() {
		lines.push(format!(
			"Guests disliked: {}",
			sentiment.cons.iter().take(MAX_PROMPT_ITEMS).cloned().collect::<Vec<_>>().join("; ")
		));
	}

	lines.join("\n")
}
