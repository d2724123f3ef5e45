use std::{
	collections::hash_map::DefaultHasher,
	hash::{Hash, Hasher},
};

use unicode_segmentation::UnicodeSegmentation;

use crate::SentimentAnalysis;

/// Shown on every shortlisted hotel until the background job merges its payload.
pub const PLACEHOLDER_INSIGHT: &str = "Gathering guest insights…";

/// Used when there is no sentiment signal at all for a hotel.
pub const GENERIC_INSIGHT_TEMPLATES: [&str; 4] = [
	"Guest reviews for {name} are still coming in; early impressions are positive.",
	"{name} has limited recent reviews, so judge it on location and amenities for now.",
	"Not enough guest feedback yet to summarize the experience at {name}.",
	"Recent guest sentiment for {name} is unavailable; the listing details are the best guide.",
];

const RATED_INSIGHT_TEMPLATE: &str = "Guests rate {name} highest for {category} ({score}/10).";
const RATED_WITH_CON_TEMPLATE: &str =
	"Guests rate {name} highest for {category} ({score}/10), with some remarks about {con}.";

/// Deterministic insight text for a hotel whose LLM insight could not be produced.
pub fn template_insight(name: &str, sentiment: Option<&SentimentAnalysis>) -> String {
	if let Some(sentiment) = sentiment
		&& let Some((category, score)) = best_category(sentiment)
	{
		let category = humanize_category(category);
		let score = format!("{score:.1}");

		return match sentiment.cons.first().map(|con| con.trim()).filter(|con| !con.is_empty()) {
			Some(con) => RATED_WITH_CON_TEMPLATE
				.replace("{name}", name)
				.replace("{category}", &category)
				.replace("{score}", &score)
				.replace("{con}", &con.to_lowercase()),
			None => RATED_INSIGHT_TEMPLATE
				.replace("{name}", name)
				.replace("{category}", &category)
				.replace("{score}", &score),
		};
	}

	let mut hasher = DefaultHasher::new();

	Hash::hash(name, &mut hasher);

	let idx = (hasher.finish() % GENERIC_INSIGHT_TEMPLATES.len() as u64) as usize;

	GENERIC_INSIGHT_TEMPLATES[idx].replace("{name}", name)
}

/// Collapses whitespace and cuts `raw` to at most `max_chars` graphemes, ending in an ellipsis when
/// cut.
pub fn trim_text(raw: &str, max_chars: usize) -> String {
	let normalized = normalize_whitespace(raw);

	truncate_graphemes(&normalized, max_chars)
}

fn best_category(sentiment: &SentimentAnalysis) -> Option<(&str, f32)> {
	sentiment
		.categories
		.iter()
		.filter(|(_, score)| score.is_finite())
		.max_by(|a, b| a.1.total_cmp(b.1))
		.map(|(category, score)| (category.as_str(), *score))
}

fn humanize_category(raw: &str) -> String {
	raw.replace(['_', '-'], " ").trim().to_lowercase()
}

fn normalize_whitespace(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());
	let mut prev_space = false;

	for ch in raw.trim().chars() {
		if ch.is_whitespace() {
			if !prev_space {
				out.push(' ');

				prev_space = true;
			}

			continue;
		}

		out.push(ch);

		prev_space = false;
	}

	out
}

fn truncate_graphemes(text: &str, max_chars: usize) -> String {
	if max_chars == 0 {
		return String::new();
	}

	let graphemes: Vec<&str> = text.graphemes(true).collect();

	if graphemes.len() <= max_chars {
		return text.to_string();
	}

	let mut out: String = graphemes[..max_chars - 1].concat();

	out.truncate(out.trim_end().len());
	out.push('…');

	out
}
