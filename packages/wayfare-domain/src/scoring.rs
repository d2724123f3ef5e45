//! Match-score policy: the heuristic fallback scorer and the spreading pass that keeps a
//! shortlist's scores pairwise distinct.

use rand::{Rng, SeedableRng, rngs::StdRng};

pub const MAX_MATCH_SCORE: u8 = 100;

const HEURISTIC_BASE: f32 = 50.0;
const HEURISTIC_PER_STAR: f32 = 7.0;
const HEURISTIC_JITTER: u8 = 10;

/// Star-rating based scorer used when the LLM cannot rank a batch.
///
/// With a fixed seed the sequence of scores is reproducible, which is what tests rely on.
pub struct HeuristicScorer {
	rng: StdRng,
}
impl HeuristicScorer {
	pub fn new(seed: Option<u64>) -> Self {
		let rng = match seed {
			Some(seed) => StdRng::seed_from_u64(seed),
			None => StdRng::from_os_rng(),
		};

		Self { rng }
	}

	/// Returns a score in `50..=95`: 7 points per star (capped at five) plus up to 10 points of
	/// jitter.
	pub fn score(&mut self, star_rating: f32) -> u8 {
		let stars = if star_rating.is_finite() { star_rating.clamp(0.0, 5.0) } else { 0.0 };
		let base = (HEURISTIC_BASE + stars * HEURISTIC_PER_STAR).round() as u8;
		let jitter = self.rng.random_range(0..=HEURISTIC_JITTER);

		base.saturating_add(jitter).min(MAX_MATCH_SCORE)
	}
}

/// Clamps an arbitrary model-provided number onto the 0-100 scale.
pub fn clamp_score(raw: f64) -> Option<u8> {
	if !raw.is_finite() {
		return None;
	}

	Some(raw.round().clamp(0.0, MAX_MATCH_SCORE as f64) as u8)
}

/// Makes scores strictly decreasing while keeping their order.
///
/// `scores` must already be in rank order (best first, ties in any order). Each score that is not
/// below its predecessor is lowered to one under it, so already-distinct input comes back
/// unchanged and duplicates move as little as possible. If that pushes the tail below zero the
/// tail is lifted back onto the scale. Inputs longer than 101 cannot be distinct on a 0-100 scale;
/// their tail saturates at zero.
pub fn spread_scores(scores: &[u8]) -> Vec<u8> {
	let mut out: Vec<i32> = scores.iter().map(|score| *score as i32).collect();

	for idx in 1..out.len() {
		if out[idx] >= out[idx - 1] {
			out[idx] = out[idx - 1] - 1;
		}
	}

	let len = out.len();

	for (idx, score) in out.iter_mut().enumerate() {
		let floor = (len - 1 - idx) as i32;

		if *score < floor {
			*score = floor;
		}
	}
	for idx in (0..len.saturating_sub(1)).rev() {
		if out[idx] <= out[idx + 1] {
			out[idx] = out[idx + 1] + 1;
		}
	}

	out.into_iter().map(|score| score.clamp(0, MAX_MATCH_SCORE as i32) as u8).collect()
}

pub fn is_strictly_decreasing(scores: &[u8]) -> bool {
	scores.windows(2).all(|pair| pair[0] > pair[1])
}
