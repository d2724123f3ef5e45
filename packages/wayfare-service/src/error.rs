use serde::Serialize;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Pipeline stage a fatal error is attributed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
	Parse,
	CandidateFetch,
	RateFetch,
	MatchSelect,
	FastEnrich,
	Persist,
}
impl Step {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Parse => "parse",
			Self::CandidateFetch => "candidate_fetch",
			Self::RateFetch => "rate_fetch",
			Self::MatchSelect => "match_select",
			Self::FastEnrich => "fast_enrich",
			Self::Persist => "persist",
		}
	}
}

impl std::fmt::Display for Step {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	/// `step` is set when the request was rejected inside the search pipeline.
	#[error("Invalid request: {message}")]
	Validation { step: Option<Step>, message: String },
	#[error("No availability: {message}")]
	NoAvailability { step: Step, message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Upstream failure at {step}: {message}")]
	Upstream { step: Step, message: String },
	#[error("Internal error: {message}")]
	Internal { message: String },
}
impl Error {
	/// The stage the error is attributed to, when it came out of the search pipeline.
	pub fn step(&self) -> Option<Step> {
		match self {
			Self::Validation { step, .. } => *step,
			Self::NoAvailability { step, .. } | Self::Upstream { step, .. } => Some(*step),
			Self::NotFound { .. } | Self::Internal { .. } => None,
		}
	}

	pub(crate) fn invalid_query(message: impl Into<String>) -> Self {
		Self::Validation { step: Some(Step::Parse), message: message.into() }
	}

	pub(crate) fn upstream(step: Step, err: impl std::fmt::Display) -> Self {
		Self::Upstream { step, message: err.to_string() }
	}
}
