pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Provider rate limited the request.")]
	RateLimited,
	#[error("Provider responded with status {status}.")]
	Status { status: u16 },
	#[error("Provider request timed out.")]
	Timeout,
	#[error(transparent)]
	Reqwest(reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	InvalidResponse { message: String },
}
impl Error {
	pub fn is_rate_limited(&self) -> bool {
		matches!(self, Self::RateLimited)
	}
}

impl From<reqwest::Error> for Error {
	fn from(err: reqwest::Error) -> Self {
		if err.is_timeout() {
			return Self::Timeout;
		}
		if let Some(status) = err.status() {
			return classify_status(status.as_u16());
		}

		Self::Reqwest(err)
	}
}

pub(crate) fn classify_status(status: u16) -> Error {
	if status == 429 { Error::RateLimited } else { Error::Status { status } }
}
