pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Cache backend error: {message}")]
	Backend { message: String },
	#[error("Failed to encode cache value: {0}")]
	Encode(#[source] serde_json::Error),
	#[error("Failed to decode cache value: {0}")]
	Decode(#[source] serde_json::Error),
	#[error("Invalid enrichment payload: {message}")]
	InvalidPayload { message: String },
}
