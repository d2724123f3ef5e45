//! TTL-backed key/value cache with a never-failing client surface.

pub mod backend;
pub mod client;
pub mod normalize;

mod error;

pub use backend::{BoxFuture, CacheBackend, MemoryBackend};
pub use client::{
	CacheClient, CacheEntry, MergeOutcome, TtlPolicy, decode_enrichment, hotel_detail_key,
	hotel_sentiment_key, search_record_key,
};
pub use error::{Error, Result};
pub use normalize::normalize;
