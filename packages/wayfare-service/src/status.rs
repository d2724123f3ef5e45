use std::collections::BTreeMap;

use serde::Serialize;
use time::OffsetDateTime;

use crate::{Error, Result, WayfareService};
use wayfare_domain::{EnrichmentPayload, HotelMatch, SearchRecord, time_serde};

/// Enrichment state of one search plus its shortlist.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchResults {
	pub search_id: String,
	pub insights_pending: bool,
	pub insights: Option<BTreeMap<String, EnrichmentPayload>>,
	#[serde(with = "time_serde::option")]
	pub updated_at: Option<OffsetDateTime>,
	pub recommendations: Vec<HotelMatch>,
}

/// Cheap view for repeated polling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchProgress {
	pub search_id: String,
	pub completed: bool,
	#[serde(with = "time_serde::option")]
	pub updated_at: Option<OffsetDateTime>,
	pub hotel_count: usize,
}

impl WayfareService {
	/// The stored record. Unknown and expired ids are both reported as not found.
	pub async fn get_search(&self, search_id: &str) -> Result<SearchRecord> {
		let search_id = search_id.trim();

		if search_id.is_empty() {
			return Err(Error::Validation {
				step: None,
				message: "search_id must be non-empty.".to_string(),
			});
		}

		self.cache.get_search_record(search_id).await.ok_or_else(|| Error::NotFound {
			message: format!("Search {search_id} does not exist or has expired."),
		})
	}

	pub async fn search_results(&self, search_id: &str) -> Result<SearchResults> {
		let record = self.get_search(search_id).await?;

		Ok(SearchResults {
			search_id: record.id,
			insights_pending: record.insights_pending,
			insights: record.insights,
			updated_at: record.updated_at,
			recommendations: record.recommendations,
		})
	}

	pub async fn search_progress(&self, search_id: &str) -> Result<SearchProgress> {
		let record = self.get_search(search_id).await?;

		Ok(SearchProgress {
			search_id: record.id,
			completed: !record.insights_pending,
			updated_at: record.updated_at,
			hotel_count: record.recommendations.len(),
		})
	}
}
