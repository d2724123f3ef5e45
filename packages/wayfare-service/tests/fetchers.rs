use std::time::Duration;

use wayfare_domain::HotelDetail;
use wayfare_testkit::{Failure, FakeInsights, Fakes};

fn fakes_with(insights: FakeInsights) -> Fakes {
	Fakes::new(wayfare_testkit::lisbon_query(), wayfare_testkit::candidates(5), Vec::new())
		.with_insights(insights)
}

#[tokio::test]
async fn cached_detail_issues_no_external_call() {
	let fakes = fakes_with(FakeInsights::new());
	let service = wayfare_testkit::service(wayfare_testkit::test_config(), &fakes);
	let first = service.fetcher.hotel_detail("H1").await.expect("Detail must load.");

	assert_eq!(fakes.insights.detail_calls(), 1);

	let second = service.fetcher.hotel_detail("H1").await.expect("Detail must load.");

	assert_eq!(fakes.insights.detail_calls(), 1);
	assert_eq!(first, second);
}

#[tokio::test]
async fn cache_hit_takes_no_pool_slot() {
	let fakes = fakes_with(FakeInsights::new());
	let service = wayfare_testkit::service(wayfare_testkit::test_config(), &fakes);
	let seeded = HotelDetail {
		hotel_id: "H1".to_string(),
		description: None,
		images: vec!["https://img.test/H1/seeded.jpg".to_string()],
		facilities: Vec::new(),
	};

	assert!(service.cache.set_hotel_detail(&seeded).await);

	// Hold every detail slot; a hit must still return.
	let mut held = Vec::new();

	for _ in 0..service.pools.detail.capacity() {
		held.push(service.pools.detail.acquire().await.expect("Pool is open."));
	}

	let detail = service.fetcher.hotel_detail("H1").await.expect("Detail must load.");

	assert_eq!(detail, seeded);
	assert_eq!(fakes.insights.detail_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn single_rate_limit_is_retried_once() {
	let fakes = fakes_with(FakeInsights::new().rate_limited_once("H3"));
	let service = wayfare_testkit::service(wayfare_testkit::test_config(), &fakes);
	let sentiment = service.fetcher.hotel_sentiment("H3").await;

	assert!(sentiment.is_some());
	assert_eq!(fakes.insights.calls_for("H3"), 2);
	assert!(service.cache.get_hotel_sentiment("H3").await.is_some());
}

#[tokio::test(start_paused = true)]
async fn second_rate_limit_gives_up() {
	let fakes = fakes_with(FakeInsights::new().failing_sentiment("H3", Failure::RateLimited));
	let service = wayfare_testkit::service(wayfare_testkit::test_config(), &fakes);

	assert!(service.fetcher.hotel_sentiment("H3").await.is_none());
	assert_eq!(fakes.insights.calls_for("H3"), 2);
}

#[tokio::test]
async fn other_failures_are_not_retried_or_cached() {
	let fakes = fakes_with(FakeInsights::new().failing_detail("H4"));
	let service = wayfare_testkit::service(wayfare_testkit::test_config(), &fakes);

	assert!(service.fetcher.hotel_detail("H4").await.is_none());
	assert_eq!(fakes.insights.detail_calls(), 1);
	assert!(service.cache.get_hotel_detail("H4").await.is_none());

	assert!(service.fetcher.hotel_detail("H4").await.is_none());
	assert_eq!(fakes.insights.detail_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn timed_out_call_keeps_its_slot_until_it_settles() {
	let fakes = fakes_with(FakeInsights::new().slow_sentiment("H2", Duration::from_secs(10)));
	let service = wayfare_testkit::service(wayfare_testkit::test_config(), &fakes);
	let capacity = service.pools.sentiment.capacity();

	assert!(service.fetcher.hotel_sentiment("H2").await.is_none());
	assert_eq!(service.pools.sentiment.in_use(), 1);

	tokio::time::sleep(Duration::from_secs(11)).await;

	assert_eq!(service.pools.sentiment.available(), capacity);
	// The late result is discarded, not cached.
	assert!(service.cache.get_hotel_sentiment("H2").await.is_none());
	assert_eq!(fakes.insights.sentiment_calls(), 1);
}

#[tokio::test]
async fn pools_bound_concurrent_calls() {
	let fakes = fakes_with(FakeInsights::new());
	let service = wayfare_testkit::service(wayfare_testkit::test_config(), &fakes);
	let ids: Vec<String> = wayfare_testkit::hotel_ids(1..=12);
	let results =
		futures::future::join_all(ids.iter().map(|hotel_id| service.fetcher.hotel_sentiment(hotel_id)))
			.await;

	assert!(results.iter().all(Option::is_some));
	assert_eq!(fakes.insights.sentiment_calls(), 12);
	assert_eq!(service.pools.sentiment.available(), service.pools.sentiment.capacity());
}
