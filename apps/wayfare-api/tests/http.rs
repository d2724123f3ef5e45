use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode},
	response::Response,
};
use serde_json::Value;
use tower::util::ServiceExt;

use wayfare_api::{routes, state::AppState};
use wayfare_testkit::{Failure, FakeQueryParser, Fakes};

fn lisbon() -> Fakes {
	Fakes::new(
		wayfare_testkit::lisbon_query(),
		wayfare_testkit::candidates(40),
		wayfare_testkit::hotel_ids(1..=25),
	)
}

fn app(fakes: &Fakes) -> (Router, AppState) {
	let service = wayfare_testkit::service(wayfare_testkit::test_config(), fakes);
	let state = AppState::from_service(service);

	(routes::router(state.clone()), state)
}

async fn call(app: &Router, request: Request<Body>) -> Response {
	app.clone().oneshot(request).await.expect("Router must answer.")
}

fn submit(query: &str) -> Request<Body> {
	Request::builder()
		.method("POST")
		.uri("/v1/searches")
		.header("content-type", "application/json")
		.body(Body::from(serde_json::json!({ "query": query }).to_string()))
		.expect("Failed to build request.")
}

fn get(uri: &str) -> Request<Body> {
	Request::builder().uri(uri).body(Body::empty()).expect("Failed to build request.")
}

async fn json(response: Response) -> Value {
	let body = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");

	serde_json::from_slice(&body).expect("Failed to parse response.")
}

#[tokio::test]
async fn health_ok() {
	let (app, _) = app(&lisbon());
	let response = call(&app, get("/health")).await;

	assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn submit_then_poll_until_insights_land() {
	let fakes = lisbon();
	let (app, state) = app(&fakes);
	let response = call(&app, submit("budget hotels in Lisbon with pool, Mar 10-13")).await;

	assert_eq!(response.status(), StatusCode::OK);

	let record = json(response).await;
	let search_id = record["id"].as_str().expect("Record carries its id.").to_string();

	assert_eq!(record["insights_pending"], true);
	assert_eq!(record["recommendations"].as_array().map(Vec::len), Some(5));
	assert_eq!(record["recommendations"][0]["hotel_id"], "H4");
	assert_eq!(record["search_params"]["check_in"], "2026-03-10");

	state.service.tasks.wait_idle().await;

	let status = json(call(&app, get(&format!("/v1/searches/{search_id}/status"))).await).await;

	assert_eq!(status["completed"], true);
	assert_eq!(status["hotel_count"], 5);

	let results = json(call(&app, get(&format!("/v1/searches/{search_id}/results"))).await).await;

	assert_eq!(results["insights_pending"], false);
	assert_eq!(results["insights"]["H4"]["insight_source"], "llm");
	assert!(results["updated_at"].is_string());

	let stored = json(call(&app, get(&format!("/v1/searches/{search_id}"))).await).await;

	assert_eq!(stored["id"], search_id.as_str());
}

#[tokio::test]
async fn blank_query_is_bad_input() {
	let (app, _) = app(&lisbon());
	let response = call(&app, submit("  ")).await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);

	let body = json(response).await;

	assert_eq!(body["error_code"], "bad_input");
	assert_eq!(body["step"], "parse");
}

#[tokio::test]
async fn nothing_bookable_is_no_availability() {
	let fakes = Fakes::new(
		wayfare_testkit::lisbon_query(),
		wayfare_testkit::candidates(10),
		Vec::new(),
	);
	let (app, _) = app(&fakes);
	let response = call(&app, submit("hotels in Lisbon next weekend")).await;

	assert_eq!(response.status(), StatusCode::NOT_FOUND);

	let body = json(response).await;

	assert_eq!(body["error_code"], "no_availability");
	assert_eq!(body["step"], "rate_fetch");
}

#[tokio::test]
async fn parser_outage_is_an_internal_failure_tagged_with_its_step() {
	let fakes = lisbon().with_query_parser(FakeQueryParser::failing(Failure::Timeout));
	let (app, _) = app(&fakes);
	let response = call(&app, submit("hotels in Lisbon")).await;

	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

	let body = json(response).await;

	assert_eq!(body["error_code"], "internal_failure");
	assert_eq!(body["step"], "parse");
}

#[tokio::test]
async fn unknown_search_is_not_found() {
	let (app, _) = app(&lisbon());
	let response = call(&app, get("/v1/searches/does-not-exist/status")).await;

	assert_eq!(response.status(), StatusCode::NOT_FOUND);

	let body = json(response).await;

	assert_eq!(body["error_code"], "not_found");
	assert!(body["step"].is_null());
}

#[tokio::test]
async fn blank_search_id_is_bad_input_without_a_step() {
	let (app, _) = app(&lisbon());
	let response = call(&app, get("/v1/searches/%20/status")).await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);

	let body = json(response).await;

	assert_eq!(body["error_code"], "bad_input");
	assert!(body["step"].is_null());
}

#[tokio::test]
async fn malformed_body_is_bad_input() {
	let (app, _) = app(&lisbon());
	let request = Request::builder()
		.method("POST")
		.uri("/v1/searches")
		.header("content-type", "application/json")
		.body(Body::from("{\"query\": "))
		.expect("Failed to build request.");
	let response = call(&app, request).await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);

	let body = json(response).await;

	assert_eq!(body["error_code"], "bad_input");
	assert!(body["step"].is_null());
	assert!(body["message"].as_str().is_some_and(|message| message.starts_with("Invalid request")));
}
