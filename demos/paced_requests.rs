//! Demonstrates queueing chat-completion style requests against a mock provider that throttles
//! the first call, printing every queue event as JSON.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use request_queue::{QueueConfig, QueueEvent, RequestQueue, reqwest::Client};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let mut throttled = server
		.mock_async(|when, then| {
			when.method(POST).path("/v1/chat").body_includes("\"first\"");
			then.status(429).body("{\"error\":{\"message\":\"Slow down.\",\"code\":\"rate_limit\"}}");
		})
		.await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(POST).path("/v1/chat");
			then.status(200).header("content-type", "application/json").body("{\"reply\":\"ok\"}");
		})
		.await;
	let queue = RequestQueue::builder(
		QueueConfig::default().with_base_delay_ms(250).with_min_delay_between_requests_ms(100),
	)
	.observer(|event: &QueueEvent| match serde_json::to_string(event) {
		Ok(json) => println!("{json}"),
		Err(e) => eprintln!("failed to encode event: {e}"),
	})
	.build();
	let client = Client::new();
	let url = server.url("/v1/chat");
	let first = {
		let (client, url) = (client.clone(), url.clone());

		queue.submit_request(move || client.post(&url).body("{\"prompt\":\"first\"}"))
	};
	let second = queue.submit_request(move || client.post(&url).body("{\"prompt\":\"second\"}"));

	// Let the first attempt hit the throttle, then lift it so the retry goes through.
	tokio::time::sleep(std::time::Duration::from_millis(50)).await;
	throttled.delete_async().await;

	println!("first: {}", first.await?.status());
	println!("second: {}", second.await?.status());
	println!("accepted calls: {}", accepted.calls_async().await);

	Ok(())
}
