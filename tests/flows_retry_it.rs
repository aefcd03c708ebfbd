// crates.io
use httpmock::prelude::*;
// self
use wecom_broker::{_preludet::*, auth::CredentialClass, http::ApiRequest};

#[tokio::test]
async fn stale_token_is_refreshed_and_call_retried() {
	let server = MockServer::start_async().await;
	let (broker, _clock) = build_reqwest_test_broker(&server.url("/cgi-bin/"));
	let token = server
		.mock_async(|when, then| {
			when.method(GET).path("/cgi-bin/gettoken");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"TOK2\",\"expires_in\":7200}");
		})
		.await;
	let rejected = server
		.mock_async(|when, then| {
			when.method(GET).path("/cgi-bin/user/get").query_param("access_token", "TOK1");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"errcode\":40014,\"errmsg\":\"invalid access_token\"}");
		})
		.await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/cgi-bin/user/get")
				.query_param("access_token", "TOK2")
				.query_param("userid", "zhangsan");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(serde_json::json!({
					"errcode": 0,
					"errmsg": "ok",
					"userid": "zhangsan",
					"name": "Zhang San",
				}));
		})
		.await;

	// Simulate a token the remote service revoked before its advertised expiry.
	seed_credential(broker.cache(CredentialClass::AccessToken), "TOK1", 7200);

	let user = broker
		.call_api(&ApiRequest::get("user/get").with_query("userid", "zhangsan"))
		.await
		.expect("Retry with a fresh token should succeed.");

	assert_eq!(user["name"], "Zhang San");

	rejected.assert_calls_async(1).await;
	token.assert_calls_async(1).await;
	accepted.assert_calls_async(1).await;
}

#[tokio::test]
async fn persistent_rejection_stops_after_three_attempts() {
	let server = MockServer::start_async().await;
	let (broker, _clock) = build_reqwest_test_broker(&server.url("/cgi-bin/"));
	let token = server
		.mock_async(|when, then| {
			when.method(GET).path("/cgi-bin/gettoken");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"TOK1\",\"expires_in\":7200}");
		})
		.await;
	let call = server
		.mock_async(|when, then| {
			when.method(GET).path("/cgi-bin/department/list");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"errcode\":40014,\"errmsg\":\"invalid access_token\"}");
		})
		.await;
	let err = broker
		.call_api(&ApiRequest::get("department/list"))
		.await
		.expect_err("Exhausted retries must return the rejection.");

	assert!(matches!(err, Error::InvalidCredential { code: 40014, .. }));

	call.assert_calls_async(3).await;
	token.assert_calls_async(3).await;
}

#[tokio::test]
async fn business_errors_are_not_retried() {
	let server = MockServer::start_async().await;
	let (broker, _clock) = build_reqwest_test_broker(&server.url("/cgi-bin/"));
	let _token = server
		.mock_async(|when, then| {
			when.method(GET).path("/cgi-bin/gettoken");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"TOK1\",\"expires_in\":7200}");
		})
		.await;
	let send = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/cgi-bin/message/send")
				.query_param("access_token", "TOK1")
				.header("content-type", "application/json")
				.json_body(serde_json::json!({
					"touser": "zhangsan",
					"msgtype": "text",
					"agentid": 1000002,
					"text": { "content": "hello" },
				}));
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"errcode\":81013,\"errmsg\":\"user & party & tag all invalid\"}");
		})
		.await;
	let request = ApiRequest::post(
		"message/send",
		&serde_json::json!({
			"touser": "zhangsan",
			"msgtype": "text",
			"agentid": 1000002,
			"text": { "content": "hello" },
		}),
	)
	.expect("Body should serialize.");
	let err = broker.call_api(&request).await.expect_err("Business errors must propagate.");

	assert!(matches!(err, Error::Business { code: 81013, .. }));
	assert_eq!(err.remote_code(), Some(81013));

	send.assert_calls_async(1).await;
}

#[tokio::test]
async fn ticket_class_retries_refresh_the_ticket() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let (broker, _clock) = build_reqwest_test_broker(&server.url("/cgi-bin/"));
	let _token = server
		.mock_async(|when, then| {
			when.method(GET).path("/cgi-bin/gettoken");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"TOK1\",\"expires_in\":7200}");
		})
		.await;
	let ticket = server
		.mock_async(|when, then| {
			when.method(GET).path("/cgi-bin/get_jsapi_ticket");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"ticket\":\"T\",\"expires_in\":7200}");
		})
		.await;
	let attempts = std::sync::atomic::AtomicUsize::new(0);
	let class = CredentialClass::Ticket(wecom_broker::auth::TicketKind::Default);
	let value = broker
		.with_retry(class, |ticket| {
			let attempt = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

			async move {
				if attempt == 0 {
					Err(Error::InvalidCredential { code: 40021, message: "invalid ticket".into() })
				} else {
					Ok(ticket)
				}
			}
		})
		.await?;

	assert_eq!(value, "T");

	ticket.assert_calls_async(2).await;

	Ok(())
}
