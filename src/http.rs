//! Transport seam between the broker and the remote corp API.
//!
//! The broker only talks to the network through [`CorpApi`]. The crate ships
//! [`ReqwestCorpApi`] (behind the default `reqwest` feature); tests and embedders can provide
//! their own implementation, reusing [`parse_response`] so every transport maps the remote
//! `errcode`/`errmsg` envelope into the same [`Error`] taxonomy.

// crates.io
#[cfg(feature = "reqwest")] use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{CorpId, TicketKind},
	cache::FreshCredential,
	error::ConfigError,
};
#[cfg(feature = "reqwest")] use crate::error::TransportError;

/// Base URL of the public corp API.
pub const DEFAULT_BASE_URL: &str = "https://qyapi.weixin.qq.com/cgi-bin/";
/// Request timeout applied by [`ReqwestCorpApi::new`].
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Boxed future returned by [`CorpApi`] operations.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Network collaborator used by the broker to mint credentials and call business APIs.
///
/// Implementations must map remote error envelopes through [`Error::from_remote`] (or
/// [`parse_response`]) so that invalid-credential codes surface as
/// [`Error::InvalidCredential`], which is the only signal the retry coordinator reacts to.
pub trait CorpApi
where
	Self: 'static + Send + Sync,
{
	/// Exchanges the corp identifier and application secret for an access token.
	fn fetch_access_token<'a>(
		&'a self,
		corp_id: &'a CorpId,
		secret: &'a str,
	) -> ApiFuture<'a, FreshCredential>;

	/// Fetches a ticket of the requested kind using a valid access token.
	fn fetch_ticket<'a>(
		&'a self,
		access_token: &'a str,
		kind: TicketKind,
	) -> ApiFuture<'a, FreshCredential>;

	/// Fetches the IP addresses the remote service sends callbacks from.
	fn fetch_allowed_ips<'a>(&'a self, access_token: &'a str) -> ApiFuture<'a, Vec<String>>;

	/// Performs an arbitrary API call authenticated with `access_token`.
	fn invoke<'a>(
		&'a self,
		access_token: &'a str,
		request: &'a ApiRequest,
	) -> ApiFuture<'a, serde_json::Value>;
}

/// HTTP method of an [`ApiRequest`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiMethod {
	/// Query-only request.
	Get,
	/// Request carrying a JSON body.
	Post,
}

/// Business API request routed through [`CorpApi::invoke`].
///
/// The access token is appended by the broker; callers never put it in `query`.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: ApiMethod,
	/// Path relative to the API base URL, e.g. `user/get`.
	pub path: String,
	/// Additional query parameters.
	pub query: Vec<(String, String)>,
	/// JSON body for POST requests.
	pub body: Option<serde_json::Value>,
}
impl ApiRequest {
	/// Creates a GET request for `path`.
	pub fn get(path: impl Into<String>) -> Self {
		Self { method: ApiMethod::Get, path: path.into(), query: Vec::new(), body: None }
	}

	/// Creates a POST request for `path` with a JSON-serializable body.
	pub fn post<B>(path: impl Into<String>, body: &B) -> Result<Self, ConfigError>
	where
		B: ?Sized + Serialize,
	{
		let body = serde_json::to_value(body).map_err(ConfigError::RequestBody)?;

		Ok(Self { method: ApiMethod::Post, path: path.into(), query: Vec::new(), body: Some(body) })
	}

	/// Appends a query parameter.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}
}

/// Base URL against which every API path is resolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
	base: Url,
}
impl Endpoints {
	/// Parses `base`, appending a trailing slash when missing so relative paths nest under it.
	pub fn new(base: &str) -> Result<Self, ConfigError> {
		let base = if base.ends_with('/') { base.to_owned() } else { format!("{base}/") };
		let base = Url::parse(&base).map_err(|source| ConfigError::InvalidEndpoint { source })?;

		Ok(Self { base })
	}

	/// Endpoints of the public corp API.
	pub fn public() -> Result<Self, ConfigError> {
		Self::new(DEFAULT_BASE_URL)
	}

	/// Base URL in use.
	pub fn base(&self) -> &Url {
		&self.base
	}

	/// Resolves `path` against the base URL and appends `query`.
	pub fn url<'q, I>(&self, path: &str, query: I) -> Result<Url, ConfigError>
	where
		I: IntoIterator<Item = (&'q str, &'q str)>,
	{
		let mut url = self
			.base
			.join(path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;

		{
			let mut pairs = url.query_pairs_mut();

			for (key, value) in query {
				pairs.append_pair(key, value);
			}
		}

		// An empty `query_pairs_mut` session leaves a dangling `?`.
		if url.query() == Some("") {
			url.set_query(None);
		}

		Ok(url)
	}
}

#[derive(Deserialize)]
struct Envelope {
	#[serde(default)]
	errcode: i64,
	#[serde(default)]
	errmsg: String,
}

#[derive(Deserialize)]
struct AccessTokenResponse {
	access_token: String,
	expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TicketResponse {
	ticket: String,
	expires_in: i64,
}

#[derive(Deserialize)]
struct CallbackIpResponse {
	#[serde(default)]
	ip_list: Vec<String>,
}

/// Decodes a response body, mapping a non-zero `errcode` into the broker's error taxonomy
/// before deserializing `T`.
///
/// `status` is the HTTP status code when known; a non-success status with a clean envelope
/// surfaces as [`Error::Business`] carrying that status.
pub fn parse_response<T>(status: Option<u16>, body: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	let malformed = |source| Error::MalformedResponse { source, status };
	let mut deserializer = serde_json::Deserializer::from_slice(body);
	let value: serde_json::Value =
		serde_path_to_error::deserialize(&mut deserializer).map_err(malformed)?;
	let envelope: Envelope = serde_path_to_error::deserialize(&value).map_err(malformed)?;

	if let Some(err) = Error::from_remote(envelope.errcode, envelope.errmsg) {
		return Err(err);
	}
	if let Some(code) = status.filter(|code| !(200..300).contains(code)) {
		return Err(Error::Business {
			code: i64::from(code),
			message: format!("HTTP status {code}"),
		});
	}

	serde_path_to_error::deserialize(value).map_err(malformed)
}

/// Reqwest-backed [`CorpApi`] implementation.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestCorpApi {
	client: ReqwestClient,
	endpoints: Endpoints,
}
#[cfg(feature = "reqwest")]
impl ReqwestCorpApi {
	/// Builds a client with [`DEFAULT_TIMEOUT`] pointed at the public API.
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().timeout(DEFAULT_TIMEOUT).build()?;

		Ok(Self { client, endpoints: Endpoints::public()? })
	}

	/// Wraps an existing reqwest client pointed at the public API.
	pub fn with_client(client: ReqwestClient) -> Result<Self, ConfigError> {
		Ok(Self { client, endpoints: Endpoints::public()? })
	}

	/// Overrides the endpoints (e.g. a private gateway or a mock server).
	pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
		self.endpoints = endpoints;

		self
	}

	/// Endpoints in use.
	pub fn endpoints(&self) -> &Endpoints {
		&self.endpoints
	}

	async fn get<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let url = self.endpoints.url(path, query.iter().copied())?;

		self.execute(self.client.get(url)).await
	}

	async fn execute<T>(&self, request: reqwest::RequestBuilder) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let response = request.send().await.map_err(map_reqwest_error)?;
		let status = response.status().as_u16();
		let body = response.bytes().await.map_err(map_reqwest_error)?;

		parse_response(Some(status), &body)
	}
}
#[cfg(feature = "reqwest")]
impl CorpApi for ReqwestCorpApi {
	fn fetch_access_token<'a>(
		&'a self,
		corp_id: &'a CorpId,
		secret: &'a str,
	) -> ApiFuture<'a, FreshCredential> {
		Box::pin(async move {
			let response: AccessTokenResponse = self
				.get("gettoken", &[("corpid", &**corp_id), ("corpsecret", secret)])
				.await?;

			Ok(FreshCredential::new(response.access_token, response.expires_in))
		})
	}

	fn fetch_ticket<'a>(
		&'a self,
		access_token: &'a str,
		kind: TicketKind,
	) -> ApiFuture<'a, FreshCredential> {
		Box::pin(async move {
			let response: TicketResponse = match kind {
				TicketKind::Default =>
					self.get("get_jsapi_ticket", &[("access_token", access_token)]).await?,
				TicketKind::AgentScoped =>
					self.get(
						"ticket/get",
						&[("access_token", access_token), ("type", "agent_config")],
					)
					.await?,
			};

			Ok(FreshCredential::new(response.ticket, response.expires_in))
		})
	}

	fn fetch_allowed_ips<'a>(&'a self, access_token: &'a str) -> ApiFuture<'a, Vec<String>> {
		Box::pin(async move {
			let response: CallbackIpResponse =
				self.get("getcallbackip", &[("access_token", access_token)]).await?;

			Ok(response.ip_list)
		})
	}

	fn invoke<'a>(
		&'a self,
		access_token: &'a str,
		request: &'a ApiRequest,
	) -> ApiFuture<'a, serde_json::Value> {
		Box::pin(async move {
			let query = std::iter::once(("access_token", access_token))
				.chain(request.query.iter().map(|(key, value)| (key.as_str(), value.as_str())));
			let url = self.endpoints.url(&request.path, query)?;
			let builder = match (request.method, request.body.as_ref()) {
				(ApiMethod::Get, _) => self.client.get(url),
				(ApiMethod::Post, body) => {
					let bytes = body
						.map(serde_json::to_vec)
						.transpose()
						.map_err(ConfigError::RequestBody)?
						.unwrap_or_else(|| b"{}".to_vec());

					self.client
						.post(url)
						.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
						.body(bytes)
				},
			};

			self.execute(builder).await
		})
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}

	// Timeouts, connection failures, and body read errors are all transport failures.
	TransportError::from(err).into()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn endpoints_resolve_paths_and_query() {
		let endpoints =
			Endpoints::new("http://127.0.0.1:8080/cgi-bin").expect("Base URL should parse.");
		let url = endpoints
			.url("/gettoken", [("corpid", "ww1"), ("corpsecret", "a b")])
			.expect("Path should resolve.");

		assert_eq!(
			url.as_str(),
			"http://127.0.0.1:8080/cgi-bin/gettoken?corpid=ww1&corpsecret=a+b"
		);

		let url = endpoints.url("ticket/get", []).expect("Path should resolve.");

		assert_eq!(url.as_str(), "http://127.0.0.1:8080/cgi-bin/ticket/get");
		assert!(Endpoints::new("not a url").is_err());
		assert_eq!(
			Endpoints::public().expect("Default base should parse.").base().as_str(),
			DEFAULT_BASE_URL
		);
	}

	#[test]
	fn parse_response_maps_error_envelope() {
		let err = parse_response::<serde_json::Value>(
			Some(200),
			br#"{"errcode":40014,"errmsg":"invalid access_token"}"#,
		)
		.expect_err("Invalid credential codes must surface as errors.");

		assert!(err.is_invalid_credential());

		let err = parse_response::<serde_json::Value>(
			Some(200),
			br#"{"errcode":60011,"errmsg":"no privilege"}"#,
		)
		.expect_err("Business codes must surface as errors.");

		assert!(matches!(err, Error::Business { code: 60011, .. }));
	}

	#[test]
	fn parse_response_decodes_typed_payload() {
		let response: AccessTokenResponse = parse_response(
			Some(200),
			br#"{"errcode":0,"errmsg":"ok","access_token":"TOK1","expires_in":7200}"#,
		)
		.expect("Successful payload should decode.");

		assert_eq!(response.access_token, "TOK1");
		assert_eq!(response.expires_in, 7200);

		let ips: CallbackIpResponse = parse_response(None, br#"{"ip_list":["101.226.103.1"]}"#)
			.expect("Envelope is optional.");

		assert_eq!(ips.ip_list, vec!["101.226.103.1".to_owned()]);
	}

	#[test]
	fn parse_response_reports_malformed_bodies() {
		let err = parse_response::<TicketResponse>(Some(502), b"<html>bad gateway</html>")
			.expect_err("Non-JSON bodies are malformed.");

		assert!(matches!(err, Error::MalformedResponse { status: Some(502), .. }));

		let err = parse_response::<TicketResponse>(Some(200), br#"{"errcode":0,"ticket":"T"}"#)
			.expect_err("Missing expires_in is malformed.");

		match err {
			Error::MalformedResponse { source, .. } =>
				assert!(source.to_string().contains("expires_in")),
			other => panic!("Unexpected error: {other:?}"),
		}

		let err = parse_response::<serde_json::Value>(Some(503), b"{}")
			.expect_err("Non-success status without errcode is still an error.");

		assert!(matches!(err, Error::Business { code: 503, .. }));
	}
}
