//! Credential lifecycle broker for enterprise messaging HTTP APIs.
//!
//! A [`flows::Broker`] caches the access token and tickets of one application, refreshes each of
//! them through a single in-flight fetch, and retries authenticated calls a bounded number of
//! times when the remote service rejects a credential. Ticket signing ([`sign`]), the callback
//! source allow-list ([`allowlist`]), and the webhook crypto boundary ([`webhook`]) hang off the
//! same broker.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod allowlist;
pub mod auth;
pub mod cache;
pub mod clock;
pub mod error;
pub mod flows;
pub mod http;
pub mod obs;
pub mod sign;
pub mod webhook;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{AgentId, AppIdentity, CorpId},
		cache::{CredentialCache, FreshCredential},
		clock::{Clock, ManualClock},
		flows::{Broker, RetryPolicy},
		http::{Endpoints, ReqwestCorpApi},
	};

	/// Broker type alias used by reqwest-backed integration tests.
	pub type ReqwestTestBroker = Broker<ReqwestCorpApi>;

	/// Corp identifier shared by test fixtures.
	pub const TEST_CORP_ID: &str = "ww-test-corp";
	/// Agent identifier shared by test fixtures.
	pub const TEST_AGENT_ID: &str = "1000002";
	/// Application secret shared by test fixtures.
	pub const TEST_SECRET: &str = "test-app-secret";
	/// Callback signing token shared by test fixtures.
	pub const TEST_SIGNING_TOKEN: &str = "callback-token";
	/// Callback encoding key (43 base64 characters) shared by test fixtures.
	pub const TEST_ENCODING_KEY: &str = "jWmYm7qr5nMoAUwZRjGtBxmz3KA1tkAj3ykkR6q2B2C";

	/// Builds a fully populated application identity for tests.
	pub fn test_identity() -> AppIdentity {
		let corp_id = CorpId::new(TEST_CORP_ID).expect("Test corp identifier should be valid.");

		AppIdentity::builder(corp_id)
			.agent_id(AgentId::new(TEST_AGENT_ID).expect("Test agent identifier should be valid."))
			.secret(TEST_SECRET)
			.signing_token(TEST_SIGNING_TOKEN)
			.encoding_key(TEST_ENCODING_KEY)
			.build()
			.expect("Test identity should build successfully.")
	}

	/// Installs `secret` into `cache` as if a refresh had just fetched it.
	pub fn seed_credential(cache: &CredentialCache, secret: &str, ttl_seconds: i64) {
		cache
			.install(FreshCredential::new(secret, ttl_seconds))
			.expect("Seeded credential should install successfully.");
	}

	/// Retry policy with no backoff so retry tests do not sleep.
	pub fn instant_retry_policy() -> RetryPolicy {
		RetryPolicy::default().with_backoff(Duration::ZERO)
	}

	/// Constructs a [`Broker`] backed by the reqwest transport pointed at `base` (usually an
	/// `httpmock` server), a manual clock, and an instant retry policy.
	pub fn build_reqwest_test_broker(base: &str) -> (ReqwestTestBroker, ManualClock) {
		let endpoints = Endpoints::new(base).expect("Mock base URL should parse successfully.");
		let api = ReqwestCorpApi::new()
			.expect("Failed to build Reqwest client for tests.")
			.with_endpoints(endpoints);
		let clock = ManualClock::default();
		let shared: Arc<dyn Clock> = Arc::new(clock.clone());
		let broker = Broker::with_api(test_identity(), api)
			.with_clock(shared)
			.with_retry_policy(instant_retry_policy());

		(broker, clock)
	}
}

mod _prelude {
	pub use std::{
		collections::HashSet,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
