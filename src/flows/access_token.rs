//! Access-token retrieval with single-flight refresh.

// self
use crate::{
	_prelude::*,
	auth::CredentialClass,
	flows::{self, Broker},
	http::CorpApi,
	obs::FlowKind,
};

impl<A> Broker<A>
where
	A: ?Sized + CorpApi,
{
	/// Returns the cached access token, fetching a new one when it is absent or expired.
	pub async fn get_access_token(&self) -> Result<String> {
		flows::observed(FlowKind::AccessToken, "get_access_token", self.access_token_secret(false))
			.await
	}

	/// Forces an access-token refresh.
	///
	/// When another refresh is already in flight the current (possibly stale) token is returned
	/// without a second fetch.
	pub async fn refresh_access_token(&self) -> Result<String> {
		flows::observed(
			FlowKind::AccessToken,
			"refresh_access_token",
			self.access_token_secret(true),
		)
		.await
	}

	pub(crate) async fn access_token_secret(&self, force: bool) -> Result<String> {
		let cache = self.cache(CredentialClass::AccessToken);
		let fetch =
			|| self.api.fetch_access_token(&self.identity.corp_id, self.identity.secret.expose());

		if force { cache.force_refresh(fetch).await } else { cache.get(fetch).await }
	}
}
