//! Callback source allow-list loading and checks.

// self
use crate::{
	_prelude::*,
	auth::CredentialClass,
	flows::{self, Broker},
	http::CorpApi,
	obs::{self, FlowKind},
};

impl<A> Broker<A>
where
	A: ?Sized + CorpApi,
{
	/// Fetches the remote service's callback networks and unions them into the allow-list.
	///
	/// Returns the allow-list size after the merge. On failure the list is left unchanged, so an
	/// allow-list that was never loaded keeps failing open.
	pub async fn load_allow_list(&self) -> Result<usize> {
		let result = flows::observed(FlowKind::AllowList, "load_allow_list", async {
			let ips = self
				.run_with_retry(
					CredentialClass::AccessToken,
					|force| self.access_token_secret(force),
					|token| async move { self.api.fetch_allowed_ips(&token).await },
				)
				.await?;

			Ok(self.allow_list().extend(ips))
		})
		.await;

		if let Err(err) = &result
			&& self.allow_list().is_empty()
		{
			obs::allow_list_unavailable(err);
		}

		result
	}

	/// Returns `true` when `addr` may deliver callbacks (always, while the allow-list is empty).
	pub fn is_allowed_source(&self, addr: &str) -> bool {
		self.allow_list().is_allowed(addr)
	}
}
