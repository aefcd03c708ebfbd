// self
use crate::{_prelude::*, auth::CredentialClass, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by broker flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("wecom_broker.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Enters the span for synchronous sections.
	pub fn entered(self) -> FlowSpanGuard {
		#[cfg(feature = "tracing")]
		{
			FlowSpanGuard { guard: self.span.entered() }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;

			FlowSpanGuard {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// RAII guard returned by [`FlowSpan::entered`].
pub struct FlowSpanGuard {
	#[cfg(feature = "tracing")]
	#[allow(dead_code)]
	guard: tracing::span::EnteredSpan,
}
impl Debug for FlowSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("FlowSpanGuard(..)")
	}
}

// Event helpers never receive secrets; only classes, durations, and error displays.

pub(crate) fn credential_installed(class: CredentialClass, ttl: Duration) {
	#[cfg(feature = "tracing")]
	tracing::debug!(class = class.as_str(), ttl_secs = ttl.whole_seconds(), "credential installed");
	#[cfg(not(feature = "tracing"))]
	let _ = (class, ttl);
}

pub(crate) fn refresh_coalesced(class: CredentialClass) {
	#[cfg(feature = "tracing")]
	tracing::debug!(class = class.as_str(), "refresh already in flight; serving current secret");
	#[cfg(not(feature = "tracing"))]
	let _ = class;
}

pub(crate) fn refresh_failed(class: CredentialClass, err: &Error) {
	#[cfg(feature = "tracing")]
	tracing::warn!(class = class.as_str(), error = %err, "credential refresh failed");
	#[cfg(not(feature = "tracing"))]
	let _ = (class, err);
}

pub(crate) fn retrying(class: CredentialClass, retry: u32, err: &Error) {
	#[cfg(feature = "tracing")]
	tracing::debug!(class = class.as_str(), retry, error = %err, "credential rejected; retrying");
	#[cfg(not(feature = "tracing"))]
	let _ = (class, retry, err);
}

pub(crate) fn allow_list_unavailable(err: &Error) {
	#[cfg(feature = "tracing")]
	tracing::warn!(error = %err, "callback IP allow-list unavailable; failing open");
	#[cfg(not(feature = "tracing"))]
	let _ = err;
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn flow_span_noop_without_tracing() {
		let _guard = FlowSpan::new(FlowKind::AccessToken, "test").entered();
		// Compile-time smoke test ensures the guard exists even when tracing is disabled.
	}

	#[cfg(feature = "tracing")]
	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = FlowSpan::new(FlowKind::Ticket, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
