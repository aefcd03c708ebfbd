//! Fail-open allow-list of callback source networks.
//!
//! Entries are `/24` prefixes written as `a.b.c.*`. While the list is empty every address is
//! allowed, so webhooks keep flowing before the first successful load; once populated, only
//! addresses whose `/24` prefix is listed pass. The set only grows.

// self
use crate::_prelude::*;

/// Set of `a.b.c.*` prefixes the remote service sends callbacks from.
#[derive(Debug, Default)]
pub struct IpAllowList {
	entries: RwLock<HashSet<String>>,
}
impl IpAllowList {
	/// Creates an empty (allow-all) list.
	pub fn new() -> Self {
		Self::default()
	}

	/// Unions `entries` into the list and returns the resulting size.
	pub fn extend<I, S>(&self, entries: I) -> usize
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut set = self.entries.write();

		set.extend(entries.into_iter().map(Into::into));

		set.len()
	}

	/// Returns `true` when `addr` may deliver callbacks.
	///
	/// `addr` is a dotted address without a port (e.g. `101.226.103.7`).
	pub fn is_allowed(&self, addr: &str) -> bool {
		let set = self.entries.read();

		if set.is_empty() {
			return true;
		}

		match addr.rfind('.') {
			Some(idx) => set.contains(&format!("{}.*", &addr[..idx])),
			None => false,
		}
	}

	/// Number of entries loaded so far.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns `true` before any entry has been loaded.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	/// Returns a sorted copy of the entries.
	pub fn entries(&self) -> Vec<String> {
		let mut entries = self.entries.read().iter().cloned().collect::<Vec<_>>();

		entries.sort_unstable();

		entries
	}
}
