//! Token persistence contracts, cache key derivation, and the in-memory store.

pub mod keys;
pub mod memory;

pub use keys::*;
pub use memory::MemoryStore;

// self
use crate::{_prelude::*, auth::TokenRecord};

/// Future type returned by [`TokenStore`] implementations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistence contract for verified token records.
///
/// Records are addressed by their derived credential key, so a backend never
/// needs to understand the key's structure; platform backends can additionally
/// shard by [`KeyTriple`] or index by [`CacheKeyAttributes::hashed_key`] where the
/// full composite exceeds native limits.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Persists or replaces the record stored under `key`.
	fn save<'a>(&'a self, key: &'a str, record: TokenRecord) -> StoreFuture<'a, ()>;

	/// Fetches the record stored under `key`, if present.
	fn fetch<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<TokenRecord>>;

	/// Removes the record stored under `key`, returning it if present.
	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<TokenRecord>>;
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
