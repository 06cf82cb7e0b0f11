//! Resource manager trait seam.
//!
//! The coordinator drives an external transactional resource (typically a
//! database connection) exclusively through these two traits. It never
//! inspects a handle's internals, and it never retries a failed operation:
//! a `begin`/`commit`/`rollback` failure is fatal and propagated unchanged.

use async_trait::async_trait;

use crate::error::ResourceFailure;

/// A transactional resource the coordinator can open physical
/// transactions against.
///
/// One implementation typically wraps one connection (or one pool with
/// connection affinity). All physical transactions opened by a single
/// logical call chain go through the same resource manager.
#[async_trait]
pub trait ResourceManager: Send + Sync {
	/// Begin a new physical transaction and return its handle.
	async fn begin(&self) -> Result<Box<dyn ResourceTransaction>, ResourceFailure>;
}

/// Handle to one open physical transaction.
///
/// The handle is exclusively owned by the coordinator frame that began
/// the transaction; participant frames never see it. Consuming `self`
/// makes double-commit and commit-after-rollback unrepresentable.
#[async_trait]
pub trait ResourceTransaction: Send {
	/// Commit the physical transaction, consuming the handle.
	async fn commit(self: Box<Self>) -> Result<(), ResourceFailure>;

	/// Roll back the physical transaction, consuming the handle.
	async fn rollback(self: Box<Self>) -> Result<(), ResourceFailure>;
}
