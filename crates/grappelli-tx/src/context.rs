//! Transaction context model.
//!
//! A [`PhysicalTransaction`] records one begin/commit-or-rollback cycle
//! against the resource manager. A [`TransactionContext`] is one frame's
//! view of that cycle: the frame that began the transaction holds the
//! owning view (`is_new_transaction() == true`), every nested frame that
//! joined it holds a participant view sharing the same physical record.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::resource::ResourceTransaction;

/// One physical transaction against the resource manager.
///
/// The resource handle lives here and is taken exactly once, by the
/// owning frame, at exit. The rollback-only flag is monotonic: once a
/// participant sets it, nothing can clear it for the lifetime of this
/// physical transaction.
pub struct PhysicalTransaction {
	id: Uuid,
	handle: Mutex<Option<Box<dyn ResourceTransaction>>>,
	rollback_only: AtomicBool,
}

impl PhysicalTransaction {
	pub(crate) fn new(handle: Box<dyn ResourceTransaction>) -> Arc<Self> {
		Arc::new(Self {
			id: Uuid::new_v4(),
			handle: Mutex::new(Some(handle)),
			rollback_only: AtomicBool::new(false),
		})
	}

	/// Identifier for log correlation.
	pub fn id(&self) -> Uuid {
		self.id
	}

	/// Whether some frame has doomed this transaction.
	pub fn is_rollback_only(&self) -> bool {
		self.rollback_only.load(Ordering::Acquire)
	}

	/// Doom this transaction. Monotonic; repeated calls are no-ops.
	pub(crate) fn mark_rollback_only(&self) {
		self.rollback_only.store(true, Ordering::Release);
	}

	/// Detach the resource handle. Returns `None` if it was already taken.
	pub(crate) fn take_handle(&self) -> Option<Box<dyn ResourceTransaction>> {
		self.handle.lock().take()
	}

	#[cfg(test)]
	fn has_handle(&self) -> bool {
		self.handle.lock().is_some()
	}
}

impl fmt::Debug for PhysicalTransaction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PhysicalTransaction")
			.field("id", &self.id)
			.field("rollback_only", &self.is_rollback_only())
			.field("handle_present", &self.handle.lock().is_some())
			.finish()
	}
}

/// One frame's view of a physical transaction.
///
/// Cloning is cheap (an `Arc` bump) and never duplicates ownership: the
/// owner/participant distinction is carried by the view, not the clone.
///
/// # Examples
///
/// A work unit can doom the surrounding transaction without raising an
/// error; the owning frame will then roll back at exit:
///
/// ```ignore
/// coordinator.run(Propagation::Required, |ctx| async move {
///     ctx.set_rollback_only();
///     Ok(())
/// }).await
/// ```
#[derive(Clone)]
pub struct TransactionContext {
	physical: Arc<PhysicalTransaction>,
	is_new: bool,
	savepoint: Option<String>,
}

impl TransactionContext {
	/// Owning view over a freshly begun physical transaction.
	pub(crate) fn owner(physical: Arc<PhysicalTransaction>) -> Self {
		Self {
			physical,
			is_new: true,
			savepoint: None,
		}
	}

	/// Participant view joining this context's physical transaction.
	pub(crate) fn participant(&self) -> Self {
		Self {
			physical: Arc::clone(&self.physical),
			is_new: false,
			savepoint: None,
		}
	}

	/// Identifier of the underlying physical transaction.
	pub fn id(&self) -> Uuid {
		self.physical.id()
	}

	/// True if this frame began the physical transaction, false if it
	/// joined an ambient one. Only the owning frame may commit or roll
	/// back through the resource manager.
	pub fn is_new_transaction(&self) -> bool {
		self.is_new
	}

	/// Whether the underlying physical transaction has been doomed.
	pub fn is_rollback_only(&self) -> bool {
		self.physical.is_rollback_only()
	}

	/// Doom the underlying physical transaction.
	///
	/// The owning frame will roll back at exit even if every frame
	/// returns normally; a clean return then surfaces
	/// [`TransactionError::UnexpectedRollback`](crate::TransactionError::UnexpectedRollback).
	pub fn set_rollback_only(&self) {
		tracing::debug!(tx = %self.id(), "marking transaction rollback-only");
		self.physical.mark_rollback_only();
	}

	/// Savepoint isolating this frame, when entered under a policy that
	/// requires one. Always `None` for REQUIRED/REQUIRES_NEW; reserved
	/// for the NESTED extension.
	pub fn savepoint(&self) -> Option<&str> {
		self.savepoint.as_deref()
	}

	pub(crate) fn physical(&self) -> &Arc<PhysicalTransaction> {
		&self.physical
	}
}

impl fmt::Debug for TransactionContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TransactionContext")
			.field("tx", &self.physical.id())
			.field("is_new", &self.is_new)
			.field("rollback_only", &self.is_rollback_only())
			.field("savepoint", &self.savepoint)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ResourceFailure;
	use async_trait::async_trait;

	struct NoopTransaction;

	#[async_trait]
	impl ResourceTransaction for NoopTransaction {
		async fn commit(self: Box<Self>) -> Result<(), ResourceFailure> {
			Ok(())
		}

		async fn rollback(self: Box<Self>) -> Result<(), ResourceFailure> {
			Ok(())
		}
	}

	fn physical() -> Arc<PhysicalTransaction> {
		PhysicalTransaction::new(Box::new(NoopTransaction))
	}

	#[test]
	fn rollback_only_is_monotonic_and_idempotent() {
		let ctx = TransactionContext::owner(physical());
		assert!(!ctx.is_rollback_only());

		ctx.set_rollback_only();
		assert!(ctx.is_rollback_only());

		// Repeated marking changes nothing
		ctx.set_rollback_only();
		assert!(ctx.is_rollback_only());
	}

	#[test]
	fn participant_shares_the_physical_transaction() {
		let owner = TransactionContext::owner(physical());
		let participant = owner.participant();

		assert!(owner.is_new_transaction());
		assert!(!participant.is_new_transaction());
		assert_eq!(owner.id(), participant.id());

		// A participant dooming the transaction is visible to the owner
		participant.set_rollback_only();
		assert!(owner.is_rollback_only());
	}

	#[test]
	fn handle_can_only_be_taken_once() {
		let physical = physical();
		assert!(physical.has_handle());
		assert!(physical.take_handle().is_some());
		assert!(!physical.has_handle());
		assert!(physical.take_handle().is_none());
	}

	#[test]
	fn covered_policies_never_carry_a_savepoint() {
		let owner = TransactionContext::owner(physical());
		assert!(owner.savepoint().is_none());
		assert!(owner.participant().savepoint().is_none());
	}
}
