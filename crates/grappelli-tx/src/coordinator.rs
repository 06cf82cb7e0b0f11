//! The transaction coordinator.
//!
//! One coordinator instance serves one logical call chain. It owns the
//! chain's ambient context slot, resolves propagation on entry, wraps
//! the work unit's execution, and applies the commit/rollback/doom
//! reconciliation rules on exit. It is never shared across chains: a
//! process-wide coordinator singleton would leak transaction state
//! between unrelated chains.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::{PhysicalTransaction, TransactionContext};
use crate::error::{ResourceFailure, Result, TransactionError};
use crate::propagation::{self, Propagation, Resolution};
use crate::resource::ResourceManager;

/// Coordinates logical transaction frames over one resource manager.
///
/// See [`run`](Self::run) for the entry/exit contract. A complete
/// example lives in the crate-level documentation.
pub struct TransactionCoordinator<R: ResourceManager> {
	resource: R,
	ambient: Mutex<Option<TransactionContext>>,
}

impl<R: ResourceManager> TransactionCoordinator<R> {
	/// Create a coordinator for one logical call chain.
	pub fn new(resource: R) -> Self {
		Self {
			resource,
			ambient: Mutex::new(None),
		}
	}

	/// The resource manager this coordinator drives.
	pub fn resource(&self) -> &R {
		&self.resource
	}

	/// The ambient transaction context, if a frame is currently active.
	///
	/// Work units can use this to observe or doom the transaction they
	/// run under without having the context threaded through every call.
	pub fn current(&self) -> Option<TransactionContext> {
		self.ambient.lock().clone()
	}

	/// Execute a work unit under the given propagation policy.
	///
	/// On entry, the policy is resolved against the ambient context:
	/// the frame either joins the ambient physical transaction or begins
	/// an independent one (suspending the ambient context under
	/// [`Propagation::RequiresNew`]).
	///
	/// On exit, exactly once on every path:
	///
	/// - Owning frame, clean return, not rollback-only: physical commit.
	/// - Owning frame, clean return, rollback-only: physical rollback,
	///   then [`TransactionError::UnexpectedRollback`]. Some participant
	///   below was doomed and its error swallowed; the clean-looking
	///   return must not be mistaken for a successful commit.
	/// - Owning frame, error: physical rollback, original error
	///   propagated.
	/// - Participant frame, clean return: no physical action.
	/// - Participant frame, error: the shared context is marked
	///   rollback-only and the original error propagated. Participants
	///   never touch the resource manager directly.
	///
	/// A suspended context is resumed unconditionally, whatever the
	/// frame's outcome, including cancellation of the returned future.
	pub async fn run<F, Fut, T>(&self, policy: Propagation, work: F) -> Result<T>
	where
		F: FnOnce(TransactionContext) -> Fut,
		Fut: Future<Output = anyhow::Result<T>>,
	{
		let ambient = self.current();
		let Resolution { context, suspended } =
			propagation::resolve(&self.resource, ambient.as_ref(), policy).await?;

		if !context.is_new_transaction() {
			// Participant frame: reuse the ambient entry, never pop it.
			return match work(context.clone()).await {
				Ok(value) => Ok(value),
				Err(err) => {
					tracing::debug!(
						tx = %context.id(),
						policy = policy.as_str(),
						"participant frame failed; dooming ambient transaction"
					);
					context.set_rollback_only();
					Err(TransactionError::Work(err))
				}
			};
		}

		// Owning frame: install the fresh context as ambient for nested
		// frames. The guard restores the slot (resuming any suspended
		// context) when this frame unwinds, even if the future is
		// dropped before the exit sequence runs.
		*self.ambient.lock() = Some(context.clone());
		let _guard = AmbientGuard {
			slot: &self.ambient,
			restore: suspended,
			physical: Arc::clone(context.physical()),
		};

		let outcome = work(context.clone()).await;
		self.finish_owner(&context, outcome).await
	}

	/// Exit sequence for an owning frame.
	async fn finish_owner<T>(
		&self,
		context: &TransactionContext,
		outcome: anyhow::Result<T>,
	) -> Result<T> {
		match outcome {
			Ok(value) => {
				if context.is_rollback_only() {
					tracing::warn!(
						tx = %context.id(),
						"clean return on a rollback-only transaction; rolling back"
					);
					self.rollback_physical(context).await?;
					Err(TransactionError::UnexpectedRollback)
				} else {
					self.commit_physical(context).await?;
					Ok(value)
				}
			}
			Err(err) => {
				self.rollback_physical(context).await?;
				Err(TransactionError::Work(err))
			}
		}
	}

	async fn commit_physical(&self, context: &TransactionContext) -> Result<()> {
		let handle = context.physical().take_handle().ok_or_else(|| {
			ResourceFailure::Commit(anyhow::anyhow!("transaction handle already consumed"))
		})?;
		tracing::debug!(tx = %context.id(), "committing physical transaction");
		handle.commit().await?;
		Ok(())
	}

	async fn rollback_physical(&self, context: &TransactionContext) -> Result<()> {
		let handle = context.physical().take_handle().ok_or_else(|| {
			ResourceFailure::Rollback(anyhow::anyhow!("transaction handle already consumed"))
		})?;
		tracing::debug!(tx = %context.id(), "rolling back physical transaction");
		handle.rollback().await?;
		Ok(())
	}
}

/// Restores the ambient slot when an owning frame unwinds.
///
/// On the normal path the exit sequence has already consumed the
/// resource handle, so dropping the guard only resumes the suspended
/// context. A handle still present here means the frame's future was
/// dropped mid-flight; the transaction is rolled back best-effort, as
/// errors cannot propagate out of `drop`.
struct AmbientGuard<'a> {
	slot: &'a Mutex<Option<TransactionContext>>,
	restore: Option<TransactionContext>,
	physical: Arc<PhysicalTransaction>,
}

impl Drop for AmbientGuard<'_> {
	fn drop(&mut self) {
		*self.slot.lock() = self.restore.take();

		if let Some(handle) = self.physical.take_handle() {
			tracing::warn!(
				tx = %self.physical.id(),
				"transaction frame dropped before its exit sequence; rolling back"
			);

			// The rollback is async but Drop is not; run it to
			// completion on the current runtime. block_in_place panics
			// on a current-thread runtime, in which case the physical
			// transaction is leaked to the resource manager's own
			// timeout handling.
			if let Ok(runtime) = tokio::runtime::Handle::try_current() {
				let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
					tokio::task::block_in_place(|| {
						runtime.block_on(async { handle.rollback().await })
					})
				}));

				match result {
					Ok(Ok(())) => {}
					Ok(Err(e)) => {
						tracing::error!(
							tx = %self.physical.id(),
							error = %e,
							"rollback failed while cleaning up a dropped frame"
						);
					}
					Err(_) => {
						tracing::error!(
							tx = %self.physical.id(),
							"cannot roll back on a current-thread runtime; \
							 transaction left to the resource manager"
						);
					}
				}
			} else {
				tracing::error!(
					tx = %self.physical.id(),
					"no async runtime available for rollback; \
					 transaction left to the resource manager"
				);
			}
		}
	}
}
