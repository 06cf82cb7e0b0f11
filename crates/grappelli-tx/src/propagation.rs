//! Propagation policies and the resolver that applies them.
//!
//! Given the ambient context (present or absent) and the requested
//! policy, the resolver decides whether the entering frame joins the
//! ambient physical transaction or begins an independent one, and
//! whether the ambient context must be suspended for the duration of
//! the frame. Everything else (running the work unit, the exit
//! sequence, resumption) is the coordinator's job.

use crate::context::{PhysicalTransaction, TransactionContext};
use crate::error::ResourceFailure;
use crate::resource::ResourceManager;

/// How a frame relates to the ambient transaction.
///
/// Other standard policies (NESTED, SUPPORTS, NOT_SUPPORTED, NEVER,
/// MANDATORY) are natural additions to the resolver's decision table;
/// they are deliberately not variants until they are implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
	/// Join the ambient transaction if one is active, otherwise begin a
	/// new one. The default policy of data-access layers.
	Required,
	/// Always begin an independent physical transaction, suspending any
	/// ambient one until this frame exits. The inner transaction commits
	/// or rolls back regardless of the outer outcome.
	RequiresNew,
}

impl Propagation {
	pub fn as_str(&self) -> &'static str {
		match self {
			Propagation::Required => "REQUIRED",
			Propagation::RequiresNew => "REQUIRES_NEW",
		}
	}
}

/// Outcome of resolving a policy against the ambient context.
pub(crate) struct Resolution {
	/// The context the entering frame runs under.
	pub(crate) context: TransactionContext,
	/// Ambient context detached for the duration of the frame
	/// (REQUIRES_NEW only). The coordinator restores it unconditionally
	/// at exit.
	pub(crate) suspended: Option<TransactionContext>,
}

/// Apply `policy` to the current ambient context.
///
/// Pure decision logic; the only fallible step is beginning a new
/// physical transaction through the resource manager.
pub(crate) async fn resolve(
	resource: &dyn ResourceManager,
	ambient: Option<&TransactionContext>,
	policy: Propagation,
) -> Result<Resolution, ResourceFailure> {
	match (policy, ambient) {
		(Propagation::Required, Some(ambient)) => {
			tracing::debug!(tx = %ambient.id(), "joining ambient transaction");
			Ok(Resolution {
				context: ambient.participant(),
				suspended: None,
			})
		}
		(Propagation::Required, None) => {
			let context = begin(resource).await?;
			Ok(Resolution {
				context,
				suspended: None,
			})
		}
		(Propagation::RequiresNew, ambient) => {
			if let Some(ambient) = ambient {
				tracing::debug!(tx = %ambient.id(), "suspending ambient transaction");
			}
			let context = begin(resource).await?;
			Ok(Resolution {
				context,
				suspended: ambient.cloned(),
			})
		}
	}
}

async fn begin(resource: &dyn ResourceManager) -> Result<TransactionContext, ResourceFailure> {
	let handle = resource.begin().await?;
	let context = TransactionContext::owner(PhysicalTransaction::new(handle));
	tracing::debug!(tx = %context.id(), "began new physical transaction");
	Ok(context)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::resource::ResourceTransaction;
	use async_trait::async_trait;
	use rstest::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

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

	struct CountingManager {
		begins: AtomicUsize,
	}

	impl CountingManager {
		fn new() -> Self {
			Self {
				begins: AtomicUsize::new(0),
			}
		}

		fn begins(&self) -> usize {
			self.begins.load(Ordering::SeqCst)
		}
	}

	#[async_trait]
	impl ResourceManager for CountingManager {
		async fn begin(&self) -> Result<Box<dyn ResourceTransaction>, ResourceFailure> {
			self.begins.fetch_add(1, Ordering::SeqCst);
			Ok(Box::new(NoopTransaction))
		}
	}

	#[fixture]
	fn manager() -> CountingManager {
		CountingManager::new()
	}

	async fn ambient_context(manager: &CountingManager) -> TransactionContext {
		let handle = manager.begin().await.unwrap();
		TransactionContext::owner(PhysicalTransaction::new(handle))
	}

	#[rstest]
	#[tokio::test]
	async fn required_without_ambient_begins_new(manager: CountingManager) {
		let resolution = resolve(&manager, None, Propagation::Required)
			.await
			.unwrap();

		assert!(resolution.context.is_new_transaction());
		assert!(resolution.suspended.is_none());
		assert_eq!(manager.begins(), 1);
	}

	#[rstest]
	#[tokio::test]
	async fn required_with_ambient_joins_without_beginning(manager: CountingManager) {
		let ambient = ambient_context(&manager).await;

		let resolution = resolve(&manager, Some(&ambient), Propagation::Required)
			.await
			.unwrap();

		assert!(!resolution.context.is_new_transaction());
		assert_eq!(resolution.context.id(), ambient.id());
		assert!(resolution.suspended.is_none());
		// Only the ambient setup called begin
		assert_eq!(manager.begins(), 1);
	}

	#[rstest]
	#[tokio::test]
	async fn requires_new_with_ambient_suspends_and_begins(manager: CountingManager) {
		let ambient = ambient_context(&manager).await;

		let resolution = resolve(&manager, Some(&ambient), Propagation::RequiresNew)
			.await
			.unwrap();

		assert!(resolution.context.is_new_transaction());
		assert_ne!(resolution.context.id(), ambient.id());

		let suspended = resolution.suspended.expect("ambient must be suspended");
		assert_eq!(suspended.id(), ambient.id());
		assert_eq!(manager.begins(), 2);
	}

	#[rstest]
	#[tokio::test]
	async fn requires_new_without_ambient_begins_plain(manager: CountingManager) {
		let resolution = resolve(&manager, None, Propagation::RequiresNew)
			.await
			.unwrap();

		assert!(resolution.context.is_new_transaction());
		assert!(resolution.suspended.is_none());
		assert_eq!(manager.begins(), 1);
	}

	#[test]
	fn policy_names() {
		assert_eq!(Propagation::Required.as_str(), "REQUIRED");
		assert_eq!(Propagation::RequiresNew.as_str(), "REQUIRES_NEW");
	}
}
