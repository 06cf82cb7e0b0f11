//! Error types for the transaction coordinator.

/// Result alias used throughout the coordinator.
pub type Result<T> = std::result::Result<T, TransactionError>;

/// Errors raised by the resource manager itself.
///
/// These are always fatal: the coordinator never retries a failed
/// `begin`/`commit`/`rollback` and propagates the failure unchanged.
/// Retry policies, if any, belong to a higher layer.
#[derive(Debug, thiserror::Error)]
pub enum ResourceFailure {
	/// Beginning a new physical transaction failed
	#[error("failed to begin transaction: {0}")]
	Begin(#[source] anyhow::Error),

	/// Committing the physical transaction failed
	#[error("failed to commit transaction: {0}")]
	Commit(#[source] anyhow::Error),

	/// Rolling back the physical transaction failed
	#[error("failed to roll back transaction: {0}")]
	Rollback(#[source] anyhow::Error),
}

/// Errors surfaced by [`TransactionCoordinator::run`](crate::TransactionCoordinator::run).
///
/// # Examples
///
/// ```
/// use grappelli_tx::TransactionError;
///
/// let err = TransactionError::UnexpectedRollback;
/// assert!(err.to_string().contains("rollback-only"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
	/// The work unit returned normally, but a participant had already
	/// marked the transaction rollback-only. The transaction has been
	/// rolled back instead of committed.
	///
	/// This is manufactured by the coordinator at an owning frame's exit,
	/// never by work units. It signals that a nested participant's error
	/// was caught and swallowed somewhere below, silently dooming the
	/// transaction without the outer caller ever observing an error.
	#[error(
		"transaction was marked rollback-only by a participant and has been rolled back \
		 despite a clean return"
	)]
	UnexpectedRollback,

	/// Resource manager failure during begin/commit/rollback
	#[error("resource manager failure: {0}")]
	Resource(#[from] ResourceFailure),

	/// The work unit's own error, propagated unchanged
	#[error("work unit failed: {0}")]
	Work(#[source] anyhow::Error),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resource_failure_converts_into_transaction_error() {
		let failure = ResourceFailure::Commit(anyhow::anyhow!("connection reset"));
		let err: TransactionError = failure.into();
		assert!(matches!(err, TransactionError::Resource(_)));
	}

	#[test]
	fn work_error_preserves_original_message() {
		let err = TransactionError::Work(anyhow::anyhow!("duplicate key"));
		assert!(err.to_string().contains("duplicate key"));
	}
}
