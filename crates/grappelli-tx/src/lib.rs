//! # Grappelli TX
//!
//! Transaction propagation coordinator for data-access layers.
//!
//! Every call into [`TransactionCoordinator::run`] opens a *logical*
//! transaction frame. A frame either owns a *physical* transaction (one
//! begin/commit-or-rollback cycle against the resource manager) or
//! participates in the physical transaction of an enclosing frame; the
//! [`Propagation`] policy decides which on entry, and the coordinator
//! reconciles the frames' outcomes on exit.
//!
//! The coordinator knows nothing about SQL, tables, or domain objects.
//! It drives the resource purely through the [`ResourceManager`] /
//! [`ResourceTransaction`] trait seam and operates on transaction
//! context and policy alone.
//!
//! ## Propagation policies
//!
//! - [`Propagation::Required`]: join the ambient transaction if one is
//!   active, otherwise begin a new one.
//! - [`Propagation::RequiresNew`]: always begin an independent physical
//!   transaction, suspending any ambient one until the frame exits.
//!
//! ## The rollback-only reconciliation rule
//!
//! A participant frame that fails never rolls back physically; only the
//! owning frame may touch the resource manager. It marks the shared
//! context rollback-only and rethrows. If a caller in between catches
//! that error and returns normally, the owning frame still rolls back
//! and surfaces [`TransactionError::UnexpectedRollback`], so a silently
//! doomed transaction can never masquerade as a successful commit. This
//! is deliberate behavior, not an inconsistency to paper over.
//!
//! ## Example
//!
//! ```
//! use async_trait::async_trait;
//! use grappelli_tx::{
//! 	Propagation, ResourceFailure, ResourceManager, ResourceTransaction,
//! 	TransactionCoordinator,
//! };
//!
//! struct InMemory;
//! struct InMemoryTx;
//!
//! #[async_trait]
//! impl ResourceManager for InMemory {
//! 	async fn begin(&self) -> Result<Box<dyn ResourceTransaction>, ResourceFailure> {
//! 		Ok(Box::new(InMemoryTx))
//! 	}
//! }
//!
//! #[async_trait]
//! impl ResourceTransaction for InMemoryTx {
//! 	async fn commit(self: Box<Self>) -> Result<(), ResourceFailure> {
//! 		Ok(())
//! 	}
//!
//! 	async fn rollback(self: Box<Self>) -> Result<(), ResourceFailure> {
//! 		Ok(())
//! 	}
//! }
//!
//! # async fn example() -> Result<(), grappelli_tx::TransactionError> {
//! let coordinator = TransactionCoordinator::new(InMemory);
//!
//! let value = coordinator
//! 	.run(Propagation::Required, |_ctx| async move {
//! 		// Business logic goes here; return Err to roll back.
//! 		Ok::<_, anyhow::Error>(42)
//! 	})
//! 	.await?;
//!
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! # tokio::runtime::Runtime::new().unwrap().block_on(example()).unwrap();
//! ```
//!
//! ## Concurrency model
//!
//! One coordinator serves one logical call chain. The ambient context is
//! chain-local state; chains running concurrently must each hold their
//! own coordinator over their own resource manager. Nothing here is a
//! process-wide singleton.

pub mod context;
pub mod coordinator;
pub mod error;
pub mod propagation;
pub mod resource;

pub use context::{PhysicalTransaction, TransactionContext};
pub use coordinator::TransactionCoordinator;
pub use error::{ResourceFailure, Result, TransactionError};
pub use propagation::Propagation;
pub use resource::{ResourceManager, ResourceTransaction};
