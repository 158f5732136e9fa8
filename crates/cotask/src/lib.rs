//! Cotask - cooperative task chains with one-shot completion
//!
//! A small control-flow engine for chaining units of deferred work that can
//! succeed, be cancelled, or fail, and for transforming those outcomes
//! declaratively.
//!
//! # Overview
//!
//! - A [`Task`] starts its work in `begin_execute` and signals a [`Completion`]
//!   exactly once through a [`Completer`], synchronously or later
//! - An [`ExecutionContext`] is threaded through every task of a chain
//! - Leaf tasks do the work: [`DelegateTask`], [`ImmediateTask`], [`FutureAdapterTask`]
//! - [`SequentialTask`] runs lazily produced steps one at a time
//! - Decorators rewrite outcomes: [`OverrideCancelDecorator`],
//!   [`ContinueOnCancelDecorator`], [`RescueDecorator`]
//! - The [`Engine`] turns a chain into a callback or an awaitable result
//!
//! No failure raised while building or starting a task escapes the engine;
//! every failure becomes a `Completion::Failed`.
//!
//! # Example
//!
//! ```rust
//! use cotask::{as_task, from_future, BoxError, Engine, TaskExt};
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("remote timed out")]
//! struct RemoteTimeout;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::new();
//!
//!     let cached = || Ok::<_, BoxError>("cached".to_string());
//!     let task = from_future(async { Err::<String, _>(RemoteTimeout) })
//!         .rescue(move |_: Box<RemoteTimeout>| Ok(as_task(cached).boxed()), false);
//!
//!     let value = engine.execute(task).await?;
//!     assert_eq!(value, "cached");
//!     Ok(())
//! }
//! ```

pub mod adapter;
pub mod completion;
pub mod context;
pub mod decorator;
pub mod engine;
pub mod error;
pub mod leaf;
pub mod reporter;
pub mod sequential;
pub mod task;
pub mod types;

pub use adapter::FutureAdapterTask;
pub use completion::{Completer, Completion, CompletionKind};
pub use context::{ContextId, ContextKey, ContextValue, ExecutionContext, ExecutionHook};
pub use decorator::{ContinueOnCancelDecorator, OverrideCancelDecorator, RescueDecorator};
pub use engine::{as_task, from_future, sequence, Engine};
pub use error::{BoxError, ConfigError, ConfigResult, ExecutionError, ExecutionResult};
pub use leaf::{DelegateTask, ImmediateTask};
pub use reporter::{
    ExecutionReporter, MultiReporter, NoOpReporter, SimpleConsoleReporter, TaskExecutionEvent,
};
pub use sequential::SequentialTask;
pub use task::{BoxTask, Task, TaskExt};
pub use types::{EngineConfig, ExecutionStats};

use std::future::Future;
use std::pin::Pin;

/// A boxed future that is Send and can be used across thread boundaries
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;
