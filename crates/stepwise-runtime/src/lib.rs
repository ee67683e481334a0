//! Stepwise Runtime
//!
//! This crate executes [`Workflow`](stepwise_workflow::Workflow)s. The
//! lowest-level primitive is [`StepExecutor`], which runs one step: condition,
//! input mapping, tool invocation under a timeout with retries, output mapping
//! and the optional/error-handler recovery chain.
//!
//! [`Runtime`] drives the executor across the planned batches with bounded
//! parallelism, honours cancellation and pause gates through [`RunControl`],
//! and reports progress as [`ExecutionEvent`]s.

mod config;
mod control;
mod error;
mod events;
mod executor;
mod result;
mod runtime;

pub use config::RuntimeConfig;
pub use control::RunControl;
pub use error::RuntimeError;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use executor::{StepExecutor, StepOutcome};
pub use result::{RunError, RunOutcome, RunStatus};
pub use runtime::Runtime;
