//! Stepwise Workflow
//!
//! This crate provides the executable workflow representation for stepwise.
//! A [`Workflow`] is an ordered list of [`Step`]s whose callables (conditions,
//! input/output mappers, error handlers) are shared trait objects, so a step
//! stays a plain data structure that can be cloned into worker tasks.
//!
//! Key pieces:
//! - [`ExecutionContext`] is the per-run state handed to step callables
//! - [`Graph`] exposes the dependency structure
//! - [`plan`] turns a workflow into ordered batches of independent steps,
//!   rejecting duplicate ids, unknown dependencies and cycles

mod branch;
mod callable;
mod context;
mod error;
mod graph;
mod plan;
mod step;
mod workflow;

pub use branch::Branch;
pub use callable::{Condition, ErrorHandler, InputMapper, OutputMapper};
pub use context::ExecutionContext;
pub use error::{MapperError, StepError, WorkflowError};
pub use graph::Graph;
pub use plan::{Plan, plan};
pub use step::Step;
pub use workflow::Workflow;
