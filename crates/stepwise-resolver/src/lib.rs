//! Stepwise Resolver
//!
//! Turns a declarative [`WorkflowDef`](stepwise_config::WorkflowDef) into an
//! executable [`Workflow`](stepwise_workflow::Workflow):
//!
//! - step `inputs` become a minijinja-backed input mapper whose rendered
//!   strings are coerced through the step's `input_schema`
//! - `when` becomes an expression condition
//! - `output` becomes an expression output mapper
//! - `on_error: continue` becomes a recovering error handler
//!
//! The dependency graph is planned during resolution, so a resolved workflow
//! is known to be free of duplicate ids, unknown dependencies and cycles.

mod error;
mod input;
mod mapper;
mod resolver;

pub use error::ResolveError;
pub use input::{SchemaType, coerce_inputs, extract_schema_types, resolve_inputs};
pub use mapper::{ContinueOnError, ExpressionCondition, ExpressionOutput, TemplateInput};
pub use resolver::{Resolver, StandardResolver};
