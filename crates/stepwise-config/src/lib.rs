//! Stepwise Config
//!
//! This crate contains the serializable workflow configuration types for stepwise.
//! These types represent workflow definitions before they are resolved into
//! executable workflows by `stepwise-resolver`.
//!
//! Configuration can be loaded from:
//! - JSON files (`workflow.json`)
//! - YAML files (`workflow.yaml` / `workflow.yml`)
//!
//! The resolver takes these configuration types, validates the dependency graph
//! and the embedded templates, and builds the runtime structures for execution.

mod enums;
mod input;
mod step;
mod workflow;

pub use enums::ErrorPolicy;
pub use input::InputValue;
pub use step::StepDef;
pub use workflow::WorkflowDef;
