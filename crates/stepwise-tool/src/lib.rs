//! Stepwise Tool
//!
//! The orchestration engine never looks tools up itself. It talks to a
//! [`ToolInvoker`], an already-resolved capability that maps an opaque tool
//! reference and a JSON input to a JSON output.
//!
//! [`ToolRegistry`] is the standard invoker: an explicit registry object that
//! the host application builds and populates at startup, then hands to the
//! runtime by reference. There is no process-global registration.

pub mod builtin;
mod error;
mod invoker;
mod registry;

pub use error::ToolError;
pub use invoker::{Tool, ToolInvoker};
pub use registry::{FnTool, ToolRegistry};
