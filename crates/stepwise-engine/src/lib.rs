//! Stepwise Engine
//!
//! Asynchronous execution on top of [`stepwise_runtime::Runtime`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ExecutionRegistry                        │
//! │  - execute_async(workflow, input) → execution id            │
//! │  - status / list / wait / evict                             │
//! │  - cancel / pause / resume / shutdown                       │
//! └─────────────────────────────────────────────────────────────┘
//!                               │  one worker task per run
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Runtime                             │
//! │  - batch scheduling, bounded parallelism                    │
//! │  - cancellation token + pause gate checks                   │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       StepExecutor                          │
//! │  - condition, mappers, tool invocation, recovery            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let runtime = Runtime::new(Arc::new(ToolRegistry::with_builtins()), RuntimeConfig::default());
//! let registry = ExecutionRegistry::new(Arc::new(runtime));
//!
//! let id = registry.execute_async(Arc::new(workflow), json!({}))?;
//! registry.pause(&id)?;
//! registry.resume(&id)?;
//! let record = registry.wait(&id).await?;
//! ```

mod error;
mod record;
mod registry;

pub use error::RegistryError;
pub use record::{ExecutionRecord, ExecutionState};
pub use registry::ExecutionRegistry;
