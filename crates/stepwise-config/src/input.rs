//! Step input templates.
//!
//! Each entry of a step's `inputs` map is a minijinja template rendered just
//! before the step's tool is invoked. Templates see three roots:
//!
//! - `input`: the payload the run was started with
//! - `results`: stored outputs of steps that completed earlier in the run
//! - `metadata`: run-scoped values supplied by the caller
//!
//! ```yaml
//! inputs:
//!   to: "{{ results.lookup.email }}"
//!   subject: "Welcome, {{ input.first_name | title }}"
//!   retries: "{{ input.attempts | default(3) }}"
//! ```
//!
//! Rendering always yields strings. Keys listed in the step's `input_schema`
//! are then coerced, so `retries` above reaches the tool as the integer `3`
//! when the schema declares it `integer`.

/// Template source for one tool input.
pub type InputValue = String;
