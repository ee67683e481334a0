use std::collections::HashSet;
use std::time::Duration;

use minijinja::Environment;
use stepwise_config::{ErrorPolicy, StepDef, WorkflowDef};
use stepwise_workflow::{Step, Workflow};
use tracing::debug;

use crate::error::ResolveError;
use crate::input::environment;
use crate::mapper::{ContinueOnError, ExpressionCondition, ExpressionOutput, TemplateInput};

/// Resolver transforms a WorkflowDef into an executable Workflow.
pub trait Resolver: Send + Sync {
  /// Resolve a workflow definition.
  ///
  /// This process:
  /// 1. Validates templates, expressions and tool references
  /// 2. Builds steps with their callables attached
  /// 3. Plans the graph (no duplicates, unknown dependencies or cycles)
  fn resolve(&self, def: WorkflowDef) -> Result<Workflow, ResolveError>;
}

/// Standard resolver, optionally checking tools against a known set.
#[derive(Debug, Clone, Default)]
pub struct StandardResolver {
  known_tools: Option<HashSet<String>>,
}

impl StandardResolver {
  pub fn new() -> Self {
    Self::default()
  }

  /// Reject steps whose tool is not in `tools`.
  pub fn with_known_tools<I, S>(mut self, tools: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.known_tools = Some(tools.into_iter().map(Into::into).collect());
    self
  }

  fn validate_step(&self, env: &Environment<'_>, def: &StepDef) -> Result<(), ResolveError> {
    let known = self.known_tools.as_ref();
    if known.is_some_and(|tools| !tools.contains(&def.tool)) {
      return Err(ResolveError::UnknownTool {
        step_id: def.step_id.clone(),
        tool: def.tool.clone(),
      });
    }

    for (input, template) in &def.inputs {
      env
        .template_from_str(template)
        .map_err(|e| ResolveError::InvalidTemplate {
          step_id: def.step_id.clone(),
          input: input.clone(),
          message: e.to_string(),
        })?;
    }

    let expressions = [("when", def.when.as_deref()), ("output", def.output.as_deref())];
    for (field, source) in expressions {
      if let Some(source) = source {
        env
          .compile_expression(source)
          .map_err(|e| ResolveError::InvalidExpression {
            step_id: def.step_id.clone(),
            field,
            message: e.to_string(),
          })?;
      }
    }

    Ok(())
  }

  fn resolve_step(&self, def: StepDef) -> Step {
    let mut step = Step::new(def.step_id, def.tool)
      .depends_on(def.depends_on)
      .retries(def.retries.unwrap_or(0));

    if let Some(name) = def.name {
      step = step.named(name);
    }
    if def.optional {
      step = step.optional();
    }
    if let Some(ms) = def.timeout_ms {
      step = step.timeout(Duration::from_millis(ms));
    }
    if let Some(when) = def.when {
      step = step.with_condition(ExpressionCondition::new(when));
    }
    if !def.inputs.is_empty() {
      step = step.with_input_mapper(TemplateInput::new(def.inputs, def.input_schema.as_ref()));
    }
    if let Some(output) = def.output {
      step = step.with_output_mapper(ExpressionOutput::new(output));
    }
    if def.on_error == ErrorPolicy::Continue {
      step = step.with_error_handler(ContinueOnError);
    }

    step
  }
}

impl Resolver for StandardResolver {
  fn resolve(&self, def: WorkflowDef) -> Result<Workflow, ResolveError> {
    if def.max_workers == Some(0) {
      return Err(ResolveError::InvalidMaxWorkers);
    }

    let env = environment();
    for step in &def.steps {
      self.validate_step(&env, step)?;
    }

    let mut workflow = Workflow::new(def.workflow_id, def.name);
    workflow.max_workers = def.max_workers;
    for step in def.steps {
      workflow.steps.push(self.resolve_step(step));
    }

    let plan = workflow.plan()?;
    debug!(
      workflow_id = %workflow.workflow_id,
      steps = workflow.steps.len(),
      batches = plan.len(),
      "workflow_resolved"
    );

    Ok(workflow)
  }
}
