//! Input resolution pipeline
//!
//! Each stage takes the previous mapping by value and returns a new one.
//! [`resolve_inputs`] runs them in their fixed order.

use stevedore_core::task::TaskInputDefinition;
use stevedore_core::variables::expand_macros;
use stevedore_core::{Definition, ExecutionContext, HandlerData, InputMap, TaskInstance, Variables};
use tracing::debug;

use crate::path::PathResolutionChain;

/// Final inputs for one task run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInputs {
    /// Task inputs handed to the handler
    pub inputs: InputMap,

    /// The selected variant's own inputs, expanded
    pub handler_inputs: InputMap,
}

/// Declared defaults, trimmed; declarations without a name are ignored
pub fn seed_defaults(declarations: &[TaskInputDefinition]) -> InputMap {
    declarations
        .iter()
        .filter_map(|declaration| {
            let name = declaration.name.trim();
            (!name.is_empty()).then(|| {
                let value = declaration.default_value.as_deref().unwrap_or_default().trim();
                (name.to_string(), value.to_string())
            })
        })
        .collect()
}

/// Overlay the instance's values, trimmed; the instance wins on collision
pub fn overlay_instance(inputs: InputMap, instance: &InputMap) -> InputMap {
    let supplied: InputMap = instance
        .iter()
        .filter_map(|(name, value)| {
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect();
    inputs.overlay(&supplied)
}

/// Expand `$(name)` job variable references
pub fn expand_variables(inputs: InputMap, variables: &Variables) -> InputMap {
    variables.expand_values(inputs)
}

/// Expand `$(NAME)` process environment references
pub fn expand_environment(inputs: InputMap, context: &ExecutionContext) -> InputMap {
    inputs.map_values(|_, value| {
        expand_macros(value, |name| context.environment_variable(name).map(str::to_string))
    })
}

/// Rewrite every input declared with the file path type through `translate`
pub fn translate_file_paths<F>(
    mut inputs: InputMap,
    declarations: &[TaskInputDefinition],
    translate: F,
) -> InputMap
where
    F: Fn(&str) -> String,
{
    for declaration in declarations.iter().filter(|d| d.is_file_path()) {
        let name = declaration.name.trim();
        if name.is_empty() {
            continue;
        }
        let raw = inputs.get(name).unwrap_or_default().to_string();
        let translated = translate(&raw);
        debug!("Translated file path input '{}': '{}' -> '{}'", name, raw, translated);
        inputs.insert(name, translated);
    }
    inputs
}

/// Expand handler inputs against the task inputs first, then job variables.
///
/// Environment references are not expanded.
pub fn expand_handler_inputs(
    handler_inputs: InputMap,
    task_inputs: &InputMap,
    variables: &Variables,
) -> InputMap {
    let from_task = handler_inputs.map_values(|_, value| {
        expand_macros(value, |name| task_inputs.get(name).map(str::to_string))
    });
    variables.expand_values(from_task)
}

/// Run the whole pipeline for `task` against `handler`
pub fn resolve_inputs(
    context: &ExecutionContext,
    definition: &Definition,
    task: &TaskInstance,
    handler: &HandlerData,
    paths: &PathResolutionChain,
) -> ResolvedInputs {
    let variables = context.variables().clone();

    let inputs = seed_defaults(&definition.inputs);
    let inputs = overlay_instance(inputs, &task.inputs);
    let inputs = expand_variables(inputs, &variables);
    let inputs = expand_environment(inputs, context);
    let inputs = translate_file_paths(inputs, &definition.inputs, |raw| {
        paths.resolve(context, raw)
    });

    let handler_inputs = expand_handler_inputs(handler.inputs.clone(), &inputs, &variables);

    ResolvedInputs {
        inputs,
        handler_inputs,
    }
}
