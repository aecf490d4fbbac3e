//! Semantic validation of the executable subset.
//!
//! Validation runs after transformation and is pure: it walks the
//! model in declaration order and accumulates diagnostics, it never
//! mutates or fails. A model is invalid once the result carries at
//! least one error.

use std::str::FromStr;

use bpmn_types::{
    BpmnAspect, ElementRef, ExclusiveGateway, FlowElement, InputOutputMapping, Mapping,
    OutputBehavior, ServiceTask, TaskDefinition, TaskHeaders, ValidationResult, Workflow,
    WorkflowDefinition, ID_MAX_LENGTH,
};
use once_cell::sync::Lazy;
use regex::Regex;

/// Mapping expressions that would fan out to several values.
static PROHIBITED_EXPRESSIONS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\.\*)|(\[.*,.*\])").expect("prohibited expression pattern"));

#[derive(Debug, Clone, Copy, Default)]
pub struct BpmnValidator;

impl BpmnValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, definition: &WorkflowDefinition) -> ValidationResult {
        let mut result = ValidationResult::new();

        let executable: Vec<&Workflow> = definition.executable_workflows().collect();
        if executable.is_empty() {
            result.add_error(
                ElementRef::new("bpmn:definitions", definition.line),
                "BPMN model must contain at least one executable process.",
            );
        }

        for workflow in executable {
            validate_workflow(&mut result, workflow);
        }

        result
    }
}

fn validate_workflow(result: &mut ValidationResult, workflow: &Workflow) {
    let process = ElementRef::new("bpmn:process", workflow.line);

    if workflow.bpmn_process_id.is_empty() {
        result.add_error(process.clone(), "BPMN process id is required.");
    } else if workflow.bpmn_process_id.len() > ID_MAX_LENGTH {
        result.add_error(
            process.clone(),
            format!("BPMN process id must not be longer than {}.", ID_MAX_LENGTH),
        );
    }

    if workflow.initial_start_event.is_none() {
        result.add_error(
            process,
            "The process must contain at least one none start event.",
        );
    }

    for element in &workflow.elements {
        validate_flow_element(result, workflow, element);
    }
}

fn validate_flow_element(result: &mut ValidationResult, workflow: &Workflow, element: &FlowElement) {
    let element_ref = ElementRef::new(element.qualified_name(), element.common().line);

    if element.id().is_empty() {
        result.add_error(element_ref.clone(), "Activity id is required.");
    } else if element.id().len() > ID_MAX_LENGTH {
        result.add_error(
            element_ref.clone(),
            format!("Activity id must not be longer than {}.", ID_MAX_LENGTH),
        );
    }

    if element.is_flow_node() {
        validate_flow_node(result, workflow, element, &element_ref);
    }

    match element {
        FlowElement::ServiceTask(task) => validate_service_task(result, task, &element_ref),
        FlowElement::EndEvent(_) => validate_end_event(result, element, &element_ref),
        FlowElement::ExclusiveGateway(gateway) => {
            validate_exclusive_gateway(result, workflow, gateway, &element_ref)
        }
        _ => {}
    }
}

fn validate_flow_node(
    result: &mut ValidationResult,
    workflow: &Workflow,
    element: &FlowElement,
    element_ref: &ElementRef,
) {
    let Some(node) = element.node() else {
        return;
    };

    if !matches!(element, FlowElement::ExclusiveGateway(_)) && node.outgoing.len() > 1 {
        result.add_error(
            element_ref.clone(),
            "The flow element must not have more than one outgoing sequence flow.",
        );
    }

    for &flow_index in &node.incoming {
        if let Some(flow) = workflow.sequence_flow(flow_index) {
            if flow.source_node.is_none() {
                result.add_error(
                    ElementRef::new("bpmn:sequenceFlow", flow.common.line),
                    "Cannot find source of sequence flow.",
                );
            }
        }
    }

    for &flow_index in &node.outgoing {
        if let Some(flow) = workflow.sequence_flow(flow_index) {
            if flow.target_node.is_none() {
                result.add_error(
                    ElementRef::new("bpmn:sequenceFlow", flow.common.line),
                    "Cannot find target of sequence flow.",
                );
            }
        }
    }
}

fn validate_service_task(result: &mut ValidationResult, task: &ServiceTask, task_ref: &ElementRef) {
    match task.task_definition() {
        None => result.add_error(
            task_ref.clone(),
            "A service task must contain a 'taskDefinition' extension element.",
        ),
        Some(definition) => validate_task_definition(result, definition),
    }

    if let Some(headers) = task.task_headers() {
        validate_task_headers(result, headers);
    }

    if let Some(mapping) = task.input_output_mapping() {
        validate_input_output_mapping(result, mapping);
    }
}

fn validate_task_definition(result: &mut ValidationResult, definition: &TaskDefinition) {
    let definition_ref = ElementRef::new("zeebe:taskDefinition", definition.line);

    if definition.task_type.is_empty() {
        result.add_error(
            definition_ref.clone(),
            "A task definition must contain a 'type' attribute which specifies the type of the task.",
        );
    }

    if definition.retries < 1 {
        result.add_error(definition_ref, "The task retries must be greater than 0.");
    }
}

fn validate_task_headers(result: &mut ValidationResult, headers: &TaskHeaders) {
    let headers_ref = ElementRef::new("zeebe:taskHeaders", headers.line);

    for header in &headers.headers {
        if header.key.is_none() {
            result.add_error(
                headers_ref.clone(),
                "A task header must contain a 'key' attribute.",
            );
        }

        if header.value.is_none() {
            result.add_error(
                headers_ref.clone(),
                "A task header must contain a 'value' attribute.",
            );
        }
    }
}

fn validate_input_output_mapping(result: &mut ValidationResult, mapping: &InputOutputMapping) {
    let mapping_ref = ElementRef::new("zeebe:ioMapping", mapping.line);

    validate_output_behavior(result, mapping, &mapping_ref);

    validate_mapping_expressions(result, &mapping.inputs, &mapping_ref);
    validate_mapping_expressions(result, &mapping.outputs, &mapping_ref);

    for compiled in mapping
        .compiled_inputs
        .iter()
        .chain(&mapping.compiled_outputs)
    {
        if let Some(reason) = compiled.source.error_reason() {
            result.add_error(
                mapping_ref.clone(),
                format!(
                    "JSON path query '{}' is not valid! Reason: {}",
                    compiled.source.expression(),
                    reason
                ),
            );
        }
    }
}

fn validate_output_behavior(
    result: &mut ValidationResult,
    mapping: &InputOutputMapping,
    mapping_ref: &ElementRef,
) {
    match OutputBehavior::from_str(&mapping.output_behavior) {
        Err(unknown) => result.add_error(mapping_ref.clone(), unknown.to_string()),
        Ok(OutputBehavior::None) if !mapping.outputs.is_empty() => {
            result.add_error(
                mapping_ref.clone(),
                format!(
                    "Output behavior '{}' is not supported in combination with output mappings.",
                    mapping.output_behavior
                ),
            );
        }
        Ok(_) => {}
    }
}

fn validate_mapping_expressions(
    result: &mut ValidationResult,
    mappings: &[Mapping],
    mapping_ref: &ElementRef,
) {
    for mapping in mappings {
        if PROHIBITED_EXPRESSIONS.is_match(&mapping.source) {
            result.add_error(
                mapping_ref.clone(),
                format!(
                    "Source mapping: JSON path '{}' contains prohibited expression \
                     (for example $.* or $.(foo|bar)).",
                    mapping.source
                ),
            );
        }

        if PROHIBITED_EXPRESSIONS.is_match(&mapping.target) {
            result.add_error(
                mapping_ref.clone(),
                format!(
                    "Target mapping: JSON path '{}' contains prohibited expression \
                     (for example $.* or $.(foo|bar)).",
                    mapping.target
                ),
            );
        }

        if mappings.len() > 1 && mapping.target == bpmn_el::JSON_ROOT_PATH {
            result.add_error(
                mapping_ref.clone(),
                "Target mapping: root mapping is not allowed because it would override other mapping.",
            );
        }
    }
}

fn validate_end_event(result: &mut ValidationResult, element: &FlowElement, element_ref: &ElementRef) {
    let has_outgoing = element.node().is_some_and(|node| !node.outgoing.is_empty());
    if has_outgoing {
        result.add_error(
            element_ref.clone(),
            "An end event must not have an outgoing sequence flow.",
        );
    }
}

fn validate_exclusive_gateway(
    result: &mut ValidationResult,
    workflow: &Workflow,
    gateway: &ExclusiveGateway,
    gateway_ref: &ElementRef,
) {
    if gateway.common.aspect == BpmnAspect::ExclusiveSplit {
        match gateway.default_flow {
            Some(default_index) => {
                if let Some(default_flow) = workflow.sequence_flow(default_index) {
                    if default_flow.has_condition() {
                        result.add_error(
                            ElementRef::new("bpmn:sequenceFlow", default_flow.common.line),
                            "A default sequence flow must not have a condition.",
                        );
                    }
                }

                if !gateway.node.outgoing.contains(&default_index) {
                    result.add_error(
                        gateway_ref.clone(),
                        "The default sequence flow must be an outgoing sequence flow of the exclusive gateway.",
                    );
                }
            }
            None => {
                result.add_warning(
                    gateway_ref.clone(),
                    "An exclusive gateway should have a default sequence flow without condition.",
                );
            }
        }

        for &flow_index in &gateway.outgoing_with_conditions {
            let Some(flow) = workflow.sequence_flow(flow_index) else {
                continue;
            };
            let Some(compiled) = flow.condition.as_ref().and_then(|c| c.compiled.as_ref()) else {
                continue;
            };
            if let Some(reason) = compiled.error_message() {
                result.add_error(
                    ElementRef::new("bpmn:sequenceFlow", flow.common.line),
                    format!(
                        "The condition '{}' is not valid: {}",
                        compiled.expression(),
                        reason
                    ),
                );
            }
        }

        for &flow_index in &gateway.node.outgoing {
            let Some(flow) = workflow.sequence_flow(flow_index) else {
                continue;
            };
            if !flow.has_condition() && gateway.default_flow != Some(flow_index) {
                result.add_error(
                    ElementRef::new("bpmn:sequenceFlow", flow.common.line),
                    "A sequence flow on an exclusive gateway must have a condition, \
                     if it is not the default flow.",
                );
            }
        }
    } else if gateway.node.outgoing.len() > 1 {
        result.add_error(
            gateway_ref.clone(),
            "An exclusive gateway with more than one outgoing sequence flow \
             must have conditions on the sequence flows.",
        );
    }
}
