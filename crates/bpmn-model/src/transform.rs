//! Graph transformation: closes a raw model into its executable form.
//!
//! A freshly parsed or built model has no derived state: sequence flows
//! carry unresolved id references, conditions and mappings are plain
//! text, headers are unencoded. Transformation fills all of that in and
//! never fails; resolution gaps and invalid expressions are left for
//! validation to report.
//!
//! Running the transformer twice on the same model yields the same
//! result, since every derived field is rebuilt from scratch.

use bpmn_el::{
    CompileCondition, CompileJsonPath, JsonConditionCompiler, JsonPathQueryCompiler,
};
use bpmn_types::{
    BpmnAspect, CompiledMapping, FlowElement, Mapping, TaskHeaders, Workflow, WorkflowDefinition,
};
use tracing::debug;

/// Initial buffer estimate per encoded header pair.
const INITIAL_SIZE_KEY_VALUE_PAIR: usize = 128;

pub struct BpmnTransformer {
    path_compiler: Box<dyn CompileJsonPath>,
    condition_compiler: Box<dyn CompileCondition>,
}

impl Default for BpmnTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl BpmnTransformer {
    pub fn new() -> Self {
        Self {
            path_compiler: Box::new(JsonPathQueryCompiler::new()),
            condition_compiler: Box::new(JsonConditionCompiler::new()),
        }
    }

    /// Replaces the expression compilers, e.g. with test doubles.
    pub fn with_compilers(
        path_compiler: Box<dyn CompileJsonPath>,
        condition_compiler: Box<dyn CompileCondition>,
    ) -> Self {
        Self {
            path_compiler,
            condition_compiler,
        }
    }

    pub fn transform(&self, definition: &mut WorkflowDefinition) {
        for workflow in &mut definition.workflows {
            self.transform_workflow(workflow);
        }

        definition.workflows_by_id = definition
            .workflows
            .iter()
            .enumerate()
            .map(|(index, workflow)| (workflow.bpmn_process_id.clone(), index))
            .collect();
    }

    fn transform_workflow(&self, workflow: &mut Workflow) {
        debug!(
            process = %workflow.bpmn_process_id,
            elements = workflow.elements.len(),
            "transforming process"
        );

        collect_flow_elements(workflow);
        set_initial_start_event(workflow);
        link_sequence_flows(workflow);
        self.compile_conditions(workflow);
        self.transform_service_tasks(workflow);
        annotate_exclusive_gateways(workflow);
        add_bpmn_aspects(workflow);
    }

    fn compile_conditions(&self, workflow: &mut Workflow) {
        for element in &mut workflow.elements {
            if let FlowElement::SequenceFlow(flow) = element {
                if let Some(condition) = &mut flow.condition {
                    condition.compiled = Some(self.condition_compiler.compile(&condition.text));
                }
            }
        }
    }

    fn transform_service_tasks(&self, workflow: &mut Workflow) {
        for element in &mut workflow.elements {
            if let FlowElement::ServiceTask(task) = element {
                let extensions = task.extension_elements.get_or_insert_with(Default::default);

                let headers = extensions.task_headers.get_or_insert_with(Default::default);
                encode_task_headers(headers);

                let mapping = extensions
                    .input_output_mapping
                    .get_or_insert_with(Default::default);
                mapping.compiled_inputs = self.compile_mappings(&mapping.inputs);
                mapping.compiled_outputs = self.compile_mappings(&mapping.outputs);
            }
        }
    }

    fn compile_mappings(&self, mappings: &[Mapping]) -> Vec<CompiledMapping> {
        // A sole identity root mapping is a no-op and compiles away.
        if let [mapping] = mappings {
            if mapping.is_root_mapping() {
                return Vec::new();
            }
        }

        mappings
            .iter()
            .map(|mapping| CompiledMapping {
                source: self.path_compiler.compile(&mapping.source),
                target: mapping.target.clone(),
            })
            .collect()
    }
}

/// Orders the arena as start events, end events, sequence flows,
/// service tasks, exclusive gateways (stable within each kind) and
/// rebuilds the id index. On duplicate ids the last element wins;
/// validation catches the fallout through broken links.
fn collect_flow_elements(workflow: &mut Workflow) {
    fn rank(element: &FlowElement) -> u8 {
        match element {
            FlowElement::StartEvent(_) => 0,
            FlowElement::EndEvent(_) => 1,
            FlowElement::SequenceFlow(_) => 2,
            FlowElement::ServiceTask(_) => 3,
            FlowElement::ExclusiveGateway(_) => 4,
        }
    }

    workflow.elements.sort_by_key(rank);
    workflow.element_index = workflow
        .elements
        .iter()
        .enumerate()
        .map(|(index, element)| (element.id().to_string(), index))
        .collect();
}

fn set_initial_start_event(workflow: &mut Workflow) {
    workflow.initial_start_event = workflow
        .elements
        .iter()
        .position(|element| matches!(element, FlowElement::StartEvent(_)));
}

/// Resolves every sequence flow's source and target reference and
/// rebuilds the incoming/outgoing lists of the nodes. References that
/// miss or hit a non-node element stay unresolved.
fn link_sequence_flows(workflow: &mut Workflow) {
    for element in &mut workflow.elements {
        if let Some(node) = element.node_mut() {
            node.incoming.clear();
            node.outgoing.clear();
        } else if let Some(flow) = element.as_sequence_flow_mut() {
            flow.source_node = None;
            flow.target_node = None;
        }
    }

    for flow_index in workflow.sequence_flow_indices() {
        let (source_ref, target_ref) = match workflow.sequence_flow(flow_index) {
            Some(flow) => (flow.source_ref.clone(), flow.target_ref.clone()),
            None => continue,
        };

        if let Some(source_index) = resolve_node(workflow, &source_ref) {
            if let Some(flow) = workflow.elements[flow_index].as_sequence_flow_mut() {
                flow.source_node = Some(source_index);
            }
            if let Some(node) = workflow.elements[source_index].node_mut() {
                node.outgoing.push(flow_index);
            }
        }

        if let Some(target_index) = resolve_node(workflow, &target_ref) {
            if let Some(flow) = workflow.elements[flow_index].as_sequence_flow_mut() {
                flow.target_node = Some(target_index);
            }
            if let Some(node) = workflow.elements[target_index].node_mut() {
                node.incoming.push(flow_index);
            }
        }
    }
}

fn resolve_node(workflow: &Workflow, id: &str) -> Option<usize> {
    workflow
        .element_index
        .get(id)
        .copied()
        .filter(|&index| workflow.elements[index].is_flow_node())
}

fn encode_task_headers(headers: &mut TaskHeaders) {
    let mut buffer = Vec::new();

    if !headers.headers.is_empty() {
        buffer.reserve(INITIAL_SIZE_KEY_VALUE_PAIR * headers.headers.len());
        rmp::encode::write_map_len(&mut buffer, headers.headers.len() as u32)
            .expect("writing to a Vec cannot fail");

        for header in &headers.headers {
            rmp::encode::write_str(&mut buffer, header.key.as_deref().unwrap_or(""))
                .expect("writing to a Vec cannot fail");
            rmp::encode::write_str(&mut buffer, header.value.as_deref().unwrap_or(""))
                .expect("writing to a Vec cannot fail");
        }
    }

    headers.encoded_msgpack = buffer;
}

/// Resolves the default flow reference and collects the outgoing flows
/// that carry a condition, in declaration order.
fn annotate_exclusive_gateways(workflow: &mut Workflow) {
    for index in 0..workflow.elements.len() {
        let (default_flow_ref, outgoing) = match &workflow.elements[index] {
            FlowElement::ExclusiveGateway(gateway) => (
                gateway.default_flow_ref.clone(),
                gateway.node.outgoing.clone(),
            ),
            _ => continue,
        };

        let default_flow = default_flow_ref.as_deref().and_then(|id| {
            workflow
                .element_index
                .get(id)
                .copied()
                .filter(|&flow_index| {
                    matches!(workflow.elements[flow_index], FlowElement::SequenceFlow(_))
                })
        });

        let outgoing_with_conditions: Vec<usize> = outgoing
            .iter()
            .copied()
            .filter(|&flow_index| {
                workflow
                    .sequence_flow(flow_index)
                    .is_some_and(|flow| flow.has_condition())
            })
            .collect();

        if let FlowElement::ExclusiveGateway(gateway) = &mut workflow.elements[index] {
            gateway.default_flow = default_flow;
            gateway.outgoing_with_conditions = outgoing_with_conditions;
        }
    }
}

/// Classifies every flow node by its outgoing flows.
fn add_bpmn_aspects(workflow: &mut Workflow) {
    for index in 0..workflow.elements.len() {
        let Some(node) = workflow.elements[index].node() else {
            continue;
        };

        let outgoing = node.outgoing.clone();
        let aspect = if outgoing.is_empty() {
            BpmnAspect::ConsumeToken
        } else if outgoing.len() == 1
            && !workflow
                .sequence_flow(outgoing[0])
                .is_some_and(|flow| flow.has_condition())
        {
            BpmnAspect::TakeSequenceFlow
        } else if matches!(workflow.elements[index], FlowElement::ExclusiveGateway(_)) {
            BpmnAspect::ExclusiveSplit
        } else {
            BpmnAspect::None
        };

        workflow.elements[index].common_mut().aspect = aspect;
    }
}
