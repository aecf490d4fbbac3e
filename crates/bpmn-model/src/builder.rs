//! Fluent construction of executable workflows.
//!
//! ```
//! use bpmn_model::Bpmn;
//!
//! let definition = Bpmn::create_executable_workflow("order")
//!     .start_event()
//!     .service_task()
//!     .task_type("collect-payment")
//!     .done()
//!     .end_event()
//!     .done()
//!     .unwrap();
//!
//! assert!(definition.workflow_by_id("order").is_some());
//! ```
//!
//! Successive nodes are connected with implicit sequence flows. After
//! an end event closes a gateway branch, the next flow starts from the
//! most recent exclusive gateway, so alternatives are written one after
//! the other.

use bpmn_types::{
    ConditionExpression, EndEvent, ExclusiveGateway, ExtensionElements, FlowElement,
    FlowElementCommon, InputOutputMapping, Mapping, OutputBehavior, SequenceFlow, ServiceTask,
    StartEvent, TaskDefinition, TaskHeader, TaskHeaders, ValidationError, Workflow,
    WorkflowDefinition,
};

use crate::transform::BpmnTransformer;
use crate::validator::BpmnValidator;

/// Builds a single executable process.
#[derive(Debug)]
pub struct BpmnBuilder {
    workflow: Workflow,
    next_id: u32,
    /// Node the next sequence flow starts from.
    last_node: Option<String>,
    /// Most recent exclusive gateway; branch source after an end event.
    branch_origin: Option<String>,
    pending_flow: Option<PendingFlow>,
}

#[derive(Debug, Default)]
struct PendingFlow {
    id: Option<String>,
    condition: Option<String>,
    default_flow: bool,
}

/// Configures the sequence flow to the next node.
#[derive(Debug, Default)]
pub struct SequenceFlowBuilder {
    flow: PendingFlow,
}

impl SequenceFlowBuilder {
    pub fn condition(mut self, expression: impl Into<String>) -> Self {
        self.flow.condition = Some(expression.into());
        self
    }

    /// Marks this flow as the default flow of the gateway it leaves.
    pub fn default_flow(mut self) -> Self {
        self.flow.default_flow = true;
        self
    }
}

impl BpmnBuilder {
    pub(crate) fn new(bpmn_process_id: impl Into<String>) -> Self {
        Self {
            workflow: Workflow::new(bpmn_process_id, true),
            next_id: 0,
            last_node: None,
            branch_origin: None,
            pending_flow: None,
        }
    }

    pub fn start_event(mut self) -> Self {
        let id = self.generate_id();
        self.start_event_with_id(id)
    }

    pub fn start_event_with_id(self, id: impl Into<String>) -> Self {
        self.append_node(FlowElement::StartEvent(StartEvent {
            common: FlowElementCommon::with_id(id),
            ..StartEvent::default()
        }))
    }

    pub fn end_event(mut self) -> Self {
        let id = self.generate_id();
        self.end_event_with_id(id)
    }

    pub fn end_event_with_id(self, id: impl Into<String>) -> Self {
        self.append_node(FlowElement::EndEvent(EndEvent {
            common: FlowElementCommon::with_id(id),
            ..EndEvent::default()
        }))
    }

    pub fn exclusive_gateway(self, id: impl Into<String>) -> Self {
        self.append_node(FlowElement::ExclusiveGateway(ExclusiveGateway {
            common: FlowElementCommon::with_id(id),
            ..ExclusiveGateway::default()
        }))
    }

    pub fn service_task(mut self) -> ServiceTaskBuilder {
        let id = self.generate_id();
        self.service_task_with_id(id)
    }

    pub fn service_task_with_id(self, id: impl Into<String>) -> ServiceTaskBuilder {
        let builder = self.append_node(FlowElement::ServiceTask(ServiceTask {
            common: FlowElementCommon::with_id(id),
            ..ServiceTask::default()
        }));
        let task_index = builder.workflow.elements.len() - 1;
        ServiceTaskBuilder {
            builder,
            task_index,
        }
    }

    /// Names the sequence flow to the next node.
    pub fn sequence_flow(self, id: impl Into<String>) -> Self {
        self.sequence_flow_with(id, |flow| flow)
    }

    /// Names and configures the sequence flow to the next node.
    pub fn sequence_flow_with(
        mut self,
        id: impl Into<String>,
        configure: impl FnOnce(SequenceFlowBuilder) -> SequenceFlowBuilder,
    ) -> Self {
        let mut flow = configure(SequenceFlowBuilder::default()).flow;
        flow.id = Some(id.into());
        self.pending_flow = Some(flow);
        self
    }

    /// Finishes construction: transforms the model and validates it.
    pub fn done(self) -> Result<WorkflowDefinition, ValidationError> {
        let mut definition = WorkflowDefinition::new();
        definition.workflows.push(self.workflow);

        BpmnTransformer::new().transform(&mut definition);

        let result = BpmnValidator::new().validate(&definition);
        if result.has_errors() {
            return Err(ValidationError::new(result));
        }

        Ok(definition)
    }

    fn append_node(mut self, element: FlowElement) -> Self {
        let target_id = element.id().to_string();

        if let Some(source_id) = self.last_node.clone() {
            let pending = self.pending_flow.take().unwrap_or_default();
            let flow_id = pending.id.unwrap_or_else(|| self.generate_id());

            if pending.default_flow {
                if let Some(FlowElement::ExclusiveGateway(gateway)) = self
                    .workflow
                    .elements
                    .iter_mut()
                    .find(|e| e.id() == source_id)
                {
                    gateway.default_flow_ref = Some(flow_id.clone());
                }
            }

            self.workflow
                .elements
                .push(FlowElement::SequenceFlow(SequenceFlow {
                    common: FlowElementCommon::with_id(flow_id),
                    source_ref: source_id,
                    target_ref: target_id.clone(),
                    condition: pending.condition.map(ConditionExpression::new),
                    ..SequenceFlow::default()
                }));
        } else {
            self.pending_flow = None;
        }

        let is_end_event = matches!(element, FlowElement::EndEvent(_));
        let is_gateway = matches!(element, FlowElement::ExclusiveGateway(_));
        self.workflow.elements.push(element);

        self.last_node = Some(target_id.clone());
        if is_gateway {
            self.branch_origin = Some(target_id);
        }
        if is_end_event {
            if let Some(origin) = self.branch_origin.clone() {
                self.last_node = Some(origin);
            }
        }

        self
    }

    fn generate_id(&mut self) -> String {
        self.next_id += 1;
        format!("_id_{}", self.next_id)
    }
}

/// Configures the extension elements of the service task just appended.
#[derive(Debug)]
pub struct ServiceTaskBuilder {
    builder: BpmnBuilder,
    task_index: usize,
}

impl ServiceTaskBuilder {
    pub fn task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_definition_mut().task_type = task_type.into();
        self
    }

    pub fn task_retries(mut self, retries: i32) -> Self {
        self.task_definition_mut().retries = retries;
        self
    }

    pub fn input(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.mapping_mut().inputs.push(Mapping::new(source, target));
        self
    }

    pub fn output(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.mapping_mut()
            .outputs
            .push(Mapping::new(source, target));
        self
    }

    pub fn output_behavior(self, behavior: OutputBehavior) -> Self {
        self.output_behavior_raw(behavior.as_str())
    }

    pub(crate) fn output_behavior_raw(mut self, behavior: impl Into<String>) -> Self {
        self.mapping_mut().output_behavior = behavior.into();
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extensions_mut()
            .task_headers
            .get_or_insert_with(TaskHeaders::default)
            .headers
            .push(TaskHeader::new(key, value));
        self
    }

    /// Returns to the process builder.
    pub fn done(self) -> BpmnBuilder {
        self.builder
    }

    fn extensions_mut(&mut self) -> &mut ExtensionElements {
        let element = &mut self.builder.workflow.elements[self.task_index];
        match element {
            FlowElement::ServiceTask(task) => {
                task.extension_elements.get_or_insert_with(Default::default)
            }
            other => unreachable!("element {} is not a service task", other.id()),
        }
    }

    fn task_definition_mut(&mut self) -> &mut TaskDefinition {
        self.extensions_mut()
            .task_definition
            .get_or_insert_with(TaskDefinition::default)
    }

    fn mapping_mut(&mut self) -> &mut InputOutputMapping {
        self.extensions_mut()
            .input_output_mapping
            .get_or_insert_with(InputOutputMapping::default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpmn_types::BpmnAspect;

    #[test]
    fn test_linear_workflow() {
        let definition = BpmnBuilder::new("process")
            .start_event_with_id("start")
            .service_task_with_id("task")
            .task_type("work")
            .done()
            .end_event_with_id("end")
            .done()
            .unwrap();

        let workflow = definition.workflow_by_id("process").unwrap();
        assert_eq!(workflow.elements.len(), 5);
        assert_eq!(workflow.initial_start_event().unwrap().common.id, "start");

        let task = workflow.element_by_id("task").unwrap();
        assert_eq!(task.aspect(), BpmnAspect::TakeSequenceFlow);
        assert_eq!(
            task.as_service_task().unwrap().task_definition().unwrap().task_type,
            "work"
        );
    }

    #[test]
    fn test_generated_ids_are_sequential() {
        let definition = BpmnBuilder::new("process")
            .start_event()
            .end_event()
            .done()
            .unwrap();

        let workflow = definition.workflow_by_id("process").unwrap();
        // _id_1 and _id_2 are the events, _id_3 the implicit flow.
        assert!(workflow.element_by_id("_id_1").is_some());
        assert!(workflow.element_by_id("_id_2").is_some());
        assert!(workflow.element_by_id("_id_3").is_some());
    }

    #[test]
    fn test_service_task_metadata() {
        let definition = BpmnBuilder::new("process")
            .start_event()
            .service_task_with_id("task")
            .task_type("payment")
            .task_retries(5)
            .header("region", "eu")
            .header("tier", "gold")
            .input("$.order", "$.order")
            .output("$.receipt", "$.receipt")
            .output_behavior(OutputBehavior::Overwrite)
            .done()
            .end_event()
            .done()
            .unwrap();

        let workflow = definition.workflow_by_id("process").unwrap();
        let task = workflow
            .element_by_id("task")
            .unwrap()
            .as_service_task()
            .unwrap();

        let task_definition = task.task_definition().unwrap();
        assert_eq!(task_definition.task_type, "payment");
        assert_eq!(task_definition.retries, 5);

        let headers = task.task_headers().unwrap();
        assert_eq!(headers.headers.len(), 2);
        assert!(!headers.encoded_msgpack.is_empty());

        let mapping = task.input_output_mapping().unwrap();
        assert_eq!(mapping.output_behavior, "OVERWRITE");
        assert_eq!(mapping.compiled_inputs.len(), 1);
        assert_eq!(mapping.compiled_outputs.len(), 1);
    }

    #[test]
    fn test_gateway_branches() {
        let definition = BpmnBuilder::new("workflow")
            .start_event()
            .exclusive_gateway("xor")
            .sequence_flow_with("s1", |flow| flow.condition("$.foo < 5"))
            .end_event()
            .sequence_flow_with("s2", |flow| flow.default_flow())
            .end_event()
            .done()
            .unwrap();

        let workflow = definition.workflow_by_id("workflow").unwrap();
        let gateway = match workflow.element_by_id("xor").unwrap() {
            FlowElement::ExclusiveGateway(gateway) => gateway,
            other => panic!("expected gateway, got {:?}", other),
        };

        assert_eq!(gateway.common.aspect, BpmnAspect::ExclusiveSplit);
        assert_eq!(gateway.node.outgoing.len(), 2);
        assert_eq!(gateway.outgoing_with_conditions.len(), 1);

        let default_flow = gateway.default_flow.expect("default flow resolved");
        assert_eq!(workflow.elements[default_flow].id(), "s2");
    }

    #[test]
    fn test_named_sequence_flow_between_nodes() {
        let definition = BpmnBuilder::new("process")
            .start_event_with_id("start")
            .sequence_flow("to-end")
            .end_event_with_id("end")
            .done()
            .unwrap();

        let workflow = definition.workflow_by_id("process").unwrap();
        let flow = workflow
            .element_by_id("to-end")
            .unwrap()
            .as_sequence_flow()
            .unwrap();
        assert_eq!(workflow.elements[flow.source_node.unwrap()].id(), "start");
        assert_eq!(workflow.elements[flow.target_node.unwrap()].id(), "end");
    }

    #[test]
    fn test_done_fails_on_invalid_workflow() {
        let error = BpmnBuilder::new("process").done().unwrap_err();
        assert!(error
            .to_string()
            .contains("The process must contain at least one none start event."));
    }
}
