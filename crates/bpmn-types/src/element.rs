//! Flow elements: the nodes and edges of a process graph.

use bpmn_el::CompiledJsonCondition;

use crate::metadata::{ExtensionElements, InputOutputMapping, TaskDefinition, TaskHeaders};

/// Longest permitted element and process id, in bytes.
pub const ID_MAX_LENGTH: usize = 255;

/// Engine-level classification of a flow node.
///
/// The aspect decides the runtime behavior when a token arrives at the
/// node. `None` means the configuration carries no runtime semantics;
/// validation rejects such nodes, so consumers never act on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BpmnAspect {
    #[default]
    None,
    /// The token ends here.
    ConsumeToken,
    /// The token continues over the single outgoing flow.
    TakeSequenceFlow,
    /// The token takes the first outgoing flow whose condition holds,
    /// falling back to the default flow.
    ExclusiveSplit,
}

/// Attributes shared by every flow element.
#[derive(Debug, Clone, Default)]
pub struct FlowElementCommon {
    pub id: String,
    pub name: Option<String>,
    pub aspect: BpmnAspect,
    /// 1-based source line, when the element was read from XML.
    pub line: Option<u64>,
}

impl FlowElementCommon {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// Graph connectivity of a flow node.
///
/// Both lists hold arena indices of sequence flows and are derived
/// state, rebuilt on every transformation.
#[derive(Debug, Clone, Default)]
pub struct FlowNodeCommon {
    pub incoming: Vec<usize>,
    pub outgoing: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct StartEvent {
    pub common: FlowElementCommon,
    pub node: FlowNodeCommon,
}

#[derive(Debug, Clone, Default)]
pub struct EndEvent {
    pub common: FlowElementCommon,
    pub node: FlowNodeCommon,
}

#[derive(Debug, Clone, Default)]
pub struct ServiceTask {
    pub common: FlowElementCommon,
    pub node: FlowNodeCommon,
    pub extension_elements: Option<ExtensionElements>,
}

impl ServiceTask {
    pub fn task_definition(&self) -> Option<&TaskDefinition> {
        self.extension_elements
            .as_ref()
            .and_then(|e| e.task_definition.as_ref())
    }

    pub fn task_headers(&self) -> Option<&TaskHeaders> {
        self.extension_elements
            .as_ref()
            .and_then(|e| e.task_headers.as_ref())
    }

    pub fn input_output_mapping(&self) -> Option<&InputOutputMapping> {
        self.extension_elements
            .as_ref()
            .and_then(|e| e.input_output_mapping.as_ref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExclusiveGateway {
    pub common: FlowElementCommon,
    pub node: FlowNodeCommon,
    /// Id of the default flow, from the `default` attribute.
    pub default_flow_ref: Option<String>,
    /// Resolved default flow, set by transformation.
    pub default_flow: Option<usize>,
    /// Outgoing flows carrying a condition, in declaration order.
    pub outgoing_with_conditions: Vec<usize>,
}

/// A condition attached to a sequence flow.
#[derive(Debug, Clone)]
pub struct ConditionExpression {
    pub text: String,
    /// Set by transformation; carries invalidity instead of failing.
    pub compiled: Option<CompiledJsonCondition>,
}

impl ConditionExpression {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            compiled: None,
        }
    }
}

/// A directed edge between two flow nodes.
#[derive(Debug, Clone, Default)]
pub struct SequenceFlow {
    pub common: FlowElementCommon,
    pub source_ref: String,
    pub target_ref: String,
    /// Resolved source node, set by transformation.
    pub source_node: Option<usize>,
    /// Resolved target node, set by transformation.
    pub target_node: Option<usize>,
    pub condition: Option<ConditionExpression>,
}

impl SequenceFlow {
    pub fn has_condition(&self) -> bool {
        self.condition.is_some()
    }
}

/// Any element of a process graph.
#[derive(Debug, Clone)]
pub enum FlowElement {
    StartEvent(StartEvent),
    EndEvent(EndEvent),
    ServiceTask(ServiceTask),
    ExclusiveGateway(ExclusiveGateway),
    SequenceFlow(SequenceFlow),
}

impl FlowElement {
    pub fn common(&self) -> &FlowElementCommon {
        match self {
            Self::StartEvent(e) => &e.common,
            Self::EndEvent(e) => &e.common,
            Self::ServiceTask(e) => &e.common,
            Self::ExclusiveGateway(e) => &e.common,
            Self::SequenceFlow(e) => &e.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut FlowElementCommon {
        match self {
            Self::StartEvent(e) => &mut e.common,
            Self::EndEvent(e) => &mut e.common,
            Self::ServiceTask(e) => &mut e.common,
            Self::ExclusiveGateway(e) => &mut e.common,
            Self::SequenceFlow(e) => &mut e.common,
        }
    }

    pub fn id(&self) -> &str {
        &self.common().id
    }

    pub fn aspect(&self) -> BpmnAspect {
        self.common().aspect
    }

    /// Connectivity, for the variants that are flow nodes.
    pub fn node(&self) -> Option<&FlowNodeCommon> {
        match self {
            Self::StartEvent(e) => Some(&e.node),
            Self::EndEvent(e) => Some(&e.node),
            Self::ServiceTask(e) => Some(&e.node),
            Self::ExclusiveGateway(e) => Some(&e.node),
            Self::SequenceFlow(_) => None,
        }
    }

    pub fn node_mut(&mut self) -> Option<&mut FlowNodeCommon> {
        match self {
            Self::StartEvent(e) => Some(&mut e.node),
            Self::EndEvent(e) => Some(&mut e.node),
            Self::ServiceTask(e) => Some(&mut e.node),
            Self::ExclusiveGateway(e) => Some(&mut e.node),
            Self::SequenceFlow(_) => None,
        }
    }

    pub fn is_flow_node(&self) -> bool {
        !matches!(self, Self::SequenceFlow(_))
    }

    pub fn as_sequence_flow(&self) -> Option<&SequenceFlow> {
        match self {
            Self::SequenceFlow(flow) => Some(flow),
            _ => None,
        }
    }

    pub fn as_sequence_flow_mut(&mut self) -> Option<&mut SequenceFlow> {
        match self {
            Self::SequenceFlow(flow) => Some(flow),
            _ => None,
        }
    }

    pub fn as_service_task(&self) -> Option<&ServiceTask> {
        match self {
            Self::ServiceTask(task) => Some(task),
            _ => None,
        }
    }

    /// Qualified XML name of the element, used in diagnostics.
    pub fn qualified_name(&self) -> &'static str {
        match self {
            Self::StartEvent(_) => "bpmn:startEvent",
            Self::EndEvent(_) => "bpmn:endEvent",
            Self::ServiceTask(_) => "bpmn:serviceTask",
            Self::ExclusiveGateway(_) => "bpmn:exclusiveGateway",
            Self::SequenceFlow(_) => "bpmn:sequenceFlow",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_node_capability() {
        let start = FlowElement::StartEvent(StartEvent::default());
        let flow = FlowElement::SequenceFlow(SequenceFlow::default());

        assert!(start.is_flow_node());
        assert!(start.node().is_some());
        assert!(!flow.is_flow_node());
        assert!(flow.node().is_none());
    }

    #[test]
    fn test_default_aspect_is_none() {
        let task = FlowElement::ServiceTask(ServiceTask {
            common: FlowElementCommon::with_id("task"),
            ..ServiceTask::default()
        });
        assert_eq!(task.aspect(), BpmnAspect::None);
        assert_eq!(task.id(), "task");
    }

    #[test]
    fn test_qualified_names() {
        assert_eq!(
            FlowElement::ExclusiveGateway(ExclusiveGateway::default()).qualified_name(),
            "bpmn:exclusiveGateway"
        );
        assert_eq!(
            FlowElement::SequenceFlow(SequenceFlow::default()).qualified_name(),
            "bpmn:sequenceFlow"
        );
    }

    #[test]
    fn test_service_task_metadata_accessors() {
        let mut task = ServiceTask::default();
        assert!(task.task_definition().is_none());

        task.extension_elements = Some(ExtensionElements {
            task_definition: Some(TaskDefinition::new("payment")),
            ..ExtensionElements::default()
        });
        assert_eq!(task.task_definition().unwrap().task_type, "payment");
        assert!(task.task_headers().is_none());
    }
}
