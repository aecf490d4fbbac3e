//! Workflow definitions and the processes they own.

use std::collections::HashMap;

use crate::element::{FlowElement, SequenceFlow, StartEvent};

/// A single BPMN process.
///
/// The process owns its flow elements in one arena (`elements`); every
/// cross-reference inside the graph is an index into it. `element_index`
/// and `initial_start_event` are derived state filled by transformation.
#[derive(Debug, Clone, Default)]
pub struct Workflow {
    pub bpmn_process_id: String,
    pub is_executable: bool,
    /// 1-based source line, when read from XML.
    pub line: Option<u64>,
    pub elements: Vec<FlowElement>,
    /// Element id to arena index. On duplicate ids the last element wins.
    pub element_index: HashMap<String, usize>,
    /// Arena index of the first declared start event.
    pub initial_start_event: Option<usize>,
}

impl Workflow {
    pub fn new(bpmn_process_id: impl Into<String>, is_executable: bool) -> Self {
        Self {
            bpmn_process_id: bpmn_process_id.into(),
            is_executable,
            ..Self::default()
        }
    }

    pub fn element(&self, index: usize) -> Option<&FlowElement> {
        self.elements.get(index)
    }

    pub fn element_by_id(&self, id: &str) -> Option<&FlowElement> {
        self.element_index
            .get(id)
            .and_then(|&index| self.elements.get(index))
    }

    /// The sequence flow at `index`, if that element is one.
    pub fn sequence_flow(&self, index: usize) -> Option<&SequenceFlow> {
        self.elements.get(index).and_then(FlowElement::as_sequence_flow)
    }

    pub fn initial_start_event(&self) -> Option<&StartEvent> {
        self.initial_start_event
            .and_then(|index| match self.elements.get(index) {
                Some(FlowElement::StartEvent(event)) => Some(event),
                _ => None,
            })
    }

    /// Arena indices of all sequence flows, in declaration order.
    pub fn sequence_flow_indices(&self) -> Vec<usize> {
        self.elements
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, FlowElement::SequenceFlow(_)))
            .map(|(i, _)| i)
            .collect()
    }
}

/// The root of a BPMN model: an ordered set of processes.
#[derive(Debug, Clone, Default)]
pub struct WorkflowDefinition {
    pub workflows: Vec<Workflow>,
    /// Process id to index into `workflows`, filled by transformation.
    pub workflows_by_id: HashMap<String, usize>,
    /// 1-based source line of the definitions element, when read from XML.
    pub line: Option<u64>,
}

impl WorkflowDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workflow_by_id(&self, bpmn_process_id: &str) -> Option<&Workflow> {
        self.workflows_by_id
            .get(bpmn_process_id)
            .and_then(|&index| self.workflows.get(index))
    }

    pub fn executable_workflows(&self) -> impl Iterator<Item = &Workflow> {
        self.workflows.iter().filter(|w| w.is_executable)
    }
}
