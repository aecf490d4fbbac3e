//! XML bridge: reads BPMN 2.0 XML into a raw model and writes a model
//! back out.
//!
//! The reader is a streaming pull parser over the executable subset.
//! It performs no validation and no reference resolution: sequence
//! flows keep their textual `sourceRef`/`targetRef`, conditions and
//! mappings stay uncompiled. Unknown BPMN elements are skipped; unknown
//! elements or attributes in the Zeebe extension namespace are
//! rejected. Every recognized element records its 1-based source line
//! for diagnostics.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use bpmn_types::{
    ConditionExpression, EndEvent, ExclusiveGateway, ExtensionElements, FlowElement,
    FlowElementCommon, InputOutputMapping, Mapping, OutputBehavior, SequenceFlow, ServiceTask,
    StartEvent, TaskDefinition, TaskHeader, TaskHeaders, Workflow, WorkflowDefinition,
};

use crate::errors::ParseError;

/// Namespace URIs of the recognized vocabularies.
pub mod namespace {
    /// BPMN 2.0 model namespace (prefix `bpmn`).
    pub const BPMN: &str = "http://www.omg.org/spec/BPMN/20100524/MODEL";
    /// Zeebe extension namespace (prefix `zeebe`).
    pub const ZEEBE: &str = "http://camunda.org/schema/zeebe/1.0";
}

/// Reads BPMN XML documents into raw workflow definitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct BpmnParser;

impl BpmnParser {
    pub fn new() -> Self {
        Self
    }

    pub fn read_from_str(&self, input: &str) -> Result<WorkflowDefinition, ParseError> {
        self.read_from_bytes(input.as_bytes())
    }

    pub fn read_from_file(&self, path: impl AsRef<Path>) -> Result<WorkflowDefinition, ParseError> {
        let bytes = fs::read(path)?;
        self.read_from_bytes(&bytes)
    }

    pub fn read_from_bytes(&self, input: &[u8]) -> Result<WorkflowDefinition, ParseError> {
        BpmnReader::new(input).read()
    }
}

/// 1-based line of a byte offset into the document.
fn line_at(input: &[u8], position: u64) -> u64 {
    let end = (position as usize).min(input.len());
    input[..end].iter().filter(|&&b| b == b'\n').count() as u64 + 1
}

struct BpmnReader<'a> {
    input: &'a [u8],
    definition: WorkflowDefinition,
    workflow: Option<Workflow>,
    /// Arena index of the service task receiving extension elements.
    task_index: Option<usize>,
    /// Arena index of the sequence flow receiving a condition.
    flow_index: Option<usize>,
    in_extension_elements: bool,
    in_task_headers: bool,
    in_io_mapping: bool,
    in_condition: bool,
    /// Nesting depth of unknown elements currently being skipped.
    skip_depth: usize,
}

impl<'a> BpmnReader<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            definition: WorkflowDefinition::new(),
            workflow: None,
            task_index: None,
            flow_index: None,
            in_extension_elements: false,
            in_task_headers: false,
            in_io_mapping: false,
            in_condition: false,
            skip_depth: 0,
        }
    }

    fn read(mut self) -> Result<WorkflowDefinition, ParseError> {
        let mut reader = Reader::from_reader(self.input);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();

        loop {
            let line = line_at(self.input, reader.buffer_position());
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => self.handle_start(e, line, false)?,
                Ok(Event::Empty(ref e)) => self.handle_start(e, line, true)?,
                Ok(Event::End(ref e)) => self.handle_end(e)?,
                Ok(Event::Text(ref e)) => self.handle_text(e, line)?,
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(ParseError::Xml {
                        line: line_at(self.input, reader.error_position()),
                        message: e.to_string(),
                    })
                }
                _ => {}
            }
            buf.clear();
        }

        if let Some(workflow) = self.workflow.take() {
            self.definition.workflows.push(workflow);
        }

        Ok(self.definition)
    }

    fn handle_start(
        &mut self,
        e: &BytesStart<'_>,
        line: u64,
        is_empty: bool,
    ) -> Result<(), ParseError> {
        if self.skip_depth > 0 {
            if !is_empty {
                self.skip_depth += 1;
            }
            return Ok(());
        }

        let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let attributes = read_attributes(e, line)?;

        match tag.as_str() {
            "bpmn:definitions" => {
                self.definition.line = Some(line);
            }
            "bpmn:process" => {
                if let Some(previous) = self.workflow.take() {
                    self.definition.workflows.push(previous);
                }
                let mut workflow = Workflow::new(attribute(&attributes, "id"), false);
                workflow.is_executable =
                    attributes.iter().any(|(k, v)| k == "isExecutable" && v == "true");
                workflow.line = Some(line);
                if is_empty {
                    self.definition.workflows.push(workflow);
                } else {
                    self.workflow = Some(workflow);
                }
            }
            "bpmn:startEvent" => {
                self.push_element(FlowElement::StartEvent(StartEvent {
                    common: common_from(&attributes, line),
                    ..StartEvent::default()
                }));
            }
            "bpmn:endEvent" => {
                self.push_element(FlowElement::EndEvent(EndEvent {
                    common: common_from(&attributes, line),
                    ..EndEvent::default()
                }));
            }
            "bpmn:serviceTask" => {
                let index = self.push_element(FlowElement::ServiceTask(ServiceTask {
                    common: common_from(&attributes, line),
                    ..ServiceTask::default()
                }));
                if !is_empty {
                    self.task_index = index;
                }
            }
            "bpmn:exclusiveGateway" => {
                self.push_element(FlowElement::ExclusiveGateway(ExclusiveGateway {
                    common: common_from(&attributes, line),
                    default_flow_ref: optional_attribute(&attributes, "default"),
                    ..ExclusiveGateway::default()
                }));
            }
            "bpmn:sequenceFlow" => {
                let index = self.push_element(FlowElement::SequenceFlow(SequenceFlow {
                    common: common_from(&attributes, line),
                    source_ref: attribute(&attributes, "sourceRef"),
                    target_ref: attribute(&attributes, "targetRef"),
                    ..SequenceFlow::default()
                }));
                if !is_empty {
                    self.flow_index = index;
                }
            }
            "bpmn:conditionExpression" => {
                if self.flow_index.is_some() {
                    if !is_empty {
                        self.in_condition = true;
                    }
                } else if !is_empty {
                    self.skip_depth += 1;
                }
            }
            "bpmn:extensionElements" => {
                if let Some(task) = self.current_task() {
                    task.extension_elements.get_or_insert_with(Default::default);
                    if !is_empty {
                        self.in_extension_elements = true;
                    }
                } else if !is_empty {
                    self.skip_depth += 1;
                }
            }
            "zeebe:taskDefinition" => {
                let definition = parse_task_definition(&attributes, line)?;
                self.extensions(&tag, line)?.task_definition = Some(definition);
            }
            "zeebe:taskHeaders" => {
                self.extensions(&tag, line)?
                    .task_headers
                    .get_or_insert_with(TaskHeaders::default)
                    .line = Some(line);
                if !is_empty {
                    self.in_task_headers = true;
                }
            }
            "zeebe:header" => {
                if !self.in_task_headers {
                    return Err(unexpected_element(&tag, line));
                }
                let header = parse_task_header(&attributes, line)?;
                if let Some(headers) = self
                    .extensions(&tag, line)?
                    .task_headers
                    .as_mut()
                {
                    headers.headers.push(header);
                }
            }
            "zeebe:ioMapping" => {
                let mapping = parse_io_mapping(&attributes, line)?;
                self.extensions(&tag, line)?.input_output_mapping = Some(mapping);
                if !is_empty {
                    self.in_io_mapping = true;
                }
            }
            "zeebe:input" | "zeebe:output" => {
                if !self.in_io_mapping {
                    return Err(unexpected_element(&tag, line));
                }
                let mapping = parse_mapping(&attributes, &tag, line)?;
                if let Some(io) = self
                    .extensions(&tag, line)?
                    .input_output_mapping
                    .as_mut()
                {
                    if tag == "zeebe:input" {
                        io.inputs.push(mapping);
                    } else {
                        io.outputs.push(mapping);
                    }
                }
            }
            other if other.starts_with("zeebe:") => {
                return Err(unexpected_element(other, line));
            }
            _ => {
                // Unknown BPMN (or foreign) element: skip its subtree.
                if !is_empty {
                    self.skip_depth += 1;
                }
            }
        }

        Ok(())
    }

    fn handle_end(&mut self, e: &BytesEnd<'_>) -> Result<(), ParseError> {
        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            return Ok(());
        }

        match e.name().as_ref() {
            b"bpmn:process" => {
                if let Some(workflow) = self.workflow.take() {
                    self.definition.workflows.push(workflow);
                }
            }
            b"bpmn:serviceTask" => self.task_index = None,
            b"bpmn:sequenceFlow" => self.flow_index = None,
            b"bpmn:conditionExpression" => self.in_condition = false,
            b"bpmn:extensionElements" => self.in_extension_elements = false,
            b"zeebe:taskHeaders" => self.in_task_headers = false,
            b"zeebe:ioMapping" => self.in_io_mapping = false,
            _ => {}
        }

        Ok(())
    }

    fn handle_text(&mut self, e: &BytesText<'_>, line: u64) -> Result<(), ParseError> {
        if self.skip_depth > 0 || !self.in_condition {
            return Ok(());
        }

        let text = e.unescape().map_err(|err| ParseError::Xml {
            line,
            message: err.to_string(),
        })?;

        let flow = self
            .flow_index
            .and_then(|index| self.workflow.as_mut()?.elements.get_mut(index))
            .and_then(FlowElement::as_sequence_flow_mut);

        if let Some(flow) = flow {
            match &mut flow.condition {
                Some(condition) => condition.text.push_str(&text),
                None => flow.condition = Some(ConditionExpression::new(text.into_owned())),
            }
        }

        Ok(())
    }

    /// Appends the element to the open process. Elements outside a
    /// process are dropped.
    fn push_element(&mut self, element: FlowElement) -> Option<usize> {
        let workflow = self.workflow.as_mut()?;
        workflow.elements.push(element);
        Some(workflow.elements.len() - 1)
    }

    fn current_task(&mut self) -> Option<&mut ServiceTask> {
        let index = self.task_index?;
        match self.workflow.as_mut()?.elements.get_mut(index) {
            Some(FlowElement::ServiceTask(task)) => Some(task),
            _ => None,
        }
    }

    /// The extension container of the open service task; zeebe elements
    /// outside one are malformed.
    fn extensions(&mut self, tag: &str, line: u64) -> Result<&mut ExtensionElements, ParseError> {
        if !self.in_extension_elements {
            return Err(unexpected_element(tag, line));
        }
        match self.current_task() {
            Some(task) => Ok(task.extension_elements.get_or_insert_with(Default::default)),
            None => Err(unexpected_element(tag, line)),
        }
    }
}

fn read_attributes(e: &BytesStart<'_>, line: u64) -> Result<Vec<(String, String)>, ParseError> {
    let mut attributes = Vec::new();

    for attr in e.attributes() {
        let attr = attr.map_err(|err| ParseError::Xml {
            line,
            message: format!("invalid attribute: {err}"),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if key.starts_with("xmlns") {
            continue;
        }
        let value = attr
            .unescape_value()
            .map_err(|err| ParseError::Xml {
                line,
                message: format!("invalid attribute value: {err}"),
            })?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(attributes)
}

fn attribute(attributes: &[(String, String)], name: &str) -> String {
    optional_attribute(attributes, name).unwrap_or_default()
}

fn optional_attribute(attributes: &[(String, String)], name: &str) -> Option<String> {
    attributes
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.clone())
}

fn common_from(attributes: &[(String, String)], line: u64) -> FlowElementCommon {
    FlowElementCommon {
        id: attribute(attributes, "id"),
        name: optional_attribute(attributes, "name"),
        line: Some(line),
        ..FlowElementCommon::default()
    }
}

fn unexpected_element(tag: &str, line: u64) -> ParseError {
    ParseError::Xml {
        line,
        message: format!("unexpected element '{tag}'"),
    }
}

fn unexpected_attribute(tag: &str, key: &str, line: u64) -> ParseError {
    ParseError::Xml {
        line,
        message: format!("unexpected attribute '{key}' on '{tag}'"),
    }
}

fn parse_task_definition(
    attributes: &[(String, String)],
    line: u64,
) -> Result<TaskDefinition, ParseError> {
    let mut definition = TaskDefinition::new("");
    definition.line = Some(line);

    for (key, value) in attributes {
        match key.as_str() {
            "type" => definition.task_type = value.clone(),
            "retries" => {
                definition.retries = value.parse().map_err(|_| ParseError::Xml {
                    line,
                    message: format!("invalid retries value '{value}'"),
                })?;
            }
            other => return Err(unexpected_attribute("zeebe:taskDefinition", other, line)),
        }
    }

    Ok(definition)
}

fn parse_task_header(
    attributes: &[(String, String)],
    line: u64,
) -> Result<TaskHeader, ParseError> {
    let mut header = TaskHeader::default();

    for (key, value) in attributes {
        match key.as_str() {
            "key" => header.key = Some(value.clone()),
            "value" => header.value = Some(value.clone()),
            other => return Err(unexpected_attribute("zeebe:header", other, line)),
        }
    }

    Ok(header)
}

fn parse_io_mapping(
    attributes: &[(String, String)],
    line: u64,
) -> Result<InputOutputMapping, ParseError> {
    let mut mapping = InputOutputMapping {
        line: Some(line),
        ..InputOutputMapping::default()
    };

    for (key, value) in attributes {
        match key.as_str() {
            "outputBehavior" => mapping.output_behavior = value.clone(),
            other => return Err(unexpected_attribute("zeebe:ioMapping", other, line)),
        }
    }

    Ok(mapping)
}

fn parse_mapping(
    attributes: &[(String, String)],
    tag: &str,
    line: u64,
) -> Result<Mapping, ParseError> {
    let mut mapping = Mapping::new("", "");

    for (key, value) in attributes {
        match key.as_str() {
            "source" => mapping.source = value.clone(),
            "target" => mapping.target = value.clone(),
            other => return Err(unexpected_attribute(tag, other, line)),
        }
    }

    Ok(mapping)
}

/// Writes a workflow definition back out as BPMN XML.
#[derive(Debug, Clone, Copy, Default)]
pub struct BpmnWriter;

impl BpmnWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn write(&self, definition: &WorkflowDefinition) -> Result<String, ParseError> {
        let mut buffer = Cursor::new(Vec::new());
        let mut writer = Writer::new_with_indent(&mut buffer, b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(write_error)?;

        let mut definitions_start = BytesStart::new("bpmn:definitions");
        definitions_start.push_attribute(("xmlns:bpmn", namespace::BPMN));
        definitions_start.push_attribute(("xmlns:zeebe", namespace::ZEEBE));
        writer
            .write_event(Event::Start(definitions_start))
            .map_err(write_error)?;

        for workflow in &definition.workflows {
            write_workflow(&mut writer, workflow)?;
        }

        writer
            .write_event(Event::End(BytesEnd::new("bpmn:definitions")))
            .map_err(write_error)?;

        String::from_utf8(buffer.into_inner()).map_err(|e| ParseError::Xml {
            line: 0,
            message: format!("serialized document is not UTF-8: {e}"),
        })
    }
}

fn write_error(e: impl std::fmt::Display) -> ParseError {
    ParseError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        e.to_string(),
    ))
}

fn write_workflow<W: std::io::Write>(
    writer: &mut Writer<W>,
    workflow: &Workflow,
) -> Result<(), ParseError> {
    let mut process_start = BytesStart::new("bpmn:process");
    process_start.push_attribute(("id", workflow.bpmn_process_id.as_str()));
    process_start.push_attribute((
        "isExecutable",
        if workflow.is_executable { "true" } else { "false" },
    ));
    writer
        .write_event(Event::Start(process_start))
        .map_err(write_error)?;

    for element in &workflow.elements {
        write_element(writer, element)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("bpmn:process")))
        .map_err(write_error)?;

    Ok(())
}

fn write_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    element: &FlowElement,
) -> Result<(), ParseError> {
    let tag = element.qualified_name();
    let mut start = BytesStart::new(tag);
    start.push_attribute(("id", element.id()));
    if let Some(name) = &element.common().name {
        start.push_attribute(("name", name.as_str()));
    }

    match element {
        FlowElement::SequenceFlow(flow) => {
            start.push_attribute(("sourceRef", flow.source_ref.as_str()));
            start.push_attribute(("targetRef", flow.target_ref.as_str()));

            match &flow.condition {
                Some(condition) => {
                    writer.write_event(Event::Start(start)).map_err(write_error)?;
                    writer
                        .write_event(Event::Start(BytesStart::new("bpmn:conditionExpression")))
                        .map_err(write_error)?;
                    writer
                        .write_event(Event::Text(BytesText::new(&condition.text)))
                        .map_err(write_error)?;
                    writer
                        .write_event(Event::End(BytesEnd::new("bpmn:conditionExpression")))
                        .map_err(write_error)?;
                    writer
                        .write_event(Event::End(BytesEnd::new(tag)))
                        .map_err(write_error)?;
                }
                None => writer.write_event(Event::Empty(start)).map_err(write_error)?,
            }
        }
        FlowElement::ExclusiveGateway(gateway) => {
            if let Some(default_flow) = &gateway.default_flow_ref {
                start.push_attribute(("default", default_flow.as_str()));
            }
            writer.write_event(Event::Empty(start)).map_err(write_error)?;
        }
        FlowElement::ServiceTask(task) => {
            if has_extension_content(task) {
                writer.write_event(Event::Start(start)).map_err(write_error)?;
                write_extension_elements(writer, task)?;
                writer
                    .write_event(Event::End(BytesEnd::new(tag)))
                    .map_err(write_error)?;
            } else {
                writer.write_event(Event::Empty(start)).map_err(write_error)?;
            }
        }
        FlowElement::StartEvent(_) | FlowElement::EndEvent(_) => {
            writer.write_event(Event::Empty(start)).map_err(write_error)?;
        }
    }

    Ok(())
}

fn has_extension_content(task: &ServiceTask) -> bool {
    task.task_definition().is_some()
        || task.task_headers().is_some_and(|h| !h.is_empty())
        || task
            .input_output_mapping()
            .is_some_and(|m| !m.inputs.is_empty() || !m.outputs.is_empty() || !is_default_behavior(m))
}

fn is_default_behavior(mapping: &InputOutputMapping) -> bool {
    mapping.output_behavior == OutputBehavior::Merge.as_str()
}

fn write_extension_elements<W: std::io::Write>(
    writer: &mut Writer<W>,
    task: &ServiceTask,
) -> Result<(), ParseError> {
    writer
        .write_event(Event::Start(BytesStart::new("bpmn:extensionElements")))
        .map_err(write_error)?;

    if let Some(definition) = task.task_definition() {
        let mut start = BytesStart::new("zeebe:taskDefinition");
        start.push_attribute(("type", definition.task_type.as_str()));
        start.push_attribute(("retries", definition.retries.to_string().as_str()));
        writer.write_event(Event::Empty(start)).map_err(write_error)?;
    }

    if let Some(headers) = task.task_headers() {
        if !headers.is_empty() {
            writer
                .write_event(Event::Start(BytesStart::new("zeebe:taskHeaders")))
                .map_err(write_error)?;
            for header in &headers.headers {
                let mut start = BytesStart::new("zeebe:header");
                if let Some(key) = &header.key {
                    start.push_attribute(("key", key.as_str()));
                }
                if let Some(value) = &header.value {
                    start.push_attribute(("value", value.as_str()));
                }
                writer.write_event(Event::Empty(start)).map_err(write_error)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new("zeebe:taskHeaders")))
                .map_err(write_error)?;
        }
    }

    if let Some(mapping) = task.input_output_mapping() {
        let has_mappings = !mapping.inputs.is_empty() || !mapping.outputs.is_empty();
        if has_mappings || !is_default_behavior(mapping) {
            let mut start = BytesStart::new("zeebe:ioMapping");
            if !is_default_behavior(mapping) {
                start.push_attribute(("outputBehavior", mapping.output_behavior.as_str()));
            }
            if has_mappings {
                writer.write_event(Event::Start(start)).map_err(write_error)?;
                for (tag, mappings) in [("zeebe:input", &mapping.inputs), ("zeebe:output", &mapping.outputs)]
                {
                    for entry in mappings.iter() {
                        let mut mapping_start = BytesStart::new(tag);
                        mapping_start.push_attribute(("source", entry.source.as_str()));
                        mapping_start.push_attribute(("target", entry.target.as_str()));
                        writer
                            .write_event(Event::Empty(mapping_start))
                            .map_err(write_error)?;
                    }
                }
                writer
                    .write_event(Event::End(BytesEnd::new("zeebe:ioMapping")))
                    .map_err(write_error)?;
            } else {
                writer.write_event(Event::Empty(start)).map_err(write_error)?;
            }
        }
    }

    writer
        .write_event(Event::End(BytesEnd::new("bpmn:extensionElements")))
        .map_err(write_error)?;

    Ok(())
}
