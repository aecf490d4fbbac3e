//! BPMN workflow model library for the executable subset.
//!
//! Reads BPMN 2.0 XML (or a simpler YAML surface) into a typed
//! workflow graph, transforms it into its executable form and validates
//! it against the executable-subset rules. The subset covers processes,
//! none start events, end events, service tasks, exclusive gateways and
//! sequence flows, plus the Zeebe task extensions (task definition,
//! task headers, variable mappings).
//!
//! # Reading a model
//!
//! ```no_run
//! use bpmn_model::Bpmn;
//!
//! # fn main() -> Result<(), bpmn_model::BpmnError> {
//! let definition = Bpmn::read_from_xml_file("order.bpmn")?;
//! let workflow = definition.workflow_by_id("order").unwrap();
//! println!("{} elements", workflow.elements.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Building a model
//!
//! ```
//! use bpmn_model::Bpmn;
//!
//! let definition = Bpmn::create_executable_workflow("order")
//!     .start_event()
//!     .service_task()
//!     .task_type("collect-payment")
//!     .task_retries(5)
//!     .header("method", "VISA")
//!     .done()
//!     .end_event()
//!     .done()
//!     .unwrap();
//! ```
//!
//! Every path — XML, YAML, builder — runs the same pipeline: parse or
//! build a raw graph, transform it (link resolution, expression
//! compilation, header encoding, aspect classification), then validate.
//! Reader and builder entry points fail on error diagnostics;
//! [`Bpmn::validate`] returns the diagnostic bag instead.

#![deny(unsafe_code)]

mod builder;
mod errors;
mod transform;
mod validator;
mod xml;
mod yaml;

use std::path::Path;

use tracing::debug;

pub use bpmn_types::*;

pub use crate::builder::{BpmnBuilder, SequenceFlowBuilder, ServiceTaskBuilder};
pub use crate::errors::{BpmnError, ParseError, ValidationError};
pub use crate::transform::BpmnTransformer;
pub use crate::validator::BpmnValidator;
pub use crate::xml::{namespace, BpmnParser, BpmnWriter};
pub use crate::yaml::BpmnYamlParser;

/// Entry point for reading, building, validating and writing workflow
/// models.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bpmn;

impl Bpmn {
    /// Starts a fluent builder for a single executable process.
    pub fn create_executable_workflow(bpmn_process_id: &str) -> BpmnBuilder {
        BpmnBuilder::new(bpmn_process_id)
    }

    pub fn read_from_xml_str(xml: &str) -> Result<WorkflowDefinition, BpmnError> {
        Self::read_from_xml_bytes(xml.as_bytes())
    }

    pub fn read_from_xml_bytes(xml: &[u8]) -> Result<WorkflowDefinition, BpmnError> {
        let definition = BpmnParser::new().read_from_bytes(xml)?;
        finish(definition)
    }

    pub fn read_from_xml_file(path: impl AsRef<Path>) -> Result<WorkflowDefinition, BpmnError> {
        let definition = BpmnParser::new().read_from_file(path)?;
        finish(definition)
    }

    pub fn read_from_xml_reader(
        mut reader: impl std::io::Read,
    ) -> Result<WorkflowDefinition, BpmnError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).map_err(ParseError::Io)?;
        Self::read_from_xml_bytes(&bytes)
    }

    pub fn read_from_yaml_str(yaml: &str) -> Result<WorkflowDefinition, BpmnError> {
        BpmnYamlParser::new().read_from_str(yaml)
    }

    pub fn read_from_yaml_file(path: impl AsRef<Path>) -> Result<WorkflowDefinition, BpmnError> {
        BpmnYamlParser::new().read_from_file(path)
    }

    pub fn read_from_yaml_reader(
        mut reader: impl std::io::Read,
    ) -> Result<WorkflowDefinition, BpmnError> {
        let mut input = String::new();
        reader.read_to_string(&mut input).map_err(ParseError::Io)?;
        Self::read_from_yaml_str(&input)
    }

    /// Validates a transformed model, returning the diagnostics instead
    /// of failing.
    pub fn validate(definition: &WorkflowDefinition) -> ValidationResult {
        BpmnValidator::new().validate(definition)
    }

    /// Serializes a model back to BPMN XML.
    pub fn convert_to_string(definition: &WorkflowDefinition) -> Result<String, BpmnError> {
        Ok(BpmnWriter::new().write(definition)?)
    }
}

fn finish(mut definition: WorkflowDefinition) -> Result<WorkflowDefinition, BpmnError> {
    BpmnTransformer::new().transform(&mut definition);

    let result = BpmnValidator::new().validate(&definition);
    debug!(
        errors = result.error_count(),
        warnings = result.warning_count(),
        "validated workflow definition"
    );

    if result.has_errors() {
        return Err(ValidationError::new(result).into());
    }

    Ok(definition)
}
