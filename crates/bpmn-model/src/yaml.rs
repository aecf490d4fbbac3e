//! YAML surface: a simpler way to describe a linear workflow.
//!
//! ```yaml
//! name: order
//! tasks:
//!   - id: collect-money
//!     type: payment-service
//!     retries: 5
//!     headers:
//!       method: VISA
//!     inputs:
//!       - source: $.totalPrice
//!         target: $.price
//!     outputs:
//!       - source: $.success
//!         target: $.paid
//!     outputBehavior: MERGE
//!   - id: ship-parcel
//!     type: shipment-service
//! ```
//!
//! The document is translated into builder calls: a start event, one
//! service task per entry in declaration order, an end event. The
//! result passes through the same transformation and validation as any
//! other construction path.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use bpmn_types::WorkflowDefinition;

use crate::builder::BpmnBuilder;
use crate::errors::{BpmnError, ParseError};

#[derive(Debug, Deserialize)]
struct YamlDefinition {
    name: String,
    #[serde(default)]
    tasks: Vec<YamlTask>,
}

#[derive(Debug, Deserialize)]
struct YamlTask {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    task_type: String,
    #[serde(default)]
    retries: Option<i32>,
    /// Declaration order matters: it is preserved through header
    /// encoding.
    #[serde(default)]
    headers: IndexMap<String, String>,
    #[serde(default)]
    inputs: Vec<YamlMapping>,
    #[serde(default)]
    outputs: Vec<YamlMapping>,
    #[serde(default, rename = "outputBehavior")]
    output_behavior: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YamlMapping {
    source: String,
    target: String,
}

/// Reads the YAML workflow surface into a validated model.
#[derive(Debug, Clone, Copy, Default)]
pub struct BpmnYamlParser;

impl BpmnYamlParser {
    pub fn new() -> Self {
        Self
    }

    pub fn read_from_str(&self, input: &str) -> Result<WorkflowDefinition, BpmnError> {
        let document: YamlDefinition =
            serde_yaml::from_str(input).map_err(ParseError::Yaml)?;
        build(document)
    }

    pub fn read_from_file(&self, path: impl AsRef<Path>) -> Result<WorkflowDefinition, BpmnError> {
        let input = fs::read_to_string(path).map_err(ParseError::Io)?;
        self.read_from_str(&input)
    }
}

fn build(document: YamlDefinition) -> Result<WorkflowDefinition, BpmnError> {
    let mut builder = BpmnBuilder::new(&document.name).start_event();

    for task in document.tasks {
        let mut task_builder = match task.id {
            Some(id) => builder.service_task_with_id(id),
            None => builder.service_task(),
        };

        task_builder = task_builder.task_type(&task.task_type);

        if let Some(retries) = task.retries {
            task_builder = task_builder.task_retries(retries);
        }

        for (key, value) in task.headers {
            task_builder = task_builder.header(key, value);
        }

        for mapping in task.inputs {
            task_builder = task_builder.input(mapping.source, mapping.target);
        }

        for mapping in task.outputs {
            task_builder = task_builder.output(mapping.source, mapping.target);
        }

        if let Some(behavior) = task.output_behavior {
            // Kept verbatim; unsupported values become validation
            // diagnostics, same as on the XML surface.
            task_builder = task_builder.output_behavior_raw(behavior);
        }

        builder = task_builder.done();
    }

    builder = builder.end_event();
    builder.done().map_err(BpmnError::from)
}
