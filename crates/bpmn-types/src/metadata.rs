//! Extension metadata carried by service tasks.

use std::fmt;
use std::str::FromStr;

use bpmn_el::JsonPathQuery;
use thiserror::Error;

/// Default retry count of a task definition.
pub const DEFAULT_TASK_RETRIES: i32 = 3;

/// Extension elements of a service task.
#[derive(Debug, Clone, Default)]
pub struct ExtensionElements {
    pub task_definition: Option<TaskDefinition>,
    pub task_headers: Option<TaskHeaders>,
    pub input_output_mapping: Option<InputOutputMapping>,
}

/// Which worker handles a task and how often it may be retried.
#[derive(Debug, Clone)]
pub struct TaskDefinition {
    pub task_type: String,
    pub retries: i32,
    pub line: Option<u64>,
}

impl TaskDefinition {
    pub fn new(task_type: impl Into<String>) -> Self {
        Self {
            task_type: task_type.into(),
            retries: DEFAULT_TASK_RETRIES,
            line: None,
        }
    }
}

impl Default for TaskDefinition {
    fn default() -> Self {
        Self::new("")
    }
}

/// A single header handed to the task worker.
///
/// Key and value stay optional so a missing XML attribute is
/// representable; validation reports it.
#[derive(Debug, Clone, Default)]
pub struct TaskHeader {
    pub key: Option<String>,
    pub value: Option<String>,
}

impl TaskHeader {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value: Some(value.into()),
        }
    }
}

/// Ordered task headers plus their pre-encoded wire form.
#[derive(Debug, Clone, Default)]
pub struct TaskHeaders {
    pub headers: Vec<TaskHeader>,
    /// Headers as a msgpack map in declaration order, set by
    /// transformation. Empty when there are no headers.
    pub encoded_msgpack: Vec<u8>,
    pub line: Option<u64>,
}

impl TaskHeaders {
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// How task output variables are merged back into the workflow payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputBehavior {
    Merge,
    Overwrite,
    None,
}

impl OutputBehavior {
    pub const VALUES: [OutputBehavior; 3] = [Self::Merge, Self::Overwrite, Self::None];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merge => "MERGE",
            Self::Overwrite => "OVERWRITE",
            Self::None => "NONE",
        }
    }
}

impl fmt::Display for OutputBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when an output behavior attribute is not one of the variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Output behavior '{0}' is not supported. Valid values are [MERGE, OVERWRITE, NONE].")]
pub struct UnknownOutputBehavior(pub String);

impl FromStr for OutputBehavior {
    type Err = UnknownOutputBehavior;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MERGE" => Ok(Self::Merge),
            "OVERWRITE" => Ok(Self::Overwrite),
            "NONE" => Ok(Self::None),
            other => Err(UnknownOutputBehavior(other.to_string())),
        }
    }
}

/// A source/target JSON path pair governing variable flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub source: String,
    pub target: String,
}

impl Mapping {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Whether both sides address the document root, making the mapping
    /// an identity.
    pub fn is_root_mapping(&self) -> bool {
        self.source == bpmn_el::JSON_ROOT_PATH && self.target == bpmn_el::JSON_ROOT_PATH
    }
}

/// A mapping with its source path compiled.
#[derive(Debug, Clone)]
pub struct CompiledMapping {
    pub source: JsonPathQuery,
    pub target: String,
}

/// Input and output variable mappings of a service task.
#[derive(Debug, Clone)]
pub struct InputOutputMapping {
    pub inputs: Vec<Mapping>,
    pub outputs: Vec<Mapping>,
    /// Raw attribute value; parsed by validation so unsupported values
    /// become diagnostics instead of read failures.
    pub output_behavior: String,
    /// Compiled forms, set by transformation. A sole identity root
    /// mapping compiles to an empty list.
    pub compiled_inputs: Vec<CompiledMapping>,
    pub compiled_outputs: Vec<CompiledMapping>,
    pub line: Option<u64>,
}

impl Default for InputOutputMapping {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            outputs: Vec::new(),
            output_behavior: OutputBehavior::Merge.as_str().to_string(),
            compiled_inputs: Vec::new(),
            compiled_outputs: Vec::new(),
            line: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_definition_defaults() {
        let definition = TaskDefinition::new("payment");
        assert_eq!(definition.task_type, "payment");
        assert_eq!(definition.retries, DEFAULT_TASK_RETRIES);
    }

    #[test]
    fn test_output_behavior_parse() {
        assert_eq!("MERGE".parse(), Ok(OutputBehavior::Merge));
        assert_eq!("OVERWRITE".parse(), Ok(OutputBehavior::Overwrite));
        assert_eq!("NONE".parse(), Ok(OutputBehavior::None));
    }

    #[test]
    fn test_output_behavior_parse_rejects_unknown() {
        let err = "asdf".parse::<OutputBehavior>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Output behavior 'asdf' is not supported. Valid values are [MERGE, OVERWRITE, NONE]."
        );
    }

    #[test]
    fn test_output_behavior_round_trip() {
        for behavior in OutputBehavior::VALUES {
            assert_eq!(behavior.as_str().parse(), Ok(behavior));
        }
    }

    #[test]
    fn test_root_mapping() {
        assert!(Mapping::new("$", "$").is_root_mapping());
        assert!(!Mapping::new("$.a", "$").is_root_mapping());
        assert!(!Mapping::new("$", "$.a").is_root_mapping());
    }

    #[test]
    fn test_default_output_behavior_is_merge() {
        let mapping = InputOutputMapping::default();
        assert_eq!(mapping.output_behavior, "MERGE");
    }
}
