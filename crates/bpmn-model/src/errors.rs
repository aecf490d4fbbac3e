//! Error types for reading and building workflow models.

use thiserror::Error;

pub use bpmn_types::ValidationError;

/// Raised when a BPMN source cannot be read into a model at all.
/// Semantic problems are not parse errors; they surface as validation
/// diagnostics instead.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read workflow source: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid BPMN XML at line {line}: {message}")]
    Xml { line: u64, message: String },

    #[error("invalid workflow YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Any failure of a reader or builder entry point.
#[derive(Debug, Error)]
pub enum BpmnError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xml_error_display() {
        let error = ParseError::Xml {
            line: 7,
            message: "unexpected element 'zeebe:unknown'".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "invalid BPMN XML at line 7: unexpected element 'zeebe:unknown'"
        );
    }

    #[test]
    fn test_parse_error_converts_to_bpmn_error() {
        let error: BpmnError = ParseError::Xml {
            line: 1,
            message: "broken".to_string(),
        }
        .into();
        assert!(matches!(error, BpmnError::Parse(_)));
    }
}
