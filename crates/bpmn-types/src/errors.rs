//! Error types for the model layer.

use thiserror::Error;

use crate::diagnostics::ValidationResult;

/// Raised by reader and builder entry points when validation produced
/// at least one error diagnostic. The display form lists every
/// diagnostic, one per line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{result}")]
pub struct ValidationError {
    result: ValidationResult,
}

impl ValidationError {
    pub fn new(result: ValidationResult) -> Self {
        Self { result }
    }

    pub fn result(&self) -> &ValidationResult {
        &self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::ElementRef;

    #[test]
    fn test_display_lists_diagnostics() {
        let mut result = ValidationResult::new();
        result.add_error(
            ElementRef::new("bpmn:process", None),
            "BPMN process id is required.",
        );
        result.add_error(
            ElementRef::new("bpmn:startEvent", Some(4)),
            "Activity id is required.",
        );

        let error = ValidationError::new(result);
        let rendered = error.to_string();
        assert!(rendered.contains("[ERROR] (bpmn:process) BPMN process id is required."));
        assert!(rendered.contains("[ERROR] [line:4] (bpmn:startEvent) Activity id is required."));
    }
}
