//! Validation diagnostics.
//!
//! Validation walks the model and accumulates [`Diagnostic`]s in
//! traversal order into a [`ValidationResult`]. A single error makes
//! the result invalid; warnings are informational.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("ERROR"),
            Self::Warning => f.write_str("WARNING"),
        }
    }
}

/// The element a diagnostic points at: its qualified XML name and, when
/// the model came from XML, its source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementRef {
    pub qualified_name: &'static str,
    pub line: Option<u64>,
}

impl ElementRef {
    pub fn new(qualified_name: &'static str, line: Option<u64>) -> Self {
        Self {
            qualified_name,
            line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub element: ElementRef,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.severity)?;
        if let Some(line) = self.element.line {
            write!(f, "[line:{}] ", line)?;
        }
        write!(f, "({}) {}", self.element.qualified_name, self.message)
    }
}

/// The ordered outcome of validating a model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, element: ElementRef, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            element,
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, element: ElementRef, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            element,
            message: message.into(),
        });
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diagnostic) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_format_with_line() {
        let mut result = ValidationResult::new();
        result.add_error(
            ElementRef::new("bpmn:startEvent", Some(4)),
            "Activity id is required.",
        );

        assert_eq!(
            result.to_string(),
            "[ERROR] [line:4] (bpmn:startEvent) Activity id is required."
        );
    }

    #[test]
    fn test_diagnostic_format_without_line() {
        let mut result = ValidationResult::new();
        result.add_warning(
            ElementRef::new("bpmn:exclusiveGateway", None),
            "An exclusive gateway should have a default sequence flow without condition.",
        );

        assert_eq!(
            result.to_string(),
            "[WARNING] (bpmn:exclusiveGateway) An exclusive gateway should have a default \
             sequence flow without condition."
        );
    }

    #[test]
    fn test_severity_gate() {
        let mut result = ValidationResult::new();
        assert!(!result.has_errors());

        result.add_warning(ElementRef::new("bpmn:process", None), "warning");
        assert!(!result.has_errors());
        assert_eq!(result.warning_count(), 1);

        result.add_error(ElementRef::new("bpmn:process", None), "error");
        assert!(result.has_errors());
        assert_eq!(result.error_count(), 1);
    }

    #[test]
    fn test_diagnostics_keep_insertion_order() {
        let mut result = ValidationResult::new();
        result.add_error(ElementRef::new("bpmn:process", None), "first");
        result.add_warning(ElementRef::new("bpmn:process", None), "second");
        result.add_error(ElementRef::new("bpmn:process", None), "third");

        let messages: Vec<_> = result
            .diagnostics()
            .iter()
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(messages, ["first", "second", "third"]);
    }

    #[test]
    fn test_multiple_diagnostics_render_on_separate_lines() {
        let mut result = ValidationResult::new();
        result.add_error(ElementRef::new("bpmn:process", None), "one");
        result.add_error(ElementRef::new("bpmn:process", None), "two");

        let rendered = result.to_string();
        assert_eq!(rendered.lines().count(), 2);
    }
}
