//! JSON path queries for variable mappings.
//!
//! A query addresses a value inside a task's variable document:
//! `$` is the document root, `.field` and `['field']` step into an
//! object, `[3]` steps into an array, `.*` matches any object member.
//!
//! Compilation never fails the caller. An invalid query keeps its
//! expression text and the failure reason so validation can quote both.

use std::fmt;

use thiserror::Error;

/// Path referring to the whole variable document.
pub const JSON_ROOT_PATH: &str = "$";

/// Why a path expression failed to compile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason} at position {position}")]
pub struct JsonPathError {
    pub position: usize,
    pub reason: String,
}

impl JsonPathError {
    fn new(position: usize, reason: impl Into<String>) -> Self {
        Self {
            position,
            reason: reason.into(),
        }
    }
}

/// One step of a compiled path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathToken {
    /// `$`
    Root,
    /// `.field` or `['field']`
    Key(String),
    /// `[3]`
    Index(u64),
    /// `.*`
    Wildcard,
}

/// A compiled JSON path query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPathQuery {
    expression: String,
    result: Result<Vec<PathToken>, JsonPathError>,
}

impl JsonPathQuery {
    /// The expression this query was compiled from.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn is_valid(&self) -> bool {
        self.result.is_ok()
    }

    /// The failure reason, if the expression did not compile.
    pub fn error_reason(&self) -> Option<String> {
        self.result.as_ref().err().map(JsonPathError::to_string)
    }

    /// The token sequence of a valid query.
    pub fn tokens(&self) -> Option<&[PathToken]> {
        self.result.as_ref().ok().map(Vec::as_slice)
    }

    /// Whether this query addresses the document root and nothing below it.
    pub fn is_root(&self) -> bool {
        matches!(self.result.as_deref(), Ok([PathToken::Root]))
    }
}

impl fmt::Display for JsonPathQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

/// Capability of compiling a path expression into a [`JsonPathQuery`].
pub trait CompileJsonPath {
    fn compile(&self, expression: &str) -> JsonPathQuery;
}

/// The default query compiler.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPathQueryCompiler;

impl JsonPathQueryCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl CompileJsonPath for JsonPathQueryCompiler {
    fn compile(&self, expression: &str) -> JsonPathQuery {
        JsonPathQuery {
            expression: expression.to_string(),
            result: parse(expression),
        }
    }
}

fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn parse(expression: &str) -> Result<Vec<PathToken>, JsonPathError> {
    let mut chars = expression.char_indices().peekable();
    let mut tokens = Vec::new();

    match chars.next() {
        Some((_, '$')) => tokens.push(PathToken::Root),
        Some((position, other)) => {
            return Err(JsonPathError::new(
                position,
                format!("expected root object '$' but found '{}'", other),
            ))
        }
        None => return Err(JsonPathError::new(0, "expected root object '$'")),
    }

    while let Some((position, c)) = chars.next() {
        match c {
            '.' => match chars.peek().copied() {
                Some((_, '*')) => {
                    chars.next();
                    tokens.push(PathToken::Wildcard);
                }
                Some((_, k)) if is_key_char(k) => {
                    let mut key = String::new();
                    while let Some(&(_, k)) = chars.peek() {
                        if !is_key_char(k) {
                            break;
                        }
                        key.push(k);
                        chars.next();
                    }
                    tokens.push(PathToken::Key(key));
                }
                _ => {
                    return Err(JsonPathError::new(
                        position,
                        "expected object key after '.'",
                    ))
                }
            },
            '[' => {
                let token = match chars.peek().copied() {
                    Some((_, '\'')) => {
                        chars.next();
                        let mut key = String::new();
                        loop {
                            match chars.next() {
                                Some((_, '\'')) => break,
                                Some((_, k)) => key.push(k),
                                None => {
                                    return Err(JsonPathError::new(
                                        position,
                                        "unterminated quoted object key",
                                    ))
                                }
                            }
                        }
                        PathToken::Key(key)
                    }
                    Some((_, d)) if d.is_ascii_digit() => {
                        let mut digits = String::new();
                        while let Some(&(_, d)) = chars.peek() {
                            if !d.is_ascii_digit() {
                                break;
                            }
                            digits.push(d);
                            chars.next();
                        }
                        let index = digits.parse::<u64>().map_err(|_| {
                            JsonPathError::new(position, "invalid array index")
                        })?;
                        PathToken::Index(index)
                    }
                    _ => {
                        return Err(JsonPathError::new(
                            position,
                            "expected array index or quoted object key after '['",
                        ))
                    }
                };
                match chars.next() {
                    Some((_, ']')) => tokens.push(token),
                    Some((close, other)) => {
                        return Err(JsonPathError::new(
                            close,
                            format!("expected ']' but found '{}'", other),
                        ))
                    }
                    None => return Err(JsonPathError::new(position, "expected ']'")),
                }
            }
            other => {
                return Err(JsonPathError::new(
                    position,
                    format!("unexpected character '{}'", other),
                ))
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(expression: &str) -> JsonPathQuery {
        JsonPathQueryCompiler::new().compile(expression)
    }

    #[test]
    fn test_compile_root() {
        let query = compile("$");
        assert!(query.is_valid());
        assert!(query.is_root());
        assert_eq!(query.tokens(), Some(&[PathToken::Root][..]));
    }

    #[test]
    fn test_compile_nested_keys() {
        let query = compile("$.order.customer");
        assert!(query.is_valid());
        assert_eq!(
            query.tokens(),
            Some(
                &[
                    PathToken::Root,
                    PathToken::Key("order".into()),
                    PathToken::Key("customer".into()),
                ][..]
            )
        );
    }

    #[test]
    fn test_compile_array_index() {
        let query = compile("$.items[2]");
        assert!(query.is_valid());
        assert_eq!(
            query.tokens(),
            Some(
                &[
                    PathToken::Root,
                    PathToken::Key("items".into()),
                    PathToken::Index(2),
                ][..]
            )
        );
    }

    #[test]
    fn test_compile_quoted_key() {
        let query = compile("$['order total']");
        assert!(query.is_valid());
        assert_eq!(
            query.tokens(),
            Some(&[PathToken::Root, PathToken::Key("order total".into())][..])
        );
    }

    #[test]
    fn test_compile_wildcard() {
        // Wildcards compile; rejecting them in mappings is a validation rule.
        let query = compile("$.*");
        assert!(query.is_valid());
        assert_eq!(
            query.tokens(),
            Some(&[PathToken::Root, PathToken::Wildcard][..])
        );
    }

    #[test]
    fn test_missing_root_is_invalid() {
        let query = compile("foo");
        assert!(!query.is_valid());
        assert!(query.error_reason().unwrap().contains("root object"));
        assert_eq!(query.expression(), "foo");
    }

    #[test]
    fn test_empty_expression_is_invalid() {
        assert!(!compile("").is_valid());
    }

    #[test]
    fn test_multi_index_is_invalid() {
        let query = compile("$.a[0,1]");
        assert!(!query.is_valid());
        assert!(query.error_reason().unwrap().contains("']'"));
    }

    #[test]
    fn test_trailing_dot_is_invalid() {
        assert!(!compile("$.").is_valid());
    }

    #[test]
    fn test_non_root_query_is_not_root() {
        assert!(!compile("$.foo").is_root());
        assert!(!compile("foo").is_root());
    }
}
