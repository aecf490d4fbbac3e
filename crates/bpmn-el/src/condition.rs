//! Conditions on sequence flows.
//!
//! A condition compares variable paths and literals, optionally joined
//! with `&&` and `||`:
//!
//! ```text
//! $.totalPrice > 100
//! $.owner == 'paul' || ($.retries < 3 && $.approved == true)
//! ```
//!
//! Compilation never fails the caller: an expression that does not
//! parse yields a [`CompiledJsonCondition`] carrying the error message,
//! which validation reports together with the expression.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use crate::jsonpath::{CompileJsonPath, JsonPathQuery, JsonPathQueryCompiler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

impl ComparisonOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Path(JsonPathQuery),
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
}

/// A compiled condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Comparison {
        left: Operand,
        operator: ComparisonOperator,
        right: Operand,
    },
    Conjunction(Box<Condition>, Box<Condition>),
    Disjunction(Box<Condition>, Box<Condition>),
}

/// The result of compiling a condition expression.
///
/// Either a condition tree or the message explaining why the expression
/// did not parse. Validation decides whether an invalid condition is an
/// error for the model at hand.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledJsonCondition {
    expression: String,
    result: Result<Condition, String>,
}

impl CompiledJsonCondition {
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn is_valid(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.result.as_ref().err().map(String::as_str)
    }

    pub fn condition(&self) -> Option<&Condition> {
        self.result.as_ref().ok()
    }
}

/// Capability of compiling a condition expression.
pub trait CompileCondition {
    fn compile(&self, expression: &str) -> CompiledJsonCondition;
}

/// The default condition compiler.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConditionCompiler;

impl JsonConditionCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl CompileCondition for JsonConditionCompiler {
    fn compile(&self, expression: &str) -> CompiledJsonCondition {
        let result = tokenize(expression).and_then(|tokens| {
            let mut parser = Parser::new(tokens);
            parser.parse()
        });

        CompiledJsonCondition {
            expression: expression.to_string(),
            result,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Path(String),
    Str(String),
    Number(f64),
    Boolean(bool),
    Null,
    Operator(ComparisonOperator),
    And,
    Or,
    LeftParen,
    RightParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Path(p) => format!("'{}'", p),
            Token::Str(s) => format!("'{}'", s),
            Token::Number(n) => format!("'{}'", n),
            Token::Boolean(b) => format!("'{}'", b),
            Token::Null => "'null'".to_string(),
            Token::Operator(op) => format!("'{}'", op),
            Token::And => "'&&'".to_string(),
            Token::Or => "'||'".to_string(),
            Token::LeftParen => "'('".to_string(),
            Token::RightParen => "')'".to_string(),
        }
    }
}

fn is_path_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '=' | '!' | '<' | '>' | '&' | '|' | '(' | ')')
}

fn tokenize(expression: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars: Peekable<Chars<'_>> = expression.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        match c {
            '$' => {
                let mut path = String::new();
                while let Some(&p) = chars.peek() {
                    if !is_path_char(p) {
                        break;
                    }
                    path.push(p);
                    chars.next();
                }
                tokens.push(Token::Path(path));
            }
            '\'' => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(s) => value.push(s),
                        None => return Err("unterminated string literal".to_string()),
                    }
                }
                tokens.push(Token::Str(value));
            }
            '=' => {
                chars.next();
                match chars.next() {
                    Some('=') => tokens.push(Token::Operator(ComparisonOperator::Equal)),
                    _ => return Err("expected '==' but found '='".to_string()),
                }
            }
            '!' => {
                chars.next();
                match chars.next() {
                    Some('=') => tokens.push(Token::Operator(ComparisonOperator::NotEqual)),
                    _ => return Err("expected '!=' but found '!'".to_string()),
                }
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Operator(ComparisonOperator::LessOrEqual));
                } else {
                    tokens.push(Token::Operator(ComparisonOperator::LessThan));
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Operator(ComparisonOperator::GreaterOrEqual));
                } else {
                    tokens.push(Token::Operator(ComparisonOperator::GreaterThan));
                }
            }
            '&' => {
                chars.next();
                match chars.next() {
                    Some('&') => tokens.push(Token::And),
                    _ => return Err("expected '&&' but found '&'".to_string()),
                }
            }
            '|' => {
                chars.next();
                match chars.next() {
                    Some('|') => tokens.push(Token::Or),
                    _ => return Err("expected '||' but found '|'".to_string()),
                }
            }
            '(' => {
                chars.next();
                tokens.push(Token::LeftParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RightParen);
            }
            d if d.is_ascii_digit() || d == '-' => {
                let mut number = String::new();
                number.push(d);
                chars.next();
                while let Some(&n) = chars.peek() {
                    if !n.is_ascii_digit() && n != '.' {
                        break;
                    }
                    number.push(n);
                    chars.next();
                }
                let value = number
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{}'", number))?;
                tokens.push(Token::Number(value));
            }
            w if w.is_alphabetic() => {
                let mut word = String::new();
                while let Some(&l) = chars.peek() {
                    if !l.is_alphanumeric() && l != '_' {
                        break;
                    }
                    word.push(l);
                    chars.next();
                }
                match word.as_str() {
                    "true" => tokens.push(Token::Boolean(true)),
                    "false" => tokens.push(Token::Boolean(false)),
                    "null" => tokens.push(Token::Null),
                    other => {
                        return Err(format!(
                            "expected JSON path or literal but found '{}'",
                            other
                        ))
                    }
                }
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    fn parse(&mut self) -> Result<Condition, String> {
        if self.tokens.is_empty() {
            return Err("expression is empty".to_string());
        }
        let condition = self.parse_disjunction()?;
        match self.peek() {
            None => Ok(condition),
            Some(token) => Err(format!("unexpected token {}", token.describe())),
        }
    }

    fn parse_disjunction(&mut self) -> Result<Condition, String> {
        let mut left = self.parse_conjunction()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let right = self.parse_conjunction()?;
            left = Condition::Disjunction(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_conjunction(&mut self) -> Result<Condition, String> {
        let mut left = self.parse_primary()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let right = self.parse_primary()?;
            left = Condition::Conjunction(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Condition, String> {
        if self.peek() == Some(&Token::LeftParen) {
            self.advance();
            let condition = self.parse_disjunction()?;
            match self.peek() {
                Some(Token::RightParen) => {
                    self.advance();
                    Ok(condition)
                }
                _ => Err("expected ')'".to_string()),
            }
        } else {
            self.parse_comparison()
        }
    }

    fn parse_comparison(&mut self) -> Result<Condition, String> {
        let left = self.parse_operand()?;
        let operator = match self.peek() {
            Some(&Token::Operator(op)) => {
                self.advance();
                op
            }
            Some(token) => {
                return Err(format!(
                    "expected comparison operator but found {}",
                    token.describe()
                ))
            }
            None => return Err("expected comparison operator".to_string()),
        };
        let right = self.parse_operand()?;
        Ok(Condition::Comparison {
            left,
            operator,
            right,
        })
    }

    fn parse_operand(&mut self) -> Result<Operand, String> {
        let operand = match self.peek() {
            Some(Token::Path(path)) => {
                let query = JsonPathQueryCompiler::new().compile(path);
                if let Some(reason) = query.error_reason() {
                    return Err(format!("invalid JSON path '{}': {}", path, reason));
                }
                Operand::Path(query)
            }
            Some(Token::Str(value)) => Operand::String(value.clone()),
            Some(&Token::Number(value)) => Operand::Number(value),
            Some(&Token::Boolean(value)) => Operand::Boolean(value),
            Some(Token::Null) => Operand::Null,
            Some(token) => {
                return Err(format!(
                    "expected JSON path or literal but found {}",
                    token.describe()
                ))
            }
            None => return Err("expected JSON path or literal".to_string()),
        };
        self.advance();
        Ok(operand)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn advance(&mut self) {
        self.position += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(expression: &str) -> CompiledJsonCondition {
        JsonConditionCompiler::new().compile(expression)
    }

    #[test]
    fn test_compile_comparison() {
        let condition = compile("$.foo < 5");
        assert!(condition.is_valid());
        assert_eq!(condition.expression(), "$.foo < 5");

        match condition.condition() {
            Some(Condition::Comparison {
                left: Operand::Path(path),
                operator: ComparisonOperator::LessThan,
                right: Operand::Number(value),
            }) => {
                assert_eq!(path.expression(), "$.foo");
                assert_eq!(*value, 5.0);
            }
            other => panic!("expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_compile_all_operators() {
        for expression in [
            "$.a == 1", "$.a != 1", "$.a < 1", "$.a <= 1", "$.a > 1", "$.a >= 1",
        ] {
            assert!(compile(expression).is_valid(), "{} should compile", expression);
        }
    }

    #[test]
    fn test_compile_literals() {
        assert!(compile("$.owner == 'paul'").is_valid());
        assert!(compile("$.approved == true").is_valid());
        assert!(compile("$.approved != false").is_valid());
        assert!(compile("$.owner == null").is_valid());
        assert!(compile("$.count >= -2.5").is_valid());
    }

    #[test]
    fn test_compile_boolean_combinations() {
        let condition = compile("$.a == 1 && $.b == 2 || $.c == 3");
        assert!(condition.is_valid());
        assert!(matches!(
            condition.condition(),
            Some(Condition::Disjunction(_, _))
        ));

        let grouped = compile("$.a == 1 && ($.b == 2 || $.c == 3)");
        assert!(grouped.is_valid());
        assert!(matches!(
            grouped.condition(),
            Some(Condition::Conjunction(_, _))
        ));
    }

    #[test]
    fn test_bare_word_is_invalid() {
        let condition = compile("foobar");
        assert!(!condition.is_valid());
        assert_eq!(condition.expression(), "foobar");
        assert!(condition.error_message().unwrap().contains("foobar"));
    }

    #[test]
    fn test_missing_operator_is_invalid() {
        assert!(!compile("$.foo").is_valid());
        assert!(!compile("$.foo 5").is_valid());
    }

    #[test]
    fn test_unterminated_string_is_invalid() {
        assert!(!compile("$.owner == 'paul").is_valid());
    }

    #[test]
    fn test_unbalanced_parens_are_invalid() {
        assert!(!compile("($.a == 1").is_valid());
        assert!(!compile("$.a == 1)").is_valid());
    }

    #[test]
    fn test_empty_expression_is_invalid() {
        assert!(!compile("").is_valid());
        assert!(!compile("   ").is_valid());
    }

    #[test]
    fn test_single_equals_is_invalid() {
        assert!(!compile("$.a = 1").is_valid());
    }
}
