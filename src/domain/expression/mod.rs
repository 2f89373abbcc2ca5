//! Boolean/text expression language evaluated against an alert's field map.
//!
//! Expressions are compiled once when the configuration is loaded and then
//! evaluated per alert. Supported syntax: arithmetic (`+ - * / % **`), string
//! concatenation and regex matching (`=~`, `!~`), comparisons, propositional
//! logic (`&& || !`), ternaries, JSON array/object literals, member and index
//! access (`labels.severity`, `labels["team"]`) and the `in` membership
//! operator, which tests a value against a sequence with deep equality.

mod eval;
mod lexer;
mod parser;
pub mod selector;

use serde_json::{Map, Value};
use thiserror::Error;

pub use eval::display_value;

/// Flattened alert fields visible to an expression.
pub type AlertFields = Map<String, Value>;

#[derive(Debug, Error, PartialEq)]
pub enum CompileError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected character {ch:?} at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("invalid number {text:?} at offset {offset}")]
    InvalidNumber { text: String, offset: usize },

    #[error("unexpected token {token} at offset {offset}")]
    UnexpectedToken { token: String, offset: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("invalid regular expression: {0}")]
    InvalidRegex(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("unknown parameter {0}")]
    UnknownVariable(String),

    #[error("unknown key {0:?}")]
    MissingKey(String),

    #[error("index {0} out of range")]
    IndexOutOfRange(String),

    #[error("invalid operation ({left}) {op} ({right})")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },

    #[error("expected bool but got {found}")]
    ExpectedBool { found: &'static str },

    #[error("expected sequence for in operator but got {found}")]
    ExpectedSequence { found: &'static str },

    #[error("invalid regular expression: {0}")]
    InvalidRegex(String),

    #[error("arithmetic result is not a finite number")]
    NonFiniteNumber,
}

/// A compiled expression.
#[derive(Debug, Clone)]
pub struct Expression {
    text: String,
    root: parser::Node,
}

impl Expression {
    pub fn compile(source: &str) -> Result<Self, CompileError> {
        let text = source.trim();
        let tokens = lexer::tokenize(text)?;
        let root = parser::parse(tokens)?;

        Ok(Self {
            text: text.to_string(),
            root,
        })
    }

    /// Source text the expression was compiled from.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn evaluate(&self, fields: &AlertFields) -> Result<Value, EvalError> {
        eval::evaluate(&self.root, fields)
    }

    pub fn eval_bool(&self, fields: &AlertFields) -> Result<bool, EvalError> {
        eval::expect_bool(&self.evaluate(fields)?)
    }

    pub fn eval_string(&self, fields: &AlertFields) -> Result<String, EvalError> {
        Ok(display_value(&self.evaluate(fields)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields() -> AlertFields {
        let value = json!({
            "status": "firing",
            "labels": {"severity": "critical", "service": "api", "replicas": "3"},
            "annotations": {"summary": "p99 above 2s"},
            "fingerprint": "c0ffee",
        });
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn eval(src: &str) -> Result<Value, EvalError> {
        Expression::compile(src).unwrap().evaluate(&fields())
    }

    #[test]
    fn evaluates_label_conditions() {
        let expr = Expression::compile(r#"labels.severity == "critical" && status == "firing""#)
            .unwrap();
        assert_eq!(expr.eval_bool(&fields()), Ok(true));

        let expr = Expression::compile(r#"labels["service"] != "api" || !(status == "firing")"#)
            .unwrap();
        assert_eq!(expr.eval_bool(&fields()), Ok(false));
    }

    #[test]
    fn in_uses_deep_equality() {
        assert_eq!(eval(r#"labels.severity in ["warning", "critical"]"#), Ok(json!(true)));
        assert_eq!(eval(r#"{"a": [1]} in [{"a": [1.0]}]"#), Ok(json!(true)));
        assert_eq!(eval(r#""info" in ["warning", "critical"]"#), Ok(json!(false)));
        assert_eq!(
            eval(r#""x" in "xyz""#),
            Err(EvalError::ExpectedSequence { found: "string" })
        );
    }

    #[test]
    fn arithmetic_and_text() {
        assert_eq!(eval("1 + 2 * 3"), Ok(json!(7.0)));
        assert_eq!(eval("2 ** 10 % 1000"), Ok(json!(24.0)));
        assert_eq!(eval(r#""svc-" + labels.service"#), Ok(json!("svc-api")));
        assert_eq!(eval(r#""n" + 3"#), Ok(json!("n3")));
        assert_eq!(eval(r#"annotations.summary =~ "p9[59]""#), Ok(json!(true)));
        assert_eq!(eval(r#"fingerprint !~ "^c0""#), Ok(json!(false)));
    }

    #[test]
    fn ternary_selects_strings() {
        let expr = Expression::compile(
            r#"labels.severity == "critical" ? "urgent" : labels.severity == "warning" ? "high" : "default""#,
        )
        .unwrap();
        assert_eq!(expr.eval_string(&fields()), Ok("urgent".to_string()));
    }

    #[test]
    fn eval_string_formats_scalars() {
        let expr = Expression::compile("2 + 3").unwrap();
        assert_eq!(expr.eval_string(&fields()), Ok("5".to_string()));

        let expr = Expression::compile("1 < 2").unwrap();
        assert_eq!(expr.eval_string(&fields()), Ok("true".to_string()));
    }

    #[test]
    fn numeric_label_guards() {
        let expr = Expression::compile("labels.replicas > 2").unwrap();
        assert_eq!(expr.eval_bool(&fields()), Ok(true));
        let expr = Expression::compile("labels.replicas == 3 && labels.replicas != 4").unwrap();
        assert_eq!(expr.eval_bool(&fields()), Ok(true));
        assert_eq!(eval("labels.replicas + 1"), Ok(json!(4.0)));
        assert_eq!(eval("-labels.replicas"), Ok(json!(-3.0)));
    }

    #[test]
    fn type_errors_surface_at_evaluation() {
        let expr = Expression::compile(r#"labels.service > 2"#).unwrap();
        assert_eq!(
            expr.eval_bool(&fields()),
            Err(EvalError::TypeMismatch {
                op: ">",
                left: "string",
                right: "number"
            })
        );

        let expr = Expression::compile(r#"labels.severity"#).unwrap();
        assert_eq!(
            expr.eval_bool(&fields()),
            Err(EvalError::ExpectedBool { found: "string" })
        );

        let expr = Expression::compile(r#"labels.team == "infra""#).unwrap();
        assert_eq!(
            expr.eval_bool(&fields()),
            Err(EvalError::MissingKey("team".to_string()))
        );

        let expr = Expression::compile(r#"cluster == "eu""#).unwrap();
        assert_eq!(
            expr.eval_bool(&fields()),
            Err(EvalError::UnknownVariable("cluster".to_string()))
        );
    }

    #[test]
    fn logical_operators_short_circuit() {
        // The right-hand side would fail with a missing key.
        assert_eq!(eval(r#"false && labels.team == "x""#), Ok(json!(false)));
        assert_eq!(eval(r#"true || labels.team == "x""#), Ok(json!(true)));
    }

    #[test]
    fn compile_errors() {
        assert_eq!(Expression::compile("   ").unwrap_err(), CompileError::Empty);
        assert!(Expression::compile("labels.").is_err());
        assert!(Expression::compile("a ==").is_err());
        assert!(Expression::compile("[1, 2").is_err());
        assert!(matches!(
            Expression::compile(r#"status =~ "[a-""#),
            Err(CompileError::InvalidRegex(_))
        ));
    }

    #[test]
    fn keeps_trimmed_source_text() {
        let expr = Expression::compile("  status == \"firing\"\n").unwrap();
        assert_eq!(expr.text(), "status == \"firing\"");
    }
}
