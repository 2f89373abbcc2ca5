use std::sync::OnceLock;

use regex::Regex;

use super::{AlertFields, CompileError, EvalError, Expression};

/// Strings matching this pattern are used verbatim and never compiled.
const LITERAL_PATTERN: &str = r"^[-_A-Za-z0-9]{1,64}$";

fn literal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(LITERAL_PATTERN).expect("literal pattern is a valid regex"))
}

/// Whether `source` is a plain token rather than an expression.
pub fn is_literal(source: &str) -> bool {
    literal_pattern().is_match(source.trim())
}

/// A string-valued setting (topic, priority) that is either a literal token or
/// an expression evaluated per alert. The choice is made once, at compile time.
#[derive(Debug, Clone)]
pub enum StringSelector {
    Literal(String),
    Expression(Expression),
}

impl StringSelector {
    pub fn compile(source: &str) -> Result<Self, CompileError> {
        let text = source.trim();
        if is_literal(text) {
            return Ok(Self::Literal(text.to_string()));
        }
        Expression::compile(text).map(Self::Expression)
    }

    pub fn resolve(&self, fields: &AlertFields) -> Result<String, EvalError> {
        match self {
            Self::Literal(text) => Ok(text.clone()),
            Self::Expression(expr) => expr.eval_string(fields),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Literal(text) => text,
            Self::Expression(expr) => expr.text(),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }
}
