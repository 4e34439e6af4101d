//! Backend-agnostic filter predicates.
//!
//! A predicate is a field comparison or a logical combination of predicates.
//! Values are plain JSON so the same tree can be logged, serialized, or
//! handed to the grammar unchanged.
//!
//! ```
//! use entity_search::search::predicate::{Operator, Predicate};
//! use serde_json::json;
//!
//! let p = Predicate::and([
//!     Predicate::between("age", 45, 51),
//!     Predicate::eq("name", "John"),
//! ]);
//! assert!(matches!(p, Predicate::And(ref xs) if xs.len() == 2));
//!
//! let parsed = Predicate::parse("age", ">=", json!(18)).unwrap();
//! assert_eq!(parsed, Predicate::cmp("age", Operator::Gte, json!(18)));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::grammar::GrammarError;

/// Comparison operators understood by the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "between")]
    Between,
    #[serde(rename = ":in")]
    In,
    #[serde(rename = "!in")]
    NotIn,
    #[serde(rename = ":like")]
    Like,
    #[serde(rename = "~=")]
    Regex,
}

impl Operator {
    pub const ALL: [Operator; 11] = [
        Self::Eq,
        Self::Ne,
        Self::Lt,
        Self::Lte,
        Self::Gt,
        Self::Gte,
        Self::Between,
        Self::In,
        Self::NotIn,
        Self::Like,
        Self::Regex,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Between => "between",
            Self::In => ":in",
            Self::NotIn => "!in",
            Self::Like => ":like",
            Self::Regex => "~=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = GrammarError;

    /// Parse the textual form. Aliases: `==`, `<>`, `in`, `not in`, `like`,
    /// `regex`; matching is case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.trim().to_ascii_lowercase().as_str() {
            "=" | "==" => Self::Eq,
            "!=" | "<>" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Lte,
            ">" => Self::Gt,
            ">=" => Self::Gte,
            "between" => Self::Between,
            ":in" | "in" => Self::In,
            "!in" | "not in" => Self::NotIn,
            ":like" | "like" => Self::Like,
            "~=" | "regex" => Self::Regex,
            _ => return Err(GrammarError::UnknownOperator(s.to_string())),
        };
        Ok(op)
    }
}

/// A filter predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Predicate {
    Compare {
        field: String,
        operator: Operator,
        value: Value,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    /// A query fragment already in backend form, passed through verbatim.
    Raw(Value),
}

impl Predicate {
    pub fn cmp(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self::Compare {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Comparison with a textual operator, e.g. `Predicate::parse("age", ">", 3)`.
    pub fn parse(
        field: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Self, GrammarError> {
        Ok(Self::cmp(field, operator.parse()?, value))
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::cmp(field, Operator::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::cmp(field, Operator::Ne, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::cmp(field, Operator::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::cmp(field, Operator::Lte, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::cmp(field, Operator::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::cmp(field, Operator::Gte, value)
    }

    pub fn between(field: impl Into<String>, lo: impl Into<Value>, hi: impl Into<Value>) -> Self {
        Self::cmp(
            field,
            Operator::Between,
            Value::Array(vec![lo.into(), hi.into()]),
        )
    }

    pub fn is_in<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::cmp(
            field,
            Operator::In,
            Value::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn not_in<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::cmp(
            field,
            Operator::NotIn,
            Value::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    /// SQL-style pattern: `%` matches any run of characters, `_` one character.
    pub fn like(field: impl Into<String>, pattern: impl Into<Value>) -> Self {
        Self::cmp(field, Operator::Like, pattern)
    }

    pub fn regex(field: impl Into<String>, pattern: impl Into<Value>) -> Self {
        Self::cmp(field, Operator::Regex, pattern)
    }

    pub fn and(children: impl IntoIterator<Item = Predicate>) -> Self {
        Self::And(children.into_iter().collect())
    }

    pub fn or(children: impl IntoIterator<Item = Predicate>) -> Self {
        Self::Or(children.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: Predicate) -> Self {
        Self::Not(Box::new(child))
    }

    pub fn raw(fragment: Value) -> Self {
        Self::Raw(fragment)
    }

    /// Negate this predicate.
    pub fn negate(self) -> Self {
        Self::not(self)
    }
}
