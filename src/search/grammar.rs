//! Query grammar: compiles predicates into the backend's boolean query JSON.
//!
//! The grammar is pure. It holds no state, performs no I/O, and produces a
//! fresh fragment on every call. Either the whole predicate compiles or the
//! call fails with a [`GrammarError`]; nothing is partially compiled.
//!
//! # Fragments
//!
//! | Predicate | Fragment |
//! |-----------|----------|
//! | `f = v` | `{"term": {f: v}}` (`terms` for lists, `missing` for null) |
//! | `f != v` | `NOT term` (`NOT terms` for lists, `exists` for null) |
//! | `f < v` … `f >= v` | `{"range": {f: {"lt"|"lte"|"gt"|"gte": v}}}` |
//! | `f between [lo, hi]` | `{"range": {f: {"gte": lo, "lte": hi}}}` |
//! | `f :in [..]` | `{"terms": {f: [..]}}` (`missing` when empty) |
//! | `f !in [..]` | `NOT terms` (`exists` when empty) |
//! | `f :like p` | `{"prefix": ..}` or `{"wildcard": ..}` |
//! | `f ~= r` | `{"regexp": {f: {"value": r}}}` |
//! | `NOT x` | `{"bool": {"must_not": [x]}}` |
//! | `x OR y` | `{"bool": {"should": [x, y], "minimum_should_match": 1}}` |
//! | `x AND y` | `{"bool": {"must": [x, y]}}` |
//!
//! `= null` compiles to `missing` while `!= null` compiles to `exists`:
//! "not equal to null" means "has a value".

use serde_json::{Value, json};
use thiserror::Error;
use tracing::trace;

use super::predicate::{Operator, Predicate};

/// Characters with a meaning in backend regular expressions.
const REGEX_RESERVED: &[char] = &[
    '\\', '.', '?', '+', '*', '|', '{', '}', '[', ']', '(', ')', '"', '#', '@', '&', '<', '>', '~',
];

/// A predicate that cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("unknown operator `{0}`")]
    UnknownOperator(String),

    #[error("`{field} {operator}` expects {expected} values, got {actual}")]
    Arity {
        field: String,
        operator: Operator,
        expected: usize,
        actual: usize,
    },

    #[error("`{field} {operator}` expects a list")]
    ExpectedList { field: String, operator: Operator },

    #[error("`{field} {operator}` expects a single value")]
    ExpectedScalar { field: String, operator: Operator },

    #[error("`{field} {operator}` expects a string pattern")]
    ExpectedString { field: String, operator: Operator },

    #[error("`{field} {operator}` does not accept null")]
    NullValue { field: String, operator: Operator },
}

/// Stateless predicate compiler.
#[derive(Debug, Clone, Copy, Default)]
pub struct Grammar;

impl Grammar {
    pub fn new() -> Self {
        Self
    }

    /// Compile a predicate tree.
    pub fn compile(&self, predicate: &Predicate) -> Result<Value, GrammarError> {
        let fragment = self.compile_node(predicate)?;
        trace!(fragment = %fragment, "predicate compiled");
        Ok(fragment)
    }

    fn compile_node(&self, predicate: &Predicate) -> Result<Value, GrammarError> {
        match predicate {
            Predicate::Compare {
                field,
                operator,
                value,
            } => self.comparison(field, *operator, value),
            Predicate::And(children) => Ok(self.and(self.compile_all(children)?)),
            Predicate::Or(children) => Ok(self.or(self.compile_all(children)?)),
            Predicate::Not(child) => Ok(self.not(self.compile_node(child)?)),
            Predicate::Raw(fragment) => Ok(fragment.clone()),
        }
    }

    fn compile_all(&self, children: &[Predicate]) -> Result<Vec<Value>, GrammarError> {
        children.iter().map(|c| self.compile_node(c)).collect()
    }

    /// Compile one `field operator value` test.
    pub fn comparison(
        &self,
        field: &str,
        operator: Operator,
        value: &Value,
    ) -> Result<Value, GrammarError> {
        match operator {
            Operator::Eq => Ok(match value {
                Value::Null => missing(field),
                Value::Array(items) => terms(field, items),
                Value::Object(_) => return Err(expected_scalar(field, operator)),
                scalar => term(field, scalar),
            }),
            Operator::Ne => Ok(match value {
                Value::Null => exists(field),
                Value::Array(items) => self.not(terms(field, items)),
                Value::Object(_) => return Err(expected_scalar(field, operator)),
                scalar => self.not(term(field, scalar)),
            }),
            Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte => {
                let bound = match operator {
                    Operator::Lt => "lt",
                    Operator::Lte => "lte",
                    Operator::Gt => "gt",
                    _ => "gte",
                };
                match value {
                    Value::Null => Err(GrammarError::NullValue {
                        field: field.to_string(),
                        operator,
                    }),
                    Value::Array(_) | Value::Object(_) => Err(expected_scalar(field, operator)),
                    scalar => Ok(json!({ "range": { field: { bound: scalar } } })),
                }
            }
            Operator::Between => match value {
                Value::Array(bounds) if bounds.len() == 2 => Ok(json!({
                    "range": { field: { "gte": bounds[0], "lte": bounds[1] } }
                })),
                other => Err(GrammarError::Arity {
                    field: field.to_string(),
                    operator,
                    expected: 2,
                    actual: arity(other),
                }),
            },
            Operator::In => match value {
                Value::Null => Ok(missing(field)),
                Value::Array(items) if items.is_empty() => Ok(missing(field)),
                Value::Array(items) => Ok(terms(field, items)),
                _ => Err(expected_list(field, operator)),
            },
            Operator::NotIn => match value {
                Value::Null => Ok(exists(field)),
                Value::Array(items) if items.is_empty() => Ok(exists(field)),
                Value::Array(items) => Ok(self.not(terms(field, items))),
                _ => Err(expected_list(field, operator)),
            },
            Operator::Like => {
                let fragments = patterns(field, operator, value)?
                    .into_iter()
                    .map(|pattern| like(field, pattern))
                    .collect();
                Ok(self.or(fragments))
            }
            Operator::Regex => {
                let fragments = patterns(field, operator, value)?
                    .into_iter()
                    .map(|pattern| json!({ "regexp": { field: { "value": pattern } } }))
                    .collect();
                Ok(self.or(fragments))
            }
        }
    }

    /// All fragments must match. One fragment is returned as is; none
    /// matches every document.
    pub fn and(&self, mut fragments: Vec<Value>) -> Value {
        match fragments.len() {
            0 => json!({ "match_all": {} }),
            1 => fragments.remove(0),
            _ => json!({ "bool": { "must": fragments } }),
        }
    }

    /// At least one fragment must match. One fragment is returned as is.
    pub fn or(&self, mut fragments: Vec<Value>) -> Value {
        if fragments.len() == 1 {
            return fragments.remove(0);
        }
        json!({ "bool": { "minimum_should_match": 1, "should": fragments } })
    }

    pub fn not(&self, fragment: Value) -> Value {
        json!({ "bool": { "must_not": [fragment] } })
    }

    /// Backslash-escape the characters that have a meaning in backend
    /// regular expressions, so `text` matches literally.
    pub fn escape(text: &str) -> String {
        let mut out = String::with_capacity(text.len() + 8);
        for c in text.chars() {
            if REGEX_RESERVED.contains(&c) {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }

    /// Translate an SQL `LIKE` pattern into a backend wildcard pattern.
    ///
    /// Backend wildcards (`*`, `?`) and the escape character already present
    /// in the input are escaped first, then `%` becomes `*` and `_` becomes
    /// `?`.
    ///
    /// ```
    /// use entity_search::search::Grammar;
    ///
    /// assert_eq!(Grammar::like_to_wildcard("*?P_r%"), r"\*\?P?r*");
    /// ```
    pub fn like_to_wildcard(pattern: &str) -> String {
        let mut out = String::with_capacity(pattern.len() + 4);
        for c in pattern.chars() {
            match c {
                '\\' | '*' | '?' => {
                    out.push('\\');
                    out.push(c);
                }
                '%' => out.push('*'),
                '_' => out.push('?'),
                other => out.push(other),
            }
        }
        out
    }
}

fn term(field: &str, value: &Value) -> Value {
    json!({ "term": { field: value } })
}

fn terms(field: &str, values: &[Value]) -> Value {
    json!({ "terms": { field: values } })
}

fn missing(field: &str) -> Value {
    json!({ "missing": { "field": field } })
}

fn exists(field: &str) -> Value {
    json!({ "exists": { "field": field } })
}

/// `prefix` when the only wildcard is one trailing `%`, `wildcard` otherwise.
fn like(field: &str, pattern: &str) -> Value {
    let wildcards = pattern.chars().filter(|c| matches!(c, '%' | '_')).count();
    if wildcards == 1 && pattern.len() > 1 && pattern.ends_with('%') {
        let prefix = &pattern[..pattern.len() - 1];
        return json!({ "prefix": { field: prefix } });
    }
    json!({ "wildcard": { field: Grammar::like_to_wildcard(pattern) } })
}

fn patterns<'a>(
    field: &str,
    operator: Operator,
    value: &'a Value,
) -> Result<Vec<&'a str>, GrammarError> {
    let expected_string = || GrammarError::ExpectedString {
        field: field.to_string(),
        operator,
    };
    match value {
        Value::Null => Err(GrammarError::NullValue {
            field: field.to_string(),
            operator,
        }),
        Value::String(s) => Ok(vec![s.as_str()]),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().ok_or_else(expected_string))
            .collect(),
        _ => Err(expected_string()),
    }
}

fn arity(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::Array(items) => items.len(),
        _ => 1,
    }
}

fn expected_scalar(field: &str, operator: Operator) -> GrammarError {
    GrammarError::ExpectedScalar {
        field: field.to_string(),
        operator,
    }
}

fn expected_list(field: &str, operator: Operator) -> GrammarError {
    GrammarError::ExpectedList {
        field: field.to_string(),
        operator,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(p: Predicate) -> Value {
        Grammar.compile(&p).unwrap()
    }

    #[test]
    fn equality() {
        assert_eq!(
            compile(Predicate::eq("name", "John")),
            json!({"term": {"name": "John"}})
        );
        assert_eq!(
            compile(Predicate::eq("id", json!([1, 2]))),
            json!({"terms": {"id": [1, 2]}})
        );
    }

    #[test]
    fn null_equality_is_asymmetric() {
        assert_eq!(
            compile(Predicate::eq("deleted_at", Value::Null)),
            json!({"missing": {"field": "deleted_at"}})
        );
        assert_eq!(
            compile(Predicate::ne("deleted_at", Value::Null)),
            json!({"exists": {"field": "deleted_at"}})
        );
    }

    #[test]
    fn inequality_wraps_positive_fragment_once() {
        assert_eq!(
            compile(Predicate::ne("name", "John")),
            json!({"bool": {"must_not": [{"term": {"name": "John"}}]}})
        );
        assert_eq!(
            compile(Predicate::ne("id", json!([1, 2]))),
            json!({"bool": {"must_not": [{"terms": {"id": [1, 2]}}]}})
        );
    }

    #[test]
    fn ranges() {
        assert_eq!(
            compile(Predicate::lt("age", 3)),
            json!({"range": {"age": {"lt": 3}}})
        );
        assert_eq!(
            compile(Predicate::lte("age", 3)),
            json!({"range": {"age": {"lte": 3}}})
        );
        assert_eq!(
            compile(Predicate::gt("age", 3)),
            json!({"range": {"age": {"gt": 3}}})
        );
        assert_eq!(
            compile(Predicate::gte("age", 3)),
            json!({"range": {"age": {"gte": 3}}})
        );
    }

    #[test]
    fn range_rejects_lists_and_null() {
        let err = Grammar
            .comparison("age", Operator::Gt, &json!([1, 2]))
            .unwrap_err();
        assert!(matches!(err, GrammarError::ExpectedScalar { .. }));
        let err = Grammar.comparison("age", Operator::Lt, &Value::Null).unwrap_err();
        assert!(matches!(err, GrammarError::NullValue { .. }));
    }

    #[test]
    fn between_needs_two_bounds() {
        assert_eq!(
            compile(Predicate::between("age", 45, 51)),
            json!({"range": {"age": {"gte": 45, "lte": 51}}})
        );
        for (value, actual) in [
            (json!([1]), 1),
            (json!([1, 2, 3]), 3),
            (json!(4), 1),
            (Value::Null, 0),
        ] {
            let err = Grammar
                .comparison("age", Operator::Between, &value)
                .unwrap_err();
            assert_eq!(
                err,
                GrammarError::Arity {
                    field: "age".into(),
                    operator: Operator::Between,
                    expected: 2,
                    actual,
                }
            );
        }
    }

    #[test]
    fn membership() {
        assert_eq!(
            compile(Predicate::is_in("tag", ["a", "b"])),
            json!({"terms": {"tag": ["a", "b"]}})
        );
        assert_eq!(
            compile(Predicate::is_in("tag", Vec::<String>::new())),
            json!({"missing": {"field": "tag"}})
        );
        assert_eq!(
            compile(Predicate::not_in("tag", ["a"])),
            json!({"bool": {"must_not": [{"terms": {"tag": ["a"]}}]}})
        );
        assert_eq!(
            compile(Predicate::not_in("tag", Vec::<String>::new())),
            json!({"exists": {"field": "tag"}})
        );
        let err = Grammar.comparison("tag", Operator::In, &json!("a")).unwrap_err();
        assert!(matches!(err, GrammarError::ExpectedList { .. }));
    }

    #[test]
    fn like_uses_prefix_for_trailing_percent_only() {
        assert_eq!(
            compile(Predicate::like("name", "Jo%")),
            json!({"prefix": {"name": "Jo"}})
        );
        assert_eq!(
            compile(Predicate::like("name", "%hn")),
            json!({"wildcard": {"name": "*hn"}})
        );
        assert_eq!(
            compile(Predicate::like("name", "J_h%")),
            json!({"wildcard": {"name": "J?h*"}})
        );
        assert_eq!(
            compile(Predicate::like("name", "%")),
            json!({"wildcard": {"name": "*"}})
        );
    }

    #[test]
    fn like_prefix_keeps_literal_wildcards_unescaped() {
        assert_eq!(
            compile(Predicate::like("name", "a*b%")),
            json!({"prefix": {"name": "a*b"}})
        );
    }

    #[test]
    fn like_list_is_an_or() {
        assert_eq!(
            compile(Predicate::like("name", json!(["Jo%", "%n"]))),
            json!({"bool": {
                "minimum_should_match": 1,
                "should": [
                    {"prefix": {"name": "Jo"}},
                    {"wildcard": {"name": "*n"}},
                ],
            }})
        );
    }

    #[test]
    fn like_requires_strings() {
        let err = Grammar.comparison("name", Operator::Like, &json!(3)).unwrap_err();
        assert!(matches!(err, GrammarError::ExpectedString { .. }));
        let err = Grammar
            .comparison("name", Operator::Like, &json!(["a", 3]))
            .unwrap_err();
        assert!(matches!(err, GrammarError::ExpectedString { .. }));
    }

    #[test]
    fn regex_is_verbatim() {
        assert_eq!(
            compile(Predicate::regex("code", "ab.*")),
            json!({"regexp": {"code": {"value": "ab.*"}}})
        );
        assert_eq!(
            compile(Predicate::regex("code", json!(["a+", "b+"]))),
            json!({"bool": {
                "minimum_should_match": 1,
                "should": [
                    {"regexp": {"code": {"value": "a+"}}},
                    {"regexp": {"code": {"value": "b+"}}},
                ],
            }})
        );
    }

    #[test]
    fn logical_combinators() {
        let p = Predicate::or([
            Predicate::eq("a", 1),
            Predicate::not(Predicate::eq("b", 2)),
        ]);
        assert_eq!(
            compile(p),
            json!({"bool": {
                "minimum_should_match": 1,
                "should": [
                    {"term": {"a": 1}},
                    {"bool": {"must_not": [{"term": {"b": 2}}]}},
                ],
            }})
        );
        assert_eq!(compile(Predicate::and([])), json!({"match_all": {}}));
        assert_eq!(
            compile(Predicate::and([Predicate::eq("a", 1)])),
            json!({"term": {"a": 1}})
        );
    }

    #[test]
    fn failure_anywhere_fails_the_whole_tree() {
        let p = Predicate::and([
            Predicate::eq("a", 1),
            Predicate::or([Predicate::eq("b", 2), Predicate::cmp("c", Operator::Between, 1)]),
        ]);
        assert!(matches!(
            Grammar.compile(&p),
            Err(GrammarError::Arity { .. })
        ));
    }

    #[test]
    fn raw_fragments_pass_through() {
        let fragment = json!({"match": {"body": "hello"}});
        assert_eq!(compile(Predicate::raw(fragment.clone())), fragment);
    }

    #[test]
    fn escape_reserved_characters() {
        assert_eq!(Grammar::escape("a.b"), r"a\.b");
        assert_eq!(Grammar::escape("(x|y)*"), r"\(x\|y\)\*");
        assert_eq!(Grammar::escape(r"c:\path"), r"c:\\path");
        assert_eq!(Grammar::escape("plain"), "plain");
    }

    #[test]
    fn like_to_wildcard_escapes_before_translating() {
        assert_eq!(Grammar::like_to_wildcard("*?P_r%"), r"\*\?P?r*");
        assert_eq!(Grammar::like_to_wildcard(r"a\b"), r"a\\b");
    }
}
