//! Entity configuration contract.
//!
//! A configuration declares how one entity type is indexed. Only
//! [`entity_type`](EntityConfiguration::entity_type),
//! [`fields`](EntityConfiguration::fields) and
//! [`instantiate`](EntityConfiguration::instantiate) are required; the other
//! methods are optional capabilities. The mapper asks for each capability
//! once, when it is built, and keeps the answer.

use std::sync::Arc;

use serde_json::Value;

use super::analyzer::AnalyzerDeclaration;
use super::property::FieldDeclaration;
use crate::model::{Accessor, Entity};
use crate::search::predicate::Predicate;

/// Builds a predicate from caller-supplied arguments.
pub type ScopeFn = Arc<dyn Fn(&[Value]) -> Predicate + Send + Sync>;

/// Decides whether an entity belongs in the index.
pub type ShouldIndexFn = Arc<dyn Fn(&dyn Entity) -> bool + Send + Sync>;

/// Lists every entity to put in the index during a full rebuild.
pub type EnumerateFn = Arc<dyn Fn() -> Vec<Box<dyn Entity>> + Send + Sync>;

pub trait EntityConfiguration: Send + Sync {
    /// Entity type handled by this configuration, e.g. `"User"`.
    fn entity_type(&self) -> &str;

    /// Index name. Defaults to the entity type in snake case.
    fn index_name(&self) -> String {
        snake_case(self.entity_type())
    }

    /// Indexed fields, in declaration order.
    fn fields(&self) -> Vec<FieldDeclaration>;

    /// Create a blank entity for documents read back from the index.
    fn instantiate(&self) -> Box<dyn Entity>;

    /// Named analyzers referenced by the fields.
    fn analyzers(&self) -> Vec<(String, AnalyzerDeclaration)> {
        Vec::new()
    }

    /// Accessor for the document identifier.
    fn id_accessor(&self) -> Option<Arc<dyn Accessor>> {
        None
    }

    fn scopes(&self) -> Vec<(String, ScopeFn)> {
        Vec::new()
    }

    fn should_index(&self) -> Option<ShouldIndexFn> {
        None
    }

    fn enumerate(&self) -> Option<EnumerateFn> {
        None
    }
}

/// Which optional capabilities a configuration provides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub id: bool,
    pub scopes: bool,
    pub should_index: bool,
    pub enumerate: bool,
}

/// `UserProfile` -> `user_profile`, `HTTPLog` -> `http_log`.
pub(crate) fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if prev_lower || (prev_upper && next_lower) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else if c == ':' || c == '\\' || c == '-' || c == ' ' {
            if !out.ends_with('_') && !out.is_empty() {
                out.push('_');
            }
        } else {
            out.push(c);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_cases_entity_types() {
        assert_eq!(snake_case("User"), "user");
        assert_eq!(snake_case("UserProfile"), "user_profile");
        assert_eq!(snake_case("HTTPLog"), "http_log");
        assert_eq!(snake_case("Order2Line"), "order2_line");
        assert_eq!(snake_case("app::Invoice"), "app_invoice");
    }
}
