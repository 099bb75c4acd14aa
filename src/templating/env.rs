//! Render-time state: the output accumulator and the namespace of bindings.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::templating::program::{Param, Program};

/// Host-provided callable, visible to every template under its name.
///
/// Helpers receive the output accumulator so they can write markup directly,
/// and evaluate to `null`.
pub type Helper = Arc<dyn Fn(&mut Output, &[Value]) -> Result<(), String> + Send + Sync>;

/// Named helpers merged into every namespace.
pub type Extensions = BTreeMap<String, Helper>;

/// Append-only list of rendered fragments.
///
/// One accumulator is owned by each top-level render call. Included templates,
/// macros and helpers write into the same accumulator, so their output lands
/// where they were invoked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    parts: Vec<String>,
}

impl Output {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment. Empty fragments are dropped.
    pub fn push(&mut self, text: impl Into<String>) {
        let text = text.into();
        if !text.is_empty() {
            self.parts.push(text);
        }
    }

    #[must_use]
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Concatenate every fragment.
    #[must_use]
    pub fn into_string(self) -> String {
        self.parts.concat()
    }
}

impl fmt::Write for Output {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push(s);
        Ok(())
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.parts.iter().try_for_each(|part| f.write_str(part))
    }
}

/// A macro defined by a `def` block.
#[derive(Debug)]
pub struct Macro {
    pub name: String,
    pub params: Vec<Param>,
    /// Program holding the body
    pub program: Arc<Program>,
    /// Instruction range of the body
    pub body: (usize, usize),
}

/// What a name is bound to.
#[derive(Clone)]
pub enum Binding {
    Value(Value),
    Macro(Arc<Macro>),
    Helper(Helper),
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Macro(m) => f.debug_tuple("Macro").field(&m.name).finish(),
            Self::Helper(_) => f.write_str("Helper(..)"),
        }
    }
}

/// Names visible to one template execution.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    bindings: HashMap<String, Binding>,
}

impl Namespace {
    /// Extensions first, then values; a value wins over a helper of the same
    /// name.
    #[must_use]
    pub fn new(extensions: &Extensions, values: Map<String, Value>) -> Self {
        let mut bindings: HashMap<String, Binding> = extensions
            .iter()
            .map(|(name, helper)| (name.clone(), Binding::Helper(Arc::clone(helper))))
            .collect();
        bindings.extend(values.into_iter().map(|(name, value)| (name, Binding::Value(value))));
        Self {
            bindings,
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    /// Value bound to `name`; macros and helpers are not values.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.bindings.get(name) {
            Some(Binding::Value(value)) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Bind `name`, returning the previous binding.
    pub fn insert(&mut self, name: impl Into<String>, binding: Binding) -> Option<Binding> {
        self.bindings.insert(name.into(), binding)
    }

    pub fn remove(&mut self, name: &str) -> Option<Binding> {
        self.bindings.remove(name)
    }

    /// Bound names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fmt::Write;

    #[test]
    fn test_output_accumulates_in_order() {
        let mut output = Output::new();
        output.push("a");
        output.push("");
        output.push(String::from("b"));
        write!(output, "{}", 1).unwrap();
        assert_eq!(output.parts(), ["a", "b", "1"]);
        assert_eq!(output.to_string(), "ab1");
        assert_eq!(output.into_string(), "ab1");
    }

    #[test]
    fn test_values_win_over_extensions() {
        let mut extensions = Extensions::new();
        let helper: Helper = Arc::new(|out: &mut Output, _: &[Value]| {
            out.push("helper");
            Ok(())
        });
        extensions.insert("title".to_string(), Arc::clone(&helper));
        extensions.insert("nav".to_string(), helper);

        let values = json!({"title": "Home"}).as_object().cloned().unwrap_or_default();
        let namespace = Namespace::new(&extensions, values);
        assert_eq!(namespace.value("title"), Some(&json!("Home")));
        assert!(matches!(namespace.get("nav"), Some(Binding::Helper(_))));
        assert_eq!(namespace.value("nav"), None);
        assert_eq!(namespace.names(), vec!["nav".to_string(), "title".to_string()]);
    }

    #[test]
    fn test_insert_returns_previous() {
        let mut namespace = Namespace::default();
        assert!(namespace.insert("x", Binding::Value(json!(1))).is_none());
        let previous = namespace.insert("x", Binding::Value(json!(2)));
        assert!(matches!(previous, Some(Binding::Value(v)) if v == json!(1)));
        assert!(namespace.remove("x").is_some());
        assert!(!namespace.contains("x"));
    }
}
