//! Typed attribute accessors for rule targets
//!
//! Rules name the attribute they control as text. Instead of looking that
//! text up on every evaluation, a [`RuleSet`](super::RuleSet) resolves it
//! once, at load time, to a getter registered for the entity type. A rule
//! naming an attribute nobody registered fails to load.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Getter extracting one attribute of an entity as a JSON value
///
/// Absent attributes are reported as `Value::Null`.
pub type Getter<E> = Arc<dyn Fn(&E) -> Value + Send + Sync>;

type Resolver<E> = Arc<dyn Fn(&str) -> Option<Getter<E>> + Send + Sync>;

/// Attribute name → getter table for one entity type
pub struct AccessorMap<E> {
    getters: HashMap<String, Getter<E>>,
    resolver: Option<Resolver<E>>,
}

impl<E> Default for AccessorMap<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for AccessorMap<E> {
    fn clone(&self) -> Self {
        Self {
            getters: self.getters.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

impl<E> AccessorMap<E> {
    pub fn new() -> Self {
        Self {
            getters: HashMap::new(),
            resolver: None,
        }
    }

    /// Register a getter for an attribute name
    pub fn with<F>(mut self, name: &str, getter: F) -> Self
    where
        F: Fn(&E) -> Value + Send + Sync + 'static,
    {
        self.getters.insert(name.to_string(), Arc::new(getter));
        self
    }

    /// Register a fallback building getters for a family of names
    ///
    /// Consulted only for names without a registered getter; returning
    /// `None` rejects the name.
    pub fn with_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&str) -> Option<Getter<E>> + Send + Sync + 'static,
    {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Getter for `name`, if the entity type exposes it
    pub fn resolve(&self, name: &str) -> Option<Getter<E>> {
        self.getters
            .get(name)
            .cloned()
            .or_else(|| self.resolver.as_ref().and_then(|r| r(name)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.getters.keys().map(String::as_str)
    }
}

impl AccessorMap<Value> {
    /// Accessors for JSON entities: any dotted path is accepted
    ///
    /// Object segments select a key, array segments an index. A path that
    /// does not exist yields `null` rather than an error.
    pub fn json_paths() -> Self {
        AccessorMap::new().with_resolver(|path| {
            let segments: Vec<String> = path.split('.').map(str::to_string).collect();
            let getter: Getter<Value> = Arc::new(move |entity: &Value| lookup_path(entity, &segments));
            Some(getter)
        })
    }
}

impl<E> fmt::Debug for AccessorMap<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("AccessorMap")
            .field("names", &names)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

/// Follow a dotted path through a JSON value
pub fn lookup_path(entity: &Value, segments: &[String]) -> Value {
    let mut current = entity;
    for segment in segments {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return Value::Null,
        }
    }
    current.clone()
}
