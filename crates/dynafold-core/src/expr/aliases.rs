use crate::value::Value;
use std::collections::BTreeMap;

///
/// Aliases
///
/// Placeholder allocator shared by every clause of one compiled request.
///
/// Attribute names are interned: the same field referenced twice yields the
/// same `#attrN` alias. Values are never interned: identical literals get
/// distinct `:valueN` aliases. Interning values would require equality
/// semantics that are ambiguous for composite values, and request size is
/// rarely the bottleneck; the asymmetry is deliberate.
///

#[derive(Debug, Default)]
pub struct Aliases {
    names: Vec<(String, String)>,
    values: Vec<(String, Value)>,
}

impl Aliases {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            names: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Alias an attribute name, reusing an existing alias for the same field.
    pub fn name(&mut self, field: &str) -> String {
        if let Some((_, alias)) = self.names.iter().find(|(f, _)| f == field) {
            return alias.clone();
        }

        let alias = format!("#attr{}", self.names.len());
        self.names.push((field.to_string(), alias.clone()));

        alias
    }

    /// Allocate a fresh value alias; every call yields a new placeholder.
    pub fn value(&mut self, value: Value) -> String {
        let alias = format!(":value{}", self.values.len());
        self.values.push((alias.clone(), value));

        alias
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.values.is_empty()
    }

    /// Finish allocation, producing the request's
    /// `ExpressionAttributeNames` / `ExpressionAttributeValues` maps.
    #[must_use]
    pub fn into_maps(self) -> (BTreeMap<String, String>, BTreeMap<String, Value>) {
        let names = self
            .names
            .into_iter()
            .map(|(field, alias)| (alias, field))
            .collect();
        let values = self.values.into_iter().collect();

        (names, values)
    }
}
