//! Declarative index-key derivation. Each key slot is a plain
//! `{dependencies, derive}` pair so the entity engine can reason about
//! dependency coverage with a set-inclusion check, without ever invoking the
//! derivation speculatively.


use crate::value::Document;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error as ThisError;

/// Segment separator of a derived key: `derive(doc).join("#")`.
pub const KEY_SEPARATOR: &str = "#";

///
/// IndexError
///

#[derive(Debug, ThisError)]
pub enum IndexError {
    #[error("cannot derive {attr:?}: dependency field {field:?} is missing")]
    MissingDependency { attr: String, field: String },
}

/// Key derivation function. Must be pure and total over any document
/// containing all declared dependencies.
pub type DeriveFn = Arc<dyn Fn(&Document) -> Vec<String> + Send + Sync>;

///
/// KeySlot
///
/// One key slot (partition or sort) of an index: the stored attribute name,
/// the entity fields the derived value depends on, and the derivation.
///

#[derive(Clone)]
pub struct KeySlot {
    attr: String,
    dependencies: BTreeSet<String>,
    derive: DeriveFn,
}

impl KeySlot {
    pub fn new<const N: usize>(
        attr: impl Into<String>,
        dependencies: [&str; N],
        derive: impl Fn(&Document) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            attr: attr.into(),
            dependencies: dependencies.iter().map(|s| (*s).to_string()).collect(),
            derive: Arc::new(derive),
        }
    }

    /// Common case: the derived key is the text/number rendering of a single
    /// field.
    #[must_use]
    pub fn field(attr: impl Into<String>, field: &str) -> Self {
        let name = field.to_string();
        Self::new(attr, [field], move |doc| {
            vec![render_field(doc, &name)]
        })
    }

    #[must_use]
    pub fn attr(&self) -> &str {
        &self.attr
    }

    #[must_use]
    pub const fn dependencies(&self) -> &BTreeSet<String> {
        &self.dependencies
    }

    /// Whether every declared dependency is present in `doc`. Coverage is a
    /// set-inclusion check; the derivation never runs to answer it.
    #[must_use]
    pub fn covered_by(&self, doc: &Document) -> bool {
        self.dependencies.iter().all(|dep| doc.contains_key(dep))
    }

    /// Whether any declared dependency is present in `doc`.
    #[must_use]
    pub fn touched_by(&self, doc: &Document) -> Option<&str> {
        self.dependencies
            .iter()
            .map(String::as_str)
            .find(|dep| doc.contains_key(*dep))
    }

    /// Derive the stored key value. Fails if a dependency is absent; the
    /// derivation is only total over complete dependency sets.
    pub fn derive(&self, doc: &Document) -> Result<String, IndexError> {
        for dep in &self.dependencies {
            if !doc.contains_key(dep) {
                return Err(IndexError::MissingDependency {
                    attr: self.attr.clone(),
                    field: dep.clone(),
                });
            }
        }

        Ok((self.derive)(doc).join(KEY_SEPARATOR))
    }
}

impl fmt::Debug for KeySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySlot")
            .field("attr", &self.attr)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

///
/// IndexDef
///
/// A primary index (unnamed) or a named secondary index: a partition slot
/// and an optional sort slot. Declared once at construction, immutable
/// thereafter.
///

#[derive(Clone, Debug)]
pub struct IndexDef {
    name: Option<String>,
    partition: KeySlot,
    sort: Option<KeySlot>,
}

impl IndexDef {
    #[must_use]
    pub const fn primary(partition: KeySlot, sort: Option<KeySlot>) -> Self {
        Self {
            name: None,
            partition,
            sort,
        }
    }

    #[must_use]
    pub fn secondary(name: impl Into<String>, partition: KeySlot, sort: Option<KeySlot>) -> Self {
        Self {
            name: Some(name.into()),
            partition,
            sort,
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub const fn partition(&self) -> &KeySlot {
        &self.partition
    }

    #[must_use]
    pub const fn sort(&self) -> Option<&KeySlot> {
        self.sort.as_ref()
    }

    /// Both slots in partition-then-sort order.
    pub fn slots(&self) -> impl Iterator<Item = &KeySlot> {
        std::iter::once(&self.partition).chain(self.sort.as_ref())
    }
}

/// Render a single field for key derivation; absent fields render empty,
/// which `derive` rules out by checking dependencies first.
#[must_use]
pub fn render_field(doc: &Document, field: &str) -> String {
    use crate::value::Value;

    match doc.get(field) {
        Some(Value::Text(s)) => s.clone(),
        Some(Value::Number(n)) => n.as_str().to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => format!("{other:?}"),
        None => String::new(),
    }
}
