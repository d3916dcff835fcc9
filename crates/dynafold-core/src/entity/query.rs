use crate::{
    error::{Error, RequestError},
    expr::{Condition, KeyCondition, SortCondition},
    index::IndexDef,
    table::{QueryRequest, ScanRequest},
    value::{Document, Value},
};
use serde::{Deserialize, Serialize};

///
/// Cursor
///
/// Opaque resumption token. Callers hold it and hand it back verbatim; its
/// contents are engine-private. Serializable so it can cross process
/// boundaries between pages.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Cursor(Document);

impl Cursor {
    pub(crate) const fn new(key: Document) -> Self {
        Self(key)
    }

    pub(crate) fn into_key(self) -> Document {
        self.0
    }
}

///
/// QueryResponse
///
/// One page of decoded items. A present cursor means the page boundary was
/// hit, not that more matching items necessarily exist.
///

#[derive(Debug)]
pub struct QueryResponse {
    pub items: Vec<Document>,
    pub cursor: Option<Cursor>,
}

///
/// SortBound
///
/// A sort-key bound in entity-field terms. Each document carries the sort
/// slot's dependency fields; the bound value is produced by the same
/// derivation that produced the stored keys, so callers never handle joined
/// key strings.
///

#[derive(Clone, Debug)]
pub enum SortBound {
    Eq(Document),
    Lt(Document),
    Lte(Document),
    Gt(Document),
    Gte(Document),
    BeginsWith(Document),
    Between(Document, Document),
}

///
/// EntityQuery
///

#[derive(Debug)]
pub struct EntityQuery {
    index: Option<String>,
    partition: Document,
    sort: Option<SortBound>,
    filter: Option<Condition>,
    projection: Option<Vec<String>>,
    limit: Option<u32>,
    descending: bool,
    cursor: Option<Cursor>,
}

impl EntityQuery {
    /// Query the primary index for one partition. The document carries the
    /// partition slot's dependency fields.
    #[must_use]
    pub const fn partition(partition: Document) -> Self {
        Self {
            index: None,
            partition,
            sort: None,
            filter: None,
            projection: None,
            limit: None,
            descending: false,
            cursor: None,
        }
    }

    /// Query a named secondary index instead. The name is validated against
    /// the entity's declared indexes before anything is dispatched.
    #[must_use]
    pub fn on_index(name: impl Into<String>, partition: Document) -> Self {
        let mut query = Self::partition(partition);
        query.index = Some(name.into());
        query
    }

    #[must_use]
    pub fn sort(mut self, bound: SortBound) -> Self {
        self.sort = Some(bound);
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: Condition) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn projection(mut self, attrs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.projection = Some(attrs.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Walk the sort key in descending order.
    #[must_use]
    pub const fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    #[must_use]
    pub fn cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub(crate) fn index_name(&self) -> Option<&str> {
        self.index.as_deref()
    }

    /// Lower to a raw table request against the resolved index: derive the
    /// partition value and run every sort bound through the sort slot's
    /// derivation.
    pub(crate) fn into_table_request(self, index: &IndexDef) -> Result<QueryRequest, Error> {
        let partition_value = index.partition().derive(&self.partition)?;
        let mut key = KeyCondition::partition(index.partition().attr(), partition_value);

        if let Some(bound) = self.sort {
            let slot = index.sort().ok_or_else(|| RequestError::NoSortKey {
                index: index.name().unwrap_or("primary").to_string(),
            })?;
            let derived = |doc: &Document| -> Result<Value, Error> {
                Ok(Value::Text(slot.derive(doc)?))
            };
            let condition = match &bound {
                SortBound::Eq(doc) => SortCondition::Eq(derived(doc)?),
                SortBound::Lt(doc) => SortCondition::Lt(derived(doc)?),
                SortBound::Lte(doc) => SortCondition::Lte(derived(doc)?),
                SortBound::Gt(doc) => SortCondition::Gt(derived(doc)?),
                SortBound::Gte(doc) => SortCondition::Gte(derived(doc)?),
                SortBound::BeginsWith(doc) => SortCondition::BeginsWith(derived(doc)?),
                SortBound::Between(lo, hi) => {
                    SortCondition::Between(derived(lo)?, derived(hi)?)
                }
            };
            key = key.sort(slot.attr(), condition);
        }

        Ok(QueryRequest {
            index: self.index,
            key,
            filter: self.filter,
            projection: self.projection,
            limit: self.limit,
            forward: !self.descending,
            start_key: self.cursor.map(Cursor::into_key),
        })
    }
}

///
/// EntityScan
///

#[derive(Debug, Default)]
pub struct EntityScan {
    index: Option<String>,
    filter: Option<Condition>,
    projection: Option<Vec<String>>,
    limit: Option<u32>,
    cursor: Option<Cursor>,
}

impl EntityScan {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_index(name: impl Into<String>) -> Self {
        Self {
            index: Some(name.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn filter(mut self, filter: Condition) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn projection(mut self, attrs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.projection = Some(attrs.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub(crate) fn index_name(&self) -> Option<&str> {
        self.index.as_deref()
    }

    pub(crate) fn into_table_request(self) -> ScanRequest {
        ScanRequest {
            index: self.index,
            filter: self.filter,
            projection: self.projection,
            limit: self.limit,
            start_key: self.cursor.map(Cursor::into_key),
        }
    }
}
