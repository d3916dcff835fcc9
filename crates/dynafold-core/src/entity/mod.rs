//! The entity engine: composes the table surface, the schema chain, and
//! declarative index derivation into insert/update/get/query/scan/batch
//! operations, and owns metadata stamping and the optimistic-concurrency
//! conditions.

mod query;


use crate::{
    error::{Error, RequestError},
    expr::{Condition, Update},
    index::IndexDef,
    meta,
    obs::{self, OpKind},
    schema::SchemaChain,
    table::{Table, Transport, WriteRequest},
    value::{Document, Value},
};

pub use query::{Cursor, EntityQuery, EntityScan, QueryResponse, SortBound};

///
/// EntityDef
///
/// Everything a caller declares once: the entity type tag, primary-key
/// derivation, secondary indexes, and the versioned schema chain. Immutable
/// after construction.
///

#[derive(Clone, Debug)]
pub struct EntityDef {
    tag: String,
    primary: IndexDef,
    indexes: Vec<IndexDef>,
    schema: SchemaChain,
}

impl EntityDef {
    #[must_use]
    pub fn new(tag: impl Into<String>, primary: IndexDef, schema: SchemaChain) -> Self {
        Self {
            tag: tag.into(),
            primary,
            indexes: Vec::new(),
            schema,
        }
    }

    #[must_use]
    pub fn with_index(mut self, index: IndexDef) -> Self {
        debug_assert!(index.name().is_some(), "secondary indexes must be named");
        self.indexes.push(index);
        self
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub const fn primary(&self) -> &IndexDef {
        &self.primary
    }

    #[must_use]
    pub fn indexes(&self) -> &[IndexDef] {
        &self.indexes
    }

    #[must_use]
    pub const fn schema(&self) -> &SchemaChain {
        &self.schema
    }

    fn index_named(&self, name: &str) -> Result<&IndexDef, RequestError> {
        self.indexes
            .iter()
            .find(|index| index.name() == Some(name))
            .ok_or_else(|| RequestError::UnknownIndex {
                name: name.to_string(),
            })
    }
}

///
/// InsertOptions
///

#[derive(Clone, Copy, Debug, Default)]
pub struct InsertOptions {
    /// Treat an existing item under the same key as success instead of
    /// `ItemAlreadyExists`. The stored item is never touched either way.
    pub ignore_if_already_present: bool,
}

///
/// UpdateOptions
///

#[derive(Debug, Default)]
pub struct UpdateOptions {
    /// Optimistic concurrency: the revision the caller last read. The write
    /// only lands if the stored revision still matches.
    pub expected_revision: Option<u64>,
    /// Extra caller condition, AND-joined with the engine's own.
    pub condition: Option<Condition>,
}

///
/// Entity
///
/// An entity definition bound to a table. Every operation is one logical
/// exchange; concurrency correctness rides entirely on the store's
/// conditional writes.
///

pub struct Entity<T> {
    def: EntityDef,
    table: Table<T>,
}

impl<T: Transport> Entity<T> {
    pub const fn new(def: EntityDef, table: Table<T>) -> Self {
        Self { def, table }
    }

    #[must_use]
    pub const fn def(&self) -> &EntityDef {
        &self.def
    }

    /// Pure create: validate, stamp metadata and every index key, then put
    /// with a "primary key must not exist" condition. Never overwrites.
    pub fn insert(&self, doc: Document) -> Result<Document, Error> {
        self.insert_with(doc, InsertOptions::default())
    }

    pub fn insert_with(&self, doc: Document, options: InsertOptions) -> Result<Document, Error> {
        obs::record(OpKind::Insert);

        let item = self.prepare_item(doc)?;
        let condition = self.absence_condition();

        match self.table.put_item(&item, Some(&condition)) {
            Ok(()) => Ok(item),
            Err(error) if is_condition_failure(&error) => {
                if options.ignore_if_already_present {
                    Ok(item)
                } else {
                    Err(Error::ItemAlreadyExists)
                }
            }
            Err(error) => Err(error),
        }
    }

    /// Partial update under optimistic concurrency.
    ///
    /// # Panics
    ///
    /// Panics if the patch touches a declared dependency of the primary
    /// key's derivation. Primary keys are immutable once inserted; such a
    /// patch is a programmer error, not a recoverable failure.
    pub fn update(&self, key: &Document, patch: Document) -> Result<(), Error> {
        self.update_with(key, patch, UpdateOptions::default())
    }

    pub fn update_with(
        &self,
        key: &Document,
        patch: Document,
        options: UpdateOptions,
    ) -> Result<(), Error> {
        obs::record(OpKind::Update);

        for slot in self.def.primary.slots() {
            if let Some(field) = slot.touched_by(&patch) {
                panic!(
                    "update patch touches {field:?}, a dependency of primary key \
                     attribute {:?}; primary keys are immutable",
                    slot.attr()
                );
            }
        }

        let mut update = Update::new();
        for (field, value) in &patch {
            update = update.assign(field.clone(), value.clone());
        }

        // Per secondary slot: recompute only when the patch covers every
        // declared dependency. Partial coverage must never write a
        // half-derived key, so the slot is left untouched instead.
        for index in &self.def.indexes {
            for slot in index.slots() {
                if slot.covered_by(&patch) {
                    let derived = slot.derive(&patch)?;
                    update = update.assign(slot.attr(), Value::text(derived));
                }
            }
        }

        update = update.plus(meta::REVISION_ATTR, meta::REVISION_ATTR, 1);

        self.send_conditional_update(key, &update, options)
    }

    /// Soft delete: set the tombstone flag through the normal update path.
    /// The item remains in the store and in every index.
    pub fn delete(&self, key: &Document) -> Result<(), Error> {
        self.delete_with(key, UpdateOptions::default())
    }

    pub fn delete_with(&self, key: &Document, options: UpdateOptions) -> Result<(), Error> {
        obs::record(OpKind::Delete);

        let update = Update::new()
            .assign(meta::TOMBSTONE_ATTR, true)
            .plus(meta::REVISION_ATTR, meta::REVISION_ATTR, 1);

        self.send_conditional_update(key, &update, options)
    }

    /// Hard delete of the store-level item.
    pub fn remove(&self, key: &Document) -> Result<(), Error> {
        obs::record(OpKind::Remove);

        let key = self.primary_key(key)?;
        self.table.delete_item(&key, None)
    }

    /// Fetch by primary key; absent items are `None`. Present items decode
    /// through the schema chain to the latest version.
    pub fn get(&self, key: &Document) -> Result<Option<Document>, Error> {
        obs::record(OpKind::Get);

        let key = self.primary_key(key)?;
        match self.table.get_item(&key)? {
            None => Ok(None),
            Some(item) => Ok(Some(self.def.schema.decode(item)?)),
        }
    }

    /// Query the primary index or a named secondary index. Bounds are given
    /// in entity-field terms and run through the same derivation as stored
    /// keys.
    pub fn query(&self, request: EntityQuery) -> Result<QueryResponse, Error> {
        obs::record(OpKind::Query);

        let index = match request.index_name() {
            Some(name) => self.def.index_named(name)?,
            None => &self.def.primary,
        };
        let table_request = request.into_table_request(index)?;
        let projected = table_request.projection.is_some();

        let page = self.table.query(&table_request)?;
        self.page_to_response(page, projected)
    }

    /// Scan: the same filter/projection/pagination machinery without a key
    /// condition.
    pub fn scan(&self, request: EntityScan) -> Result<QueryResponse, Error> {
        obs::record(OpKind::Scan);

        if let Some(name) = request.index_name() {
            self.def.index_named(name)?;
        }
        let table_request = request.into_table_request();
        let projected = table_request.projection.is_some();

        let page = self.table.scan(&table_request)?;
        self.page_to_response(page, projected)
    }

    /// Grouped point reads by primary key. Absent keys are silently omitted
    /// from the result; the key-count limit fails fast before dispatch.
    pub fn batch_get(&self, keys: &[Document]) -> Result<Vec<Document>, Error> {
        obs::record(OpKind::BatchGet);

        let keys = keys
            .iter()
            .map(|key| self.primary_key(key))
            .collect::<Result<Vec<_>, _>>()?;

        self.table
            .batch_get(&keys)?
            .into_iter()
            .map(|item| self.def.schema.decode(item).map_err(Error::from))
            .collect()
    }

    /// Grouped writes. Puts run through the same validate/stamp/derive
    /// pipeline as insert, but unconditionally; deletes are hard deletes by
    /// key. Unprocessed elements come back typed for caller-driven retry.
    pub fn batch_write(
        &self,
        puts: Vec<Document>,
        deletes: Vec<Document>,
    ) -> Result<Vec<WriteRequest>, Error> {
        obs::record(OpKind::BatchWrite);

        let mut requests = Vec::with_capacity(puts.len() + deletes.len());
        for doc in puts {
            requests.push(WriteRequest::Put(self.prepare_item(doc)?));
        }
        for key in deletes {
            requests.push(WriteRequest::Delete(self.primary_key(&key)?));
        }

        self.table.batch_write(&requests)
    }

    /// Validate and stamp a fresh record: schema `make`, metadata, and every
    /// index key slot derived unconditionally.
    fn prepare_item(&self, doc: Document) -> Result<Document, Error> {
        let mut item = self.def.schema.make(doc)?;
        item.insert(meta::REVISION_ATTR.to_string(), Value::from(0));
        item.insert(meta::TOMBSTONE_ATTR.to_string(), Value::Bool(false));
        item.insert(meta::ENTITY_ATTR.to_string(), Value::text(&self.def.tag));

        for index in std::iter::once(&self.def.primary).chain(&self.def.indexes) {
            for slot in index.slots() {
                let derived = slot.derive(&item)?;
                item.insert(slot.attr().to_string(), Value::Text(derived));
            }
        }

        Ok(item)
    }

    /// The wire key document for a caller-supplied primary-key value.
    fn primary_key(&self, key: &Document) -> Result<Document, Error> {
        let mut out = Document::new();
        for slot in self.def.primary.slots() {
            let derived = slot.derive(key)?;
            out.insert(slot.attr().to_string(), Value::Text(derived));
        }

        Ok(out)
    }

    fn absence_condition(&self) -> Condition {
        let slots: Vec<Condition> = self
            .def
            .primary
            .slots()
            .map(|slot| Condition::not_exists(slot.attr()))
            .collect();

        Condition::and(slots)
    }

    fn send_conditional_update(
        &self,
        key: &Document,
        update: &Update,
        options: UpdateOptions,
    ) -> Result<(), Error> {
        let mut conditions = vec![Condition::eq(
            meta::VERSION_ATTR,
            u64::from(self.def.schema.latest()),
        )];
        if let Some(revision) = options.expected_revision {
            conditions.push(Condition::eq(meta::REVISION_ATTR, revision));
        }
        if let Some(extra) = options.condition {
            conditions.push(extra);
        }
        let condition = Condition::and(conditions);

        let key = self.primary_key(key)?;
        match self.table.update_item(&key, update, Some(&condition)) {
            Err(error) if is_condition_failure(&error) => Err(Error::NoItemToUpdate),
            other => other,
        }
    }

    fn page_to_response(
        &self,
        page: crate::table::Page,
        projected: bool,
    ) -> Result<QueryResponse, Error> {
        // Projected items are partial records; migrations need whole
        // documents, so they are returned as stored.
        let items = if projected {
            page.items
        } else {
            page.items
                .into_iter()
                .map(|item| self.def.schema.decode(item))
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(QueryResponse {
            items,
            cursor: page.last_key.map(Cursor::new),
        })
    }
}

fn is_condition_failure(error: &Error) -> bool {
    matches!(
        error,
        Error::Wire(crate::table::WireError::ConditionalCheckFailed(_))
    )
}
