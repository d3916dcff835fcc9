//! The raw operation surface over a table: marshalling via the value codec,
//! expression compilation via `expr`, one request/response exchange per
//! operation. No connection state, no retries, no client-side locking.

mod transport;


use crate::{
    MAX_BATCH_GET_KEYS, MAX_BATCH_WRITE_REQUESTS,
    error::{Error, RequestError},
    expr::{Aliases, Condition, KeyCondition, Update, compile_projection},
    value::{Document, marshal, marshal_document, unmarshal_document},
};
use serde_json::{Map as JsonMap, Value as Json, json};

pub use transport::{Transport, TransportFailure, WireContext, WireError, map_failure};

///
/// Page
///
/// One page of query/scan results. `last_key` is a resumption point, not a
/// promise of more data.
///

#[derive(Debug)]
pub struct Page {
    pub items: Vec<Document>,
    pub last_key: Option<Document>,
}

///
/// QueryRequest
///

#[derive(Debug)]
pub struct QueryRequest {
    pub index: Option<String>,
    pub key: KeyCondition,
    pub filter: Option<Condition>,
    pub projection: Option<Vec<String>>,
    pub limit: Option<u32>,
    pub forward: bool,
    pub start_key: Option<Document>,
}

impl QueryRequest {
    #[must_use]
    pub const fn new(key: KeyCondition) -> Self {
        Self {
            index: None,
            key,
            filter: None,
            projection: None,
            limit: None,
            forward: true,
            start_key: None,
        }
    }
}

///
/// ScanRequest
///

#[derive(Debug, Default)]
pub struct ScanRequest {
    pub index: Option<String>,
    pub filter: Option<Condition>,
    pub projection: Option<Vec<String>>,
    pub limit: Option<u32>,
    pub start_key: Option<Document>,
}

///
/// WriteRequest
///
/// One element of a grouped write: a full item to put or a key to delete.
/// Unprocessed elements of a partial wire-level failure come back in this
/// same shape for caller-driven retry.
///

#[derive(Clone, Debug, PartialEq)]
pub enum WriteRequest {
    Put(Document),
    Delete(Document),
}

///
/// Table
///
/// Thin wire surface bound to one table name and a transport.
///

pub struct Table<T> {
    name: String,
    transport: T,
}

impl<T: Transport> Table<T> {
    pub fn new(name: impl Into<String>, transport: T) -> Self {
        Self {
            name: name.into(),
            transport,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fetch one item by its full primary key. Absent items are `None`, not
    /// an error.
    pub fn get_item(&self, key: &Document) -> Result<Option<Document>, Error> {
        let body = json!({
            "TableName": self.name,
            "Key": marshal_document(key)?,
        });
        let response = self.send("GetItem", body)?;

        match response.get("Item") {
            Some(item) => Ok(Some(unmarshal_document(item)?)),
            None => Ok(None),
        }
    }

    pub fn put_item(&self, item: &Document, condition: Option<&Condition>) -> Result<(), Error> {
        let mut body = JsonMap::new();
        body.insert("TableName".to_string(), json!(self.name));
        body.insert("Item".to_string(), marshal_document(item)?);

        let mut aliases = Aliases::new();
        if let Some(condition) = condition {
            let expr = condition.compile(&mut aliases)?;
            body.insert("ConditionExpression".to_string(), json!(expr));
        }
        attach_aliases(&mut body, aliases)?;

        self.send("PutItem", Json::Object(body))?;

        Ok(())
    }

    pub fn update_item(
        &self,
        key: &Document,
        update: &Update,
        condition: Option<&Condition>,
    ) -> Result<(), Error> {
        let mut body = JsonMap::new();
        body.insert("TableName".to_string(), json!(self.name));
        body.insert("Key".to_string(), marshal_document(key)?);

        let mut aliases = Aliases::new();
        let expr = update.compile(&mut aliases)?;
        body.insert("UpdateExpression".to_string(), json!(expr));
        if let Some(condition) = condition {
            let expr = condition.compile(&mut aliases)?;
            body.insert("ConditionExpression".to_string(), json!(expr));
        }
        attach_aliases(&mut body, aliases)?;

        self.send("UpdateItem", Json::Object(body))?;

        Ok(())
    }

    pub fn delete_item(&self, key: &Document, condition: Option<&Condition>) -> Result<(), Error> {
        let mut body = JsonMap::new();
        body.insert("TableName".to_string(), json!(self.name));
        body.insert("Key".to_string(), marshal_document(key)?);

        let mut aliases = Aliases::new();
        if let Some(condition) = condition {
            let expr = condition.compile(&mut aliases)?;
            body.insert("ConditionExpression".to_string(), json!(expr));
        }
        attach_aliases(&mut body, aliases)?;

        self.send("DeleteItem", Json::Object(body))?;

        Ok(())
    }

    pub fn query(&self, request: &QueryRequest) -> Result<Page, Error> {
        let mut body = JsonMap::new();
        body.insert("TableName".to_string(), json!(self.name));
        if let Some(index) = &request.index {
            body.insert("IndexName".to_string(), json!(index));
        }

        let mut aliases = Aliases::new();
        let key_expr = request.key.compile(&mut aliases)?;
        body.insert("KeyConditionExpression".to_string(), json!(key_expr));
        if let Some(filter) = &request.filter {
            let expr = filter.compile(&mut aliases)?;
            body.insert("FilterExpression".to_string(), json!(expr));
        }
        if let Some(projection) = &request.projection {
            let expr = compile_projection(projection, &mut aliases)?;
            body.insert("ProjectionExpression".to_string(), json!(expr));
        }
        attach_aliases(&mut body, aliases)?;

        if let Some(limit) = request.limit {
            body.insert("Limit".to_string(), json!(limit));
        }
        if !request.forward {
            body.insert("ScanIndexForward".to_string(), json!(false));
        }
        if let Some(start_key) = &request.start_key {
            body.insert("ExclusiveStartKey".to_string(), marshal_document(start_key)?);
        }

        let response = self.send("Query", Json::Object(body))?;

        parse_page(&response)
    }

    pub fn scan(&self, request: &ScanRequest) -> Result<Page, Error> {
        let mut body = JsonMap::new();
        body.insert("TableName".to_string(), json!(self.name));
        if let Some(index) = &request.index {
            body.insert("IndexName".to_string(), json!(index));
        }

        let mut aliases = Aliases::new();
        if let Some(filter) = &request.filter {
            let expr = filter.compile(&mut aliases)?;
            body.insert("FilterExpression".to_string(), json!(expr));
        }
        if let Some(projection) = &request.projection {
            let expr = compile_projection(projection, &mut aliases)?;
            body.insert("ProjectionExpression".to_string(), json!(expr));
        }
        attach_aliases(&mut body, aliases)?;

        if let Some(limit) = request.limit {
            body.insert("Limit".to_string(), json!(limit));
        }
        if let Some(start_key) = &request.start_key {
            body.insert("ExclusiveStartKey".to_string(), marshal_document(start_key)?);
        }

        let response = self.send("Scan", Json::Object(body))?;

        parse_page(&response)
    }

    /// Grouped point reads. The key-count limit is enforced before anything
    /// is dispatched; absent keys are silently omitted from the result.
    pub fn batch_get(&self, keys: &[Document]) -> Result<Vec<Document>, Error> {
        if keys.len() > MAX_BATCH_GET_KEYS {
            return Err(RequestError::BatchGetTooLarge {
                count: keys.len(),
                max: MAX_BATCH_GET_KEYS,
            }
            .into());
        }
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let keys = keys
            .iter()
            .map(marshal_document)
            .collect::<Result<Vec<_>, _>>()?;
        let body = json!({
            "RequestItems": { &self.name: { "Keys": keys } },
        });

        let response = self.send("BatchGetItem", body)?;
        let items = response
            .get("Responses")
            .and_then(|r| r.get(&self.name))
            .and_then(Json::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        items.iter().map(|item| Ok(unmarshal_document(item)?)).collect()
    }

    /// Grouped writes. The combined count limit is enforced before dispatch;
    /// whatever the store leaves unprocessed is handed back typed, never
    /// retried here.
    pub fn batch_write(&self, requests: &[WriteRequest]) -> Result<Vec<WriteRequest>, Error> {
        if requests.is_empty() {
            return Err(RequestError::EmptyBatchWrite.into());
        }
        if requests.len() > MAX_BATCH_WRITE_REQUESTS {
            return Err(RequestError::BatchWriteTooLarge {
                count: requests.len(),
                max: MAX_BATCH_WRITE_REQUESTS,
            }
            .into());
        }

        let entries = requests
            .iter()
            .map(|request| {
                Ok(match request {
                    WriteRequest::Put(item) => {
                        json!({ "PutRequest": { "Item": marshal_document(item)? } })
                    }
                    WriteRequest::Delete(key) => {
                        json!({ "DeleteRequest": { "Key": marshal_document(key)? } })
                    }
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;
        let body = json!({
            "RequestItems": { &self.name: entries },
        });

        let response = self.send("BatchWriteItem", body)?;

        parse_unprocessed(&response, &self.name)
    }

    fn send(&self, action: &str, body: Json) -> Result<Json, Error> {
        self.transport
            .send(action, body)
            .map_err(|failure| Error::Wire(map_failure(failure)))
    }
}

/// Move the allocator's maps into the request body, if any were used.
fn attach_aliases(body: &mut JsonMap<String, Json>, aliases: Aliases) -> Result<(), Error> {
    if aliases.is_empty() {
        return Ok(());
    }

    let (names, values) = aliases.into_maps();
    if !names.is_empty() {
        body.insert("ExpressionAttributeNames".to_string(), json!(names));
    }
    if !values.is_empty() {
        let mut wire = JsonMap::with_capacity(values.len());
        for (alias, value) in &values {
            wire.insert(alias.clone(), marshal(value)?);
        }
        body.insert("ExpressionAttributeValues".to_string(), Json::Object(wire));
    }

    Ok(())
}

fn parse_page(response: &Json) -> Result<Page, Error> {
    let items = response
        .get("Items")
        .and_then(Json::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .map(|item| Ok(unmarshal_document(item)?))
        .collect::<Result<Vec<_>, Error>>()?;
    let last_key = match response.get("LastEvaluatedKey") {
        Some(key) => Some(unmarshal_document(key)?),
        None => None,
    };

    Ok(Page { items, last_key })
}

fn parse_unprocessed(response: &Json, table: &str) -> Result<Vec<WriteRequest>, Error> {
    let entries = response
        .get("UnprocessedItems")
        .and_then(|u| u.get(table))
        .and_then(Json::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    entries
        .iter()
        .map(|entry| {
            if let Some(item) = entry.get("PutRequest").and_then(|p| p.get("Item")) {
                Ok(WriteRequest::Put(unmarshal_document(item)?))
            } else if let Some(key) = entry.get("DeleteRequest").and_then(|d| d.get("Key")) {
                Ok(WriteRequest::Delete(unmarshal_document(key)?))
            } else {
                Err(crate::value::CodecError::MalformedWire {
                    reason: "unprocessed entry is neither put nor delete".to_string(),
                }
                .into())
            }
        })
        .collect()
}
