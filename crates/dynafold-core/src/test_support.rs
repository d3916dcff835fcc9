//! In-memory transport double. Interprets the slice of the wire protocol
//! the engine actually emits: conditional put/update/delete, query and scan
//! with pagination, and the batch endpoints. Expressions are parsed from
//! their compiled string form, so tests exercise the real wire output.

use crate::table::{Transport, TransportFailure};
use serde_json::{Map as JsonMap, Value as Json, json};
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;

type Item = JsonMap<String, Json>;

///
/// MemoryIndex
///

#[derive(Clone, Debug)]
struct MemoryIndex {
    name: String,
    pk_attr: String,
    sk_attr: Option<String>,
}

///
/// MemoryTransport
///
/// One table, one primary key pair, any number of secondary indexes.
/// Items live as wire JSON so every request passes through the real codec.
///

pub struct MemoryTransport {
    pk_attr: String,
    sk_attr: Option<String>,
    indexes: Vec<MemoryIndex>,
    items: RefCell<Vec<Item>>,
    actions: RefCell<Vec<String>>,
    fail_next: RefCell<Option<TransportFailure>>,
    leave_unprocessed: Cell<usize>,
}

impl MemoryTransport {
    pub fn new(pk_attr: &str, sk_attr: Option<&str>) -> Self {
        Self {
            pk_attr: pk_attr.to_string(),
            sk_attr: sk_attr.map(str::to_string),
            indexes: Vec::new(),
            items: RefCell::new(Vec::new()),
            actions: RefCell::new(Vec::new()),
            fail_next: RefCell::new(None),
            leave_unprocessed: Cell::new(0),
        }
    }

    pub fn with_index(mut self, name: &str, pk_attr: &str, sk_attr: Option<&str>) -> Self {
        self.indexes.push(MemoryIndex {
            name: name.to_string(),
            pk_attr: pk_attr.to_string(),
            sk_attr: sk_attr.map(str::to_string),
        });
        self
    }

    /// Actions dispatched so far, for fail-fast assertions.
    pub fn actions(&self) -> Vec<String> {
        self.actions.borrow().clone()
    }

    pub fn item_count(&self) -> usize {
        self.items.borrow().len()
    }

    /// Fetch a stored item by primary key strings, bypassing the wire.
    pub fn raw_item(&self, pk: &str, sk: Option<&str>) -> Option<Json> {
        self.items
            .borrow()
            .iter()
            .find(|item| {
                wire_str(item.get(&self.pk_attr)) == Some(pk.to_string())
                    && self.sk_attr.as_ref().is_none_or(|attr| {
                        wire_str(item.get(attr)).as_deref() == sk
                    })
            })
            .map(|item| Json::Object(item.clone()))
    }

    /// Fail the next exchange with the given error body.
    pub fn fail_next(&self, status_code: u16, error_type: &str, message: &str) {
        *self.fail_next.borrow_mut() = Some(TransportFailure {
            status_code,
            body: json!({
                "__type": format!("com.amazonaws.dynamodb.v20120810#{error_type}"),
                "Message": message,
            }),
            request_id: Some("req-memory-1".to_string()),
        });
    }

    /// Leave the trailing `n` entries of the next batch write unprocessed.
    pub fn leave_unprocessed(&self, n: usize) {
        self.leave_unprocessed.set(n);
    }

    fn conditional_check_failed() -> TransportFailure {
        TransportFailure {
            status_code: 400,
            body: json!({
                "__type": "com.amazonaws.dynamodb.v20120810#ConditionalCheckFailedException",
                "Message": "The conditional request failed",
            }),
            request_id: Some("req-memory-1".to_string()),
        }
    }

    fn primary_key_of(&self, item: &Item) -> (String, Option<String>) {
        let pk = wire_str(item.get(&self.pk_attr)).unwrap_or_default();
        let sk = self
            .sk_attr
            .as_ref()
            .and_then(|attr| wire_str(item.get(attr)));
        (pk, sk)
    }

    fn position_of_key(&self, key: &Item) -> Option<usize> {
        let pk = wire_str(key.get(&self.pk_attr))?;
        let sk = self
            .sk_attr
            .as_ref()
            .and_then(|attr| wire_str(key.get(attr)));
        self.items
            .borrow()
            .iter()
            .position(|item| self.primary_key_of(item) == (pk.clone(), sk.clone()))
    }

    fn get_item(&self, body: &Json) -> Json {
        let key = as_object(body.get("Key"));
        match self.position_of_key(&key) {
            Some(pos) => json!({ "Item": self.items.borrow()[pos].clone() }),
            None => json!({}),
        }
    }

    fn put_item(&self, body: &Json) -> Result<Json, TransportFailure> {
        let item = as_object(body.get("Item"));
        let pos = self.position_of_key(&item);
        let existing = pos.map(|p| self.items.borrow()[p].clone());

        if let Some(expr) = body.get("ConditionExpression").and_then(Json::as_str) {
            let env = Env::of(body);
            if !eval_condition(expr, existing.as_ref(), &env) {
                return Err(Self::conditional_check_failed());
            }
        }

        let mut items = self.items.borrow_mut();
        match pos {
            Some(p) => items[p] = item,
            None => items.push(item),
        }

        Ok(json!({}))
    }

    fn update_item(&self, body: &Json) -> Result<Json, TransportFailure> {
        let key = as_object(body.get("Key"));
        let pos = self.position_of_key(&key);
        let existing = pos.map(|p| self.items.borrow()[p].clone());

        let env = Env::of(body);
        if let Some(expr) = body.get("ConditionExpression").and_then(Json::as_str)
            && !eval_condition(expr, existing.as_ref(), &env)
        {
            return Err(Self::conditional_check_failed());
        }

        // The store upserts when no condition guards existence.
        let mut item = existing.unwrap_or_else(|| key.clone());
        let expr = body
            .get("UpdateExpression")
            .and_then(Json::as_str)
            .expect("update carries an expression");
        apply_update(expr, &mut item, &env);

        let mut items = self.items.borrow_mut();
        match pos {
            Some(p) => items[p] = item,
            None => items.push(item),
        }

        Ok(json!({}))
    }

    fn delete_item(&self, body: &Json) -> Result<Json, TransportFailure> {
        let key = as_object(body.get("Key"));
        let pos = self.position_of_key(&key);

        if let Some(expr) = body.get("ConditionExpression").and_then(Json::as_str) {
            let existing = pos.map(|p| self.items.borrow()[p].clone());
            let env = Env::of(body);
            if !eval_condition(expr, existing.as_ref(), &env) {
                return Err(Self::conditional_check_failed());
            }
        }

        if let Some(p) = pos {
            self.items.borrow_mut().remove(p);
        }

        Ok(json!({}))
    }

    fn index_for(&self, body: &Json) -> (String, Option<String>) {
        match body.get("IndexName").and_then(Json::as_str) {
            Some(name) => {
                let index = self
                    .indexes
                    .iter()
                    .find(|i| i.name == name)
                    .unwrap_or_else(|| panic!("mock transport: unknown index {name}"));
                (index.pk_attr.clone(), index.sk_attr.clone())
            }
            None => (self.pk_attr.clone(), self.sk_attr.clone()),
        }
    }

    fn query(&self, body: &Json) -> Json {
        let (pk_attr, sk_attr) = self.index_for(body);
        let env = Env::of(body);
        let key_expr = body
            .get("KeyConditionExpression")
            .and_then(Json::as_str)
            .expect("query carries a key condition");

        let (pk_value, sort_test) = parse_key_condition(key_expr, &env, &pk_attr, sk_attr.as_deref());

        let mut matches: Vec<Item> = self
            .items
            .borrow()
            .iter()
            .filter(|item| item.get(&pk_attr) == Some(&pk_value))
            // Sparse index: items missing the index sort attribute are
            // invisible through it.
            .filter(|item| sk_attr.as_ref().is_none_or(|attr| item.contains_key(attr)))
            .filter(|item| match (&sort_test, &sk_attr) {
                (Some(test), Some(attr)) => test.matches(item.get(attr)),
                _ => true,
            })
            .cloned()
            .collect();

        if let Some(attr) = &sk_attr {
            matches.sort_by(|a, b| compare_wire(a.get(attr), b.get(attr)));
        }
        let forward = body
            .get("ScanIndexForward")
            .and_then(Json::as_bool)
            .unwrap_or(true);
        if !forward {
            matches.reverse();
        }

        self.paginate(body, matches, &env, sk_attr.as_deref())
    }

    fn scan(&self, body: &Json) -> Json {
        let (_, sk_attr) = self.index_for(body);
        let env = Env::of(body);

        let mut matches: Vec<Item> = self.items.borrow().clone();
        matches.sort_by(|a, b| {
            self.primary_key_of(a).cmp(&self.primary_key_of(b))
        });

        self.paginate(body, matches, &env, sk_attr.as_deref())
    }

    fn paginate(&self, body: &Json, matches: Vec<Item>, env: &Env, sk_attr: Option<&str>) -> Json {
        let mut matches = matches;
        if let Some(filter) = body.get("FilterExpression").and_then(Json::as_str) {
            matches.retain(|item| eval_condition(filter, Some(item), env));
        }

        let start = match body.get("ExclusiveStartKey") {
            Some(start_key) => {
                let start_key = as_object(Some(start_key));
                let pk = wire_str(start_key.get(&self.pk_attr));
                let sk = self
                    .sk_attr
                    .as_ref()
                    .and_then(|attr| wire_str(start_key.get(attr)));
                matches
                    .iter()
                    .position(|item| {
                        let (ipk, isk) = self.primary_key_of(item);
                        Some(ipk) == pk && isk == sk
                    })
                    .map_or(0, |p| p + 1)
            }
            None => 0,
        };

        let limit = body
            .get("Limit")
            .and_then(Json::as_u64)
            .map_or(usize::MAX, |l| l as usize);
        let end = (start + limit).min(matches.len());
        let page: Vec<Item> = matches[start..end].to_vec();
        let more = end < matches.len();

        let last_key = if more {
            page.last().map(|item| {
                let mut key = Item::new();
                key.insert(
                    self.pk_attr.clone(),
                    item.get(&self.pk_attr).cloned().unwrap_or(Json::Null),
                );
                if let Some(attr) = &self.sk_attr
                    && let Some(v) = item.get(attr)
                {
                    key.insert(attr.clone(), v.clone());
                }
                if let Some(attr) = sk_attr
                    && let Some(v) = item.get(attr)
                {
                    key.insert(attr.to_string(), v.clone());
                }
                Json::Object(key)
            })
        } else {
            None
        };

        let projection = body
            .get("ProjectionExpression")
            .and_then(Json::as_str)
            .map(|expr| {
                expr.split(", ")
                    .map(|alias| env.name(alias))
                    .collect::<Vec<_>>()
            });
        let page: Vec<Json> = page
            .into_iter()
            .map(|item| match &projection {
                Some(attrs) => {
                    let projected: Item = item
                        .into_iter()
                        .filter(|(k, _)| attrs.contains(k))
                        .collect();
                    Json::Object(projected)
                }
                None => Json::Object(item),
            })
            .collect();

        let mut response = json!({ "Items": page });
        if let Some(key) = last_key {
            response["LastEvaluatedKey"] = key;
        }

        response
    }

    fn batch_get(&self, body: &Json, table: &str) -> Json {
        let keys = body
            .get("RequestItems")
            .and_then(|r| r.get(table))
            .and_then(|t| t.get("Keys"))
            .and_then(Json::as_array)
            .cloned()
            .unwrap_or_default();

        let found: Vec<Json> = keys
            .iter()
            .filter_map(|key| {
                let key = as_object(Some(key));
                self.position_of_key(&key)
                    .map(|p| Json::Object(self.items.borrow()[p].clone()))
            })
            .collect();

        json!({ "Responses": { table: found } })
    }

    fn batch_write(&self, body: &Json, table: &str) -> Json {
        let entries = body
            .get("RequestItems")
            .and_then(|r| r.get(table))
            .and_then(Json::as_array)
            .cloned()
            .unwrap_or_default();

        let skip = self.leave_unprocessed.replace(0);
        let process_until = entries.len().saturating_sub(skip);
        let mut unprocessed = Vec::new();

        for (i, entry) in entries.iter().enumerate() {
            if i >= process_until {
                unprocessed.push(entry.clone());
                continue;
            }
            if let Some(put) = entry.get("PutRequest") {
                let item = as_object(put.get("Item"));
                match self.position_of_key(&item) {
                    Some(p) => self.items.borrow_mut()[p] = item,
                    None => self.items.borrow_mut().push(item),
                }
            } else if let Some(delete) = entry.get("DeleteRequest") {
                let key = as_object(delete.get("Key"));
                if let Some(p) = self.position_of_key(&key) {
                    self.items.borrow_mut().remove(p);
                }
            }
        }

        if unprocessed.is_empty() {
            json!({})
        } else {
            json!({ "UnprocessedItems": { table: unprocessed } })
        }
    }
}

impl Transport for MemoryTransport {
    fn send(&self, action: &str, body: Json) -> Result<Json, TransportFailure> {
        self.actions.borrow_mut().push(action.to_string());

        if let Some(failure) = self.fail_next.borrow_mut().take() {
            return Err(failure);
        }

        let table = body
            .get("TableName")
            .and_then(Json::as_str)
            .map(str::to_string)
            .or_else(|| {
                body.get("RequestItems")
                    .and_then(Json::as_object)
                    .and_then(|r| r.keys().next().cloned())
            })
            .unwrap_or_default();

        match action {
            "GetItem" => Ok(self.get_item(&body)),
            "PutItem" => self.put_item(&body),
            "UpdateItem" => self.update_item(&body),
            "DeleteItem" => self.delete_item(&body),
            "Query" => Ok(self.query(&body)),
            "Scan" => Ok(self.scan(&body)),
            "BatchGetItem" => Ok(self.batch_get(&body, &table)),
            "BatchWriteItem" => Ok(self.batch_write(&body, &table)),
            other => panic!("mock transport: unsupported action {other}"),
        }
    }
}

///
/// Env
///
/// Alias environment of one request body.
///

struct Env {
    names: JsonMap<String, Json>,
    values: JsonMap<String, Json>,
}

impl Env {
    fn of(body: &Json) -> Self {
        Self {
            names: as_object(body.get("ExpressionAttributeNames")),
            values: as_object(body.get("ExpressionAttributeValues")),
        }
    }

    fn name(&self, alias: &str) -> String {
        self.names
            .get(alias)
            .and_then(Json::as_str)
            .unwrap_or_else(|| panic!("mock transport: unresolved name alias {alias}"))
            .to_string()
    }

    fn value(&self, alias: &str) -> Json {
        self.values
            .get(alias)
            .unwrap_or_else(|| panic!("mock transport: unresolved value alias {alias}"))
            .clone()
    }
}

fn as_object(value: Option<&Json>) -> Item {
    value
        .and_then(Json::as_object)
        .cloned()
        .unwrap_or_default()
}

/// The scalar payload of an S/N/BOOL wire value, as text.
fn wire_str(value: Option<&Json>) -> Option<String> {
    let obj = value?.as_object()?;
    let (tag, body) = obj.iter().next()?;
    match tag.as_str() {
        "S" | "N" => body.as_str().map(str::to_string),
        "BOOL" => body.as_bool().map(|b| b.to_string()),
        _ => None,
    }
}

fn compare_wire(a: Option<&Json>, b: Option<&Json>) -> Ordering {
    let tag = |v: Option<&Json>| {
        v.and_then(Json::as_object)
            .and_then(|o| o.keys().next().cloned())
            .unwrap_or_default()
    };

    if tag(a) == "N" && tag(b) == "N" {
        let parse = |v: Option<&Json>| {
            wire_str(v)
                .and_then(|s| s.parse::<f64>().ok())
                .unwrap_or(f64::NEG_INFINITY)
        };
        return parse(a).partial_cmp(&parse(b)).unwrap_or(Ordering::Equal);
    }

    wire_str(a).cmp(&wire_str(b))
}

///
/// SortTest
///

enum SortTest {
    Compare(&'static str, Json),
    BeginsWith(String),
    Between(Json, Json),
}

impl SortTest {
    fn matches(&self, value: Option<&Json>) -> bool {
        match self {
            Self::Compare(op, bound) => {
                let ord = compare_wire(value, Some(bound));
                match *op {
                    "=" => ord == Ordering::Equal,
                    "<" => ord == Ordering::Less,
                    "<=" => ord != Ordering::Greater,
                    ">" => ord == Ordering::Greater,
                    ">=" => ord != Ordering::Less,
                    _ => unreachable!("unknown sort operator"),
                }
            }
            Self::BeginsWith(prefix) => {
                wire_str(value).is_some_and(|s| s.starts_with(prefix))
            }
            Self::Between(lo, hi) => {
                compare_wire(value, Some(lo)) != Ordering::Less
                    && compare_wire(value, Some(hi)) != Ordering::Greater
            }
        }
    }
}

fn parse_key_condition(
    expr: &str,
    env: &Env,
    pk_attr: &str,
    sk_attr: Option<&str>,
) -> (Json, Option<SortTest>) {
    let mut pk_value = None;
    let mut sort_test = None;

    for clause in split_top_level_and(expr) {
        if let Some(inner) = clause
            .strip_prefix("begins_with(")
            .and_then(|s| s.strip_suffix(')'))
        {
            let (name, value) = inner.split_once(", ").expect("begins_with arity");
            assert_eq!(Some(env.name(name).as_str()), sk_attr, "sort attr mismatch");
            let prefix = wire_str(Some(&env.value(value))).expect("string prefix");
            sort_test = Some(SortTest::BeginsWith(prefix));
        } else if let Some((name, rest)) = clause.split_once(" BETWEEN ") {
            let (lo, hi) = rest.split_once(" AND ").expect("between arity");
            assert_eq!(Some(env.name(name).as_str()), sk_attr, "sort attr mismatch");
            sort_test = Some(SortTest::Between(env.value(lo), env.value(hi)));
        } else {
            let mut parts = clause.splitn(3, ' ');
            let name = parts.next().expect("attr");
            let op = parts.next().expect("operator");
            let value = parts.next().expect("value");
            let field = env.name(name);
            if field == pk_attr && op == "=" {
                pk_value = Some(env.value(value));
            } else {
                assert_eq!(Some(field.as_str()), sk_attr, "sort attr mismatch");
                let op: &'static str = match op {
                    "=" => "=",
                    "<" => "<",
                    "<=" => "<=",
                    ">" => ">",
                    ">=" => ">=",
                    other => panic!("mock transport: bad sort operator {other}"),
                };
                sort_test = Some(SortTest::Compare(op, env.value(value)));
            }
        }
    }

    (
        pk_value.expect("key condition names the partition key"),
        sort_test,
    )
}

/// Split on top-level " AND " — never inside parentheses, and a BETWEEN
/// clause consumes exactly one following AND for its upper bound.
fn split_top_level_and(expr: &str) -> Vec<String> {
    let mut clauses = Vec::new();
    let mut depth = 0usize;
    let mut pending_between = false;
    let mut current = String::new();
    let mut i = 0;

    while i < expr.len() {
        if depth == 0 && expr[i..].starts_with(" AND ") {
            if pending_between {
                pending_between = false;
                current.push_str(" AND ");
            } else {
                clauses.push(std::mem::take(&mut current));
            }
            i += 5;
            continue;
        }
        if expr[i..].starts_with(" BETWEEN ") {
            pending_between = true;
            current.push_str(" BETWEEN ");
            i += 9;
            continue;
        }
        let ch = expr[i..].chars().next().expect("in-bounds");
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
        current.push(ch);
        i += ch.len_utf8();
    }
    if !current.is_empty() {
        clauses.push(current);
    }

    clauses
}

fn eval_condition(expr: &str, item: Option<&Item>, env: &Env) -> bool {
    split_top_level_and(expr)
        .iter()
        .all(|clause| eval_clause(clause, item, env))
}

fn eval_clause(clause: &str, item: Option<&Item>, env: &Env) -> bool {
    let lookup = |alias: &str| -> Option<Json> {
        let field = env.name(alias);
        item.and_then(|i| i.get(&field).cloned())
    };

    if let Some(inner) = clause
        .strip_prefix("attribute_not_exists(")
        .and_then(|s| s.strip_suffix(')'))
    {
        return lookup(inner).is_none();
    }
    if let Some(inner) = clause
        .strip_prefix("attribute_exists(")
        .and_then(|s| s.strip_suffix(')'))
    {
        return lookup(inner).is_some();
    }
    if let Some(inner) = clause
        .strip_prefix("begins_with(")
        .and_then(|s| s.strip_suffix(')'))
    {
        let (name, value) = inner.split_once(", ").expect("begins_with arity");
        let prefix = wire_str(Some(&env.value(value))).expect("string prefix");
        return wire_str(lookup(name).as_ref()).is_some_and(|s| s.starts_with(&prefix));
    }
    if let Some(inner) = clause
        .strip_prefix("contains(")
        .and_then(|s| s.strip_suffix(')'))
    {
        let (name, value) = inner.split_once(", ").expect("contains arity");
        let needle = env.value(value);
        let stored = lookup(name);
        return match stored.as_ref().and_then(Json::as_object) {
            Some(obj) => match obj.iter().next() {
                Some((tag, body)) if tag == "S" => {
                    let needle = wire_str(Some(&needle)).unwrap_or_default();
                    body.as_str().is_some_and(|s| s.contains(&needle))
                }
                Some((tag, body)) if tag == "SS" || tag == "NS" || tag == "L" => body
                    .as_array()
                    .is_some_and(|items| {
                        items.iter().any(|i| {
                            i == &needle
                                || Some(i) == needle.get("S")
                                || Some(i) == needle.get("N")
                        })
                    }),
                _ => false,
            },
            None => false,
        };
    }
    if let Some((name, rest)) = clause.split_once(" BETWEEN ") {
        let (lo, hi) = rest.split_once(" AND ").expect("between arity");
        let value = lookup(name);
        return compare_wire(value.as_ref(), Some(&env.value(lo))) != Ordering::Less
            && compare_wire(value.as_ref(), Some(&env.value(hi))) != Ordering::Greater;
    }

    let mut parts = clause.splitn(3, ' ');
    let name = parts.next().expect("attr");
    let op = parts.next().expect("operator");
    let value = parts.next().expect("value");
    let stored = lookup(name);
    let bound = env.value(value);

    match op {
        "=" => stored.as_ref() == Some(&bound),
        "<" => compare_wire(stored.as_ref(), Some(&bound)) == Ordering::Less,
        "<=" => compare_wire(stored.as_ref(), Some(&bound)) != Ordering::Greater,
        ">" => compare_wire(stored.as_ref(), Some(&bound)) == Ordering::Greater,
        ">=" => compare_wire(stored.as_ref(), Some(&bound)) != Ordering::Less,
        other => panic!("mock transport: unsupported operator {other}"),
    }
}

fn apply_update(expr: &str, item: &mut Item, env: &Env) {
    for (verb, section) in split_verbs(expr) {
        for op in section.split(", ") {
            match verb {
                "SET" => apply_set(op, item, env),
                "ADD" => apply_add(op, item, env),
                "REMOVE" => {
                    item.remove(&env.name(op.trim()));
                }
                "DELETE" => apply_delete(op, item, env),
                other => panic!("mock transport: unknown verb {other}"),
            }
        }
    }
}

fn split_verbs(expr: &str) -> Vec<(&'static str, String)> {
    const VERBS: [&str; 4] = ["SET", "ADD", "REMOVE", "DELETE"];

    let mut sections = Vec::new();
    let mut rest = expr;

    while !rest.is_empty() {
        let verb = VERBS
            .iter()
            .find(|v| rest.starts_with(**v) && rest.as_bytes().get(v.len()) == Some(&b' '))
            .copied()
            .unwrap_or_else(|| panic!("mock transport: bad update expression {expr}"));
        rest = &rest[verb.len() + 1..];

        // Section runs until the next top-level verb keyword.
        let next = VERBS
            .iter()
            .filter_map(|v| rest.find(&format!(" {v} ")))
            .min();
        match next {
            Some(pos) => {
                sections.push((verb, rest[..pos].to_string()));
                rest = &rest[pos + 1..];
            }
            None => {
                sections.push((verb, rest.to_string()));
                rest = "";
            }
        }
    }

    sections
}

fn apply_set(op: &str, item: &mut Item, env: &Env) {
    let (target, rhs) = op.split_once(" = ").expect("set op shape");
    let target = env.name(target);

    let value = if let Some(inner) = rhs
        .strip_prefix("if_not_exists(")
        .and_then(|s| s.strip_suffix(')'))
    {
        let (source, default) = inner.split_once(", ").expect("if_not_exists arity");
        item.get(&env.name(source))
            .cloned()
            .unwrap_or_else(|| env.value(default))
    } else if let Some(inner) = rhs
        .strip_prefix("list_append(")
        .and_then(|s| s.strip_suffix(')'))
    {
        let (source, tail) = inner.split_once(", ").expect("list_append arity");
        let mut list = item
            .get(&env.name(source))
            .and_then(|v| v.get("L"))
            .and_then(Json::as_array)
            .cloned()
            .unwrap_or_default();
        let tail = env.value(tail);
        if let Some(extra) = tail.get("L").and_then(Json::as_array) {
            list.extend(extra.clone());
        }
        json!({ "L": list })
    } else if let Some((source, value)) = rhs.split_once(" + ") {
        arith(item, env, source, value, 1.0)
    } else if let Some((source, value)) = rhs.split_once(" - ") {
        arith(item, env, source, value, -1.0)
    } else {
        env.value(rhs)
    };

    item.insert(target, value);
}

fn arith(item: &Item, env: &Env, source: &str, value: &str, sign: f64) -> Json {
    let base = item
        .get(&env.name(source))
        .and_then(|v| v.get("N"))
        .and_then(Json::as_str)
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);
    let delta = env
        .value(value)
        .get("N")
        .and_then(Json::as_str)
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);
    json!({ "N": format_number(sign.mul_add(delta, base)) })
}

fn apply_add(op: &str, item: &mut Item, env: &Env) {
    let (name, value) = op.split_once(' ').expect("add op shape");
    let field = env.name(name);
    let operand = env.value(value);

    if let Some(set) = operand.get("SS").and_then(Json::as_array) {
        let mut stored = item
            .get(&field)
            .and_then(|v| v.get("SS"))
            .and_then(Json::as_array)
            .cloned()
            .unwrap_or_default();
        for entry in set {
            if !stored.contains(entry) {
                stored.push(entry.clone());
            }
        }
        item.insert(field, json!({ "SS": stored }));
        return;
    }

    let base = item
        .get(&field)
        .and_then(|v| v.get("N"))
        .and_then(Json::as_str)
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);
    let delta = operand
        .get("N")
        .and_then(Json::as_str)
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);
    item.insert(field, json!({ "N": format_number(base + delta) }));
}

fn apply_delete(op: &str, item: &mut Item, env: &Env) {
    let (name, value) = op.split_once(' ').expect("delete op shape");
    let field = env.name(name);
    let operand = env.value(value);

    let removing: Vec<Json> = operand
        .get("SS")
        .or_else(|| operand.get("NS"))
        .and_then(Json::as_array)
        .cloned()
        .unwrap_or_default();
    if let Some(stored) = item.get_mut(&field) {
        for tag in ["SS", "NS"] {
            if let Some(entries) = stored.get_mut(tag).and_then(Json::as_array_mut) {
                entries.retain(|e| !removing.contains(e));
            }
        }
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 9e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}
