use crate::value::{CodecError, Document, Number, Value};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as Json, json};

///
/// WireTag
///
/// The store's attribute-value type codes, bit-exact. Also the vocabulary of
/// `attribute_type(...)` conditions.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum WireTag {
    S,
    N,
    Bool,
    Null,
    L,
    M,
    Ss,
    Ns,
}

impl WireTag {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::S => "S",
            Self::N => "N",
            Self::Bool => "BOOL",
            Self::Null => "NULL",
            Self::L => "L",
            Self::M => "M",
            Self::Ss => "SS",
            Self::Ns => "NS",
        }
    }
}

impl std::fmt::Display for WireTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encode a native value as the store's tagged wire form.
///
/// Empty sets are rejected up front; the store refuses them and catching the
/// case locally keeps the failure attributable to a value rather than a
/// request.
pub fn marshal(value: &Value) -> Result<Json, CodecError> {
    let wire = match value {
        Value::Null => json!({ "NULL": true }),
        Value::Bool(b) => json!({ "BOOL": b }),
        Value::Text(s) => json!({ "S": s }),
        Value::Number(n) => json!({ "N": n.as_str() }),
        Value::List(items) => {
            let items = items.iter().map(marshal).collect::<Result<Vec<_>, _>>()?;
            json!({ "L": items })
        }
        Value::Map(entries) => {
            json!({ "M": marshal_document(entries)? })
        }
        Value::TextSet(set) => {
            if set.is_empty() {
                return Err(CodecError::EmptySet { tag: WireTag::Ss });
            }
            json!({ "SS": set.iter().collect::<Vec<_>>() })
        }
        Value::NumberSet(set) => {
            if set.is_empty() {
                return Err(CodecError::EmptySet { tag: WireTag::Ns });
            }
            json!({ "NS": set.iter().map(Number::as_str).collect::<Vec<_>>() })
        }
    };

    Ok(wire)
}

/// Encode a whole document as a wire item (attribute name -> tagged value).
pub fn marshal_document(doc: &Document) -> Result<Json, CodecError> {
    let mut out = JsonMap::with_capacity(doc.len());
    for (attr, value) in doc {
        out.insert(attr.clone(), marshal(value)?);
    }

    Ok(Json::Object(out))
}

/// Decode a tagged wire value back to its native form.
///
/// Unknown tags are outside the representable domain and surface as
/// `UnsupportedValueType`; a recognized tag with the wrong payload shape is
/// `MalformedWire`.
pub fn unmarshal(wire: &Json) -> Result<Value, CodecError> {
    let Some(obj) = wire.as_object() else {
        return Err(malformed("attribute value is not an object"));
    };
    if obj.len() != 1 {
        return Err(malformed("attribute value must carry exactly one tag"));
    }
    let (tag, body) = obj.iter().next().map(|(k, v)| (k.as_str(), v)).unwrap_or(("", &Json::Null));

    match tag {
        "NULL" => match body.as_bool() {
            Some(true) => Ok(Value::Null),
            _ => Err(malformed("NULL payload must be literal true")),
        },
        "BOOL" => body
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| malformed("BOOL payload must be a boolean")),
        "S" => body
            .as_str()
            .map(Value::text)
            .ok_or_else(|| malformed("S payload must be a string")),
        "N" => {
            let text = body.as_str().ok_or_else(|| malformed("N payload must be a string"))?;
            Ok(Value::Number(Number::parse(text)?))
        }
        "L" => {
            let items = body.as_array().ok_or_else(|| malformed("L payload must be an array"))?;
            let items = items.iter().map(unmarshal).collect::<Result<Vec<_>, _>>()?;
            Ok(Value::List(items))
        }
        "M" => Ok(Value::Map(unmarshal_document(body)?)),
        "SS" => {
            let items = body.as_array().ok_or_else(|| malformed("SS payload must be an array"))?;
            let mut set = std::collections::BTreeSet::new();
            for item in items {
                let s = item.as_str().ok_or_else(|| malformed("SS element must be a string"))?;
                set.insert(s.to_string());
            }
            if set.is_empty() {
                return Err(CodecError::EmptySet { tag: WireTag::Ss });
            }
            Ok(Value::TextSet(set))
        }
        "NS" => {
            let items = body.as_array().ok_or_else(|| malformed("NS payload must be an array"))?;
            let mut set = std::collections::BTreeSet::new();
            for item in items {
                let s = item.as_str().ok_or_else(|| malformed("NS element must be a string"))?;
                set.insert(Number::parse(s)?);
            }
            if set.is_empty() {
                return Err(CodecError::EmptySet { tag: WireTag::Ns });
            }
            Ok(Value::NumberSet(set))
        }
        other => Err(CodecError::UnsupportedValueType {
            reason: format!("unknown wire tag {other:?}"),
        }),
    }
}

/// Decode a wire item into a document.
pub fn unmarshal_document(wire: &Json) -> Result<Document, CodecError> {
    let Some(obj) = wire.as_object() else {
        return Err(malformed("item is not an object"));
    };

    let mut doc = Document::new();
    for (attr, value) in obj {
        doc.insert(attr.clone(), unmarshal(value)?);
    }

    Ok(doc)
}

fn malformed(reason: &str) -> CodecError {
    CodecError::MalformedWire {
        reason: reason.to_string(),
    }
}
