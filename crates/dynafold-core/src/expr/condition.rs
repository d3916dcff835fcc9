use crate::{
    expr::{Aliases, ExprError},
    value::{Value, WireTag},
};

///
/// CompareOp
///
/// Scalar comparison operators shared by condition leaves, sort-key bounds,
/// and `size(...)` predicates.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompareOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }
}

///
/// Condition
///
/// Pure boolean expression tree over item attributes. This layer carries no
/// schema knowledge; it only lowers to the wire grammar. `And`/`Or` are
/// n-ary and nest freely.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    And(Vec<Self>),
    Or(Vec<Self>),
    Compare {
        attr: String,
        op: CompareOp,
        value: Value,
    },
    BeginsWith {
        attr: String,
        prefix: Value,
    },
    Contains {
        attr: String,
        value: Value,
    },
    Between {
        attr: String,
        lo: Value,
        hi: Value,
    },
    Exists {
        attr: String,
        present: bool,
    },
    AttrType {
        attr: String,
        tag: WireTag,
    },
    Size {
        attr: String,
        op: CompareOp,
        size: u64,
    },
}

impl Condition {
    #[must_use]
    pub const fn and(conditions: Vec<Self>) -> Self {
        Self::And(conditions)
    }

    #[must_use]
    pub const fn or(conditions: Vec<Self>) -> Self {
        Self::Or(conditions)
    }

    #[must_use]
    pub fn eq(attr: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attr, CompareOp::Eq, value)
    }

    #[must_use]
    pub fn lt(attr: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attr, CompareOp::Lt, value)
    }

    #[must_use]
    pub fn lte(attr: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attr, CompareOp::Lte, value)
    }

    #[must_use]
    pub fn gt(attr: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attr, CompareOp::Gt, value)
    }

    #[must_use]
    pub fn gte(attr: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(attr, CompareOp::Gte, value)
    }

    #[must_use]
    pub fn compare(attr: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            attr: attr.into(),
            op,
            value: value.into(),
        }
    }

    #[must_use]
    pub fn begins_with(attr: impl Into<String>, prefix: impl Into<Value>) -> Self {
        Self::BeginsWith {
            attr: attr.into(),
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn contains(attr: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Contains {
            attr: attr.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn between(
        attr: impl Into<String>,
        lo: impl Into<Value>,
        hi: impl Into<Value>,
    ) -> Self {
        Self::Between {
            attr: attr.into(),
            lo: lo.into(),
            hi: hi.into(),
        }
    }

    #[must_use]
    pub fn exists(attr: impl Into<String>) -> Self {
        Self::Exists {
            attr: attr.into(),
            present: true,
        }
    }

    #[must_use]
    pub fn not_exists(attr: impl Into<String>) -> Self {
        Self::Exists {
            attr: attr.into(),
            present: false,
        }
    }

    #[must_use]
    pub fn attr_type(attr: impl Into<String>, tag: WireTag) -> Self {
        Self::AttrType {
            attr: attr.into(),
            tag,
        }
    }

    #[must_use]
    pub fn size(attr: impl Into<String>, op: CompareOp, size: u64) -> Self {
        Self::Size {
            attr: attr.into(),
            op,
            size,
        }
    }

    /// Lower this tree to a wire condition string, allocating placeholders
    /// through `aliases`.
    pub fn compile(&self, aliases: &mut Aliases) -> Result<String, ExprError> {
        compile_node(self, aliases, Join::None)
    }
}

/// Boolean join of the enclosing group, for parenthesization decisions.
#[derive(Clone, Copy, Eq, PartialEq)]
enum Join {
    None,
    And,
    Or,
}

/// AND binds tighter than OR in the wire grammar, so the only nesting that
/// needs parentheses is an OR group joined into an AND group. Same-operator
/// nesting is associative and stays flat.
fn compile_node(node: &Condition, aliases: &mut Aliases, parent: Join) -> Result<String, ExprError> {
    match node {
        Condition::And(children) => compile_group(children, aliases, Join::And, parent),
        Condition::Or(children) => compile_group(children, aliases, Join::Or, parent),
        Condition::Compare { attr, op, value } => {
            let name = aliases.name(attr);
            let value = aliases.value(value.clone());
            Ok(format!("{name} {} {value}", op.symbol()))
        }
        Condition::BeginsWith { attr, prefix } => {
            if !matches!(prefix, Value::Text(_)) {
                return Err(ExprError::BeginsWithNotText {
                    kind: prefix.kind(),
                });
            }
            let name = aliases.name(attr);
            let value = aliases.value(prefix.clone());
            Ok(format!("begins_with({name}, {value})"))
        }
        Condition::Contains { attr, value } => {
            let name = aliases.name(attr);
            let value = aliases.value(value.clone());
            Ok(format!("contains({name}, {value})"))
        }
        Condition::Between { attr, lo, hi } => {
            let name = aliases.name(attr);
            let lo = aliases.value(lo.clone());
            let hi = aliases.value(hi.clone());
            Ok(format!("{name} BETWEEN {lo} AND {hi}"))
        }
        Condition::Exists { attr, present } => {
            let name = aliases.name(attr);
            if *present {
                Ok(format!("attribute_exists({name})"))
            } else {
                Ok(format!("attribute_not_exists({name})"))
            }
        }
        Condition::AttrType { attr, tag } => {
            let name = aliases.name(attr);
            let value = aliases.value(Value::text(tag.as_str()));
            Ok(format!("attribute_type({name}, {value})"))
        }
        Condition::Size { attr, op, size } => {
            let name = aliases.name(attr);
            let value = aliases.value(Value::from(*size));
            Ok(format!("size({name}) {} {value}", op.symbol()))
        }
    }
}

fn compile_group(
    children: &[Condition],
    aliases: &mut Aliases,
    join: Join,
    parent: Join,
) -> Result<String, ExprError> {
    match children {
        [] => Err(ExprError::EmptyBooleanGroup),
        // A one-element group is transparent; it neither joins nor wraps.
        [only] => compile_node(only, aliases, parent),
        _ => {
            let parts = children
                .iter()
                .map(|child| compile_node(child, aliases, join))
                .collect::<Result<Vec<_>, _>>()?;
            let glue = if join == Join::And { " AND " } else { " OR " };
            let body = parts.join(glue);

            if join == Join::Or && parent == Join::And {
                Ok(format!("({body})"))
            } else {
                Ok(body)
            }
        }
    }
}
