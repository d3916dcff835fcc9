use crate::{
    expr::{Aliases, CompareOp, ExprError},
    value::Value,
};

///
/// SortCondition
///
/// The operator set the store accepts against a sort key. `BeginsWith` is
/// string-only and the compiler rejects anything else rather than coercing.
///

#[derive(Clone, Debug, PartialEq)]
pub enum SortCondition {
    Eq(Value),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    BeginsWith(Value),
    Between(Value, Value),
}

///
/// KeyCondition
///
/// Key clause of a query: partition key is always equality; the sort key
/// bound is optional.
///

#[derive(Clone, Debug, PartialEq)]
pub struct KeyCondition {
    partition_attr: String,
    partition_value: Value,
    sort: Option<(String, SortCondition)>,
}

impl KeyCondition {
    #[must_use]
    pub fn partition(attr: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            partition_attr: attr.into(),
            partition_value: value.into(),
            sort: None,
        }
    }

    #[must_use]
    pub fn sort(mut self, attr: impl Into<String>, condition: SortCondition) -> Self {
        self.sort = Some((attr.into(), condition));
        self
    }

    /// Lower to a wire key-condition string through the shared allocator.
    pub fn compile(&self, aliases: &mut Aliases) -> Result<String, ExprError> {
        let name = aliases.name(&self.partition_attr);
        let value = aliases.value(self.partition_value.clone());
        let mut expr = format!("{name} = {value}");

        if let Some((attr, condition)) = &self.sort {
            let name = aliases.name(attr);
            let clause = match condition {
                SortCondition::Eq(v) => compare(&name, CompareOp::Eq, v, aliases),
                SortCondition::Lt(v) => compare(&name, CompareOp::Lt, v, aliases),
                SortCondition::Lte(v) => compare(&name, CompareOp::Lte, v, aliases),
                SortCondition::Gt(v) => compare(&name, CompareOp::Gt, v, aliases),
                SortCondition::Gte(v) => compare(&name, CompareOp::Gte, v, aliases),
                SortCondition::BeginsWith(v) => {
                    if !matches!(v, Value::Text(_)) {
                        return Err(ExprError::BeginsWithNotText { kind: v.kind() });
                    }
                    let value = aliases.value(v.clone());
                    format!("begins_with({name}, {value})")
                }
                SortCondition::Between(lo, hi) => {
                    let lo = aliases.value(lo.clone());
                    let hi = aliases.value(hi.clone());
                    format!("{name} BETWEEN {lo} AND {hi}")
                }
            };
            expr.push_str(" AND ");
            expr.push_str(&clause);
        }

        Ok(expr)
    }
}

fn compare(name: &str, op: CompareOp, value: &Value, aliases: &mut Aliases) -> String {
    let value = aliases.value(value.clone());
    format!("{name} {} {value}", op.symbol())
}
