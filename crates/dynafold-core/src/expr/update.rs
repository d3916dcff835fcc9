use crate::{
    expr::{Aliases, ExprError},
    value::Value,
};

///
/// SetOp
///
/// One `SET` operation. The arithmetic and function forms carry a source
/// attribute so `counter = counter + :v` and `copy = if_not_exists(orig, :v)`
/// are both expressible.
///

#[derive(Clone, Debug, PartialEq)]
enum SetOp {
    Assign {
        attr: String,
        value: Value,
    },
    Plus {
        attr: String,
        source: String,
        value: Value,
    },
    Minus {
        attr: String,
        source: String,
        value: Value,
    },
    IfNotExists {
        attr: String,
        source: String,
        default: Value,
    },
    ListAppend {
        attr: String,
        source: String,
        list: Value,
    },
}

///
/// Update
///
/// Structured update expression: the four verb groups, each optional but at
/// least one required. Verbs render space-joined in the fixed order
/// `SET, ADD, REMOVE, DELETE`, each section at most once; operations within
/// a verb are comma-joined.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Update {
    set: Vec<SetOp>,
    add: Vec<(String, Value)>,
    remove: Vec<String>,
    delete: Vec<(String, Value)>,
}

impl Update {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn assign(mut self, attr: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.push(SetOp::Assign {
            attr: attr.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn plus(
        mut self,
        attr: impl Into<String>,
        source: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.set.push(SetOp::Plus {
            attr: attr.into(),
            source: source.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn minus(
        mut self,
        attr: impl Into<String>,
        source: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.set.push(SetOp::Minus {
            attr: attr.into(),
            source: source.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn if_not_exists(
        mut self,
        attr: impl Into<String>,
        source: impl Into<String>,
        default: impl Into<Value>,
    ) -> Self {
        self.set.push(SetOp::IfNotExists {
            attr: attr.into(),
            source: source.into(),
            default: default.into(),
        });
        self
    }

    #[must_use]
    pub fn list_append(
        mut self,
        attr: impl Into<String>,
        source: impl Into<String>,
        list: impl Into<Value>,
    ) -> Self {
        self.set.push(SetOp::ListAppend {
            attr: attr.into(),
            source: source.into(),
            list: list.into(),
        });
        self
    }

    /// `ADD` — numeric increment or set union.
    #[must_use]
    pub fn add(mut self, attr: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add.push((attr.into(), value.into()));
        self
    }

    /// `REMOVE` — drop an attribute.
    #[must_use]
    pub fn remove(mut self, attr: impl Into<String>) -> Self {
        self.remove.push(attr.into());
        self
    }

    /// `DELETE` — remove elements from a set attribute.
    #[must_use]
    pub fn delete(mut self, attr: impl Into<String>, value: impl Into<Value>) -> Self {
        self.delete.push((attr.into(), value.into()));
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.add.is_empty() && self.remove.is_empty() && self.delete.is_empty()
    }

    /// Lower to a wire update expression through the shared allocator.
    pub fn compile(&self, aliases: &mut Aliases) -> Result<String, ExprError> {
        if self.is_empty() {
            return Err(ExprError::EmptyUpdate);
        }

        let mut sections = Vec::with_capacity(4);

        if !self.set.is_empty() {
            let ops: Vec<String> = self.set.iter().map(|op| compile_set(op, aliases)).collect();
            sections.push(format!("SET {}", ops.join(", ")));
        }

        if !self.add.is_empty() {
            let ops: Vec<String> = self
                .add
                .iter()
                .map(|(attr, value)| {
                    let name = aliases.name(attr);
                    let value = aliases.value(value.clone());
                    format!("{name} {value}")
                })
                .collect();
            sections.push(format!("ADD {}", ops.join(", ")));
        }

        if !self.remove.is_empty() {
            let ops: Vec<String> = self.remove.iter().map(|attr| aliases.name(attr)).collect();
            sections.push(format!("REMOVE {}", ops.join(", ")));
        }

        if !self.delete.is_empty() {
            let ops: Vec<String> = self
                .delete
                .iter()
                .map(|(attr, value)| {
                    let name = aliases.name(attr);
                    let value = aliases.value(value.clone());
                    format!("{name} {value}")
                })
                .collect();
            sections.push(format!("DELETE {}", ops.join(", ")));
        }

        Ok(sections.join(" "))
    }
}

fn compile_set(op: &SetOp, aliases: &mut Aliases) -> String {
    match op {
        SetOp::Assign { attr, value } => {
            let name = aliases.name(attr);
            let value = aliases.value(value.clone());
            format!("{name} = {value}")
        }
        SetOp::Plus { attr, source, value } => {
            let name = aliases.name(attr);
            let source = aliases.name(source);
            let value = aliases.value(value.clone());
            format!("{name} = {source} + {value}")
        }
        SetOp::Minus { attr, source, value } => {
            let name = aliases.name(attr);
            let source = aliases.name(source);
            let value = aliases.value(value.clone());
            format!("{name} = {source} - {value}")
        }
        SetOp::IfNotExists { attr, source, default } => {
            let name = aliases.name(attr);
            let source = aliases.name(source);
            let value = aliases.value(default.clone());
            format!("{name} = if_not_exists({source}, {value})")
        }
        SetOp::ListAppend { attr, source, list } => {
            let name = aliases.name(attr);
            let source = aliases.name(source);
            let value = aliases.value(list.clone());
            format!("{name} = list_append({source}, {value})")
        }
    }
}
