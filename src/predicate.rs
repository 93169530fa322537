//! Predicate tree shared by both filter front-ends.
//!
//! A predicate is built bottom-up and never mutated afterwards. Storage back-ends consume it
//! either through [`crate::sql_compiler::SqlCompiler`] or in memory through
//! [`Predicate::matches`](crate::record).

use std::fmt;

use serde::Serialize;

/// Scalar attributes of a catalog object revision and of its bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Name,
    ProjectName,
    BucketId,
    BucketName,
    Kind,
    ContentType,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::ProjectName => "project_name",
            Field::BucketId => "bucket_id",
            Field::BucketName => "bucket_name",
            Field::Kind => "kind",
            Field::ContentType => "content_type",
        }
    }
}

/// Key-value namespaces stored in the metadata table of a revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    GenericInformation,
    Variable,
    /// Any metadata entry, whatever its label.
    Metadata,
}

impl Namespace {
    /// Metadata label this namespace is restricted to, `None` for unrestricted metadata.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            Namespace::GenericInformation => Some("generic_information"),
            Namespace::Variable => Some("variable"),
            Namespace::Metadata => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::GenericInformation => "generic_information",
            Namespace::Variable => "variable",
            Namespace::Metadata => "metadata",
        }
    }
}

/// Storage-level comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Ne,
    Like,
    NotLike,
    In,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::In => "IN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Integer(i64),
    IntegerList(Vec<i64>),
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<Vec<i64>> for Value {
    fn from(value: Vec<i64>) -> Self {
        Value::IntegerList(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(text) => write!(f, "{:?}", text),
            Value::Integer(n) => write!(f, "{}", n),
            Value::IntegerList(list) => {
                let items: Vec<String> = list.iter().map(ToString::to_string).collect();
                write!(f, "({})", items.join(", "))
            }
        }
    }
}

/// Boolean connective of a composite predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoolOp {
    And,
    Or,
}

impl fmt::Display for BoolOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoolOp::And => write!(f, "AND"),
            BoolOp::Or => write!(f, "OR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Matches every record.
    True,
    Leaf {
        field: Field,
        operator: Operator,
        value: Value,
    },
    KeyValue {
        namespace: Namespace,
        key: String,
        /// `Eq` or `Like`, depending on whether the key carries a wildcard.
        key_operator: Operator,
        operator: Operator,
        value: String,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn leaf(field: Field, operator: Operator, value: impl Into<Value>) -> Self {
        Predicate::Leaf {
            field,
            operator,
            value: value.into(),
        }
    }

    pub fn key_value(
        namespace: Namespace,
        key: impl Into<String>,
        key_operator: Operator,
        operator: Operator,
        value: impl Into<String>,
    ) -> Self {
        Predicate::KeyValue {
            namespace,
            key: key.into(),
            key_operator,
            operator,
            value: value.into(),
        }
    }

    /// Combines operands with `op`.
    ///
    /// Returns `None` for no operand and the operand itself when there is exactly one, so a
    /// composite never has a single child.
    pub fn combine(op: BoolOp, mut operands: Vec<Predicate>) -> Option<Predicate> {
        match operands.len() {
            0 => None,
            1 => operands.pop(),
            _ => Some(match op {
                BoolOp::And => Predicate::And(operands),
                BoolOp::Or => Predicate::Or(operands),
            }),
        }
    }

    /// Number of leaf and key-value predicates in the tree.
    pub fn leaf_count(&self) -> usize {
        match self {
            Predicate::True => 0,
            Predicate::Leaf { .. } | Predicate::KeyValue { .. } => 1,
            Predicate::And(children) | Predicate::Or(children) => {
                children.iter().map(Predicate::leaf_count).sum()
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::True => write!(f, "TRUE"),
            Predicate::Leaf {
                field,
                operator,
                value,
            } => write!(f, "{} {} {}", field.as_str(), operator.symbol(), value),
            Predicate::KeyValue {
                namespace,
                key,
                key_operator,
                operator,
                value,
            } => write!(
                f,
                "{}(key {} {:?}, value {} {:?})",
                namespace.as_str(),
                key_operator.symbol(),
                key,
                operator.symbol(),
                value
            ),
            Predicate::And(children) => write_composite(f, BoolOp::And, children),
            Predicate::Or(children) => write_composite(f, BoolOp::Or, children),
        }
    }
}

fn write_composite(f: &mut fmt::Formatter<'_>, op: BoolOp, children: &[Predicate]) -> fmt::Result {
    write!(f, "(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", op)?;
        }
        write!(f, "{}", child)?;
    }
    write!(f, ")")
}
