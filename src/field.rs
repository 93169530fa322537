//! Field resolution for filter-language clauses.
//!
//! Attribute literals map to [`Field`]s and pair types to [`Namespace`]s. Each resolved clause
//! then picks its predicate builder from a table keyed by the clause's lexical shape, so a
//! combination nobody registered is reported instead of silently producing a predicate.

use std::collections::HashMap;
use std::sync::OnceLock;

use tracing::trace;

use crate::ast::CompOp;
use crate::error::FilterError;
use crate::predicate::{Field, Namespace, Operator, Predicate};
use crate::sanitize::{has_wildcard, sanitize_literal};

pub type AtomicBuilder = fn(Field, String) -> Predicate;
pub type KeyValueBuilder = fn(Namespace, String, String) -> Predicate;

/// Lexical shape of an atomic clause such as `name != "wf*"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtomicClause {
    pub field: Field,
    pub operator: CompOp,
    pub has_wildcard: bool,
}

/// Lexical shape of a key-value clause such as `variable("CPU*", "4")`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyValueClause {
    pub namespace: Namespace,
    pub key_has_wildcard: bool,
    pub value_has_wildcard: bool,
}

pub struct FieldResolver {
    attributes: HashMap<&'static str, Field>,
    pair_types: HashMap<&'static str, Namespace>,
    atomic: HashMap<AtomicClause, AtomicBuilder>,
    key_value: HashMap<KeyValueClause, KeyValueBuilder>,
}

impl FieldResolver {
    /// A resolver that knows every attribute and pair type but has no builder registered.
    pub fn empty() -> Self {
        let attributes = HashMap::from([("name", Field::Name), ("project_name", Field::ProjectName)]);
        let pair_types = HashMap::from([
            ("generic_information", Namespace::GenericInformation),
            ("variable", Namespace::Variable),
        ]);
        Self {
            attributes,
            pair_types,
            atomic: HashMap::new(),
            key_value: HashMap::new(),
        }
    }

    /// Shared resolver with every atomic and key-value combination populated.
    pub fn standard() -> &'static FieldResolver {
        static STANDARD: OnceLock<FieldResolver> = OnceLock::new();
        STANDARD.get_or_init(|| {
            let mut resolver = FieldResolver::empty();
            for field in [Field::Name, Field::ProjectName] {
                resolver
                    .register_atomic(field, CompOp::Equal, false, |f, v| Predicate::leaf(f, Operator::Eq, v))
                    .register_atomic(field, CompOp::NotEqual, false, |f, v| Predicate::leaf(f, Operator::Ne, v))
                    .register_atomic(field, CompOp::Equal, true, |f, v| Predicate::leaf(f, Operator::Like, v))
                    .register_atomic(field, CompOp::NotEqual, true, |f, v| {
                        Predicate::leaf(f, Operator::NotLike, v)
                    });
            }
            for namespace in [Namespace::GenericInformation, Namespace::Variable] {
                resolver
                    .register_key_value(namespace, false, false, |n, k, v| {
                        Predicate::key_value(n, k, Operator::Eq, Operator::Eq, v)
                    })
                    .register_key_value(namespace, true, false, |n, k, v| {
                        Predicate::key_value(n, k, Operator::Like, Operator::Eq, v)
                    })
                    .register_key_value(namespace, false, true, |n, k, v| {
                        Predicate::key_value(n, k, Operator::Eq, Operator::Like, v)
                    })
                    .register_key_value(namespace, true, true, |n, k, v| {
                        Predicate::key_value(n, k, Operator::Like, Operator::Like, v)
                    });
            }
            resolver
        })
    }

    pub fn register_atomic(
        &mut self,
        field: Field,
        operator: CompOp,
        has_wildcard: bool,
        builder: AtomicBuilder,
    ) -> &mut Self {
        self.atomic.insert(
            AtomicClause {
                field,
                operator,
                has_wildcard,
            },
            builder,
        );
        self
    }

    pub fn register_key_value(
        &mut self,
        namespace: Namespace,
        key_has_wildcard: bool,
        value_has_wildcard: bool,
        builder: KeyValueBuilder,
    ) -> &mut Self {
        self.key_value.insert(
            KeyValueClause {
                namespace,
                key_has_wildcard,
                value_has_wildcard,
            },
            builder,
        );
        self
    }

    pub fn field(&self, attribute: &str) -> Result<Field, FilterError> {
        self.attributes
            .get(attribute.to_ascii_lowercase().as_str())
            .copied()
            .ok_or_else(|| FilterError::InvalidClause(format!("unknown attribute '{}'", attribute)))
    }

    pub fn namespace(&self, pair_type: &str) -> Result<Namespace, FilterError> {
        self.pair_types
            .get(pair_type.to_ascii_lowercase().as_str())
            .copied()
            .ok_or_else(|| FilterError::InvalidClause(format!("unknown pair type '{}'", pair_type)))
    }

    /// Resolves `attribute operator literal`, where `literal` is the raw quoted text.
    pub fn resolve_atomic(&self, attribute: &str, operator: CompOp, literal: &str) -> Result<Predicate, FilterError> {
        let field = self.field(attribute)?;
        let value = sanitize_literal(literal);
        let clause = AtomicClause {
            field,
            operator,
            has_wildcard: has_wildcard(&value),
        };
        trace!(?clause, %value, "resolving atomic clause");

        let builder = self.atomic.get(&clause).ok_or_else(|| {
            FilterError::InvalidClause(format!(
                "no predicate for {} {} {}",
                field.as_str(),
                comp_op_symbol(operator),
                if clause.has_wildcard { "with wildcard" } else { "without wildcard" }
            ))
        })?;
        Ok(builder(field, value))
    }

    /// Resolves `pair_type(key, value)`, where `key` and `value` are raw quoted text.
    pub fn resolve_key_value(&self, pair_type: &str, key: &str, value: &str) -> Result<Predicate, FilterError> {
        let namespace = self.namespace(pair_type)?;
        let key = sanitize_literal(key);
        let value = sanitize_literal(value);
        let clause = KeyValueClause {
            namespace,
            key_has_wildcard: has_wildcard(&key),
            value_has_wildcard: has_wildcard(&value),
        };
        trace!(?clause, %key, %value, "resolving key-value clause");

        let builder = self.key_value.get(&clause).ok_or_else(|| {
            FilterError::InvalidClause(format!(
                "no predicate for {} with key wildcard {} and value wildcard {}",
                namespace.as_str(),
                clause.key_has_wildcard,
                clause.value_has_wildcard
            ))
        })?;
        Ok(builder(namespace, key, value))
    }
}

fn comp_op_symbol(operator: CompOp) -> &'static str {
    match operator {
        CompOp::Equal => "=",
        CompOp::NotEqual => "!=",
    }
}
