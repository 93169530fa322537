//! SQL compiler that renders predicate trees into sea-query statements.
//!
//! Every predicate is evaluated over a catalog object revision joined to its bucket. Key-value
//! predicates become sub-selects over the metadata table.

use crate::config::{FilterConfig, OptimizationConfig, SchemaConfig};
use crate::predicate::{Field, Namespace, Operator, Predicate, Value};
use crate::sanitize::LIKE_ESCAPE;
use sea_query::{Asterisk, Expr, Iden, JoinType, LikeExpr, PostgresQueryBuilder, Query, SelectStatement, SimpleExpr};
use thiserror::Error;
use tracing::debug;

/// Represents a table identifier for sea-query
#[derive(Debug, Clone)]
pub struct TableName(pub String);

impl Iden for TableName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "{}", self.0).unwrap();
    }
}

/// Column identifier wrapper
#[derive(Debug, Clone)]
pub struct ColumnName(pub String);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(s, "{}", self.0).unwrap();
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SqlCompileError {
    #[error("operator {operator:?} cannot be applied to {field} with value {value}")]
    UnsupportedLeaf {
        field: &'static str,
        operator: Operator,
        value: String,
    },
    #[error("operator {0:?} cannot be applied to metadata")]
    UnsupportedKeyValue(Operator),
}

/// Represents an optimization applied during compilation
#[derive(Debug, Clone, PartialEq)]
pub enum Optimization {
    OrToIn { field: String, value_count: usize },
}

/// Result of SQL compilation with optimization information
#[derive(Debug)]
pub struct CompileResult {
    pub sql: String,
    pub optimizations: Vec<Optimization>,
}

/// SQL Compiler that converts predicate trees to SQL queries
pub struct SqlCompiler {
    config: OptimizationConfig,
    schema: SchemaConfig,
}

impl Default for SqlCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlCompiler {
    pub fn new() -> Self {
        Self {
            config: OptimizationConfig::default(),
            schema: SchemaConfig::default(),
        }
    }

    pub fn with_config(config: OptimizationConfig) -> Self {
        Self {
            config,
            schema: SchemaConfig::default(),
        }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            config: config.optimization.clone(),
            schema: config.schema.clone(),
        }
    }

    fn revision(&self) -> TableName {
        TableName(self.schema.revision_table.clone())
    }

    fn bucket(&self) -> TableName {
        TableName(self.schema.bucket_table.clone())
    }

    fn column(&self, logical: &str) -> ColumnName {
        ColumnName(self.schema.column(logical))
    }

    /// Compile a predicate tree into a `SELECT` over revisions joined to their buckets
    pub fn compile(&self, predicate: &Predicate) -> Result<CompileResult, SqlCompileError> {
        let mut optimizations = Vec::new();

        let mut select = SelectStatement::new();
        select.column((self.revision(), Asterisk));
        select.from(self.revision());
        select.join(
            JoinType::InnerJoin,
            self.bucket(),
            Expr::col((self.revision(), self.column("bucket_id")))
                .equals((self.bucket(), self.column("id"))),
        );

        let condition = self.compile_predicate(predicate, &mut optimizations)?;
        select.and_where(condition);

        let sql = select.to_string(PostgresQueryBuilder);
        debug!(%sql, optimizations = optimizations.len(), "rendered predicate");

        Ok(CompileResult { sql, optimizations })
    }

    fn compile_predicate(
        &self,
        predicate: &Predicate,
        optimizations: &mut Vec<Optimization>,
    ) -> Result<SimpleExpr, SqlCompileError> {
        let expr = match predicate {
            Predicate::True => Expr::val(true).into(),
            Predicate::Leaf {
                field,
                operator,
                value,
            } => self.compile_leaf(*field, *operator, value)?,
            Predicate::KeyValue {
                namespace,
                key,
                key_operator,
                operator,
                value,
            } => self.compile_key_value(*namespace, key, *key_operator, *operator, value)?,
            Predicate::And(children) => {
                let conditions = self.compile_children(children, optimizations)?;
                combine(conditions, SimpleExpr::and)
            }
            Predicate::Or(children) => {
                if let Some((in_expr, optimization)) = self.try_optimize_or_to_in(children) {
                    optimizations.push(optimization);
                    in_expr
                } else {
                    let conditions = self.compile_children(children, optimizations)?;
                    combine(conditions, SimpleExpr::or)
                }
            }
        };
        Ok(expr)
    }

    fn compile_children(
        &self,
        children: &[Predicate],
        optimizations: &mut Vec<Optimization>,
    ) -> Result<Vec<SimpleExpr>, SqlCompileError> {
        children
            .iter()
            .map(|child| self.compile_predicate(child, optimizations))
            .collect()
    }

    fn field_column(&self, field: Field) -> Expr {
        let table = match field {
            Field::BucketName => self.bucket(),
            _ => self.revision(),
        };
        Expr::col((table, self.column(field.as_str())))
    }

    fn compile_leaf(&self, field: Field, operator: Operator, value: &Value) -> Result<SimpleExpr, SqlCompileError> {
        let col = self.field_column(field);

        let expr = match (operator, value) {
            (Operator::Eq, Value::Text(_) | Value::Integer(_)) => col.eq(literal_to_value(value)),
            (Operator::Ne, Value::Text(_) | Value::Integer(_)) => col.ne(literal_to_value(value)),
            (Operator::Like, Value::Text(pattern)) => col.like(like_pattern(pattern)),
            (Operator::NotLike, Value::Text(pattern)) => col.not_like(like_pattern(pattern)),
            (Operator::In, Value::IntegerList(ids)) => col.is_in(ids.iter().copied()),
            _ => {
                return Err(SqlCompileError::UnsupportedLeaf {
                    field: field.as_str(),
                    operator,
                    value: value.to_string(),
                })
            }
        };
        Ok(expr)
    }

    /// `revision.id IN (SELECT revision_id FROM metadata WHERE ...)`
    fn compile_key_value(
        &self,
        namespace: Namespace,
        key: &str,
        key_operator: Operator,
        operator: Operator,
        value: &str,
    ) -> Result<SimpleExpr, SqlCompileError> {
        let metadata = TableName(self.schema.metadata_table.clone());

        let mut sub_select = Query::select();
        sub_select
            .column((metadata.clone(), self.column("revision_id")))
            .from(metadata.clone());
        if let Some(label) = namespace.label() {
            sub_select.and_where(Expr::col((metadata.clone(), self.column("label"))).eq(label));
        }
        sub_select.and_where(text_condition(
            Expr::col((metadata.clone(), self.column("key"))),
            key_operator,
            key,
        )?);
        sub_select.and_where(text_condition(
            Expr::col((metadata, self.column("value"))),
            operator,
            value,
        )?);

        Ok(Expr::col((self.revision(), self.column("id"))).in_subquery(sub_select))
    }

    /// Try to optimize an OR of equalities on one field to an IN clause
    fn try_optimize_or_to_in(&self, children: &[Predicate]) -> Option<(SimpleExpr, Optimization)> {
        if children.len() < self.config.max_or_conditions_for_in {
            return None;
        }

        let mut target: Option<Field> = None;
        let mut values = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Predicate::Leaf {
                    field,
                    operator: Operator::Eq,
                    value: value @ (Value::Text(_) | Value::Integer(_)),
                } if target.map_or(true, |t| t == *field) => {
                    target = Some(*field);
                    values.push(literal_to_value(value));
                }
                // Other predicate types break the equality pattern
                _ => return None,
            }
        }

        let field = target?;
        let optimization = Optimization::OrToIn {
            field: field.as_str().to_string(),
            value_count: values.len(),
        };
        Some((self.field_column(field).is_in(values), optimization))
    }
}

fn text_condition(col: Expr, operator: Operator, value: &str) -> Result<SimpleExpr, SqlCompileError> {
    match operator {
        Operator::Eq => Ok(col.eq(value)),
        Operator::Ne => Ok(col.ne(value)),
        Operator::Like => Ok(col.like(like_pattern(value))),
        Operator::NotLike => Ok(col.not_like(like_pattern(value))),
        Operator::In => Err(SqlCompileError::UnsupportedKeyValue(operator)),
    }
}

fn like_pattern(pattern: &str) -> LikeExpr {
    LikeExpr::new(pattern).escape(LIKE_ESCAPE)
}

/// Combine multiple conditions with the given connective
fn combine(conditions: Vec<SimpleExpr>, connective: fn(SimpleExpr, SimpleExpr) -> SimpleExpr) -> SimpleExpr {
    conditions
        .into_iter()
        .reduce(connective)
        .unwrap_or_else(|| Expr::val(true).into())
}

/// Convert a scalar predicate value to a sea-query Value
fn literal_to_value(value: &Value) -> sea_query::Value {
    match value {
        Value::Text(s) => sea_query::Value::String(Some(Box::new(s.clone()))),
        Value::Integer(n) => sea_query::Value::BigInt(Some(*n)),
        Value::IntegerList(list) => sea_query::Value::String(Some(Box::new(format!("{:?}", list)))),
    }
}
