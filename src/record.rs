//! In-memory evaluation of predicate trees.
//!
//! A [`CatalogRecord`] is one catalog object revision joined to its bucket and its metadata
//! entries, the same shape the SQL renderer queries.

use serde::{Deserialize, Serialize};

use crate::predicate::{Field, Namespace, Operator, Predicate, Value};
use crate::sanitize::LIKE_ESCAPE;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub label: String,
    pub key: String,
    pub value: String,
}

impl Metadata {
    pub fn new(label: &str, key: &str, value: &str) -> Self {
        Self {
            label: label.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub bucket_id: i64,
    pub bucket_name: String,
    pub kind: String,
    pub name: String,
    pub project_name: String,
    pub content_type: String,
    pub metadata: Vec<Metadata>,
}

impl CatalogRecord {
    fn text(&self, field: Field) -> Option<&str> {
        match field {
            Field::Name => Some(&self.name),
            Field::ProjectName => Some(&self.project_name),
            Field::BucketName => Some(&self.bucket_name),
            Field::Kind => Some(&self.kind),
            Field::ContentType => Some(&self.content_type),
            Field::BucketId => None,
        }
    }
}

impl Predicate {
    /// Evaluates the tree against one record.
    pub fn matches(&self, record: &CatalogRecord) -> bool {
        match self {
            Predicate::True => true,
            Predicate::Leaf {
                field,
                operator,
                value,
            } => match (field, value) {
                (Field::BucketId, Value::Integer(expected)) => compare_integer(*operator, record.bucket_id, *expected),
                (Field::BucketId, Value::IntegerList(list)) => {
                    *operator == Operator::In && list.contains(&record.bucket_id)
                }
                (field, Value::Text(expected)) => record
                    .text(*field)
                    .is_some_and(|actual| compare_text(*operator, actual, expected)),
                _ => false,
            },
            Predicate::KeyValue {
                namespace,
                key,
                key_operator,
                operator,
                value,
            } => record.metadata.iter().any(|entry| {
                label_matches(*namespace, &entry.label)
                    && compare_text(*key_operator, &entry.key, key)
                    && compare_text(*operator, &entry.value, value)
            }),
            Predicate::And(children) => children.iter().all(|child| child.matches(record)),
            Predicate::Or(children) => children.iter().any(|child| child.matches(record)),
        }
    }
}

fn label_matches(namespace: Namespace, label: &str) -> bool {
    namespace.label().map_or(true, |expected| expected == label)
}

fn compare_integer(operator: Operator, actual: i64, expected: i64) -> bool {
    match operator {
        Operator::Eq => actual == expected,
        Operator::Ne => actual != expected,
        _ => false,
    }
}

fn compare_text(operator: Operator, actual: &str, expected: &str) -> bool {
    match operator {
        Operator::Eq => actual == expected,
        Operator::Ne => actual != expected,
        Operator::Like => like(actual, expected),
        Operator::NotLike => !like(actual, expected),
        Operator::In => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PatternToken {
    /// `%`
    AnySequence,
    /// `_`
    AnyChar,
    Literal(char),
}

fn compile_pattern(pattern: &str) -> Vec<PatternToken> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        let token = match c {
            '%' => PatternToken::AnySequence,
            '_' => PatternToken::AnyChar,
            // a trailing escape matches itself
            c if c == LIKE_ESCAPE => PatternToken::Literal(chars.next().unwrap_or(LIKE_ESCAPE)),
            c => PatternToken::Literal(c),
        };
        tokens.push(token);
    }
    tokens
}

/// SQL `LIKE` with `\` as the escape character.
pub fn like(text: &str, pattern: &str) -> bool {
    let pattern = compile_pattern(pattern);
    let text: Vec<char> = text.chars().collect();

    let (mut t, mut p) = (0, 0);
    // position of the last '%' and the text index it was tried against
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(PatternToken::AnySequence) => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(PatternToken::AnyChar) => {
                t += 1;
                p += 1;
            }
            Some(PatternToken::Literal(c)) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match backtrack {
                Some((star, start)) => {
                    p = star + 1;
                    t = start + 1;
                    backtrack = Some((star, start + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|token| *token == PatternToken::AnySequence)
}
