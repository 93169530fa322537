//! Structured where-arguments, as received from the schema-driven query API.
//!
//! ```json
//! {"and": [{"bucketId": {"eq": 1}}, {"or": [{"kind": {"eq": "x"}}, {"kind": {"eq": "y"}}]}]}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::FilterError;
use crate::predicate::{BoolOp, Field, Namespace, Operator, Predicate};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CatalogObjectWhereArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_id: Option<BucketIdWhereArgs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<StringWhereArgs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<StringWhereArgs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<StringWhereArgs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<StringWhereArgs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataWhereArgs>,
    #[serde(rename = "and", default, skip_serializing_if = "Option::is_none")]
    pub and_args: Option<Vec<CatalogObjectWhereArgs>>,
    #[serde(rename = "or", default, skip_serializing_if = "Option::is_none")]
    pub or_args: Option<Vec<CatalogObjectWhereArgs>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BucketIdWhereArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ne: Option<i64>,
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    pub in_list: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StringWhereArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ne: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub like: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_like: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataWhereArgs {
    pub key: String,
    pub value: MetadataValueWhereArgs,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataValueWhereArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ne: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub like: Option<String>,
}

/// Turns the leaf filter of a where-argument into a predicate, `None` when it has none.
type LeafHandler = fn(&CatalogObjectWhereArgs) -> Option<Predicate>;

/// Tried in order; the first handler producing a predicate wins.
const LEAF_HANDLERS: [LeafHandler; 6] = [
    bucket_id_handler,
    kind_handler,
    name_handler,
    content_type_handler,
    bucket_name_handler,
    metadata_handler,
];

fn bucket_id_handler(args: &CatalogObjectWhereArgs) -> Option<Predicate> {
    let bucket_id = args.bucket_id.as_ref()?;
    if let Some(id) = bucket_id.eq {
        return Some(Predicate::leaf(Field::BucketId, Operator::Eq, id));
    }
    if let Some(id) = bucket_id.ne {
        return Some(Predicate::leaf(Field::BucketId, Operator::Ne, id));
    }
    bucket_id
        .in_list
        .as_ref()
        .map(|ids| Predicate::leaf(Field::BucketId, Operator::In, ids.clone()))
}

fn string_predicate(field: Field, args: Option<&StringWhereArgs>) -> Option<Predicate> {
    let args = args?;
    [
        (Operator::Eq, &args.eq),
        (Operator::Ne, &args.ne),
        (Operator::Like, &args.like),
        (Operator::NotLike, &args.not_like),
    ]
    .into_iter()
    .find_map(|(operator, value)| value.as_ref().map(|v| Predicate::leaf(field, operator, v.as_str())))
}

fn kind_handler(args: &CatalogObjectWhereArgs) -> Option<Predicate> {
    string_predicate(Field::Kind, args.kind.as_ref())
}

fn name_handler(args: &CatalogObjectWhereArgs) -> Option<Predicate> {
    string_predicate(Field::Name, args.name.as_ref())
}

fn content_type_handler(args: &CatalogObjectWhereArgs) -> Option<Predicate> {
    string_predicate(Field::ContentType, args.content_type.as_ref())
}

fn bucket_name_handler(args: &CatalogObjectWhereArgs) -> Option<Predicate> {
    string_predicate(Field::BucketName, args.bucket_name.as_ref())
}

fn metadata_handler(args: &CatalogObjectWhereArgs) -> Option<Predicate> {
    let metadata = args.metadata.as_ref()?;
    let value = &metadata.value;
    [
        (Operator::Eq, &value.eq),
        (Operator::Ne, &value.ne),
        (Operator::Like, &value.like),
    ]
    .into_iter()
    .find_map(|(operator, v)| {
        v.as_ref().map(|v| {
            Predicate::key_value(Namespace::Metadata, metadata.key.as_str(), Operator::Eq, operator, v.as_str())
        })
    })
}

/// The nested group carried by a where-argument.
#[derive(Debug, Clone, Copy)]
pub struct Nesting<'a> {
    pub operator: BoolOp,
    pub args: &'a [CatalogObjectWhereArgs],
}

impl CatalogObjectWhereArgs {
    /// Resolves the leaf filter of this argument.
    pub fn leaf_predicate(&self) -> Option<Predicate> {
        LEAF_HANDLERS.iter().find_map(|handler| handler(self))
    }

    pub fn has_leaf_filter(&self) -> bool {
        self.bucket_id.is_some()
            || self.kind.is_some()
            || self.name.is_some()
            || self.content_type.is_some()
            || self.bucket_name.is_some()
            || self.metadata.is_some()
    }

    /// The nested group of this argument. An AND-list takes priority over an OR-list.
    pub fn nesting(&self) -> Option<Nesting<'_>> {
        match (&self.and_args, &self.or_args) {
            (Some(args), _) => Some(Nesting {
                operator: BoolOp::And,
                args,
            }),
            (None, Some(args)) => Some(Nesting {
                operator: BoolOp::Or,
                args,
            }),
            (None, None) => None,
        }
    }

    /// Whether the argument carries more than one of leaf filter, AND-list and OR-list.
    pub fn has_conflicting_tags(&self) -> bool {
        let tags = [self.has_leaf_filter(), self.and_args.is_some(), self.or_args.is_some()];
        tags.iter().filter(|present| **present).count() > 1
    }

    pub fn from_json(json: &str) -> Result<Self, FilterError> {
        serde_json::from_str(json)
            .map_err(|e| FilterError::MalformedArgumentTree(format!("invalid argument tree: {}", e)))
    }
}
