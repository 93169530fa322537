//! Assembles structured where-argument trees into predicate trees.
//!
//! The input tree is flattened by an iterative post-order traversal into a list of
//! [`TreeNode`]s, children before the parent that contains them. Nodes wrapping a single
//! argument are dropped; their parent resolves that argument in place. The assembly pass then
//! folds the node list over a result stack: leaves are resolved, nested groups pop the
//! predicate their node pushed earlier.

use tracing::{debug, error, warn};

use crate::config::FilterConfig;
use crate::error::FilterError;
use crate::predicate::{BoolOp, Predicate};
use crate::where_args::{CatalogObjectWhereArgs, Nesting};

/// One AND/OR group of the input tree.
#[derive(Debug, Clone, Copy)]
pub struct TreeNode<'a> {
    pub operator: BoolOp,
    pub args: &'a [CatalogObjectWhereArgs],
}

enum Work<'a> {
    /// A nested group; emits a node.
    Group(Nesting<'a>),
    /// Siblings left behind when a nested group was taken out of a list. Only scanned.
    Siblings(&'a [CatalogObjectWhereArgs]),
}

#[derive(Debug, Clone, Default)]
pub struct ArgumentTreeAssembler {
    strict_group_tags: bool,
}

impl ArgumentTreeAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new().with_strict_group_tags(config.strict_group_tags)
    }

    /// Rejects arguments carrying more than one of leaf filter, AND-list and OR-list instead of
    /// letting the AND-list win.
    pub fn with_strict_group_tags(mut self, strict: bool) -> Self {
        self.strict_group_tags = strict;
        self
    }

    pub fn assemble(&self, root: &CatalogObjectWhereArgs) -> Result<Predicate, FilterError> {
        let Some(nesting) = self.nesting_of(root)? else {
            return root.leaf_predicate().ok_or_else(at_least_one_argument);
        };

        let nodes = self.tree_nodes(nesting)?;
        let mut results = Vec::new();

        for node in &nodes {
            let mut resolved = Vec::with_capacity(node.args.len());
            for arg in node.args {
                if let Some(predicate) = resolve_entry(arg, &mut results)? {
                    resolved.push(predicate);
                }
            }
            let combined = Predicate::combine(node.operator, resolved).ok_or_else(at_least_one_argument)?;
            results.push(combined);
        }

        let predicate = resolve_entry(root, &mut results)?.ok_or_else(at_least_one_argument)?;
        if !results.is_empty() {
            error!(nodes = %describe(&nodes), left = results.len(), "argument tree assembly left predicates behind");
            return Err(FilterError::InternalConsistency(format!(
                "{} predicate(s) left after assembling nodes [{}]",
                results.len(),
                describe(&nodes)
            )));
        }

        debug!(%predicate, "assembled argument tree");
        Ok(predicate)
    }

    /// Post-order node list of the group rooted at `root`, single-argument nodes removed.
    pub fn tree_nodes<'a>(&self, root: Nesting<'a>) -> Result<Vec<TreeNode<'a>>, FilterError> {
        let mut work = vec![Work::Group(root)];
        let mut nodes = Vec::new();

        while let Some(item) = work.pop() {
            let list = match item {
                Work::Group(nesting) => {
                    if nesting.args.is_empty() {
                        return Err(FilterError::MalformedArgumentTree(format!(
                            "empty {} list",
                            nesting.operator
                        )));
                    }
                    nodes.push(TreeNode {
                        operator: nesting.operator,
                        args: nesting.args,
                    });
                    nesting.args
                }
                Work::Siblings(list) => list,
            };

            for (i, arg) in list.iter().enumerate() {
                if let Some(nested) = self.nesting_of(arg)? {
                    let rest = &list[i + 1..];
                    if !rest.is_empty() {
                        work.push(Work::Siblings(rest));
                    }
                    work.push(Work::Group(nested));
                    break;
                }
            }
        }

        nodes.reverse();
        debug!(nodes = %describe(&nodes), "post-order argument tree");

        nodes.retain(|node| node.args.len() > 1);
        Ok(nodes)
    }

    fn nesting_of<'a>(&self, arg: &'a CatalogObjectWhereArgs) -> Result<Option<Nesting<'a>>, FilterError> {
        if arg.has_conflicting_tags() {
            if self.strict_group_tags {
                return Err(FilterError::MalformedArgumentTree(
                    "argument carries more than one of a filter, an 'and' list and an 'or' list".to_string(),
                ));
            }
            warn!(?arg, "argument carries conflicting tags, the 'and' list takes priority");
        }
        Ok(arg.nesting())
    }
}

/// Resolves one entry of a node: a leaf through its handlers, a group by popping the
/// predicate its node produced. Single-entry groups had no node and are unwrapped here.
fn resolve_entry(
    arg: &CatalogObjectWhereArgs,
    results: &mut Vec<Predicate>,
) -> Result<Option<Predicate>, FilterError> {
    let mut arg = arg;
    loop {
        let Some(nesting) = arg.nesting() else {
            return Ok(arg.leaf_predicate());
        };
        match nesting.args {
            [] => {
                return Err(FilterError::MalformedArgumentTree(format!(
                    "empty {} list",
                    nesting.operator
                )))
            }
            [only] => arg = only,
            _ => {
                return results.pop().map(Some).ok_or_else(|| {
                    FilterError::InternalConsistency("no assembled predicate left for a nested group".to_string())
                })
            }
        }
    }
}

fn at_least_one_argument() -> FilterError {
    FilterError::MalformedArgumentTree("at least one argument required".to_string())
}

fn describe(nodes: &[TreeNode<'_>]) -> String {
    nodes
        .iter()
        .map(|node| format!("{}({})", node.operator, node.args.len()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{Field, Namespace, Operator};
    use crate::record::{CatalogRecord, Metadata};

    fn args(json: &str) -> CatalogObjectWhereArgs {
        CatalogObjectWhereArgs::from_json(json).unwrap()
    }

    fn assemble(json: &str) -> Result<Predicate, FilterError> {
        ArgumentTreeAssembler::new().assemble(&args(json))
    }

    fn kind(value: &str) -> Predicate {
        Predicate::leaf(Field::Kind, Operator::Eq, value)
    }

    fn name(value: &str) -> Predicate {
        Predicate::leaf(Field::Name, Operator::Eq, value)
    }

    #[test]
    fn test_and_of_bucket_and_kinds() {
        let predicate = assemble(
            r#"{"and": [{"bucketId": {"eq": 1}}, {"or": [{"kind": {"eq": "x"}}, {"kind": {"eq": "y"}}]}]}"#,
        )
        .unwrap();
        assert_eq!(
            predicate,
            Predicate::And(vec![
                Predicate::leaf(Field::BucketId, Operator::Eq, 1i64),
                Predicate::Or(vec![kind("x"), kind("y")]),
            ])
        );
    }

    #[test]
    fn test_root_without_nesting_is_a_leaf() {
        assert_eq!(assemble(r#"{"name": {"eq": "a"}}"#).unwrap(), name("a"));
    }

    #[test]
    fn test_root_without_anything_is_malformed() {
        assert!(matches!(assemble("{}"), Err(FilterError::MalformedArgumentTree(_))));
    }

    #[test]
    fn test_single_entry_group_is_elided() {
        let tree = args(r#"{"and": [{"name": {"eq": "a"}}, {"or": [{"kind": {"eq": "x"}}]}]}"#);
        let assembler = ArgumentTreeAssembler::new();

        let nodes = assembler.tree_nodes(tree.nesting().unwrap()).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].operator, BoolOp::And);

        assert_eq!(
            assembler.assemble(&tree).unwrap(),
            Predicate::And(vec![name("a"), kind("x")])
        );
    }

    #[test]
    fn test_single_entry_root_is_unwrapped() {
        assert_eq!(assemble(r#"{"or": [{"name": {"eq": "a"}}]}"#).unwrap(), name("a"));
        assert_eq!(
            assemble(r#"{"and": [{"or": [{"and": [{"name": {"eq": "a"}}, {"kind": {"eq": "x"}}]}]}]}"#).unwrap(),
            Predicate::And(vec![name("a"), kind("x")])
        );
    }

    #[test]
    fn test_several_nested_groups_keep_their_order() {
        let predicate = assemble(
            r#"{"and": [
                {"or": [{"name": {"eq": "a"}}, {"name": {"eq": "b"}}]},
                {"kind": {"eq": "c"}},
                {"or": [{"name": {"eq": "d"}}, {"name": {"eq": "e"}}]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            predicate,
            Predicate::And(vec![
                Predicate::Or(vec![name("a"), name("b")]),
                kind("c"),
                Predicate::Or(vec![name("d"), name("e")]),
            ])
        );
    }

    #[test]
    fn test_deep_nesting_with_trailing_siblings() {
        let predicate = assemble(
            r#"{"and": [
                {"or": [{"name": {"eq": "a"}}, {"and": [{"name": {"eq": "b"}}, {"kind": {"eq": "c"}}]}]},
                {"or": [{"name": {"eq": "d"}}, {"name": {"eq": "e"}}]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            predicate,
            Predicate::And(vec![
                Predicate::Or(vec![name("a"), Predicate::And(vec![name("b"), kind("c")])]),
                Predicate::Or(vec![name("d"), name("e")]),
            ])
        );
    }

    #[test]
    fn test_post_order_lists_children_first() {
        let tree = args(
            r#"{"and": [
                {"or": [{"name": {"eq": "a"}}, {"name": {"eq": "b"}}]},
                {"kind": {"eq": "c"}}
            ]}"#,
        );
        let nodes = ArgumentTreeAssembler::new().tree_nodes(tree.nesting().unwrap()).unwrap();
        let operators: Vec<_> = nodes.iter().map(|node| node.operator).collect();
        assert_eq!(operators, vec![BoolOp::Or, BoolOp::And]);
    }

    #[test]
    fn test_empty_list_is_malformed() {
        assert!(matches!(assemble(r#"{"and": []}"#), Err(FilterError::MalformedArgumentTree(_))));
        assert!(matches!(
            assemble(r#"{"and": [{"name": {"eq": "a"}}, {"or": []}]}"#),
            Err(FilterError::MalformedArgumentTree(_))
        ));
    }

    #[test]
    fn test_group_without_resolvable_argument() {
        let err = assemble(r#"{"or": [{"name": {}}, {}]}"#).unwrap_err();
        assert_eq!(err.to_string(), "malformed argument tree: at least one argument required");
    }

    #[test]
    fn test_unresolvable_arguments_are_skipped() {
        assert_eq!(
            assemble(r#"{"or": [{"name": {"eq": "a"}}, {}, {"kind": {"eq": "x"}}]}"#).unwrap(),
            Predicate::Or(vec![name("a"), kind("x")])
        );
        // only one left, so no composite
        assert_eq!(assemble(r#"{"or": [{"name": {"eq": "a"}}, {}]}"#).unwrap(), name("a"));
    }

    #[test]
    fn test_and_list_wins_over_or_list() {
        let json = r#"{"and": [{"name": {"eq": "a"}}, {"kind": {"eq": "x"}}], "or": [{"name": {"eq": "b"}}]}"#;
        assert_eq!(assemble(json).unwrap(), Predicate::And(vec![name("a"), kind("x")]));

        let strict = ArgumentTreeAssembler::new().with_strict_group_tags(true);
        assert!(matches!(strict.assemble(&args(json)), Err(FilterError::MalformedArgumentTree(_))));
    }

    #[test]
    fn test_strict_mode_rejects_nested_conflicts() {
        let json = r#"{"or": [{"name": {"eq": "a"}}, {"kind": {"eq": "x"}, "and": [{"name": {"eq": "b"}}, {"name": {"eq": "c"}}]}]}"#;
        assert!(assemble(json).is_ok());
        let strict = ArgumentTreeAssembler::new().with_strict_group_tags(true);
        assert!(matches!(strict.assemble(&args(json)), Err(FilterError::MalformedArgumentTree(_))));
    }

    #[test]
    fn test_assembled_tree_evaluates() {
        let predicate = assemble(
            r#"{"and": [
                {"bucketId": {"in": [1, 2]}},
                {"or": [
                    {"metadata": {"key": "CPU", "value": {"eq": "4"}}},
                    {"name": {"like": "Native%"}}
                ]}
            ]}"#,
        )
        .unwrap();

        let record = CatalogRecord {
            bucket_id: 2,
            name: "Other".to_string(),
            metadata: vec![Metadata::new("variable", "CPU", "4")],
            ..Default::default()
        };
        assert!(predicate.matches(&record));
        assert!(!predicate.matches(&CatalogRecord { bucket_id: 3, ..record.clone() }));
        assert!(matches!(
            &predicate,
            Predicate::And(children) if matches!(&children[1], Predicate::Or(or) if matches!(or[0], Predicate::KeyValue { namespace: Namespace::Metadata, .. }))
        ));
    }
}
