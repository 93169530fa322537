//! Property-based tests for both filter front-ends

use catalog_filter::record::like;
use catalog_filter::sanitize::{escape_wildcards, sanitize_literal};
use catalog_filter::where_args::StringWhereArgs;
use catalog_filter::{ArgumentTreeAssembler, CatalogObjectWhereArgs, CatalogRecord, FilterCompiler, OrSemantics};
use proptest::prelude::*;

/// One `attribute operator "value"` clause, values drawn from a tiny alphabet so they collide
#[derive(Debug, Clone)]
struct Clause {
    project: bool,
    negated: bool,
    value: String,
}

impl Clause {
    fn render(&self) -> String {
        format!(
            "{} {} \"{}\"",
            if self.project { "project_name" } else { "name" },
            if self.negated { "!=" } else { "=" },
            self.value
        )
    }

    fn holds(&self, record: &CatalogRecord) -> bool {
        let actual = if self.project { &record.project_name } else { &record.name };
        (actual == &self.value) != self.negated
    }
}

fn arb_clause() -> impl Strategy<Value = Clause> {
    (any::<bool>(), any::<bool>(), "[a-c]{1,2}").prop_map(|(project, negated, value)| Clause {
        project,
        negated,
        value,
    })
}

/// An AND of OR-groups, the shape every unparenthesized filter has
fn arb_groups() -> impl Strategy<Value = Vec<Vec<Clause>>> {
    prop::collection::vec(prop::collection::vec(arb_clause(), 1..4), 1..4)
}

fn render(groups: &[Vec<Clause>]) -> String {
    groups
        .iter()
        .map(|group| group.iter().map(Clause::render).collect::<Vec<_>>().join(" OR "))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn arb_record() -> impl Strategy<Value = CatalogRecord> {
    ("[a-c]{1,2}", "[a-c]{1,2}").prop_map(|(name, project_name)| CatalogRecord {
        name,
        project_name,
        ..Default::default()
    })
}

fn arb_where_args() -> impl Strategy<Value = CatalogObjectWhereArgs> {
    let leaf = "[a-c]".prop_map(|value| CatalogObjectWhereArgs {
        name: Some(StringWhereArgs {
            eq: Some(value),
            ..Default::default()
        }),
        ..Default::default()
    });
    leaf.prop_recursive(4, 32, 4, |inner| {
        (any::<bool>(), prop::collection::vec(inner, 1..4)).prop_map(|(is_and, args)| {
            if is_and {
                CatalogObjectWhereArgs {
                    and_args: Some(args),
                    ..Default::default()
                }
            } else {
                CatalogObjectWhereArgs {
                    or_args: Some(args),
                    ..Default::default()
                }
            }
        })
    })
}

fn leaf_count(args: &CatalogObjectWhereArgs) -> usize {
    match (&args.and_args, &args.or_args) {
        (Some(list), _) | (None, Some(list)) => list.iter().map(leaf_count).sum(),
        (None, None) => 1,
    }
}

fn expected_match(args: &CatalogObjectWhereArgs, record: &CatalogRecord) -> bool {
    match (&args.and_args, &args.or_args) {
        (Some(list), _) => list.iter().all(|arg| expected_match(arg, record)),
        (None, Some(list)) => list.iter().any(|arg| expected_match(arg, record)),
        (None, None) => args.name.as_ref().and_then(|n| n.eq.as_ref()) == Some(&record.name),
    }
}

proptest! {
    #[test]
    fn test_escape_is_identity_without_wildcards(s in "[A-Za-z0-9 _\\\\-]{0,40}") {
        prop_assert_eq!(escape_wildcards(&s), s);
    }

    #[test]
    fn test_sanitized_literal_matches_itself(s in "[a-z%_ ]{0,20}") {
        let pattern = sanitize_literal(&format!("\"{}\"", s));
        prop_assert!(like(&s, &pattern));
    }

    #[test]
    fn test_unescaped_stars_never_survive(s in "[a-z*%]{0,20}") {
        let sanitized = sanitize_literal(&format!("\"{}\"", s));
        prop_assert!(!sanitized.contains('*'));
        prop_assert_eq!(sanitized.matches('%').count(), s.matches('%').count() + s.matches('*').count());
    }

    #[test]
    fn test_compilation_is_deterministic(groups in arb_groups()) {
        let source = render(&groups);
        let compiler = FilterCompiler::new();
        prop_assert_eq!(compiler.compile(&source).unwrap(), compiler.compile(&source).unwrap());
    }

    #[test]
    fn test_every_clause_reaches_the_tree(groups in arb_groups()) {
        let source = render(&groups);
        let clauses: usize = groups.iter().map(Vec::len).sum();
        for or_semantics in [OrSemantics::Compatible, OrSemantics::Honor] {
            let predicate = FilterCompiler::new().with_or_semantics(or_semantics).compile(&source).unwrap();
            prop_assert_eq!(predicate.leaf_count(), clauses);
        }
    }

    #[test]
    fn test_honored_or_groups_evaluate_as_written(groups in arb_groups(), record in arb_record()) {
        let predicate = FilterCompiler::new()
            .with_or_semantics(OrSemantics::Honor)
            .compile(&render(&groups))
            .unwrap();
        let expected = groups.iter().all(|group| group.iter().any(|clause| clause.holds(&record)));
        prop_assert_eq!(predicate.matches(&record), expected);
    }

    #[test]
    fn test_compatible_mode_requires_every_clause(groups in arb_groups(), record in arb_record()) {
        let predicate = FilterCompiler::new().compile(&render(&groups)).unwrap();
        let expected = groups.iter().flatten().all(|clause| clause.holds(&record));
        prop_assert_eq!(predicate.matches(&record), expected);
    }

    #[test]
    fn test_assembled_tree_keeps_every_leaf(args in arb_where_args()) {
        let predicate = ArgumentTreeAssembler::new().assemble(&args).unwrap();
        prop_assert_eq!(predicate.leaf_count(), leaf_count(&args));
    }

    #[test]
    fn test_assembled_tree_evaluates_as_written(args in arb_where_args(), name in "[a-c]") {
        let record = CatalogRecord { name, ..Default::default() };
        let predicate = ArgumentTreeAssembler::new().assemble(&args).unwrap();
        prop_assert_eq!(predicate.matches(&record), expected_match(&args, &record));
    }
}
