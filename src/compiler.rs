//! Compiles filter-language strings into predicate trees.
//!
//! The parse tree is walked depth-first over an explicit event stack. Three stacks are kept
//! for the duration of one call:
//!
//! * the clause stack holds resolved clauses waiting for their or-expression to finish,
//! * the context stack holds one context per open or-expression or parenthesized group,
//! * the result stack holds one composite per finished or-expression.
//!
//! OR binds tighter than AND, so the top level is always an AND of OR-groups:
//!
//! ```text
//! name = "a" OR name = "b" AND project_name = "c"
//! // compiles like
//! (name = "a" OR name = "b") AND project_name = "c"
//! ```
//!
//! How the clauses of one OR-group are combined depends on [`OrSemantics`].

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::ast::{AndExpression, Clause, Expression, OrExpression};
use crate::config::FilterConfig;
use crate::error::FilterError;
use crate::field::FieldResolver;
use crate::lexer::tokenize;
use crate::parser::{Parser, DEFAULT_MAX_DEPTH};
use crate::predicate::{BoolOp, Predicate};

/// Connective applied to the clauses of one OR-group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrSemantics {
    /// Combine with AND, as the catalog service has always done. The OR keyword only marks
    /// where a group ends.
    #[default]
    Compatible,
    /// Combine with OR.
    Honor,
}

impl OrSemantics {
    fn connective(self) -> BoolOp {
        match self {
            OrSemantics::Compatible => BoolOp::And,
            OrSemantics::Honor => BoolOp::Or,
        }
    }
}

pub struct FilterCompiler<'r> {
    resolver: &'r FieldResolver,
    or_semantics: OrSemantics,
    max_depth: usize,
}

#[derive(Debug)]
enum Context {
    Root,
    /// A parenthesized and-expression; its results start at `result_base`.
    And { result_base: usize },
    /// An or-expression; its clauses start at `clause_base` on the clause stack.
    Or {
        clause_base: usize,
        clauses: Vec<Predicate>,
    },
}

enum Event<'t> {
    EnterAnd { expression: &'t AndExpression, nested: bool },
    ExitAnd { nested: bool },
    EnterOr(&'t OrExpression),
    ExitOr,
    Clause(&'t Clause),
}

#[derive(Default)]
struct Stacks {
    clauses: Vec<Predicate>,
    contexts: Vec<Context>,
    results: Vec<Predicate>,
}

impl FilterCompiler<'static> {
    pub fn new() -> Self {
        Self {
            resolver: FieldResolver::standard(),
            or_semantics: OrSemantics::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new()
            .with_or_semantics(config.or_semantics)
            .with_max_depth(config.max_nesting_depth)
    }
}

impl Default for FilterCompiler<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> FilterCompiler<'r> {
    /// Uses a custom resolver, e.g. a partially populated one.
    pub fn with_resolver<'n>(self, resolver: &'n FieldResolver) -> FilterCompiler<'n> {
        FilterCompiler {
            resolver,
            or_semantics: self.or_semantics,
            max_depth: self.max_depth,
        }
    }

    pub fn with_or_semantics(mut self, or_semantics: OrSemantics) -> Self {
        self.or_semantics = or_semantics;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn or_semantics(&self) -> OrSemantics {
        self.or_semantics
    }

    /// Compiles `source`. Blank input matches everything.
    pub fn compile(&self, source: &str) -> Result<Predicate, FilterError> {
        if source.trim().is_empty() {
            debug!("blank filter compiled to TRUE");
            return Ok(Predicate::True);
        }

        let tokens = tokenize(source);
        let expression = Parser::new(source, &tokens)
            .with_max_depth(self.max_depth)
            .parse()
            .map_err(FilterError::Syntax)?;

        let predicate = self.compile_expression(&expression)?;
        debug!(filter = source, %predicate, "compiled filter");
        Ok(predicate)
    }

    /// Walks an already parsed expression.
    pub fn compile_expression(&self, expression: &Expression) -> Result<Predicate, FilterError> {
        let mut stacks = Stacks::default();
        stacks.contexts.push(Context::Root);

        let mut events = vec![Event::EnterAnd {
            expression: &expression.0,
            nested: false,
        }];

        while let Some(event) = events.pop() {
            match event {
                Event::EnterAnd { expression, nested } => {
                    if nested {
                        stacks.contexts.push(Context::And {
                            result_base: stacks.results.len(),
                        });
                    }
                    events.push(Event::ExitAnd { nested });
                    events.extend(expression.operands.iter().rev().map(Event::EnterOr));
                }
                Event::EnterOr(or_expression) => {
                    stacks.contexts.push(Context::Or {
                        clause_base: stacks.clauses.len(),
                        clauses: Vec::new(),
                    });
                    events.push(Event::ExitOr);
                    events.extend(or_expression.clauses.iter().rev().map(Event::Clause));
                }
                Event::Clause(clause) => match clause {
                    Clause::Atomic {
                        attribute,
                        operator,
                        literal,
                        ..
                    } => {
                        let leaf = self.resolver.resolve_atomic(&attribute.0, *operator, literal)?;
                        stacks.clauses.push(leaf);
                    }
                    Clause::KeyValue {
                        pair_type, key, value, ..
                    } => {
                        let leaf = self.resolver.resolve_key_value(&pair_type.0, key, value)?;
                        stacks.clauses.push(leaf);
                    }
                    Clause::Group(inner) => events.push(Event::EnterAnd {
                        expression: &**inner,
                        nested: true,
                    }),
                },
                Event::ExitOr => self.exit_or(&mut stacks)?,
                Event::ExitAnd { nested: true } => Self::exit_group(&mut stacks)?,
                Event::ExitAnd { nested: false } => {}
            }
            trace!(
                clauses = stacks.clauses.len(),
                contexts = stacks.contexts.len(),
                results = stacks.results.len(),
                "compiler stacks"
            );
        }

        self.finish(stacks)
    }

    /// Moves the group's clauses into its or-context and turns the context into one result.
    fn exit_or(&self, stacks: &mut Stacks) -> Result<(), FilterError> {
        let Some(Context::Or {
            clause_base,
            mut clauses,
        }) = stacks.contexts.pop()
        else {
            return Err(FilterError::InternalConsistency(
                "or-expression finished without its context".to_string(),
            ));
        };

        clauses.extend(stacks.clauses.drain(clause_base..));
        let composite = Predicate::combine(self.or_semantics.connective(), clauses).ok_or_else(|| {
            FilterError::InternalConsistency("or-expression finished without clauses".to_string())
        })?;
        stacks.results.push(composite);
        Ok(())
    }

    /// ANDs the results of a parenthesized group; the composite becomes a clause of the
    /// enclosing or-expression.
    fn exit_group(stacks: &mut Stacks) -> Result<(), FilterError> {
        let Some(Context::And { result_base }) = stacks.contexts.pop() else {
            return Err(FilterError::InternalConsistency(
                "group finished without its context".to_string(),
            ));
        };

        let results = stacks.results.split_off(result_base);
        let composite = Predicate::combine(BoolOp::And, results).ok_or_else(|| {
            FilterError::InternalConsistency("group finished without results".to_string())
        })?;
        stacks.clauses.push(composite);
        Ok(())
    }

    fn finish(&self, mut stacks: Stacks) -> Result<Predicate, FilterError> {
        while let Some(context) = stacks.contexts.pop() {
            if let Context::Or { clauses, .. } = context {
                // empty contexts carry nothing
                if let Some(composite) = Predicate::combine(self.or_semantics.connective(), clauses) {
                    stacks.results.push(composite);
                }
            }
        }

        if !stacks.clauses.is_empty() {
            return Err(FilterError::InternalConsistency(format!(
                "{} clause(s) left outside any context",
                stacks.clauses.len()
            )));
        }

        Predicate::combine(BoolOp::And, stacks.results)
            .ok_or_else(|| FilterError::InternalConsistency("compilation produced no result".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CompOp;
    use crate::predicate::{Field, Namespace, Operator};
    use crate::record::CatalogRecord;

    fn name(value: &str) -> Predicate {
        Predicate::leaf(Field::Name, Operator::Eq, value)
    }

    fn project(value: &str) -> Predicate {
        Predicate::leaf(Field::ProjectName, Operator::Eq, value)
    }

    fn compile(source: &str) -> Predicate {
        FilterCompiler::new().compile(source).unwrap()
    }

    fn compile_honoring_or(source: &str) -> Predicate {
        FilterCompiler::new()
            .with_or_semantics(OrSemantics::Honor)
            .compile(source)
            .unwrap()
    }

    #[test]
    fn test_blank_filter_is_true() {
        assert_eq!(compile(""), Predicate::True);
        assert_eq!(compile("  \t\n"), Predicate::True);
        assert!(compile("").matches(&CatalogRecord::default()));
    }

    #[test]
    fn test_single_clause_is_not_wrapped() {
        assert_eq!(compile(r#"name = "A""#), name("A"));
    }

    #[test]
    fn test_and_of_or_groups() {
        let source = r#"name = "A" AND project_name = "B" OR project_name = "C""#;
        assert_eq!(
            compile(source),
            Predicate::And(vec![
                name("A"),
                Predicate::And(vec![project("B"), project("C")]),
            ])
        );
    }

    #[test]
    fn test_or_groups_honored_on_request() {
        let source = r#"name = "A" AND project_name = "B" OR project_name = "C""#;
        assert_eq!(
            compile_honoring_or(source),
            Predicate::And(vec![
                name("A"),
                Predicate::Or(vec![project("B"), project("C")]),
            ])
        );
    }

    #[test]
    fn test_or_semantics_change_what_matches() {
        let record = CatalogRecord {
            name: "B".to_string(),
            ..Default::default()
        };
        let source = r#"name = "A" OR name = "B""#;
        assert!(!compile(source).matches(&record));
        assert!(compile_honoring_or(source).matches(&record));
    }

    #[test]
    fn test_parenthesized_group_shares_one_context() {
        assert_eq!(
            compile(r#"(name = "A" OR name = "B")"#),
            Predicate::And(vec![name("A"), name("B")])
        );
        assert_eq!(
            compile_honoring_or(r#"(name = "A" OR name = "B")"#),
            Predicate::Or(vec![name("A"), name("B")])
        );
    }

    #[test]
    fn test_parentheses_versus_context_splitting() {
        let grouped = r#"name = "A" OR (name = "B" AND name = "C")"#;
        let split = r#"name = "A" OR name = "B" AND name = "C""#;

        assert_eq!(
            compile_honoring_or(grouped),
            Predicate::Or(vec![name("A"), Predicate::And(vec![name("B"), name("C")])])
        );
        assert_eq!(
            compile_honoring_or(split),
            Predicate::And(vec![Predicate::Or(vec![name("A"), name("B")]), name("C")])
        );

        assert_eq!(
            compile(grouped),
            Predicate::And(vec![name("A"), Predicate::And(vec![name("B"), name("C")])])
        );
        assert_eq!(
            compile(split),
            Predicate::And(vec![Predicate::And(vec![name("A"), name("B")]), name("C")])
        );
    }

    #[test]
    fn test_nested_groups_keep_outer_clauses_apart() {
        let source = r#"name = "A" OR ((name = "B" OR name = "C") AND project_name = "D")"#;
        assert_eq!(
            compile_honoring_or(source),
            Predicate::Or(vec![
                name("A"),
                Predicate::And(vec![
                    Predicate::Or(vec![name("B"), name("C")]),
                    project("D"),
                ]),
            ])
        );
    }

    #[test]
    fn test_wildcards_and_negation() {
        assert_eq!(
            compile(r#"name != "tmp*" AND project_name = "\*""#),
            Predicate::And(vec![
                Predicate::leaf(Field::Name, Operator::NotLike, "tmp%"),
                Predicate::leaf(Field::ProjectName, Operator::Eq, "*"),
            ])
        );
    }

    #[test]
    fn test_key_value_clauses() {
        assert_eq!(
            compile(r#"generic_information("Infrastructure", "Amazon*") && variable("CPU", "4")"#),
            Predicate::And(vec![
                Predicate::key_value(
                    Namespace::GenericInformation,
                    "Infrastructure",
                    Operator::Eq,
                    Operator::Like,
                    "Amazon%"
                ),
                Predicate::key_value(Namespace::Variable, "CPU", Operator::Eq, Operator::Eq, "4"),
            ])
        );
    }

    #[test]
    fn test_unknown_attribute_is_invalid_clause() {
        let err = FilterCompiler::new().compile(r#"color = "red""#).unwrap_err();
        assert!(matches!(err, FilterError::InvalidClause(_)));
    }

    #[test]
    fn test_unknown_attribute_deep_inside_aborts() {
        let err = FilterCompiler::new()
            .compile(r#"name = "a" AND (name = "b" OR (color = "red"))"#)
            .unwrap_err();
        assert!(matches!(err, FilterError::InvalidClause(_)));
    }

    #[test]
    fn test_missing_builder_aborts() {
        let mut resolver = FieldResolver::empty();
        resolver.register_atomic(Field::Name, CompOp::Equal, false, |f, v| {
            Predicate::leaf(f, Operator::Eq, v)
        });
        let compiler = FilterCompiler::new().with_resolver(&resolver);

        assert_eq!(compiler.compile(r#"name = "a""#).unwrap(), name("a"));
        assert!(matches!(
            compiler.compile(r#"name = "a" AND name = "b*""#),
            Err(FilterError::InvalidClause(_))
        ));
    }

    #[test]
    fn test_unbalanced_parentheses_are_syntax_errors() {
        for source in [r#"(name = "a""#, r#"name = "a")"#, "(((", ")"] {
            let err = FilterCompiler::new().compile(source).unwrap_err();
            assert!(!err.syntax_errors().is_empty(), "no syntax error for {}", source);
        }
    }

    #[test]
    fn test_nesting_depth_is_configurable() {
        let source = format!("{}name = \"a\"{}", "(".repeat(3), ")".repeat(3));
        assert_eq!(FilterCompiler::new().compile(&source).unwrap(), name("a"));
        assert!(matches!(
            FilterCompiler::new().with_max_depth(2).compile(&source),
            Err(FilterError::Syntax(_))
        ));
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let source = r#"name = "a" OR (project_name = "b*" AND variable("k", "v")) AND name != "c""#;
        assert_eq!(compile(source), compile(source));
    }

    #[test]
    fn test_compiler_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FilterCompiler<'static>>();
    }
}
