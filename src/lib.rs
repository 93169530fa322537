//! Filter translation for a versioned object catalog.
//!
//! Two front-ends produce the same [`Predicate`] tree:
//!
//! * [`FilterCompiler`] compiles the textual filter language,
//!   e.g. `name = "wf*" AND variable("CPU", "4")`;
//! * [`ArgumentTreeAssembler`] assembles nested AND/OR where-arguments from the structured API.
//!
//! The tree is rendered to SQL by [`SqlCompiler`] or evaluated in memory with
//! [`Predicate::matches`].

pub mod assembler;
pub mod ast;
pub mod compiler;
pub mod config;
pub mod error;
pub mod field;
pub mod lexer;
pub mod parser;
pub mod predicate;
pub mod record;
pub mod sanitize;
pub mod sql_compiler;
pub mod token;
pub mod where_args;

pub use assembler::ArgumentTreeAssembler;
pub use compiler::{FilterCompiler, OrSemantics};
pub use config::FilterConfig;
pub use error::{FilterError, SyntaxError};
pub use predicate::Predicate;
pub use record::CatalogRecord;
pub use sql_compiler::SqlCompiler;
pub use where_args::CatalogObjectWhereArgs;

/// Compiles a filter-language string with the default settings.
pub fn compile_filter(source: &str) -> Result<Predicate, FilterError> {
    FilterCompiler::new().compile(source)
}

/// Assembles a structured argument tree with the default settings.
pub fn assemble_where_args(args: &CatalogObjectWhereArgs) -> Result<Predicate, FilterError> {
    ArgumentTreeAssembler::new().assemble(args)
}
