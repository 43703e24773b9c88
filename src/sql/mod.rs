/// SQL analysis module.
/// This module turns a grouped SQL token tree into a QueryPlan: lexing and grouping,
/// clause dispatch, identifier / function / CASE resolution and plan printing.

pub mod context;
pub mod lexer;
pub mod parser;
pub mod plan;
pub mod pretty_print;
pub mod token;
pub mod utils;

mod analyzer;
mod clauses;
mod expr;
mod join;
mod resolve;

#[cfg(test)]
mod tests;

pub use parser::{parse_sql_to_plan, SqlParser};
pub use plan::{BoolExpr, CaseExpr, CaseResult, ClauseKind, ColumnRef, JoinSpec, QueryPlan};
pub use token::{Category, Keyword, TokenNode, TokenTree};
