use tracing::debug;

use crate::common::PlanResult;
use crate::config::MAX_NESTING_DEPTH;
use crate::sql::analyzer::QueryBuilder;
use crate::sql::context::ParseContext;
use crate::sql::lexer::tokenize_statement;
use crate::sql::plan::QueryPlan;
use crate::sql::token::TokenTree;

/// Statement parser: one SELECT statement in, one QueryPlan out.
/// Each call starts from a fresh ParseContext, so case numbering restarts at
/// `case1` for every statement.
#[derive(Debug, Clone)]
pub struct SqlParser {
    max_depth: usize,
}

impl Default for SqlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlParser {
    pub fn new() -> Self {
        SqlParser {
            max_depth: MAX_NESTING_DEPTH,
        }
    }

    /// Limits nesting of parentheses, subqueries and CASE blocks.
    pub fn with_max_depth(max_depth: usize) -> Self {
        SqlParser { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Tokenizes and analyzes a SQL string.
    pub fn parse_statement(&self, sql: &str) -> PlanResult<QueryPlan> {
        let tokens = tokenize_statement(sql, self.max_depth)?;
        self.analyze(&tokens)
    }

    /// Analyzes an already grouped token tree.
    pub fn analyze<T: TokenTree>(&self, tokens: &[T]) -> PlanResult<QueryPlan> {
        let mut ctx = ParseContext::new(self.max_depth);
        let plan = QueryBuilder::new(&mut ctx).build(tokens)?;
        debug!(
            from = %plan.from_table.0,
            joins = plan.joins.len(),
            nested = plan.nested_queries.len(),
            "analyzed statement"
        );
        Ok(plan)
    }
}

/// Parses a SQL string into a QueryPlan.
///
/// # Arguments
/// * `sql` - A string slice containing a single SELECT statement.
///
/// # Returns
/// * `PlanResult<QueryPlan>` - The plan on success, or the first error met.
pub fn parse_sql_to_plan(sql: &str) -> PlanResult<QueryPlan> {
    SqlParser::new().parse_statement(sql)
}
