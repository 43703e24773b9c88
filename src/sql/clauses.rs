/// SELECT, WHERE, GROUP BY and ORDER BY clause parsers.
/// Every parser receives the significant tokens of its clause, keyword first.

use crate::common::{PlanError, PlanResult};
use crate::sql::analyzer::{ClauseOutput, QueryBuilder};
use crate::sql::plan::{ClauseKind, ColumnRef};
use crate::sql::token::{Category, Keyword, TokenTree};

fn clause_body<'a, 'b, T>(tokens: &'a [&'b T]) -> &'a [&'b T] {
    tokens.get(1..).unwrap_or(&[])
}

pub(super) fn unexpected<T: TokenTree>(token: &T, clause: ClauseKind) -> PlanError {
    PlanError::MalformedStatement(format!("unexpected `{}` in {}", token.value().trim(), clause))
}

impl<'c> QueryBuilder<'c> {
    pub(super) fn parse_select<T: TokenTree>(&mut self, tokens: &[&T]) -> PlanResult<ClauseOutput> {
        match clause_body(tokens) {
            [item] if item.category() == Category::Wildcard => Ok(ClauseOutput::Select(None)),
            [item] => Ok(ClauseOutput::Select(Some(self.identifier_list(*item)?))),
            [] => Err(PlanError::MalformedStatement("SELECT without columns".to_string())),
            [_, extra, ..] => Err(unexpected(*extra, ClauseKind::Select)),
        }
    }

    pub(super) fn parse_where<T: TokenTree>(&mut self, tokens: &[&T]) -> PlanResult<ClauseOutput> {
        let mut comps: Vec<Vec<&T>> = Vec::new();
        let mut connectives = Vec::new();
        for token in clause_body(tokens) {
            match token.category() {
                Category::Comparison => comps.push(token.children().iter().collect()),
                Category::Keyword(connective @ (Keyword::And | Keyword::Or)) => connectives.push(connective),
                _ => {
                    return Err(PlanError::UnsupportedFeature(format!(
                        "`{}` in WHERE",
                        token.value().trim()
                    )))
                }
            }
        }
        if comps.is_empty() {
            return Err(PlanError::MalformedStatement("WHERE without a comparison".to_string()));
        }
        Ok(ClauseOutput::Where(self.comparison(&comps, &connectives)?))
    }

    /// Grouping keys are plain columns: functions keep only their column.
    pub(super) fn parse_group_by<T: TokenTree>(&mut self, tokens: &[&T]) -> PlanResult<ClauseOutput> {
        let columns = self.clause_columns(tokens)?;
        Ok(ClauseOutput::GroupBy(
            columns
                .iter()
                .map(|column| ColumnRef::Column(column.name().to_string()))
                .collect(),
        ))
    }

    pub(super) fn parse_order_by<T: TokenTree>(&mut self, tokens: &[&T]) -> PlanResult<ClauseOutput> {
        Ok(ClauseOutput::OrderBy(self.clause_columns(tokens)?))
    }

    // ASC / DESC are accepted and dropped
    fn clause_columns<T: TokenTree>(&mut self, tokens: &[&T]) -> PlanResult<Vec<ColumnRef>> {
        let items: Vec<&T> = clause_body(tokens)
            .iter()
            .copied()
            .filter(|t| !matches!(t.keyword(), Some(Keyword::Asc | Keyword::Desc)))
            .collect();
        match items.as_slice() {
            [item] => self.identifier_list(*item),
            [] => Err(PlanError::MalformedStatement(format!("{} without columns", self.clause))),
            [_, extra, ..] => Err(unexpected(*extra, self.clause)),
        }
    }
}
