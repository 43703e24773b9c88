/// FROM clause, join chain and nested subquery parsing.

use tracing::debug;

use crate::common::{PlanError, PlanResult};
use crate::config::TEMP_TABLE_PREFIX;
use crate::sql::analyzer::{ClauseOutput, QueryBuilder};
use crate::sql::clauses::unexpected;
use crate::sql::plan::{ClauseKind, JoinSpec};
use crate::sql::token::{strip, Category, Keyword, TokenTree};
use crate::sql::utils::{join_kind, normalize_operator};

/// A join whose table and keys are still being read.
struct PendingJoin {
    kind: String,
    right: Option<(String, String)>,
    keys: Option<(String, String)>,
}

impl PendingJoin {
    fn set_right(&mut self, right: (String, String)) -> PlanResult<()> {
        if self.right.is_some() {
            return Err(PlanError::MalformedStatement(format!(
                "{} join names more than one table",
                self.kind
            )));
        }
        self.right = Some(right);
        Ok(())
    }
}

fn pending(current: &mut Option<PendingJoin>) -> PlanResult<&mut PendingJoin> {
    current
        .as_mut()
        .ok_or_else(|| PlanError::MalformedStatement("join source without a JOIN keyword".to_string()))
}

/// (table name, alias) of a table reference.
fn tbl_identifier<T: TokenTree>(token: &T) -> (String, String) {
    let tkns = strip(token.children());
    let concat = |parts: &[&T]| parts.iter().map(|t| t.value().trim()).collect::<String>();
    if let Some(as_idx) = tkns.iter().position(|t| t.keyword() == Some(Keyword::As)) {
        let alias = tkns.last().map(|t| t.value().trim().to_string()).unwrap_or_default();
        return (concat(&tkns[..as_idx]), alias);
    }
    match tkns.as_slice() {
        [] | [_] => {
            let name = token.value().trim().to_string();
            (name.clone(), name)
        }
        [.., before_last, _] if before_last.is_punct(".") => {
            // dotted name without alias
            let name = concat(tkns.as_slice());
            (name.clone(), name)
        }
        [init @ .., last] => (concat(init), last.value().trim().to_string()),
    }
}

/// Alias declared after a subquery: `sub` or `AS sub`.
fn declared_alias<T: TokenTree>(token: &T) -> String {
    strip(token.children())
        .last()
        .map_or_else(|| token.value().trim().to_string(), |last| last.value().trim().to_string())
}

impl<'c> QueryBuilder<'c> {
    pub(super) fn parse_from<T: TokenTree>(&mut self, tokens: &[&T]) -> PlanResult<ClauseOutput> {
        let mut table: Option<(String, String)> = None;
        let mut i = 1;
        while i < tokens.len() {
            let token = tokens[i];
            match token.category() {
                Category::Keyword(Keyword::Join) => {
                    let source = table.ok_or_else(|| {
                        PlanError::MalformedStatement("JOIN without a table to join to".to_string())
                    })?;
                    self.parse_join(&tokens[i..])?;
                    return Ok(ClauseOutput::From(source));
                }
                Category::Parenthesis if table.is_none() => {
                    table = Some(self.nested_source(token, tokens.get(i + 1).copied())?);
                    i += 2;
                    continue;
                }
                Category::Identifier | Category::Name if table.is_none() => {
                    table = Some(tbl_identifier(token));
                }
                Category::IdentifierList => {
                    return Err(PlanError::UnsupportedFeature(
                        "comma separated FROM sources".to_string(),
                    ))
                }
                Category::Keyword(_) | Category::Function => {
                    return Err(PlanError::UnsupportedFeature(format!(
                        "`{}` in FROM",
                        token.value().trim()
                    )))
                }
                _ => return Err(unexpected(token, ClauseKind::From)),
            }
            i += 1;
        }
        table
            .map(ClauseOutput::From)
            .ok_or_else(|| PlanError::MalformedStatement("FROM without a table".to_string()))
    }

    /// Reads `JOIN table ON a = b` segments left to right.
    fn parse_join<T: TokenTree>(&mut self, tokens: &[&T]) -> PlanResult<()> {
        let mut current: Option<PendingJoin> = None;
        let mut i = 0;
        while i < tokens.len() {
            let token = tokens[i];
            match token.category() {
                Category::Keyword(Keyword::Join) => {
                    if let Some(done) = current.take() {
                        self.finish_join(done)?;
                    }
                    current = Some(PendingJoin {
                        kind: join_kind(token.value()),
                        right: None,
                        keys: None,
                    });
                }
                Category::Keyword(Keyword::On) => {}
                Category::Keyword(Keyword::And | Keyword::Or) => {
                    return Err(PlanError::UnsupportedFeature(
                        "compound JOIN condition".to_string(),
                    ))
                }
                Category::Keyword(_) => {
                    return Err(PlanError::UnsupportedFeature(format!(
                        "`{}` in JOIN",
                        token.value().trim()
                    )))
                }
                Category::Parenthesis => {
                    let right = self.nested_source(token, tokens.get(i + 1).copied())?;
                    pending(&mut current)?.set_right(right)?;
                    i += 2;
                    continue;
                }
                Category::Comparison => {
                    let keys = self.join_keys(token)?;
                    let join = pending(&mut current)?;
                    if join.keys.is_some() {
                        return Err(PlanError::UnsupportedFeature(
                            "compound JOIN condition".to_string(),
                        ));
                    }
                    join.keys = Some(keys);
                }
                Category::Identifier | Category::Name => {
                    pending(&mut current)?.set_right(tbl_identifier(token))?;
                }
                _ => return Err(unexpected(token, ClauseKind::From)),
            }
            i += 1;
        }
        match current {
            Some(done) => self.finish_join(done),
            None => Ok(()),
        }
    }

    fn finish_join(&mut self, join: PendingJoin) -> PlanResult<()> {
        let (right_table, right_alias) = join.right.ok_or_else(|| {
            PlanError::MalformedStatement(format!("{} join without a table", join.kind))
        })?;
        let (left_key, right_key) = join.keys.ok_or_else(|| {
            PlanError::MalformedStatement(format!("join on `{}` without an ON condition", right_table))
        })?;
        debug!(kind = %join.kind, right_table = %right_table, left_key = %left_key, right_key = %right_key, "recorded join");
        self.joins.push(JoinSpec {
            right_table,
            join_kind: join.kind,
            left_key,
            right_key,
            right_alias,
        });
        Ok(())
    }

    fn join_keys<T: TokenTree>(&mut self, comparison: &T) -> PlanResult<(String, String)> {
        let parts = strip(comparison.children());
        let [left, op, right] = parts.as_slice() else {
            return Err(PlanError::MalformedExpression(format!(
                "JOIN condition `{}` is not a single comparison",
                comparison.value().trim()
            )));
        };
        if normalize_operator(op.value().trim()) != "==" {
            return Err(PlanError::UnsupportedFeature(format!(
                "non-equality JOIN condition `{}`",
                comparison.value().trim()
            )));
        }
        Ok((self.join_key(*left)?, self.join_key(*right)?))
    }

    fn join_key<T: TokenTree>(&mut self, operand: &T) -> PlanResult<String> {
        match operand.category() {
            Category::Identifier | Category::Name => Ok(self.col_identifier(operand)?.name().to_string()),
            _ => Err(PlanError::UnsupportedFeature(format!(
                "`{}` as a JOIN key",
                operand.value().trim()
            ))),
        }
    }

    /// Parses `(SELECT ...) alias` into the nested query table under
    /// `###temp_<alias>` and returns (that key, alias).
    fn nested_source<T: TokenTree>(
        &mut self,
        parenthesis: &T,
        alias: Option<&T>,
    ) -> PlanResult<(String, String)> {
        let alias = alias
            .filter(|t| matches!(t.category(), Category::Identifier | Category::Name))
            .map(declared_alias)
            .ok_or_else(|| {
                PlanError::MalformedStatement(format!(
                    "subquery `{}` needs an alias",
                    parenthesis.value().trim()
                ))
            })?;
        let children = parenthesis.children();
        let inner = children.get(1..children.len().saturating_sub(1)).unwrap_or(&[]);
        let key = format!("{}{}", TEMP_TABLE_PREFIX, alias);

        self.ctx.descend()?;
        let mut nested_ctx = self.ctx.nested();
        let nested = QueryBuilder::new(&mut nested_ctx).build(inner);
        self.ctx.ascend();
        let nested = nested?;

        debug!(key = %key, depth = self.ctx.depth(), "registered nested query");
        self.nested_queries.insert(key.clone(), nested);
        Ok((key, alias))
    }
}
