/// Clause dispatcher.
/// Splits one statement into its top-level clauses, routes each clause to its
/// parser through a fixed handler table and assembles the QueryPlan from the
/// clause outputs and the side tables the resolvers fill along the way.

use linked_hash_map::LinkedHashMap;
use tracing::{debug, trace};

use crate::common::{PlanError, PlanResult};
use crate::sql::context::ParseContext;
use crate::sql::plan::{AliasTarget, BoolExpr, CaseExpr, ClauseKind, ColumnRef, JoinSpec, QueryPlan};
use crate::sql::token::{strip, Category, Keyword, TokenTree};

/// What a clause parser hands back to the dispatcher.
pub(crate) enum ClauseOutput {
    Select(Option<Vec<ColumnRef>>),
    From((String, String)),
    Where(BoolExpr),
    GroupBy(Vec<ColumnRef>),
    OrderBy(Vec<ColumnRef>),
}

type ClauseHandler<'c, T> = fn(&mut QueryBuilder<'c>, &[&T]) -> PlanResult<ClauseOutput>;

impl ClauseKind {
    pub(crate) fn from_token<T: TokenTree>(token: &T) -> Option<ClauseKind> {
        match token.keyword()? {
            Keyword::Select => Some(ClauseKind::Select),
            Keyword::From => Some(ClauseKind::From),
            Keyword::Where => Some(ClauseKind::Where),
            Keyword::GroupBy => Some(ClauseKind::GroupBy),
            Keyword::OrderBy => Some(ClauseKind::OrderBy),
            _ => None,
        }
    }
}

#[derive(Default)]
struct Clauses {
    select: Option<Option<Vec<ColumnRef>>>,
    from: Option<(String, String)>,
    where_expr: Option<BoolExpr>,
    group_by: Option<Vec<ColumnRef>>,
    order_by: Option<Vec<ColumnRef>>,
}

impl Clauses {
    fn absorb(&mut self, output: ClauseOutput) {
        match output {
            ClauseOutput::Select(columns) => self.select = Some(columns),
            ClauseOutput::From(table) => self.from = Some(table),
            ClauseOutput::Where(expr) => self.where_expr = Some(expr),
            ClauseOutput::GroupBy(columns) => self.group_by = Some(columns),
            ClauseOutput::OrderBy(columns) => self.order_by = Some(columns),
        }
    }
}

/// Builds the plan of one query level. Nested subqueries get their own
/// builder over a nested ParseContext.
pub(crate) struct QueryBuilder<'c> {
    pub(super) ctx: &'c mut ParseContext,
    /// Clause being parsed; CASE expressions are filed under it.
    pub(super) clause: ClauseKind,
    pub(super) functions: LinkedHashMap<String, Vec<String>>,
    pub(super) joins: Vec<JoinSpec>,
    pub(super) aliases: LinkedHashMap<String, AliasTarget>,
    pub(super) cases: LinkedHashMap<ClauseKind, Vec<CaseExpr>>,
    pub(super) nested_queries: LinkedHashMap<String, QueryPlan>,
}

impl<'c> QueryBuilder<'c> {
    pub(crate) fn new(ctx: &'c mut ParseContext) -> Self {
        QueryBuilder {
            ctx,
            clause: ClauseKind::Select,
            functions: LinkedHashMap::new(),
            joins: Vec::new(),
            aliases: LinkedHashMap::new(),
            cases: LinkedHashMap::new(),
            nested_queries: LinkedHashMap::new(),
        }
    }

    fn handler<T: TokenTree>(kind: ClauseKind) -> ClauseHandler<'c, T> {
        match kind {
            ClauseKind::Select => Self::parse_select::<T>,
            ClauseKind::From => Self::parse_from::<T>,
            ClauseKind::Where => Self::parse_where::<T>,
            ClauseKind::GroupBy => Self::parse_group_by::<T>,
            ClauseKind::OrderBy => Self::parse_order_by::<T>,
        }
    }

    /// Analyzes a statement-level token sequence.
    pub(crate) fn build<T: TokenTree>(mut self, tokens: &[T]) -> PlanResult<QueryPlan> {
        let tkns = strip(tokens);
        let first = tkns
            .first()
            .ok_or_else(|| PlanError::MalformedStatement("empty statement".to_string()))?;
        if ClauseKind::from_token(*first).is_none() {
            return Err(PlanError::MalformedStatement(format!(
                "statement must begin with a clause keyword, found `{}`",
                first.value().trim()
            )));
        }
        if let Some(token) = tkns.iter().find(|t| t.keyword() == Some(Keyword::Unsupported)) {
            return Err(PlanError::UnsupportedFeature(format!(
                "{} clause",
                token.value().trim().to_uppercase()
            )));
        }

        let starts: Vec<(usize, ClauseKind)> = tkns
            .iter()
            .enumerate()
            .filter_map(|(idx, t)| ClauseKind::from_token(*t).map(|kind| (idx, kind)))
            .collect();

        let mut clauses = Clauses::default();
        let mut seen: Vec<ClauseKind> = Vec::with_capacity(starts.len());
        for (n, &(start, kind)) in starts.iter().enumerate() {
            if seen.contains(&kind) {
                return Err(PlanError::MalformedStatement(format!("duplicate {} clause", kind)));
            }
            seen.push(kind);
            let end = starts.get(n + 1).map_or(tkns.len(), |&(next, _)| next);

            self.clause = kind;
            debug!(clause = %kind, tokens = end - start, depth = self.ctx.depth(), "dispatching clause");
            let handler = Self::handler::<T>(kind);
            clauses.absorb(handler(&mut self, &tkns[start..end])?);
        }

        self.collect_functions(&tkns)?;

        let select = clauses
            .select
            .ok_or_else(|| PlanError::MalformedStatement("statement has no SELECT clause".to_string()))?;
        let from_table = clauses
            .from
            .ok_or_else(|| PlanError::MalformedStatement("statement has no FROM clause".to_string()))?;

        Ok(QueryPlan {
            select,
            from_table,
            where_expr: clauses.where_expr,
            group_by: clauses.group_by,
            order_by: clauses.order_by,
            functions: self.functions,
            joins: self.joins,
            aliases: self.aliases,
            cases: self.cases,
            nested_queries: self.nested_queries,
        })
    }

    /// Walks the whole statement tree, nested queries included, and records
    /// every function call as column -> [functions] without duplicates.
    fn collect_functions<T: TokenTree>(&mut self, tokens: &[&T]) -> PlanResult<()> {
        for token in tokens {
            match token.category() {
                Category::Function => {
                    let (column, function) = self.sql_function(*token)?;
                    trace!(column = %column, function = %function, "found function call");
                    match self.functions.get_mut(&column) {
                        Some(known) => {
                            if !known.contains(&function) {
                                known.push(function);
                            }
                        }
                        None => {
                            self.functions.insert(column, vec![function]);
                        }
                    }
                }
                _ if token.is_group() => {
                    self.ctx.descend()?;
                    let children = strip(token.children());
                    let found = self.collect_functions(&children);
                    self.ctx.ascend();
                    found?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}
