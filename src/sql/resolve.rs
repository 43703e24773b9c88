/// Identifier, function call and CASE resolvers.
/// Each resolver turns one grouped token into a ColumnRef and records what it
/// learned in the alias table or the case catalog of the current query level.

use tracing::{debug, trace};

use crate::common::{PlanError, PlanResult};
use crate::sql::analyzer::QueryBuilder;
use crate::sql::plan::{AliasTarget, CaseExpr, CaseResult, ColumnRef};
use crate::sql::token::{strip, Category, Keyword, TokenTree};

fn reject_arithmetic<T: TokenTree>(parts: &[&T], whole: &T) -> PlanResult<()> {
    if parts.iter().any(|t| t.category() == Category::Operator) {
        return Err(PlanError::UnsupportedFeature(format!(
            "arithmetic expression `{}`",
            whole.value().trim()
        )));
    }
    Ok(())
}

impl<'c> QueryBuilder<'c> {
    /// Resolves a column-like token, registering aliases it declares.
    pub(super) fn col_identifier<T: TokenTree>(&mut self, token: &T) -> PlanResult<ColumnRef> {
        if !token.is_group() {
            return Ok(self.bare_identifier(token));
        }
        let tkns = strip(token.children());
        let (first, last) = match (tkns.first(), tkns.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => {
                return Err(PlanError::MalformedExpression(format!(
                    "empty identifier `{}`",
                    token.value()
                )))
            }
        };
        if tkns.len() == 1 {
            return Ok(self.bare_identifier(first));
        }

        let Some(as_idx) = tkns.iter().position(|t| t.keyword() == Some(Keyword::As)) else {
            reject_arithmetic(&tkns, token)?;
            // dotted name split into parts: keep the first and last segment
            return Ok(ColumnRef::Column(format!("{}.{}", first.value(), last.value())));
        };
        let alias = tkns
            .get(as_idx + 1)
            .map(|t| t.value().trim().to_string())
            .ok_or_else(|| {
                PlanError::MalformedExpression(format!("`AS` without an alias in `{}`", token.value().trim()))
            })?;

        match &tkns[..as_idx] {
            [] => Err(PlanError::MalformedExpression(format!(
                "`AS {}` without an expression",
                alias
            ))),
            [single] => self.alias_single(*single, alias),
            before => {
                reject_arithmetic(before, token)?;
                let target = format!("{}.{}", before[0].value(), before[before.len() - 1].value());
                self.register_alias(alias.clone(), (Some(ColumnRef::Column(target)), None));
                Ok(ColumnRef::Column(alias))
            }
        }
    }

    fn alias_single<T: TokenTree>(&mut self, token: &T, alias: String) -> PlanResult<ColumnRef> {
        match token.category() {
            Category::Case => self.parse_case(token.children(), Some(alias)),
            Category::Function => {
                let (column, function) = self.sql_function(token)?;
                self.register_alias(alias.clone(), (Some(ColumnRef::Column(column)), Some(function)));
                Ok(ColumnRef::Column(alias))
            }
            Category::Identifier | Category::Name | Category::Literal => {
                let target = self.col_identifier(token)?;
                self.register_alias(alias.clone(), (Some(target), None));
                Ok(ColumnRef::Column(alias))
            }
            _ => Err(PlanError::UnsupportedFeature(format!(
                "aliasing `{}`",
                token.value().trim()
            ))),
        }
    }

    fn register_alias(&mut self, alias: String, target: AliasTarget) {
        trace!(alias = %alias, target = ?target, "registered alias");
        self.aliases.insert(alias, target);
    }

    /// A bare column gets a `(None, None)` placeholder unless the name is
    /// already known.
    fn bare_identifier<T: TokenTree>(&mut self, token: &T) -> ColumnRef {
        let name = token.value().trim().to_string();
        if matches!(token.category(), Category::Name | Category::Identifier)
            && !self.aliases.contains_key(&name)
        {
            self.aliases.insert(name.clone(), (None, None));
        }
        ColumnRef::Column(name)
    }

    /// `COUNT(x)` -> ("x", "count"). Only the first argument is kept.
    pub(super) fn sql_function<T: TokenTree>(&mut self, token: &T) -> PlanResult<(String, String)> {
        let parts = strip(token.children());
        let [name, parens] = parts.as_slice() else {
            return Err(PlanError::MalformedExpression(format!(
                "function call `{}` must be a name followed by an argument list",
                token.value().trim()
            )));
        };
        if parens.category() != Category::Parenthesis {
            return Err(PlanError::MalformedExpression(format!(
                "function call `{}` has no argument list",
                token.value().trim()
            )));
        }
        let function = name.value().trim().to_lowercase();

        let args: Vec<&T> = strip(parens.children())
            .into_iter()
            .filter(|t| !t.is_punct("(") && !t.is_punct(")"))
            .collect();
        let arg = match args.first() {
            Some(list) if list.category() == Category::IdentifierList => strip(list.children())
                .into_iter()
                .find(|t| t.category() != Category::Punctuation),
            Some(arg) => Some(*arg),
            None => None,
        }
        .ok_or_else(|| PlanError::MalformedExpression(format!("function `{}` has no argument", function)))?;

        match arg.category() {
            Category::Case
            | Category::Function
            | Category::Parenthesis
            | Category::Comparison
            | Category::Keyword(_) => Err(PlanError::UnsupportedFeature(format!(
                "`{}` as an argument of {}",
                arg.value().trim(),
                function
            ))),
            _ => {
                let column = self.col_identifier(arg)?.name().to_string();
                Ok((column, function))
            }
        }
    }

    /// Resolves one projection / grouping / ordering item.
    pub(super) fn resolve_item<T: TokenTree>(&mut self, token: &T) -> PlanResult<ColumnRef> {
        match token.category() {
            Category::Identifier | Category::Name | Category::Literal | Category::Wildcard => {
                self.col_identifier(token)
            }
            Category::Function => {
                let (column, function) = self.sql_function(token)?;
                Ok(ColumnRef::Function { column, function })
            }
            Category::Case => self.parse_case(token.children(), None),
            _ => Err(PlanError::UnsupportedFeature(format!(
                "`{}` in {}",
                token.value().trim(),
                self.clause
            ))),
        }
    }

    /// Resolves a comma separated list, or a single item as a list of one.
    pub(super) fn identifier_list<T: TokenTree>(&mut self, token: &T) -> PlanResult<Vec<ColumnRef>> {
        if token.category() != Category::IdentifierList {
            return Ok(vec![self.resolve_item(token)?]);
        }
        strip(token.children())
            .into_iter()
            .filter(|t| t.category() != Category::Punctuation)
            .filter(|t| !matches!(t.keyword(), Some(Keyword::Asc | Keyword::Desc)))
            .map(|t| self.resolve_item(t))
            .collect()
    }

    /// Registers a searched CASE under the current clause and returns a
    /// reference to it. Unnamed cases get the next `caseN` name.
    pub(super) fn parse_case<T: TokenTree>(
        &mut self,
        children: &[T],
        alias: Option<String>,
    ) -> PlanResult<ColumnRef> {
        let name = match alias {
            Some(alias) => alias,
            None => self.ctx.next_case_name(),
        };
        self.ctx.descend()?;
        let case = self.case_branches(children, name);
        self.ctx.ascend();
        let case = case?;

        let clause = self.clause;
        debug!(name = %case.name, clause = %clause, branches = case.conditions.len(), "resolved CASE expression");
        let reference = ColumnRef::Case(case.name.clone());
        match self.cases.get_mut(&clause) {
            Some(cases) => cases.push(case),
            None => {
                self.cases.insert(clause, vec![case]);
            }
        }
        Ok(reference)
    }

    /// Scans the CASE body from END back to CASE, closing a branch at each WHEN.
    fn case_branches<T: TokenTree>(&mut self, children: &[T], name: String) -> PlanResult<CaseExpr> {
        let tkns = strip(children);
        let opens_with_case = tkns.first().and_then(|t| t.keyword()) == Some(Keyword::Case);
        if opens_with_case && tkns.get(1).and_then(|t| t.keyword()) != Some(Keyword::When) {
            return Err(PlanError::UnsupportedFeature(format!(
                "CASE with an operand in `{}`",
                name
            )));
        }

        let mut branches = Vec::new();
        let mut else_result = None;
        let mut pending: Option<CaseResult> = None;
        let mut comps: Vec<Vec<&T>> = Vec::new();
        let mut connectives: Vec<Keyword> = Vec::new();

        for i in (0..tkns.len()).rev() {
            let token = tkns[i];
            if token.keyword() == Some(Keyword::Case) {
                break;
            }
            let prev = i.checked_sub(1).map(|p| tkns[p]);
            match (prev.and_then(|p| p.keyword()), token.category()) {
                (Some(Keyword::Else), _) => else_result = Some(self.resolve_result(token)?),
                (Some(Keyword::Then), _) => pending = Some(self.resolve_result(token)?),
                (_, Category::Comparison) => comps.push(token.children().iter().collect()),
                (_, Category::ComparisonOperator) => {
                    let (Some(left), Some(right)) = (prev, tkns.get(i + 1)) else {
                        return Err(PlanError::MalformedExpression(format!(
                            "dangling `{}` in {}",
                            token.value(),
                            name
                        )));
                    };
                    comps.push(vec![left, token, *right]);
                }
                (_, Category::Keyword(connective @ (Keyword::And | Keyword::Or))) => {
                    connectives.push(connective)
                }
                (_, Category::Keyword(Keyword::When)) => {
                    let result = pending.take().ok_or_else(|| {
                        PlanError::MalformedExpression(format!("WHEN without THEN in {}", name))
                    })?;
                    comps.reverse();
                    connectives.reverse();
                    let condition = self.comparison(&comps, &connectives)?;
                    comps.clear();
                    connectives.clear();
                    branches.push((condition, result));
                }
                _ => trace!(token = token.value(), "skipping CASE token"),
            }
        }

        if branches.is_empty() {
            return Err(PlanError::MalformedExpression(format!("CASE {} has no WHEN branch", name)));
        }
        branches.reverse();
        Ok(CaseExpr {
            name,
            conditions: branches,
            else_result,
        })
    }

    fn resolve_result<T: TokenTree>(&mut self, token: &T) -> PlanResult<CaseResult> {
        match token.category() {
            Category::Literal => Ok(CaseResult::Literal(token.value().to_string())),
            _ => self.resolve_item(token).map(CaseResult::Ref),
        }
    }
}
