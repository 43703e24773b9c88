/// Boolean expression builder.
/// Turns comparisons joined by AND / OR into the executor's expression text,
/// e.g. `(t1_a == 1) & (b_max > 3)`, plus the identifiers it mentions.

use crate::common::{PlanError, PlanResult};
use crate::sql::analyzer::QueryBuilder;
use crate::sql::plan::{BoolExpr, IdentifierMap};
use crate::sql::token::{strip_refs, Category, Keyword, TokenTree};
use crate::sql::utils::{expr_safe_name, normalize_operator};

impl<'c> QueryBuilder<'c> {
    /// Builds one expression from comparisons in source order and the
    /// connectives between them.
    pub(super) fn comparison<T: TokenTree>(
        &mut self,
        comps: &[Vec<&T>],
        connectives: &[Keyword],
    ) -> PlanResult<BoolExpr> {
        let Some((first, rest)) = comps.split_first() else {
            return Err(PlanError::MalformedExpression(
                "boolean expression without a comparison".to_string(),
            ));
        };
        if connectives.len() != rest.len() {
            return Err(PlanError::MalformedExpression(format!(
                "{} comparisons joined by {} connectives",
                comps.len(),
                connectives.len()
            )));
        }

        let mut identifiers = IdentifierMap::new();
        let mut text = self.comparison_fragment(first, &mut identifiers)?;
        for (comp, connective) in rest.iter().zip(connectives) {
            let joiner = match connective {
                Keyword::And => " & ",
                Keyword::Or => " | ",
                other => {
                    return Err(PlanError::MalformedExpression(format!(
                        "{:?} is not a boolean connective",
                        other
                    )))
                }
            };
            text.push_str(joiner);
            text.push_str(&self.comparison_fragment(comp, &mut identifiers)?);
        }
        Ok(BoolExpr { text, identifiers })
    }

    fn comparison_fragment<T: TokenTree>(
        &mut self,
        comp: &[&T],
        identifiers: &mut IdentifierMap,
    ) -> PlanResult<String> {
        let parts = strip_refs(comp);
        let [left, op, right] = parts.as_slice() else {
            let text: Vec<&str> = parts.iter().map(|t| t.value().trim()).collect();
            return Err(PlanError::MalformedExpression(format!(
                "comparison needs a left operand, an operator and a right operand: `{}`",
                text.join(" ")
            )));
        };
        let left = self.operand(*left, identifiers)?;
        let right = self.operand(*right, identifiers)?;
        Ok(format!("({} {} {})", left, normalize_operator(op.value().trim()), right))
    }

    /// Column operands become expression-safe names recorded in `identifiers`;
    /// literals are copied verbatim.
    fn operand<T: TokenTree>(&mut self, token: &T, identifiers: &mut IdentifierMap) -> PlanResult<String> {
        match token.category() {
            Category::Function => {
                let (column, function) = self.sql_function(token)?;
                let key = expr_safe_name(&format!("{}_{}", column, function));
                identifiers.insert(key.clone(), (column, Some(function)));
                Ok(key)
            }
            Category::Identifier | Category::Name | Category::Case => {
                let column = self.resolve_item(token)?.name().to_string();
                let key = expr_safe_name(&column);
                identifiers.insert(key.clone(), (column, None));
                Ok(key)
            }
            Category::Literal => Ok(token.value().to_string()),
            _ => Err(PlanError::UnsupportedFeature(format!(
                "`{}` as a comparison operand",
                token.value().trim()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::common::PlanError;
    use crate::sql::analyzer::QueryBuilder;
    use crate::sql::context::ParseContext;
    use crate::sql::token::{Category, Keyword, TokenNode};

    fn ident(text: &str) -> TokenNode {
        let mut children = Vec::new();
        for (i, part) in text.split('.').enumerate() {
            if i > 0 {
                children.push(TokenNode::punct("."));
            }
            children.push(TokenNode::name(part));
        }
        TokenNode::group(Category::Identifier, children)
    }

    fn op(text: &str) -> TokenNode {
        TokenNode::leaf(Category::ComparisonOperator, text)
    }

    #[test]
    fn test_single_comparison() {
        let mut ctx = ParseContext::new(8);
        let mut builder = QueryBuilder::new(&mut ctx);
        let (a, eq, one) = (ident("t1.a"), op("="), TokenNode::literal("1"));
        let expr = builder.comparison(&[vec![&a, &eq, &one]], &[]).unwrap();
        assert_eq!(expr.text, "(t1_a == 1)");
        assert_eq!(
            expr.identifiers.get("t1_a"),
            Some(&("t1.a".to_string(), None))
        );
    }

    #[test]
    fn test_connectives_in_order() {
        let mut ctx = ParseContext::new(8);
        let mut builder = QueryBuilder::new(&mut ctx);
        let (a, b, c) = (ident("a"), ident("b"), ident("c"));
        let (eq, ne, gt) = (op("="), op("<>"), op(">"));
        let (one, two, three) = (
            TokenNode::literal("1"),
            TokenNode::literal("'x'"),
            TokenNode::literal("3"),
        );
        let expr = builder
            .comparison(
                &[
                    vec![&a, &eq, &one],
                    vec![&b, &ne, &two],
                    vec![&c, &gt, &three],
                ],
                &[Keyword::And, Keyword::Or],
            )
            .unwrap();
        assert_eq!(expr.text, "(a == 1) & (b != 'x') | (c > 3)");
        let keys: Vec<&String> = expr.identifiers.keys().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_function_operand() {
        let mut ctx = ParseContext::new(8);
        let mut builder = QueryBuilder::new(&mut ctx);
        let parens = TokenNode::group(
            Category::Parenthesis,
            vec![TokenNode::punct("("), ident("t.salary"), TokenNode::punct(")")],
        );
        let max = TokenNode::group(Category::Function, vec![ident("MAX"), parens]);
        let (gt, lit) = (op(">"), TokenNode::literal("100"));
        let expr = builder.comparison(&[vec![&max, &gt, &lit]], &[]).unwrap();
        assert_eq!(expr.text, "(t_salary_max > 100)");
        assert_eq!(
            expr.identifiers.get("t_salary_max"),
            Some(&("t.salary".to_string(), Some("max".to_string())))
        );
    }

    #[test]
    fn test_connective_count_mismatch() {
        let mut ctx = ParseContext::new(8);
        let mut builder = QueryBuilder::new(&mut ctx);
        let (a, eq, one) = (ident("a"), op("="), TokenNode::literal("1"));
        let err = builder
            .comparison(&[vec![&a, &eq, &one]], &[Keyword::And])
            .unwrap_err();
        assert!(matches!(err, PlanError::MalformedExpression(_)));
    }

    #[test]
    fn test_fragment_arity() {
        let mut ctx = ParseContext::new(8);
        let mut builder = QueryBuilder::new(&mut ctx);
        let (a, eq) = (ident("a"), op("="));
        let err = builder.comparison(&[vec![&a, &eq]], &[]).unwrap_err();
        assert!(matches!(err, PlanError::MalformedExpression(_)));
    }
}
