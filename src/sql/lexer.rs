/// Default token tree source.
/// Lexes SQL text with sqlparser's tokenizer, then groups the flat lexemes into
/// the tree the analyzer reads: parentheses, CASE blocks, function calls, dotted
/// identifiers, arithmetic, comparisons, aliases and comma separated lists.

use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace, Word};
use tracing::trace;

use crate::common::{PlanError, PlanResult};
use crate::sql::token::{Category, Keyword, TokenNode, TokenTree};

const JOIN_MODIFIERS: [&str; 7] = ["NATURAL", "INNER", "LEFT", "RIGHT", "FULL", "CROSS", "OUTER"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    /// Statement body or the inside of a parenthesis.
    Statement,
    /// Between CASE and END. No aliases or lists here.
    Case,
}

/// Tokenizes one SQL statement into a grouped token tree.
///
/// # Arguments
/// * `sql` - A single statement, optionally terminated by `;`.
/// * `max_depth` - Maximum nesting of parentheses and CASE blocks.
pub fn tokenize_statement(sql: &str, max_depth: usize) -> PlanResult<Vec<TokenNode>> {
    let dialect = GenericDialect {};
    let raw = Tokenizer::new(&dialect, sql)
        .tokenize()
        .map_err(|e| PlanError::Tokenize(e.to_string()))?;
    trace!(lexemes = raw.len(), "tokenized statement");

    let leaves = merge_signed_numbers(merge_keywords(lex(raw)));
    let statement = single_statement(leaves)?;
    let nested = nest_parentheses(statement)?;
    group_level(nested, Level::Statement, 0, max_depth)
}

fn lex(raw: Vec<Token>) -> Vec<TokenNode> {
    let mut out: Vec<TokenNode> = Vec::with_capacity(raw.len());
    for token in raw {
        let node = match &token {
            Token::EOF => continue,
            Token::Word(word) => word_node(word),
            Token::Whitespace(Whitespace::SingleLineComment { .. })
            | Token::Whitespace(Whitespace::MultiLineComment(_)) => {
                TokenNode::leaf(Category::Comment, token.to_string())
            }
            Token::Whitespace(_) => TokenNode::leaf(Category::Whitespace, token.to_string()),
            Token::Number(..) | Token::SingleQuotedString(_) => TokenNode::literal(token.to_string()),
            Token::Eq
            | Token::DoubleEq
            | Token::Neq
            | Token::Lt
            | Token::Gt
            | Token::LtEq
            | Token::GtEq => TokenNode::leaf(Category::ComparisonOperator, token.to_string()),
            Token::Plus | Token::Minus | Token::Div | Token::Mod | Token::StringConcat => {
                TokenNode::leaf(Category::Operator, token.to_string())
            }
            Token::Mul if follows_operand(&out) => TokenNode::leaf(Category::Operator, "*"),
            Token::Mul => TokenNode::leaf(Category::Wildcard, "*"),
            _ => TokenNode::punct(token.to_string()),
        };
        out.push(node);
    }
    out
}

fn word_node(word: &Word) -> TokenNode {
    if word.quote_style.is_some() {
        return TokenNode::name(word.value.clone());
    }
    let upper = word.value.to_ascii_uppercase();
    let category = match upper.as_str() {
        "NULL" | "TRUE" | "FALSE" => Category::Literal,
        "LIKE" => Category::ComparisonOperator,
        other => match Keyword::from_word(other) {
            Some(keyword) => Category::Keyword(keyword),
            None => return TokenNode::name(word.value.clone()),
        },
    };
    TokenNode::leaf(category, upper)
}

fn is_significant(token: &TokenNode) -> bool {
    !token.is_whitespace() && !token.is_comment()
}

fn next_significant(tokens: &[TokenNode], from: usize) -> Option<usize> {
    (from..tokens.len()).find(|&idx| is_significant(&tokens[idx]))
}

/// True when the last significant token can end an operand, so a following
/// `*` multiplies and a following `-` subtracts.
fn follows_operand(tokens: &[TokenNode]) -> bool {
    tokens
        .iter()
        .rev()
        .find(|t| is_significant(t))
        .is_some_and(|t| matches!(t.category(), Category::Name | Category::Literal) || t.is_punct(")"))
}

fn keyword_text(token: &TokenNode) -> Option<&str> {
    match token.category() {
        Category::Keyword(_) => Some(token.value()),
        _ => None,
    }
}

/// Folds `GROUP BY`, `ORDER BY` and `[modifiers] JOIN` into single keywords.
fn merge_keywords(leaves: Vec<TokenNode>) -> Vec<TokenNode> {
    let mut out = Vec::with_capacity(leaves.len());
    let mut i = 0;
    while i < leaves.len() {
        if let Some(word) = keyword_text(&leaves[i]) {
            if word == "GROUP" || word == "ORDER" {
                let by = next_significant(&leaves, i + 1)
                    .filter(|&j| keyword_text(&leaves[j]) == Some("BY"));
                if let Some(j) = by {
                    let keyword = if word == "GROUP" { Keyword::GroupBy } else { Keyword::OrderBy };
                    out.push(TokenNode::kw(keyword, format!("{} BY", word)));
                    i = j + 1;
                    continue;
                }
            } else if word == "JOIN" || JOIN_MODIFIERS.contains(&word) {
                if let Some((words, end)) = join_run(&leaves, i) {
                    out.push(TokenNode::kw(Keyword::Join, words.join(" ")));
                    i = end + 1;
                    continue;
                }
            }
        }
        out.push(leaves[i].clone());
        i += 1;
    }
    out
}

fn join_run(leaves: &[TokenNode], start: usize) -> Option<(Vec<&str>, usize)> {
    let mut words = Vec::new();
    let mut idx = start;
    loop {
        let word = keyword_text(&leaves[idx])?;
        words.push(word);
        if word == "JOIN" {
            return Some((words, idx));
        }
        if !JOIN_MODIFIERS.contains(&word) {
            return None;
        }
        idx = next_significant(leaves, idx + 1)?;
    }
}

/// `- 5` after an operator or keyword is the literal `-5`.
fn merge_signed_numbers(leaves: Vec<TokenNode>) -> Vec<TokenNode> {
    let mut out: Vec<TokenNode> = Vec::with_capacity(leaves.len());
    let mut iter = leaves.into_iter().peekable();
    while let Some(leaf) = iter.next() {
        if leaf.category() == Category::Operator && leaf.value() == "-" && !follows_operand(&out) {
            let number = iter.next_if(|next| {
                next.category() == Category::Literal
                    && next.value().starts_with(|c: char| c.is_ascii_digit() || c == '.')
            });
            if let Some(number) = number {
                out.push(TokenNode::literal(format!("-{}", number.value())));
                continue;
            }
        }
        out.push(leaf);
    }
    out
}

fn single_statement(leaves: Vec<TokenNode>) -> PlanResult<Vec<TokenNode>> {
    let mut statements: Vec<Vec<TokenNode>> = vec![Vec::new()];
    let mut depth = 0usize;
    for leaf in leaves {
        if leaf.is_punct("(") {
            depth += 1;
        } else if leaf.is_punct(")") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && leaf.is_punct(";") {
            statements.push(Vec::new());
            continue;
        }
        if let Some(current) = statements.last_mut() {
            current.push(leaf);
        }
    }

    let mut non_empty = statements
        .into_iter()
        .filter(|statement| statement.iter().any(is_significant));
    match (non_empty.next(), non_empty.next()) {
        (Some(statement), None) => Ok(statement),
        (None, _) => Err(PlanError::MalformedStatement("empty statement".to_string())),
        (Some(_), Some(_)) => Err(PlanError::MalformedStatement(
            "expected a single statement".to_string(),
        )),
    }
}

fn nest_parentheses(leaves: Vec<TokenNode>) -> PlanResult<Vec<TokenNode>> {
    let mut stack: Vec<Vec<TokenNode>> = vec![Vec::new()];
    for leaf in leaves {
        if leaf.is_punct("(") {
            stack.push(vec![leaf]);
        } else if leaf.is_punct(")") {
            let Some(mut children) = stack.pop().filter(|_| !stack.is_empty()) else {
                return Err(PlanError::MalformedStatement("unbalanced `)`".to_string()));
            };
            children.push(leaf);
            if let Some(parent) = stack.last_mut() {
                parent.push(TokenNode::group(Category::Parenthesis, children));
            }
        } else if let Some(current) = stack.last_mut() {
            current.push(leaf);
        }
    }
    if stack.len() != 1 {
        return Err(PlanError::MalformedStatement("unbalanced `(`".to_string()));
    }
    Ok(stack.pop().unwrap_or_default())
}

fn group_level(
    tokens: Vec<TokenNode>,
    level: Level,
    depth: usize,
    max_depth: usize,
) -> PlanResult<Vec<TokenNode>> {
    if depth > max_depth {
        return Err(PlanError::TooDeeplyNested(max_depth));
    }
    let tokens = tokens
        .into_iter()
        .map(|token| group_parenthesis_body(token, depth, max_depth))
        .collect::<PlanResult<Vec<_>>>()?;
    group_expressions(tokens, level, depth, max_depth)
}

fn group_parenthesis_body(token: TokenNode, depth: usize, max_depth: usize) -> PlanResult<TokenNode> {
    if token.category() != Category::Parenthesis {
        return Ok(token);
    }
    let mut children = token.into_children();
    let close = children.pop();
    let open = if children.is_empty() { None } else { Some(children.remove(0)) };

    let mut grouped = Vec::with_capacity(children.len() + 2);
    grouped.extend(open);
    grouped.extend(group_level(children, Level::Statement, depth + 1, max_depth)?);
    grouped.extend(close);
    Ok(TokenNode::group(Category::Parenthesis, grouped))
}

fn group_expressions(
    tokens: Vec<TokenNode>,
    level: Level,
    depth: usize,
    max_depth: usize,
) -> PlanResult<Vec<TokenNode>> {
    let tokens = group_case(tokens, depth, max_depth)?;
    let tokens = group_identifiers(group_functions(tokens));
    let tokens = group_binary(tokens, Category::Operator, Category::Identifier);
    let tokens = group_binary(tokens, Category::ComparisonOperator, Category::Comparison);
    Ok(match level {
        Level::Case => tokens,
        Level::Statement => group_lists(group_aliases(tokens)),
    })
}

fn group_case(tokens: Vec<TokenNode>, depth: usize, max_depth: usize) -> PlanResult<Vec<TokenNode>> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter();
    while let Some(token) = iter.next() {
        if token.keyword() != Some(Keyword::Case) {
            out.push(token);
            continue;
        }

        let mut body = Vec::new();
        let mut open = 1usize;
        let end = loop {
            let Some(next) = iter.next() else {
                return Err(PlanError::MalformedStatement("CASE without END".to_string()));
            };
            match next.keyword() {
                Some(Keyword::Case) => open += 1,
                Some(Keyword::End) => {
                    open -= 1;
                    if open == 0 {
                        break next;
                    }
                }
                _ => {}
            }
            body.push(next);
        };

        if depth + 1 > max_depth {
            return Err(PlanError::TooDeeplyNested(max_depth));
        }
        let mut children = vec![token];
        children.extend(group_expressions(body, Level::Case, depth + 1, max_depth)?);
        children.push(end);
        out.push(TokenNode::group(Category::Case, children));
    }
    Ok(out)
}

/// `name(...)` -> Function[Identifier[name], Parenthesis]
fn group_functions(tokens: Vec<TokenNode>) -> Vec<TokenNode> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        if token.category() == Category::Name {
            if let Some(parens) = iter.next_if(|next| next.category() == Category::Parenthesis) {
                let name = TokenNode::group(Category::Identifier, vec![token]);
                out.push(TokenNode::group(Category::Function, vec![name, parens]));
                continue;
            }
        }
        out.push(token);
    }
    out
}

/// `a`, `t.a`, `s.t.a`, `t.*` -> Identifier
fn group_identifiers(tokens: Vec<TokenNode>) -> Vec<TokenNode> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        if token.category() != Category::Name {
            out.push(token);
            continue;
        }
        let mut parts = vec![token];
        while let Some(dot) = iter.next_if(|next| next.is_punct(".")) {
            parts.push(dot);
            match iter.next_if(|next| matches!(next.category(), Category::Name | Category::Wildcard)) {
                Some(part) => parts.push(part),
                None => break,
            }
        }
        out.push(TokenNode::group(Category::Identifier, parts));
    }
    out
}

fn is_subquery(token: &TokenNode) -> bool {
    token.category() == Category::Parenthesis
        && token
            .children()
            .iter()
            .skip(1)
            .find(|t| is_significant(t))
            .and_then(|t| t.keyword())
            == Some(Keyword::Select)
}

fn is_operand(token: &TokenNode) -> bool {
    match token.category() {
        Category::Identifier
        | Category::Function
        | Category::Case
        | Category::Literal
        | Category::Name => true,
        Category::Parenthesis => !is_subquery(token),
        _ => false,
    }
}

/// Index of the right operand when `tokens[end]` is followed by `operator operand`.
fn binary_tail(tokens: &[TokenNode], end: usize, operator: Category) -> Option<usize> {
    let op = next_significant(tokens, end + 1).filter(|&k| tokens[k].category() == operator)?;
    next_significant(tokens, op + 1).filter(|&k| is_operand(&tokens[k]))
}

/// Groups `operand operator operand`. Arithmetic chains, comparisons do not.
fn group_binary(tokens: Vec<TokenNode>, operator: Category, category: Category) -> Vec<TokenNode> {
    let mut spans = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let mut end = i;
        if is_operand(&tokens[i]) {
            while let Some(rhs) = binary_tail(&tokens, end, operator) {
                end = rhs;
                if category == Category::Comparison {
                    break;
                }
            }
        }
        if end > i {
            spans.push((i, end));
        }
        i = end + 1;
    }
    fold_spans(tokens, &spans, category, false)
}

fn is_simple_name(token: &TokenNode) -> bool {
    token.category() == Category::Identifier
        && matches!(token.children(), [only] if only.category() == Category::Name)
}

fn alias_name(tokens: &[TokenNode], as_idx: usize) -> Option<usize> {
    next_significant(tokens, as_idx + 1).filter(|&m| is_simple_name(&tokens[m]))
}

/// `expr AS name` -> Identifier, and `table name` inside FROM/JOIN.
/// A subquery keeps standing alone; its `AS name` becomes the following Identifier.
fn group_aliases(tokens: Vec<TokenNode>) -> Vec<TokenNode> {
    let mut spans = Vec::new();
    let mut in_sources = false;
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        if let Some(keyword) = token.keyword() {
            match keyword {
                Keyword::From | Keyword::Join => in_sources = true,
                Keyword::Select | Keyword::Where | Keyword::GroupBy | Keyword::OrderBy | Keyword::On => {
                    in_sources = false
                }
                _ => {}
            }
            i += 1;
            continue;
        }

        let next = next_significant(&tokens, i + 1);
        let explicit = next
            .filter(|&k| tokens[k].keyword() == Some(Keyword::As))
            .and_then(|k| alias_name(&tokens, k).map(|m| (k, m)));

        if is_subquery(token) {
            if let Some((k, m)) = explicit {
                spans.push((k, m));
                i = m + 1;
                continue;
            }
        } else if matches!(
            token.category(),
            Category::Identifier | Category::Function | Category::Case | Category::Literal | Category::Parenthesis
        ) {
            if let Some((_, m)) = explicit {
                spans.push((i, m));
                i = m + 1;
                continue;
            }
            let implicit = next.filter(|&k| {
                in_sources && token.category() == Category::Identifier && is_simple_name(&tokens[k])
            });
            if let Some(k) = implicit {
                spans.push((i, k));
                i = k + 1;
                continue;
            }
        }
        i += 1;
    }
    fold_spans(tokens, &spans, Category::Identifier, true)
}

fn is_list_item(token: &TokenNode) -> bool {
    is_operand(token) || token.category() == Category::Wildcard
}

/// Last index of a list item, counting a trailing ASC/DESC.
fn item_end(tokens: &[TokenNode], idx: usize) -> usize {
    next_significant(tokens, idx + 1)
        .filter(|&k| matches!(tokens[k].keyword(), Some(Keyword::Asc | Keyword::Desc)))
        .unwrap_or(idx)
}

fn group_lists(tokens: Vec<TokenNode>) -> Vec<TokenNode> {
    let mut spans = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if !is_list_item(&tokens[i]) {
            i += 1;
            continue;
        }
        let mut end = item_end(&tokens, i);
        let mut items = 1;
        while let Some(next) = next_significant(&tokens, end + 1)
            .filter(|&c| tokens[c].is_punct(","))
            .and_then(|c| next_significant(&tokens, c + 1))
            .filter(|&k| is_list_item(&tokens[k]))
        {
            end = item_end(&tokens, next);
            items += 1;
        }
        if items > 1 {
            spans.push((i, end));
        }
        i = end + 1;
    }
    fold_spans(tokens, &spans, Category::IdentifierList, false)
}

/// Replaces each (start, end) run with one group. With `flatten_head`, an
/// Identifier opening a run contributes its children instead of itself.
fn fold_spans(
    tokens: Vec<TokenNode>,
    spans: &[(usize, usize)],
    category: Category,
    flatten_head: bool,
) -> Vec<TokenNode> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut spans = spans.iter().copied().peekable();
    let mut pending: Vec<TokenNode> = Vec::new();
    for (idx, token) in tokens.into_iter().enumerate() {
        let Some((start, end)) = spans.peek().copied() else {
            out.push(token);
            continue;
        };
        if idx < start {
            out.push(token);
            continue;
        }
        if idx == start && flatten_head && token.category() == Category::Identifier {
            pending.extend(token.into_children());
        } else {
            pending.push(token);
        }
        if idx == end {
            out.push(TokenNode::group(category, std::mem::take(&mut pending)));
            spans.next();
        }
    }
    out
}
