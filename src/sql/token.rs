/// Token tree protocol.
/// The analyzer reads any tree implementing `TokenTree`; `TokenNode` is the owned
/// implementation produced by the default lexer and used to build trees by hand.

use std::fmt;

/// Keywords the analyzer tells apart. Multi-word keywords (`GROUP BY`,
/// `LEFT OUTER JOIN`) arrive as a single token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Select,
    From,
    Where,
    GroupBy,
    OrderBy,
    Case,
    When,
    Then,
    Else,
    End,
    As,
    And,
    Or,
    Not,
    On,
    Join,
    Asc,
    Desc,
    /// Clause-level keyword outside the supported dialect (HAVING, LIMIT, UNION, ...).
    Unsupported,
    Other,
}

impl Keyword {
    /// Classifies an upper-cased word. `None` means the word is a plain name.
    pub fn from_word(upper: &str) -> Option<Keyword> {
        let keyword = match upper {
            "SELECT" => Keyword::Select,
            "FROM" => Keyword::From,
            "WHERE" => Keyword::Where,
            "GROUP BY" => Keyword::GroupBy,
            "ORDER BY" => Keyword::OrderBy,
            "CASE" => Keyword::Case,
            "WHEN" => Keyword::When,
            "THEN" => Keyword::Then,
            "ELSE" => Keyword::Else,
            "END" => Keyword::End,
            "AS" => Keyword::As,
            "AND" => Keyword::And,
            "OR" => Keyword::Or,
            "NOT" => Keyword::Not,
            "ON" => Keyword::On,
            "JOIN" => Keyword::Join,
            "ASC" => Keyword::Asc,
            "DESC" => Keyword::Desc,
            "HAVING" | "LIMIT" | "OFFSET" | "UNION" | "INTERSECT" | "EXCEPT" | "DISTINCT"
            | "INSERT" | "UPDATE" | "DELETE" | "WITH" | "INTO" | "VALUES" | "SET" => {
                Keyword::Unsupported
            }
            "GROUP" | "ORDER" | "BY" | "INNER" | "LEFT" | "RIGHT" | "FULL" | "OUTER"
            | "CROSS" | "NATURAL" | "IS" | "IN" | "BETWEEN" | "USING" | "EXISTS" | "ALL" => {
                Keyword::Other
            }
            _ => return None,
        };
        Some(keyword)
    }
}

/// Category tag of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    // groups
    Identifier,
    IdentifierList,
    Function,
    Case,
    Comparison,
    Parenthesis,
    // leaves
    Keyword(Keyword),
    Operator,
    ComparisonOperator,
    Wildcard,
    Punctuation,
    Name,
    Literal,
    Whitespace,
    Comment,
}

impl Category {
    pub fn is_group(self) -> bool {
        matches!(
            self,
            Category::Identifier
                | Category::IdentifierList
                | Category::Function
                | Category::Case
                | Category::Comparison
                | Category::Parenthesis
        )
    }
}

/// A node of a grouped SQL token tree.
pub trait TokenTree: Sized {
    fn category(&self) -> Category;

    /// Literal text. For groups, the concatenated text of all children.
    fn value(&self) -> &str;

    /// Ordered children. Empty for leaves.
    fn children(&self) -> &[Self];

    fn is_group(&self) -> bool {
        self.category().is_group()
    }

    fn is_whitespace(&self) -> bool {
        self.category() == Category::Whitespace
    }

    fn is_comment(&self) -> bool {
        self.category() == Category::Comment
    }

    fn keyword(&self) -> Option<Keyword> {
        match self.category() {
            Category::Keyword(keyword) => Some(keyword),
            _ => None,
        }
    }

    fn is_punct(&self, text: &str) -> bool {
        self.category() == Category::Punctuation && self.value() == text
    }
}

/// Removes whitespace and comments.
pub fn strip<T: TokenTree>(tokens: &[T]) -> Vec<&T> {
    tokens
        .iter()
        .filter(|t| !t.is_whitespace() && !t.is_comment())
        .collect()
}

/// Same as `strip`, for an already borrowed sequence.
pub fn strip_refs<'a, T: TokenTree>(tokens: &[&'a T]) -> Vec<&'a T> {
    tokens
        .iter()
        .copied()
        .filter(|t| !t.is_whitespace() && !t.is_comment())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenNode {
    category: Category,
    value: String,
    children: Vec<TokenNode>,
}

impl TokenNode {
    pub fn leaf(category: Category, value: impl Into<String>) -> Self {
        TokenNode {
            category,
            value: value.into(),
            children: Vec::new(),
        }
    }

    pub fn group(category: Category, children: Vec<TokenNode>) -> Self {
        let value = children.iter().map(|c| c.value.as_str()).collect();
        TokenNode {
            category,
            value,
            children,
        }
    }

    pub fn name(value: impl Into<String>) -> Self {
        Self::leaf(Category::Name, value)
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self::leaf(Category::Literal, value)
    }

    pub fn kw(keyword: Keyword, value: impl Into<String>) -> Self {
        Self::leaf(Category::Keyword(keyword), value)
    }

    pub fn punct(value: impl Into<String>) -> Self {
        Self::leaf(Category::Punctuation, value)
    }

    pub fn space() -> Self {
        Self::leaf(Category::Whitespace, " ")
    }

    pub fn into_children(self) -> Vec<TokenNode> {
        self.children
    }
}

impl TokenTree for TokenNode {
    fn category(&self) -> Category {
        self.category
    }

    fn value(&self) -> &str {
        &self.value
    }

    fn children(&self) -> &[Self] {
        &self.children
    }
}

impl fmt::Display for TokenNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}
