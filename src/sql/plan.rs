/// Definitions for query plans.
/// This module defines the QueryPlan handed to the execution engine and the
/// column, join and CASE structures it is made of.

use std::fmt;

use linked_hash_map::LinkedHashMap;
use serde::ser::SerializeTuple;
use serde::{Serialize, Serializer};

use crate::common::{PlanError, PlanResult};

/// Expression-safe name (no dots) -> (column, function applied to it).
pub type IdentifierMap = LinkedHashMap<String, (String, Option<String>)>;

/// What an alias stands for: (resolved column, function applied to it).
/// `(None, None)` is a placeholder for a bare, not yet qualified column.
pub type AliasTarget = (Option<ColumnRef>, Option<String>);

/// Top-level clause of a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ClauseKind {
    #[serde(rename = "SELECT")]
    Select,
    #[serde(rename = "FROM")]
    From,
    #[serde(rename = "WHERE")]
    Where,
    #[serde(rename = "GROUP BY")]
    GroupBy,
    #[serde(rename = "ORDER BY")]
    OrderBy,
}

impl ClauseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClauseKind::Select => "SELECT",
            ClauseKind::From => "FROM",
            ClauseKind::Where => "WHERE",
            ClauseKind::GroupBy => "GROUP BY",
            ClauseKind::OrderBy => "ORDER BY",
        }
    }
}

impl fmt::Display for ClauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved projection / grouping / ordering key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnRef {
    /// `table.column` or a bare `column`.
    Column(String),
    Function { column: String, function: String },
    /// Reference to a named entry of the case catalog.
    Case(String),
}

impl ColumnRef {
    pub fn column(name: impl Into<String>) -> Self {
        ColumnRef::Column(name.into())
    }

    /// First element of the (name, function) pair.
    pub fn name(&self) -> &str {
        match self {
            ColumnRef::Column(name) | ColumnRef::Case(name) => name,
            ColumnRef::Function { column, .. } => column,
        }
    }

    pub fn function(&self) -> Option<&str> {
        match self {
            ColumnRef::Function { function, .. } => Some(function),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRef::Column(name) => write!(f, "{}", name),
            ColumnRef::Function { column, function } => write!(f, "{}({})", function, column),
            ColumnRef::Case(name) => write!(f, "<case {}>", name),
        }
    }
}

// The executor reads every column reference as a [name, function] pair.
impl Serialize for ColumnRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut pair = serializer.serialize_tuple(2)?;
        pair.serialize_element(self.name())?;
        pair.serialize_element(&self.function())?;
        pair.end()
    }
}

/// Generated boolean expression text plus the identifiers it mentions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoolExpr {
    pub text: String,
    pub identifiers: IdentifierMap,
}

// Serialized as [text, identifiers].
impl Serialize for BoolExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut pair = serializer.serialize_tuple(2)?;
        pair.serialize_element(&self.text)?;
        pair.serialize_element(&self.identifiers)?;
        pair.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSpec {
    pub right_table: String,
    pub join_kind: String,
    pub left_key: String,
    pub right_key: String,
    pub right_alias: String,
}

// Serialized as [right_table, join_kind, left_key, right_key, right_alias].
impl Serialize for JoinSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut row = serializer.serialize_tuple(5)?;
        row.serialize_element(&self.right_table)?;
        row.serialize_element(&self.join_kind)?;
        row.serialize_element(&self.left_key)?;
        row.serialize_element(&self.right_key)?;
        row.serialize_element(&self.right_alias)?;
        row.end()
    }
}

/// Value produced by a CASE branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CaseResult {
    Ref(ColumnRef),
    Literal(String),
}

impl fmt::Display for CaseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseResult::Ref(column) => write!(f, "{}", column),
            CaseResult::Literal(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseExpr {
    #[serde(rename = "as_name")]
    pub name: String,
    /// Branches in source order.
    #[serde(rename = "stmts")]
    pub conditions: Vec<(BoolExpr, CaseResult)>,
    #[serde(rename = "else_stmt", skip_serializing_if = "Option::is_none")]
    pub else_result: Option<CaseResult>,
}

/// Structured result of analyzing one SELECT statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryPlan {
    /// `None` for `SELECT *`.
    #[serde(rename = "SELECT")]
    pub select: Option<Vec<ColumnRef>>,
    /// (table name, alias); both equal when unaliased.
    #[serde(rename = "FROM")]
    pub from_table: (String, String),
    #[serde(rename = "WHERE")]
    pub where_expr: Option<BoolExpr>,
    /// `None` when the statement has no GROUP BY clause.
    #[serde(rename = "GROUP BY", skip_serializing_if = "Option::is_none")]
    pub group_by: Option<Vec<ColumnRef>>,
    #[serde(rename = "ORDER BY", skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Vec<ColumnRef>>,
    #[serde(rename = "FUNCTIONS")]
    pub functions: LinkedHashMap<String, Vec<String>>,
    #[serde(rename = "JOINS")]
    pub joins: Vec<JoinSpec>,
    #[serde(rename = "ALIASES")]
    pub aliases: LinkedHashMap<String, AliasTarget>,
    #[serde(rename = "CASES")]
    pub cases: LinkedHashMap<ClauseKind, Vec<CaseExpr>>,
    #[serde(rename = "NESTED_QUERIES")]
    pub nested_queries: LinkedHashMap<String, QueryPlan>,
}

impl QueryPlan {
    /// Renders the executor contract as JSON.
    pub fn to_json(&self) -> PlanResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| PlanError::Serialize(e.to_string()))
    }

    pub fn case(&self, name: &str) -> Option<&CaseExpr> {
        self.cases
            .iter()
            .flat_map(|(_, cases)| cases.iter())
            .find(|case| case.name == name)
    }
}
