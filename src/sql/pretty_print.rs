/// Pretty printing utilities for query plans.
/// This module renders a QueryPlan and its nested queries as a tree. For easy observation and testing.

use std::fmt::Write;

use crate::sql::plan::{CaseExpr, ColumnRef, QueryPlan};

fn fmt_columns(columns: &[ColumnRef]) -> String {
    columns
        .iter()
        .map(|c| format!("{}", c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn fmt_case(case: &CaseExpr) -> String {
    let mut branches: Vec<String> = case
        .conditions
        .iter()
        .map(|(condition, result)| format!("when {} then {}", condition.text, result))
        .collect();
    if let Some(result) = &case.else_result {
        branches.push(format!("else {}", result));
    }
    branches.join("; ")
}

impl QueryPlan {
    pub fn pretty_print(&self) {
        print!("{}", self.pretty_string());
    }

    pub fn pretty_string(&self) -> String {
        let mut out = String::new();
        self.pretty_print_inner(&mut out, "", true, "Query");
        out
    }

    fn pretty_print_inner(&self, out: &mut String, prefix: &str, is_last: bool, label: &str) {
        let branch = if is_last { "└── " } else { "├── " };
        let (table, alias) = &self.from_table;
        let _ = writeln!(out, "{}{}{} [{} AS {}]", prefix, branch, label, table, alias);

        let new_prefix = if is_last {
            format!("{}    ", prefix)
        } else {
            format!("{}│   ", prefix)
        };

        let lines = self.node_lines();
        let total = lines.len() + self.nested_queries.len();
        for (i, line) in lines.iter().enumerate() {
            let branch = if i + 1 == total { "└── " } else { "├── " };
            let _ = writeln!(out, "{}{}{}", new_prefix, branch, line);
        }
        for (i, (key, nested)) in self.nested_queries.iter().enumerate() {
            let last = lines.len() + i + 1 == total;
            nested.pretty_print_inner(out, &new_prefix, last, &format!("Subquery {}", key));
        }
    }

    fn node_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        match &self.select {
            Some(columns) => lines.push(format!("Projection [{}]", fmt_columns(columns))),
            None => lines.push("Projection [*]".to_string()),
        }
        for join in &self.joins {
            lines.push(format!(
                "Join [{}, {} AS {}, on: {} = {}]",
                join.join_kind, join.right_table, join.right_alias, join.left_key, join.right_key
            ));
        }
        if let Some(expr) = &self.where_expr {
            lines.push(format!("Filter [{}]", expr.text));
        }
        if let Some(columns) = &self.group_by {
            lines.push(format!("Aggregate [group_by: {}]", fmt_columns(columns)));
        }
        if let Some(columns) = &self.order_by {
            lines.push(format!("Sort [{}]", fmt_columns(columns)));
        }
        for (clause, cases) in self.cases.iter() {
            for case in cases {
                lines.push(format!("Case [{} in {}: {}]", case.name, clause, fmt_case(case)));
            }
        }
        if !self.functions.is_empty() {
            let functions = self
                .functions
                .iter()
                .map(|(column, names)| format!("{}: {}", column, names.join("/")))
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("Functions [{}]", functions));
        }
        lines
    }
}
