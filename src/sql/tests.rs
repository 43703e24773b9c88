use crate::common::PlanError;
use crate::sql::plan::{CaseResult, ClauseKind, ColumnRef, QueryPlan};
use crate::sql::token::{Category, Keyword, TokenNode};
use crate::sql::{parse_sql_to_plan, SqlParser};

fn plan(sql: &str) -> QueryPlan {
    parse_sql_to_plan(sql).unwrap()
}

fn col(name: &str) -> ColumnRef {
    ColumnRef::column(name)
}

#[test]
fn test_simple_select() {
    let plan = plan("SELECT c FROM t");
    assert_eq!(plan.from_table, ("t".to_string(), "t".to_string()));
    assert_eq!(plan.select, Some(vec![col("c")]));
    assert!(plan.joins.is_empty());
    assert_eq!(plan.where_expr, None);
    assert_eq!(plan.group_by, None);
    assert_eq!(plan.order_by, None);
    assert_eq!(plan.aliases.get("c"), Some(&(None, None)));
}

#[test]
fn test_select_wildcard() {
    assert_eq!(plan("SELECT * FROM t").select, None);
    assert_eq!(plan("SELECT t.* FROM t").select, Some(vec![col("t.*")]));
}

#[test]
fn test_inner_join() {
    let plan = plan("SELECT a, b FROM t1 JOIN t2 ON t1.x = t2.y");
    assert_eq!(plan.select, Some(vec![col("a"), col("b")]));
    assert_eq!(plan.from_table, ("t1".to_string(), "t1".to_string()));
    assert_eq!(plan.joins.len(), 1);
    let join = &plan.joins[0];
    assert_eq!(join.join_kind, "inner");
    assert_eq!(join.right_table, "t2");
    assert_eq!(join.right_alias, "t2");
    assert_eq!(join.left_key, "t1.x");
    assert_eq!(join.right_key, "t2.y");
}

#[test]
fn test_join_chain_keeps_source_order() {
    let plan = plan(
        "SELECT * FROM users u JOIN orders o ON u.id = o.uid LEFT OUTER JOIN items AS i ON o.item = i.id",
    );
    assert_eq!(plan.from_table, ("users".to_string(), "u".to_string()));
    let kinds: Vec<&str> = plan.joins.iter().map(|j| j.join_kind.as_str()).collect();
    assert_eq!(kinds, vec!["inner", "left"]);
    assert_eq!(plan.joins[0].right_table, "orders");
    assert_eq!(plan.joins[0].right_alias, "o");
    assert_eq!(plan.joins[1].right_table, "items");
    assert_eq!(plan.joins[1].right_alias, "i");
    assert_eq!(plan.joins[1].left_key, "o.item");
}

#[test]
fn test_join_errors() {
    assert!(matches!(
        parse_sql_to_plan("SELECT * FROM a JOIN b ON a.x > b.y"),
        Err(PlanError::UnsupportedFeature(_))
    ));
    assert!(matches!(
        parse_sql_to_plan("SELECT * FROM a JOIN b ON a.x <> b.y"),
        Err(PlanError::UnsupportedFeature(_))
    ));
    assert!(matches!(
        parse_sql_to_plan("SELECT * FROM a JOIN b ON a.x = b.y AND a.z = b.z"),
        Err(PlanError::UnsupportedFeature(_))
    ));
    assert!(matches!(
        parse_sql_to_plan("SELECT * FROM a JOIN b"),
        Err(PlanError::MalformedStatement(_))
    ));
    assert!(matches!(
        parse_sql_to_plan("SELECT * FROM a, b"),
        Err(PlanError::UnsupportedFeature(_))
    ));
}

#[test]
fn test_select_alias() {
    let plan = plan("SELECT a AS foo FROM t");
    assert_eq!(plan.select, Some(vec![col("foo")]));
    assert_eq!(plan.aliases.get("foo"), Some(&(Some(col("a")), None)));
}

#[test]
fn test_function_alias_and_catalog() {
    let plan = plan("SELECT MAX(s) AS top, MIN(s), MAX(s) FROM t");
    assert_eq!(
        plan.select,
        Some(vec![
            col("top"),
            ColumnRef::Function { column: "s".to_string(), function: "min".to_string() },
            ColumnRef::Function { column: "s".to_string(), function: "max".to_string() },
        ])
    );
    assert_eq!(
        plan.aliases.get("top"),
        Some(&(Some(col("s")), Some("max".to_string())))
    );
    assert_eq!(
        plan.functions.get("s"),
        Some(&vec!["max".to_string(), "min".to_string()])
    );
}

#[test]
fn test_where_conjunction() {
    let plan = plan("SELECT a FROM t WHERE a = 1 AND b = 2");
    let expr = plan.where_expr.unwrap();
    assert_eq!(expr.text, "(a == 1) & (b == 2)");
    assert_eq!(expr.identifiers.get("a"), Some(&("a".to_string(), None)));
    assert_eq!(expr.identifiers.get("b"), Some(&("b".to_string(), None)));
}

#[test]
fn test_where_operands() {
    let plan = plan("SELECT a FROM t WHERE MAX(t.b) > 3 OR name LIKE 'x%' AND t.c <> -1");
    let expr = plan.where_expr.unwrap();
    assert_eq!(expr.text, "(t_b_max > 3) | (name LIKE 'x%') & (t_c != -1)");
    assert_eq!(
        expr.identifiers.get("t_b_max"),
        Some(&("t.b".to_string(), Some("max".to_string())))
    );
    assert_eq!(expr.identifiers.get("t_c"), Some(&("t.c".to_string(), None)));
}

#[test]
fn test_group_and_order_by() {
    let plan = plan("SELECT a FROM t GROUP BY a, MAX(b) ORDER BY a DESC, b");
    assert_eq!(plan.group_by, Some(vec![col("a"), col("b")]));
    assert_eq!(plan.order_by, Some(vec![col("a"), col("b")]));
}

#[test]
fn test_nested_subquery() {
    let outer = plan("SELECT * FROM (SELECT x FROM t) AS sub");
    assert_eq!(outer.from_table, ("###temp_sub".to_string(), "sub".to_string()));
    assert_eq!(outer.nested_queries.get("###temp_sub"), Some(&plan("SELECT x FROM t")));
}

#[test]
fn test_subquery_as_join_source() {
    let plan = plan("SELECT * FROM t JOIN (SELECT id FROM u) AS s ON t.id = s.id");
    assert_eq!(plan.joins[0].right_table, "###temp_s");
    assert_eq!(plan.joins[0].right_alias, "s");
    assert!(plan.nested_queries.contains_key("###temp_s"));
}

#[test]
fn test_subquery_needs_alias() {
    assert!(matches!(
        parse_sql_to_plan("SELECT * FROM (SELECT x FROM t)"),
        Err(PlanError::MalformedStatement(_))
    ));
}

#[test]
fn test_nested_case_names_are_independent() {
    let outer = plan("SELECT CASE WHEN a = 1 THEN b END FROM (SELECT CASE WHEN x = 1 THEN y END FROM t) AS s");
    let standalone = plan("SELECT CASE WHEN x = 1 THEN y END FROM t");
    assert_eq!(outer.select, Some(vec![ColumnRef::Case("case1".to_string())]));
    assert_eq!(outer.nested_queries.get("###temp_s"), Some(&standalone));
    assert_eq!(standalone.select, Some(vec![ColumnRef::Case("case1".to_string())]));
}

#[test]
fn test_case_names_and_counter_reset() {
    let sql = "SELECT CASE WHEN a = 1 THEN b END, CASE WHEN c = 2 THEN d ELSE e END FROM t";
    let first = plan(sql);
    assert_eq!(
        first.select,
        Some(vec![ColumnRef::Case("case1".to_string()), ColumnRef::Case("case2".to_string())])
    );
    let cases = first.cases.get(&ClauseKind::Select).unwrap();
    assert_eq!(cases.len(), 2);
    assert_eq!(cases[1].else_result, Some(CaseResult::Ref(col("e"))));

    let again = plan(sql);
    assert_eq!(again.case("case1").map(|c| c.name.as_str()), Some("case1"));
    assert_eq!(first, again);
}

#[test]
fn test_aliased_case_with_literals() {
    let plan = plan(
        "SELECT CASE WHEN score >= 90 THEN 'A' WHEN score >= 80 AND bonus = 1 THEN 'B' ELSE 'C' END AS grade FROM results",
    );
    assert_eq!(plan.select, Some(vec![ColumnRef::Case("grade".to_string())]));
    let case = plan.case("grade").unwrap();
    assert_eq!(case.conditions.len(), 2);
    assert_eq!(case.conditions[0].0.text, "(score >= 90)");
    assert_eq!(case.conditions[0].1, CaseResult::Literal("'A'".to_string()));
    assert_eq!(case.conditions[1].0.text, "(score >= 80) & (bonus == 1)");
    assert_eq!(case.else_result, Some(CaseResult::Literal("'C'".to_string())));
}

#[test]
fn test_case_filed_under_its_clause() {
    let plan = plan("SELECT a FROM t ORDER BY CASE WHEN a = 1 THEN b ELSE c END");
    assert_eq!(plan.order_by, Some(vec![ColumnRef::Case("case1".to_string())]));
    assert!(plan.cases.get(&ClauseKind::OrderBy).is_some());
    assert!(plan.cases.get(&ClauseKind::Select).is_none());
}

#[test]
fn test_parse_is_deterministic() {
    let sql = "SELECT u.name, COUNT(o.id) AS n FROM users u JOIN orders o ON u.id = o.uid WHERE o.total > 10 GROUP BY u.name";
    assert_eq!(plan(sql), plan(sql));
    assert_eq!(plan(sql).to_json().unwrap(), plan(sql).to_json().unwrap());
}

#[test]
fn test_arithmetic_is_unsupported() {
    assert!(matches!(
        parse_sql_to_plan("SELECT a + b FROM t"),
        Err(PlanError::UnsupportedFeature(_))
    ));
    assert!(matches!(
        parse_sql_to_plan("SELECT a * 2 AS double FROM t"),
        Err(PlanError::UnsupportedFeature(_))
    ));
}

#[test]
fn test_unsupported_clauses() {
    for sql in [
        "SELECT a FROM t LIMIT 5",
        "SELECT DISTINCT a FROM t",
        "SELECT a FROM t UNION SELECT b FROM u",
    ] {
        assert!(
            matches!(parse_sql_to_plan(sql), Err(PlanError::UnsupportedFeature(_))),
            "{}",
            sql
        );
    }
}

#[test]
fn test_malformed_statements() {
    for sql in [
        "SELECT a",
        "FROM t",
        "t WHERE a = 1",
        "SELECT a FROM t WHERE a = 1 WHERE b = 2",
        "SELECT FROM t",
        "",
    ] {
        assert!(
            matches!(parse_sql_to_plan(sql), Err(PlanError::MalformedStatement(_))),
            "{}",
            sql
        );
    }
}

#[test]
fn test_nesting_limit() {
    let sql = "SELECT * FROM (SELECT * FROM (SELECT * FROM (SELECT x FROM t) AS c) AS b) AS a";
    let deep = SqlParser::new().parse_statement(sql).unwrap();
    let b = deep.nested_queries.get("###temp_a").unwrap();
    assert!(b.nested_queries.get("###temp_b").unwrap().nested_queries.contains_key("###temp_c"));

    assert_eq!(
        SqlParser::with_max_depth(2).parse_statement(sql),
        Err(PlanError::TooDeeplyNested(2))
    );
}

#[test]
fn test_json_contract() {
    let value: serde_json::Value =
        serde_json::from_str(&plan("SELECT c FROM t").to_json().unwrap()).unwrap();
    assert_eq!(value["SELECT"], serde_json::json!([["c", null]]));
    assert_eq!(value["FROM"], serde_json::json!(["t", "t"]));
    assert!(value["WHERE"].is_null());
    assert!(value.get("GROUP BY").is_none());
    assert!(value.get("ORDER BY").is_none());
    for key in ["FUNCTIONS", "JOINS", "ALIASES", "CASES", "NESTED_QUERIES"] {
        assert!(value.get(key).is_some(), "{}", key);
    }

    let joined: serde_json::Value = serde_json::from_str(
        &plan("SELECT a FROM t1 JOIN t2 ON t1.x = t2.y WHERE a = 1")
            .to_json()
            .unwrap(),
    )
    .unwrap();
    assert_eq!(
        joined["WHERE"],
        serde_json::json!(["(a == 1)", {"a": ["a", null]}])
    );
    assert_eq!(
        joined["JOINS"][0],
        serde_json::json!(["t2", "inner", "t1.x", "t2.y", "t2"])
    );

    let cased: serde_json::Value = serde_json::from_str(
        &plan("SELECT CASE WHEN a = 1 THEN b END FROM t").to_json().unwrap(),
    )
    .unwrap();
    let case = &cased["CASES"]["SELECT"][0];
    assert_eq!(
        case["stmts"][0],
        serde_json::json!([["(a == 1)", {"a": ["a", null]}], ["b", null]])
    );
    assert!(case.get("else_stmt").is_none());

    let grouped: serde_json::Value = serde_json::from_str(
        &plan("SELECT a FROM t GROUP BY a").to_json().unwrap(),
    )
    .unwrap();
    assert_eq!(grouped["GROUP BY"], serde_json::json!([["a", null]]));
}

#[test]
fn test_analyze_hand_built_tree() {
    let tokens = vec![
        TokenNode::kw(Keyword::Select, "SELECT"),
        TokenNode::space(),
        TokenNode::group(Category::Identifier, vec![TokenNode::name("c")]),
        TokenNode::space(),
        TokenNode::leaf(Category::Comment, "-- projection\n"),
        TokenNode::kw(Keyword::From, "FROM"),
        TokenNode::space(),
        TokenNode::group(Category::Identifier, vec![TokenNode::name("t")]),
    ];
    let plan = SqlParser::new().analyze(&tokens).unwrap();
    assert_eq!(plan.select, Some(vec![col("c")]));
    assert_eq!(plan.from_table, ("t".to_string(), "t".to_string()));
}

#[test]
fn test_parser_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SqlParser>();
}
