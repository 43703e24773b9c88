use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sqlplan::SqlParser;

const SIMPLE: &str = "SELECT id, name FROM users WHERE id = 50";
const JOINED: &str = "SELECT u.name, COUNT(o.id) AS n FROM users u \
    JOIN orders o ON u.id = o.user_id \
    LEFT JOIN items AS i ON o.item_id = i.id \
    WHERE o.amount > 10 AND u.active = 1 \
    GROUP BY u.name ORDER BY u.name DESC";
const CASES: &str = "SELECT CASE WHEN amount >= 100 THEN 'large' WHEN amount >= 10 THEN 'medium' ELSE 'small' END AS size, \
    CASE WHEN category = 1 THEN val ELSE 0 END \
    FROM (SELECT amount, category, val FROM test_main) AS m";

fn bench_parse_suites(c: &mut Criterion) {
    let parser = SqlParser::new();

    let mut group = c.benchmark_group("Parse");
    group.bench_function("simple_select", |b| {
        b.iter(|| parser.parse_statement(black_box(SIMPLE)).unwrap());
    });
    group.bench_function("join_chain", |b| {
        b.iter(|| parser.parse_statement(black_box(JOINED)).unwrap());
    });
    group.bench_function("case_and_subquery", |b| {
        b.iter(|| parser.parse_statement(black_box(CASES)).unwrap());
    });
    group.finish();

    let plan = parser.parse_statement(JOINED).unwrap();
    c.bench_function("to_json", |b| {
        b.iter(|| black_box(&plan).to_json().unwrap());
    });
}

criterion_group!(benches, bench_parse_suites);
criterion_main!(benches);
