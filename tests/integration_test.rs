//! Integration tests for the public API
//!
//! Run with: `cargo test --test integration_test`

use mfq_engine::{compile, EngineError, MfqEngine, Relation, Value};

fn s(text: &str) -> Value {
    Value::String(text.to_string())
}

fn i(value: i64) -> Value {
    Value::Int64(value)
}

fn calls_engine() -> MfqEngine {
    let mut relation = Relation::new(vec![
        "FromAC".into(),
        "FromTel".into(),
        "ToAC".into(),
        "Length".into(),
        "Date".into(),
    ]);
    let rows = [
        ("201", "1111", "303", 10, "96/06/15"),
        ("201", "1111", "404", 20, "96/07/01"),
        ("201", "1111", "505", 100, "96/01/01"),
        ("201", "2222", "303", 50, "96/06/20"),
        ("201", "2222", "404", 30, "96/07/10"),
        ("201", "2222", "505", 5, "95/01/01"),
    ];
    for (ac, tel, to, len, date) in rows {
        relation
            .push_row(vec![s(ac), s(tel), s(to), i(len), s(date)])
            .unwrap();
    }

    let mut engine = MfqEngine::new();
    engine.register_relation("CALLS", relation);
    engine
}

fn sales_engine() -> MfqEngine {
    let mut relation = Relation::new(vec![
        "prod".into(),
        "cust".into(),
        "state".into(),
        "quant".into(),
    ]);
    let rows = [
        ("p1", "c1", "NY", 20),
        ("p1", "c1", "NY", 10),
        ("p1", "c1", "NJ", 5),
        ("p1", "c1", "CT", 7),
        ("p2", "c1", "NY", 10),
        ("p2", "c1", "NJ", 3),
    ];
    for (prod, cust, state, quant) in rows {
        relation
            .push_row(vec![s(prod), s(cust), s(state), i(quant)])
            .unwrap();
    }

    let mut engine = MfqEngine::new();
    engine.register_relation("sales", relation);
    engine
}

fn sorted_rows(relation: &Relation) -> Vec<Vec<Value>> {
    let mut rows = relation.rows.clone();
    rows.sort_by_key(|row| format!("{row:?}"));
    rows
}

const CALLS_QUERY: &str = "select FromAC, FromTel, R.ToAC, R.Length, sum(R.Length)\n\
                           from CALLS\n\
                           group by FromAC, FromTel : R\n\
                           suchthat R.Date > \"96/05/31\" and R.Date < \"96/09/01\"\n\
                           having sum(R.Length)*3 > sum(Length) and R.Length = max(R.Length)";

#[test]
fn test_calls_scenario() {
    let engine = calls_engine();
    let result = engine.execute_query(CALLS_QUERY).unwrap();

    assert_eq!(
        result.columns,
        vec!["FromAC", "FromTel", "R.ToAC", "R.Length", "sum(R.Length)"]
    );
    // (201, 1111): qualifying sum 30, tripled it stays below the
    // unrestricted 130. (201, 2222): qualifying sum 80, 240 > 85, and only
    // the 50-minute call equals the qualifying maximum.
    assert_eq!(
        result.rows,
        vec![vec![s("201"), s("2222"), s("303"), i(50), i(80)]]
    );
}

#[test]
fn test_independent_grouping_variables() {
    let engine = sales_engine();
    let query = "select prod, cust, state, sum(quant), sum(x.quant), sum(y.quant)\n\
                 from sales\n\
                 group by prod, cust : x, y\n\
                 suchthat x.state = 'NY' and x.quant > 15, y.state = 'NJ'\n\
                 having sum(x.quant) > 0";

    let compiled = compile(query).unwrap();
    assert_eq!(compiled.join_set, vec!["x", "y"]);

    let result = engine.execute_query(query).unwrap();
    // (p2, c1) has no NY sale above 15, so x is empty there and the
    // partition drops out of the inner join. (p1, c1) keeps one combined
    // row per distinct base state.
    assert_eq!(
        sorted_rows(&result),
        vec![
            vec![s("p1"), s("c1"), s("CT"), i(42), i(20), i(5)],
            vec![s("p1"), s("c1"), s("NJ"), i(42), i(20), i(5)],
            vec![s("p1"), s("c1"), s("NY"), i(42), i(20), i(5)],
        ]
    );
}

#[test]
fn test_single_variable_reduces_to_filter_aggregate_select() {
    let engine = sales_engine();
    let result = engine
        .execute_query(
            "select prod, cust, sum(quant)\n\
             from sales\n\
             group by prod, cust : z\n\
             suchthat quant > 0\n\
             having sum(quant) > 10",
        )
        .unwrap();

    assert_eq!(result.columns, vec!["prod", "cust", "sum(quant)"]);
    assert_eq!(
        sorted_rows(&result),
        vec![
            vec![s("p1"), s("c1"), i(42)],
            vec![s("p2"), s("c1"), i(13)],
        ]
    );
}

#[test]
fn test_result_is_independent_of_predicate_order() {
    let engine = sales_engine();
    let forward = "select prod, cust, sum(x.quant), sum(y.quant)\n\
                   from sales\n\
                   group by prod, cust : x, y\n\
                   suchthat x.state = 'NY' and x.quant > 15, y.state = 'NJ'\n\
                   having sum(x.quant) > 0";
    let reversed = "select prod, cust, sum(x.quant), sum(y.quant)\n\
                    from sales\n\
                    group by prod, cust : x, y\n\
                    suchthat y.state = 'NJ', x.state = 'NY' and x.quant > 15\n\
                    having sum(x.quant) > 0";

    let a = engine.execute_query(forward).unwrap();
    let b = engine.execute_query(reversed).unwrap();
    assert_eq!(a.columns, b.columns);
    assert_eq!(sorted_rows(&a), sorted_rows(&b));
}

#[test]
fn test_cyclic_suchthat_fails_without_output() {
    let engine = sales_engine();
    let err = engine
        .execute_query(
            "select cust\n\
             from sales\n\
             group by cust : x, y\n\
             suchthat x.quant > avg(y.quant), y.quant > avg(x.quant)\n\
             having count(x.quant) > 0",
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::CyclicDependency { .. }));
}

#[test]
fn test_compiled_query_is_idempotent() {
    let engine = calls_engine();
    let compiled = compile(CALLS_QUERY).unwrap();

    let first = engine.execute_compiled(&compiled).unwrap();
    let second = engine.execute_compiled(&compiled).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_where_filters_base_before_grouping() {
    let engine = sales_engine();
    let with_where = engine
        .execute_query(
            "select prod, cust, sum(quant)\n\
             from sales\n\
             group by prod, cust : z\n\
             suchthat quant > 0\n\
             having sum(quant) > 0\n\
             where state <> 'CT'",
        )
        .unwrap();

    // The CT sale (7) is gone before aggregation
    assert_eq!(
        sorted_rows(&with_where),
        vec![
            vec![s("p1"), s("c1"), i(35)],
            vec![s("p2"), s("c1"), i(13)],
        ]
    );
}

#[test]
fn test_error_taxonomy_at_compile_time() {
    // Unrecognized clause keyword
    assert!(matches!(
        compile("select a\nfromm t"),
        Err(EngineError::MalformedQuery { .. })
    ));

    // Condition without an operator
    assert!(matches!(
        compile(
            "select cust\nfrom sales\ngroup by cust : x\nsuchthat x.quant\nhaving count(x.quant) > 0"
        ),
        Err(EngineError::InvalidPredicate { .. })
    ));

    // Undeclared grouping variable in having
    assert!(matches!(
        compile(
            "select cust\nfrom sales\ngroup by cust : x\nsuchthat x.quant > 0\nhaving sum(w.quant) > 0"
        ),
        Err(EngineError::UnknownGroupingVariable { .. })
    ));
}

#[test]
fn test_csv_provider_feeds_the_engine() {
    use mfq_engine::storage::provider::CsvDirectoryProvider;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("sales.csv"),
        "prod,cust,state,quant\n\
         p1,c1,NY,20\n\
         p1,c1,NJ,5\n",
    )
    .unwrap();

    let engine = MfqEngine::with_provider(Box::new(CsvDirectoryProvider::new(dir.path())));
    let result = engine
        .execute_query(
            "select prod, cust, sum(x.quant)\n\
             from sales\n\
             group by prod, cust : x\n\
             suchthat x.state = 'NY'\n\
             having sum(x.quant) > 0",
        )
        .unwrap();

    assert_eq!(result.rows, vec![vec![s("p1"), s("c1"), i(20)]]);
}
