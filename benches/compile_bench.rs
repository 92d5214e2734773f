/// Benchmark suite for query compilation
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile_correlated_query", |b| {
        let query = "select FromAC, FromTel, R.ToAC, R.Length, sum(R.Length)\n\
                     from CALLS\n\
                     group by FromAC, FromTel : R\n\
                     suchthat R.Date > \"96/05/31\" and R.Date < \"96/09/01\"\n\
                     having sum(R.Length)*3 > sum(Length) and R.Length = max(R.Length)";

        b.iter(|| {
            let _ = mfq_engine::compile(black_box(query));
        });
    });
}

fn bench_execute(c: &mut Criterion) {
    use mfq_engine::{MfqEngine, Relation, Value};

    c.bench_function("execute_two_variable_query", |b| {
        let mut relation = Relation::new(vec!["cust".into(), "state".into(), "quant".into()]);
        for idx in 0..512i64 {
            relation
                .push_row(vec![
                    Value::String(format!("c{}", idx % 16)),
                    Value::String(if idx % 3 == 0 { "NY".into() } else { "NJ".into() }),
                    Value::Int64(idx % 40),
                ])
                .unwrap();
        }
        let mut engine = MfqEngine::new();
        engine.register_relation("sales", relation);

        let query = "select cust, sum(x.quant), sum(y.quant)\n\
                     from sales\n\
                     group by cust : x, y\n\
                     suchthat x.state = 'NY' and x.quant > 15, y.state = 'NJ'\n\
                     having sum(x.quant) > 0";

        b.iter(|| {
            let _ = engine.execute_query(black_box(query));
        });
    });
}

criterion_group!(benches, bench_compile, bench_execute);
criterion_main!(benches);
