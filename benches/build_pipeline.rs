//! Criterion measurements of the template pipeline: building a statement without touching
//! the database, and a full single-row round trip against in-memory `SQLite`.

use std::hint::black_box;
use std::sync::LazyLock;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde::Deserialize;
use serde_json::json;
use sql_templates::prelude::*;
use tokio::runtime::Runtime;

static TOKIO_RUNTIME: LazyLock<Runtime> =
    LazyLock::new(|| Runtime::new().expect("create tokio runtime"));

fn templates() -> MemorySource {
    MemorySource::new([
        (
            "user/search",
            "select id, name from users where {{ filter }}\
             {% if limit %} limit :limit{% endif %}",
        ),
        ("user/get", "select id, name from users where id = :id"),
    ])
}

fn engine() -> SqlTemplates<SqliteDatabase> {
    TOKIO_RUNTIME.block_on(async {
        let db = SqliteDatabase::builder(":memory:")
            .build()
            .await
            .expect("open sqlite");
        db.execute_batch(
            "create table users (id integer primary key, name text not null);
             with recursive n(i) as (select 1 union all select i + 1 from n where i < 1000)
             insert into users (id, name) select i, 'user' || i from n;",
        )
        .await
        .expect("seed users");
        SqlTemplates::new(db, &templates(), &[]).expect("parse templates")
    })
}

fn bench_build(c: &mut Criterion) {
    let engine = engine();
    let mut group = c.benchmark_group("build");
    for list_len in [1usize, 10, 100] {
        let cities: Vec<String> = (0..list_len).map(|i| format!("city{i}")).collect();
        let input = json!({
            "filter": "city in (:cities) and age > :age",
            "cities": cities,
            "age": 30,
            "limit": 50,
        });
        group.throughput(Throughput::Elements(list_len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(list_len), &input, |b, input| {
            b.iter(|| {
                engine
                    .build("user/search", Some(black_box(input)))
                    .expect("build statement")
            });
        });
    }
    group.finish();
}

#[derive(Deserialize)]
struct User {
    id: i64,
    name: String,
}

fn bench_get(c: &mut Criterion) {
    let engine = engine();
    let ctx = QueryContext::new();
    c.bench_function("get/sqlite_memory", |b| {
        b.to_async(&*TOKIO_RUNTIME).iter(|| async {
            let user: User = engine
                .get(&ctx, "user/get", Some(&json!({"id": 500})))
                .await
                .expect("fetch user");
            black_box((user.id, user.name))
        });
    });
}

criterion_group!(benches, bench_build, bench_get);
criterion_main!(benches);
