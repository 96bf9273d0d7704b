#![cfg(feature = "sqlite")]

use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use sql_templates::prelude::*;

fn write_templates(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(root.join("user"))?;
    let files = [
        (
            "schema.sql",
            "create table users (\
             id integer primary key autoincrement, \
             name text not null, \
             city text, \
             active integer not null default 1, \
             prefs text)",
        ),
        (
            "user/create.sql",
            "insert into users (name, city, active, prefs) \
             values (:name, :city, :active, :prefs) returning id",
        ),
        (
            "user/get.sql",
            "select id, name, city, active, prefs from users where id = :id",
        ),
        (
            "user/update.sql",
            "update users set city = :city where id = :id returning city",
        ),
        (
            "user/find.sql",
            "select id, name, city, active, prefs from users \
             where city in (:cities){% if only_active %} and active = 1{% endif %} \
             order by id",
        ),
        (
            "user/deactivate.sql",
            "update users set active = 0 where name = :name",
        ),
        ("user/insert_plain.sql", "insert into users (name) values (:name)"),
    ];
    for (path, text) in files {
        std::fs::write(root.join(path), text)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct User {
    id: Option<i64>,
    name: String,
    city: Option<String>,
    active: bool,
    prefs: Prefs,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Prefs {
    theme: String,
}

impl User {
    fn new(name: &str, city: &str, active: bool) -> Self {
        Self {
            id: None,
            name: name.into(),
            city: Some(city.into()),
            active,
            prefs: Prefs {
                theme: format!("{name}-dark"),
            },
        }
    }
}

#[tokio::test]
async fn scalar_round_trip_in_memory() -> Result<(), Box<dyn std::error::Error>> {
    let db = SqliteDatabase::builder(":memory:").build().await?;
    let engine = SqlTemplates::new(db, &MemorySource::new([("v", "select :v as v")]), &[])?;
    let ctx = QueryContext::new();

    let v: i64 = engine.get(&ctx, "v", Some(&json!({"v": 5}))).await?;
    assert_eq!(v, 5);

    #[derive(Deserialize)]
    struct Row {
        v: String,
    }
    let row: Row = engine.get(&ctx, "v", Some(&json!({"v": "it's"}))).await?;
    assert_eq!(row.v, "it's");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn records_through_template_files() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let templates = dir.path().join("sql");
    write_templates(&templates)?;
    let db_path = dir.path().join("users.db");

    let db = SqliteDatabase::builder(db_path.to_string_lossy())
        .cursor_buffer(2)
        .build()
        .await?;
    let engine = SqlTemplates::builder(db)
        .templates_dir(&templates)
        .patterns(["schema.sql", "user/*.sql"])
        .build()?;
    let ctx = QueryContext::new();
    engine.exec(&ctx, "schema", None::<&()>).await?;

    let mut ann = User::new("ann", "Tampa", true);
    engine.create(&ctx, "user/create", &mut ann).await?;
    assert_eq!(ann.id, Some(1));
    let mut bob = User::new("bob", "Rio", true);
    engine.create(&ctx, "user/create", &mut bob).await?;
    let mut cy = User::new("cy", "Oslo", false);
    engine.create(&ctx, "user/create", &mut cy).await?;
    assert_eq!(cy.id, Some(3));

    let fetched: User = engine.get(&ctx, "user/get", Some(&json!({"id": 2}))).await?;
    assert_eq!(fetched, bob);

    let err = engine
        .get::<User, _>(&ctx, "user/get", Some(&json!({"id": 99})))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    bob.city = Some("Lima".into());
    engine.update(&ctx, "user/update", &mut bob).await?;
    assert_eq!(bob.city.as_deref(), Some("Lima"));
    assert_eq!(bob.name, "bob");

    let found: Vec<User> = engine
        .select(
            &ctx,
            "user/find",
            Some(&json!({"cities": ["Tampa", "Lima", "Oslo"], "only_active": true})),
        )
        .await?;
    assert_eq!(
        found.iter().map(|u| u.name.as_str()).collect::<Vec<_>>(),
        vec!["ann", "bob"]
    );

    let summary = engine
        .exec(&ctx, "user/deactivate", Some(&json!({"name": "ann"})))
        .await?;
    assert_eq!(summary.rows_affected, 1);

    let mut visited = Vec::new();
    engine
        .iterate(
            &ctx,
            "user/find",
            Some(&json!({"cities": ["Tampa", "Lima", "Oslo"], "only_active": false})),
            |row| {
                let user: User = row.scan()?;
                visited.push((user.name, user.active));
                Ok(ControlFlow::Continue(()))
            },
        )
        .await?;
    assert_eq!(
        visited,
        vec![
            ("ann".to_string(), false),
            ("bob".to_string(), true),
            ("cy".to_string(), false),
        ]
    );

    // stopping early leaves the connection usable
    let mut first = None;
    engine
        .iterate(
            &ctx,
            "user/find",
            Some(&json!({"cities": ["Tampa", "Lima", "Oslo"]})),
            |row| {
                first = row.row().get("name").and_then(RowValues::as_text).map(str::to_owned);
                Ok(ControlFlow::Break(()))
            },
        )
        .await?;
    assert_eq!(first.as_deref(), Some("ann"));

    let summary = engine
        .exec(&ctx, "user/insert_plain", Some(&json!({"name": "dee"})))
        .await?;
    assert_eq!(summary, ExecSummary::new(1, Some(4)));
    Ok(())
}

#[tokio::test]
async fn database_errors_are_labelled() -> Result<(), Box<dyn std::error::Error>> {
    let db = SqliteDatabase::builder(":memory:").build().await?;
    let engine = SqlTemplates::new(
        db,
        &MemorySource::new([("broken", "select * from no_such_table where id = :id")]),
        &[],
    )?;
    let err = engine
        .exec(&QueryContext::new(), "broken", Some(&json!({"id": 1})))
        .await
        .unwrap_err();
    assert!(err.is_execution_error());
    assert!(err.to_string().starts_with("error executing query: "));

    let err = engine
        .select::<serde_json::Value, _>(&QueryContext::new(), "broken", Some(&json!({"id": 1})))
        .await
        .unwrap_err();
    assert_eq!(err.operation(), Some(Operation::Select));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deadline_interrupts_a_running_statement() -> Result<(), Box<dyn std::error::Error>> {
    let db = SqliteDatabase::builder(":memory:").build().await?;
    let engine = SqlTemplates::new(
        db,
        &MemorySource::new([
            (
                "forever",
                "with recursive c(x) as (select 1 union all select x + 1 from c) \
                 select count(*) from c",
            ),
            ("one", "select 1"),
        ]),
        &[],
    )?;

    let ctx = QueryContext::with_timeout(Duration::from_millis(100));
    let err = engine
        .get::<i64, _>(&ctx, "forever", None::<&()>)
        .await
        .unwrap_err();
    assert!(matches!(err.root(), SqlTemplateError::DeadlineExceeded));

    let one: i64 = engine.get(&QueryContext::new(), "one", None::<&()>).await?;
    assert_eq!(one, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn deadline_only_aborts_its_own_call() -> Result<(), Box<dyn std::error::Error>> {
    let db = SqliteDatabase::builder(":memory:").build().await?;
    db.execute_batch("create table marks (n integer)").await?;
    let engine = Arc::new(SqlTemplates::new(
        db,
        &MemorySource::new([
            (
                "count",
                "with recursive c(x) as (select 1 union all select x + 1 from c where x < 5000000) \
                 select count(*) from c",
            ),
            ("mark", "insert into marks (n) values (:n)"),
            ("marks", "select count(*) from marks"),
        ]),
        &[],
    )?);

    let long = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .get::<i64, _>(&QueryContext::new(), "count", None::<&()>)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // queued behind the long statement; gives up before it gets the connection
    let ctx = QueryContext::with_timeout(Duration::from_millis(50));
    let err = engine
        .exec(&ctx, "mark", Some(&json!({"n": 1})))
        .await
        .unwrap_err();
    assert!(matches!(err.root(), SqlTemplateError::DeadlineExceeded));

    assert_eq!(long.await??, 5_000_000);
    let marks: i64 = engine.get(&QueryContext::new(), "marks", None::<&()>).await?;
    assert_eq!(marks, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn early_stop_while_rows_are_still_produced() -> Result<(), Box<dyn std::error::Error>> {
    let db = SqliteDatabase::builder(":memory:").build().await?;
    let engine = SqlTemplates::new(
        db,
        &MemorySource::new([
            (
                "sparse",
                "with recursive c(x) as (select 1 union all select x + 1 from c) \
                 select x from c where x = 1 or x < 0",
            ),
            ("one", "select 1"),
        ]),
        &[],
    )?;

    let mut seen = Vec::new();
    tokio::time::timeout(
        Duration::from_secs(5),
        engine.iterate(&QueryContext::new(), "sparse", None::<&()>, |row| {
            seen.push(row.scan::<i64>()?);
            Ok(ControlFlow::Break(()))
        }),
    )
    .await??;
    assert_eq!(seen, vec![1]);

    let one: i64 = tokio::time::timeout(
        Duration::from_secs(5),
        engine.get(&QueryContext::new(), "one", None::<&()>),
    )
    .await??;
    assert_eq!(one, 1);
    Ok(())
}

#[tokio::test]
async fn runtime_selected_backend() -> Result<(), Box<dyn std::error::Error>> {
    let config = DatabaseConfig::from_str_for(DatabaseType::Sqlite, ":memory:")?;
    assert_eq!(config.database_type(), DatabaseType::Sqlite);
    let db = AnyDatabase::connect(config).await?;
    assert_eq!(db.placeholder_style(), PlaceholderStyle::Sqlite);

    let engine = SqlTemplates::builder(db)
        .source(MemorySource::new([("pair", "select :a as a, :b as b")]))
        .debug(true)
        .build()?;
    let stmt = engine.build("pair", Some(&json!({"a": 1, "b": "two"})))?;
    assert_eq!(stmt.sql, "select ?1 as a, ?2 as b");

    let (a, b): (i64, String) = engine
        .get(&QueryContext::new(), "pair", Some(&json!({"a": 1, "b": "two"})))
        .await?;
    assert_eq!((a, b.as_str()), (1, "two"));
    Ok(())
}
