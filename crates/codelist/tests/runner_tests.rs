use anyhow::Result;
use codelist::{
    CachedQueryRunner, CodelistRow, Error, ProductType, Query, QueryExecutionError, ResultSource,
    ResultTable, Warehouse, builtin_config, cache,
};
use std::cell::RefCell;
use std::fs;
use tempfile::tempdir;

mod common;
use common::MockWarehouse;

fn drugs() -> ResultTable {
    ResultTable::new(vec![
        CodelistRow::new(ProductType::Vmp, "1", "0301020A0AA", "Drug A"),
        CodelistRow::new(ProductType::Amp, "2", "0301020A0AB", "Drug B"),
    ])
}

/// Second run is served from the cache without touching the warehouse
#[test]
fn test_idempotent_runs() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("data").join("saba_codelist.csv");
    let runner = CachedQueryRunner::new(MockWarehouse::returning(drugs()));
    let query = Query::from("SELECT 1");

    let first = runner.run(&query, &path)?;
    let second = runner.run(&query, &path)?;

    assert_eq!(first.source, ResultSource::Warehouse);
    assert_eq!(second.source, ResultSource::Cache);
    assert_eq!(first.table, second.table);
    assert_eq!(runner.warehouse().calls(), 1);
    assert!(first.cache_error.is_none());
    Ok(())
}

/// The cache is keyed by path: a different query still gets the cached rows
#[test]
fn test_cache_takes_precedence_over_query() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("lama_single_codelist.csv");
    fs::write(
        &path,
        "type,id,bnf_code,name\namp,77,0301020Q0AA,Spiriva 18microgram inhalation powder capsules\n",
    )?;

    let runner = CachedQueryRunner::new(MockWarehouse::returning(drugs()));
    let outcome = runner.run(&Query::from("SELECT something else entirely"), &path)?;

    assert_eq!(outcome.source, ResultSource::Cache);
    assert_eq!(
        outcome.table.rows(),
        &[CodelistRow::new(
            ProductType::Amp,
            "77",
            "0301020Q0AA",
            "Spiriva 18microgram inhalation powder capsules"
        )]
    );
    assert_eq!(runner.warehouse().calls(), 0);
    Ok(())
}

#[test]
fn test_cached_file_keeps_query_order() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("order.csv");
    let runner = CachedQueryRunner::new(MockWarehouse::returning(drugs()));

    runner.run(&Query::from("SELECT 1"), &path)?;

    let text = fs::read_to_string(&path)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "type,id,bnf_code,name",
            "vmp,1,0301020A0AA,Drug A",
            "amp,2,0301020A0AB,Drug B",
        ]
    );
    Ok(())
}

#[test]
fn test_round_trip_through_runner() -> Result<()> {
    let dir = tempdir()?;
    for n in [0usize, 1, 40] {
        let rows: ResultTable = (0..n)
            .map(|i| {
                CodelistRow::new(
                    if i < n / 2 { ProductType::Amp } else { ProductType::Vmp },
                    format!("{}", 10_000_000_000_000_000u64 + i as u64),
                    format!("0301011R0AA{i:03}"),
                    format!("Salbutamol {i}00micrograms/dose inhaler, CFC free"),
                )
            })
            .collect();
        let path = dir.path().join(format!("rt_{n}.csv"));
        let runner = CachedQueryRunner::new(MockWarehouse::returning(rows.clone()));

        runner.run(&Query::from("SELECT 1"), &path)?;
        assert_eq!(cache::read_cache(&path)?, rows, "{n} rows");
    }
    Ok(())
}

/// A rejected query is reported and leaves nothing behind
#[test]
fn test_query_failure_leaves_no_cache() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("data").join("broken.csv");
    let runner = CachedQueryRunner::new(MockWarehouse::failing("Syntax error: Unexpected keyword FORM"));

    let result = runner.run(&Query::from("SELECT * FORM dmd.vmp"), &path);

    match result {
        Err(Error::QueryExecution(QueryExecutionError::Rejected { status, message })) => {
            assert_eq!(status, 400);
            assert!(message.contains("Unexpected keyword"));
        }
        other => panic!("expected a query execution error, got {other:?}"),
    }
    assert!(!path.exists());
    assert_eq!(runner.warehouse().calls(), 1);

    // Nothing was cached, so the next run asks again.
    let _ = runner.run(&Query::from("SELECT * FORM dmd.vmp"), &path);
    assert_eq!(runner.warehouse().calls(), 2);
    Ok(())
}

/// The rows are still returned when the cache cannot be written
#[test]
fn test_unwritable_cache_is_best_effort() -> Result<()> {
    let dir = tempdir()?;
    // A regular file where the cache directory should be.
    let blocker = dir.path().join("data");
    fs::write(&blocker, "not a directory")?;
    let path = blocker.join("saba_codelist.csv");

    let runner = CachedQueryRunner::new(MockWarehouse::returning(drugs()));
    let outcome = runner.run(&Query::from("SELECT 1"), &path)?;

    assert_eq!(outcome.table, drugs());
    assert_eq!(outcome.source, ResultSource::Warehouse);
    assert_eq!(runner.warehouse().calls(), 1);
    let cache_error = outcome.cache_error.expect("cache write should have failed");
    assert_eq!(cache_error.path(), path.as_path());
    Ok(())
}

/// A corrupt cache is an error, not a reason to query again
#[test]
fn test_corrupt_cache_is_not_masked() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("corrupt.csv");
    fs::write(&path, "type,id,bnf_code,name\nvmp,1\n")?;

    let runner = CachedQueryRunner::new(MockWarehouse::returning(drugs()));
    let result = runner.run(&Query::from("SELECT 1"), &path);

    assert!(matches!(result, Err(Error::CacheRead(_))));
    assert_eq!(runner.warehouse().calls(), 0);
    assert_eq!(fs::read_to_string(&path)?, "type,id,bnf_code,name\nvmp,1\n");
    Ok(())
}

/// The runner sends the generated SQL unchanged
#[test]
fn test_builtin_definition_sql_reaches_warehouse() -> Result<()> {
    struct Recording(RefCell<Vec<String>>);

    impl Warehouse for Recording {
        fn execute(&self, query: &Query) -> std::result::Result<ResultTable, QueryExecutionError> {
            self.0.borrow_mut().push(query.to_string());
            Ok(ResultTable::default())
        }
    }

    let dir = tempdir()?;
    let config = builtin_config()?;
    let runner = CachedQueryRunner::new(Recording(RefCell::new(Vec::new())));

    for definition in &config.codelists {
        let query = definition.query(&config.sources)?;
        let path = dir.path().join(definition.cache_file_name());
        let outcome = runner.run(&query, &path)?;
        assert!(outcome.table.is_empty());
        assert!(path.exists());
    }

    let sent = runner.warehouse().0.borrow();
    assert_eq!(sent.len(), 5);
    assert!(sent[0].contains("bnf_code LIKE '0301011R0%'  -- salbutamol"));
    assert!(sent[1].contains("AND form_route NOT LIKE '%neb%'  -- nebules"));
    assert!(sent.iter().all(|sql| sql.contains("UNION ALL")));
    Ok(())
}
