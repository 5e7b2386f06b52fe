//! Query runner integration tests.
//!
//! Drives the runner through the mock driver and checks console output and
//! handle release order.

use pretty_assertions::assert_eq;
use stride_db::config::ConnectionConfig;
use stride_db::db::{ColumnInfo, LifecycleEvent, MockDriver, MockScript, QueryResult, Value};
use stride_db::output::{self, OutputFormat};
use stride_db::{DbError, Projection, Query, QueryRunner, Result};
use tokio_test::{assert_err, assert_ok};

use LifecycleEvent::*;

const FULL_LIFECYCLE: [LifecycleEvent; 6] = [
    ConnectionOpened,
    StatementPrepared,
    CursorOpened,
    CursorClosed,
    StatementClosed,
    ConnectionClosed,
];

fn runner(script: MockScript) -> (QueryRunner<MockDriver>, MockDriver) {
    let driver = MockDriver::new(script);
    let runner = QueryRunner::new(driver.clone(), ConnectionConfig::default());
    (runner, driver)
}

fn console(outcome: &Result<QueryResult>) -> Vec<String> {
    let mut buf = Vec::new();
    output::report(&mut buf, outcome, OutputFormat::Text).unwrap();
    String::from_utf8(buf)
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}

#[tokio::test]
async fn test_n_rows_print_n_titles_in_order() {
    let (runner, driver) = runner(MockScript::titles(&[
        "Backend Engineer",
        "Data Analyst",
        "UX Designer",
    ]));

    let outcome = runner
        .run(&Query::new("SELECT title FROM jobs"), &Projection::title())
        .await;

    assert_eq!(
        console(&outcome),
        vec!["Backend Engineer", "Data Analyst", "UX Designer"]
    );
    assert_eq!(driver.events(), FULL_LIFECYCLE.to_vec());
    assert_eq!(driver.open_handles(), 0);
}

#[tokio::test]
async fn test_basic_query_returns_titles() {
    let (runner, driver) = runner(MockScript::titles(&["Engineer", "Analyst"]));

    let lines = assert_ok!(runner.basic_query("SELECT * FROM jobs").await);

    assert_eq!(lines, vec!["Engineer", "Analyst"]);
    let queries = driver.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].sql(), "SELECT * FROM jobs");
    assert!(queries[0].params().is_empty());
}

#[tokio::test]
async fn test_zero_rows_print_nothing() {
    let (runner, driver) = runner(MockScript::empty());

    let outcome = runner
        .run(&Query::new("SELECT title FROM jobs WHERE false"), &Projection::title())
        .await;

    let result = outcome.as_ref().unwrap();
    assert!(result.is_empty());
    assert!(console(&outcome).is_empty());
    assert_eq!(driver.events(), FULL_LIFECYCLE.to_vec());
}

#[tokio::test]
async fn test_zero_rows_skip_projection_check() {
    let (runner, _driver) = runner(MockScript::rows(
        vec![ColumnInfo::new("id", "INT4")],
        Vec::new(),
    ));

    let result = runner
        .run(&Query::new("SELECT id FROM jobs WHERE false"), &Projection::title())
        .await;

    assert_ok!(result);
}

#[tokio::test]
async fn test_unreachable_host_prints_single_error_line() {
    let (runner, driver) = runner(MockScript::titles(&["never shown"]).failing_connect(
        "Cannot connect to db.invalid:5432. Check that the server is running.",
    ));

    let outcome = runner.run(&Query::new("SELECT title FROM jobs"), &Projection::title()).await;

    assert!(matches!(outcome, Err(DbError::Connection(_))));
    assert_eq!(console(&outcome), vec!["Database Error"]);
    assert!(driver.events().is_empty());
}

#[tokio::test]
async fn test_invalid_query_prints_single_error_line() {
    let (runner, driver) = runner(
        MockScript::titles(&["never shown"]).failing_open("syntax error at or near \"SELEC\""),
    );

    let outcome = runner.run(&Query::new("SELEC title FROM jobs"), &Projection::title()).await;

    assert!(matches!(outcome, Err(DbError::Query(_))));
    assert_eq!(console(&outcome), vec!["Database Error"]);
    assert_eq!(
        driver.events(),
        vec![ConnectionOpened, StatementPrepared, StatementClosed, ConnectionClosed]
    );
}

#[tokio::test]
async fn test_prepare_failure_closes_connection() {
    let (runner, driver) = runner(MockScript::empty().failing_prepare("cannot prepare"));

    let result = runner.run(&Query::new("SELECT 1"), &Projection::All).await;

    assert_err!(result);
    assert_eq!(driver.events(), vec![ConnectionOpened, ConnectionClosed]);
}

#[tokio::test]
async fn test_missing_title_column_is_database_error() {
    let (runner, driver) = runner(MockScript::rows(
        vec![ColumnInfo::new("id", "INT4"), ColumnInfo::new("company", "TEXT")],
        vec![vec![Value::Int(1), Value::from("Acme")]],
    ));

    let outcome = runner
        .run(&Query::new("SELECT id, company FROM jobs"), &Projection::title())
        .await;

    assert!(matches!(outcome, Err(DbError::ColumnNotFound(ref c)) if c == "title"));
    assert_eq!(console(&outcome), vec!["Database Error"]);
    assert_eq!(driver.events(), FULL_LIFECYCLE.to_vec());
}

#[tokio::test]
async fn test_failure_mid_stream_prints_no_rows() {
    let (runner, driver) = runner(
        MockScript::titles(&["Engineer", "Analyst", "Designer"])
            .failing_after(2, "division by zero"),
    );

    let outcome = runner.run(&Query::new("SELECT title FROM jobs"), &Projection::title()).await;

    assert_eq!(console(&outcome), vec!["Database Error"]);
    assert_eq!(driver.events(), FULL_LIFECYCLE.to_vec());
    assert_eq!(driver.open_handles(), 0);
}

#[tokio::test]
async fn test_params_reach_driver_in_order() {
    let (runner, driver) = runner(MockScript::titles(&["Engineer"]));

    let sql = "SELECT title FROM jobs WHERE company = $1 AND remote = $2 AND level > $3";
    let query = Query::new(sql)
        .bind("Acme'; DROP TABLE jobs; --")
        .bind(true)
        .bind(3);
    assert_ok!(runner.run(&query, &Projection::title()).await);

    let recorded = driver.queries();
    assert_eq!(recorded, vec![query]);
    assert_eq!(
        recorded[0].params(),
        &[
            Value::from("Acme'; DROP TABLE jobs; --"),
            Value::Bool(true),
            Value::Int(3)
        ]
    );
}

#[tokio::test]
async fn test_multiple_columns_and_all() {
    let script = MockScript::rows(
        vec![
            ColumnInfo::new("id", "INT4"),
            ColumnInfo::new("title", "TEXT"),
            ColumnInfo::new("salary", "INT8"),
        ],
        vec![
            vec![Value::Int(1), Value::from("Engineer"), Value::Int(120_000)],
            vec![Value::Int(2), Value::from("Analyst"), Value::Null],
        ],
    );
    let (runner, _driver) = runner(script);
    let query = Query::new("SELECT id, title, salary FROM jobs");

    let picked = runner
        .run(&query, &Projection::columns(["Salary", "title"]))
        .await
        .unwrap();
    assert_eq!(picked.lines(), vec!["120000\tEngineer", "NULL\tAnalyst"]);
    assert_eq!(picked.columns[0].name, "salary");

    let all = runner.run(&query, &Projection::All).await.unwrap();
    assert_eq!(all.columns.len(), 3);
    assert_eq!(all.lines(), vec!["1\tEngineer\t120000", "2\tAnalyst\tNULL"]);
}

#[tokio::test]
async fn test_each_run_opens_its_own_connection() {
    let (runner, driver) = runner(MockScript::titles(&["Engineer"]));

    assert_ok!(runner.basic_query("SELECT title FROM jobs").await);
    assert_ok!(runner.basic_query("SELECT title FROM jobs").await);

    let opened = driver
        .events()
        .iter()
        .filter(|e| **e == ConnectionOpened)
        .count();
    assert_eq!(opened, 2);
    assert_eq!(driver.open_handles(), 0);
}

#[test]
fn test_run_blocking_outside_runtime() {
    let (runner, driver) = runner(MockScript::titles(&["Engineer"]));

    let result = runner
        .run_blocking(&Query::new("SELECT title FROM jobs"), &Projection::title())
        .unwrap();

    assert_eq!(result.lines(), vec!["Engineer"]);
    assert_eq!(driver.events(), FULL_LIFECYCLE.to_vec());
}
