//! Configuration loading integration tests.
//!
//! These assume no DB_* variables are set in the test process environment.

use pretty_assertions::assert_eq;
use std::fs;
use stride_db::config::ConnectionConfig;
use stride_db::{DbError, PostgresDriver, Projection, Query, QueryRunner};

fn env_dir_with(contents: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(".env"), contents).unwrap();
    dir
}

#[test]
fn test_load_from_env_dir() {
    let dir = env_dir_with(
        "DB_HOST=db.stride.local\n\
         DB_PORT=5433\n\
         DB_NAME=stride\n\
         DB_USER=stride_app\n\
         DB_PASSWORD=\"p@ss word\"\n",
    );

    let config = ConnectionConfig::load(dir.path()).unwrap();

    assert_eq!(
        config,
        ConnectionConfig {
            host: Some("db.stride.local".to_string()),
            port: Some(5433),
            database: Some("stride".to_string()),
            user: Some("stride_app".to_string()),
            password: Some("p@ss word".to_string()),
        }
    );
    assert!(config.validate().is_ok());
}

#[test]
fn test_load_partial_file_fails_validation() {
    let dir = env_dir_with("DB_HOST=localhost\nDB_NAME=stride\n");

    let config = ConnectionConfig::load(dir.path()).unwrap();
    let err = config.validate().unwrap_err();

    assert!(err.to_string().contains("DB_PORT"));
    assert!(err.to_string().contains("DB_USER"));
    assert!(!err.to_string().contains("DB_HOST"));
}

#[test]
fn test_load_bad_port() {
    let dir = env_dir_with("DB_PORT=not-a-port\n");

    let err = ConnectionConfig::load(dir.path()).unwrap_err();
    assert!(matches!(err, DbError::Config(_)));
}

#[test]
fn test_load_missing_dir_yields_empty_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConnectionConfig::load(&dir.path().join("backend")).unwrap();
    assert_eq!(config, ConnectionConfig::default());
}

#[test]
fn test_incomplete_config_fails_without_connecting() {
    let dir = env_dir_with("DB_HOST=localhost\n");
    let config = ConnectionConfig::load(dir.path()).unwrap();
    let runner = QueryRunner::new(PostgresDriver::new(), config);

    let result = runner.run_blocking(&Query::new("SELECT title FROM jobs"), &Projection::title());

    assert!(matches!(result, Err(DbError::Config(_))));
}
