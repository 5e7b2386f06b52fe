//! Integration tests for stride-db.

pub mod config_test;
pub mod runner_test;
