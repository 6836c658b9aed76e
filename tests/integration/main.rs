//! Integration tests

mod common;
mod e2e_test;
mod history_test;
