//! Integration tests for Shelf-Scout
//!
//! These tests run the harvest pipeline end to end against wiremock servers
//! and SQLite databases.

mod common;
mod config_tests;
mod fetcher_tests;
mod harvest_tests;
