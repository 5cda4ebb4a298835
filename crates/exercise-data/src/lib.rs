//! Data ingestion layer for the exercise importer.
//!
//! Responsible for discovering and decoding exported recordings, resolving
//! their loosely-typed sample records into typed measurements, normalizing
//! them into a time-ordered session and computing derived table columns.

pub mod derived;
pub mod extract;
pub mod ibi;
pub mod import;
pub mod normalizer;
pub mod reader;

pub use exercise_core as core;
