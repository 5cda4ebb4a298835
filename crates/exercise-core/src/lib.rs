//! Core types for the exercise importer.
//!
//! Holds the domain model shared by the reader and the normalizer, the error
//! types, timestamp parsing, cell formatting and the command-line settings.

pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod timestamps;
