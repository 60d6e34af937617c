// LogSieve - core/mod.rs
//
// Core business logic layer: rule evaluation, directory listing, field
// extraction and report assembly.
// Dependencies: standard library, chrono, walkdir, report sinks,
// platform::fs for file reads.
// Must NOT depend on: app.

pub mod discovery;
pub mod export;
pub mod extract;
pub mod filter;
pub mod model;
pub mod report;
