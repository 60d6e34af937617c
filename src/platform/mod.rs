// LogSieve - platform/mod.rs
//
// Platform abstraction layer: directories, settings file, file reading,
// durable error log.
// Dependencies: standard library, directories, toml, memmap2, core::model.
// Must NOT depend on: app.

pub mod config;
pub mod error_log;
pub mod fs;
