// LogSieve - app/mod.rs
//
// Application layer: run orchestration and event observation.
// Dependencies: core, platform.

pub mod pipeline;
pub mod stats;
