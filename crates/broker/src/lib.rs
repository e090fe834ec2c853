//! Priority task broker library crate.
//!
//! `main.rs` is a thin binary entrypoint over this library, keeping
//! orchestration logic separate from the CLI shell — this lets integration
//! tests drive a real broker over a socket without shelling out to the
//! compiled binary.

pub mod config;
pub mod dispatcher;
pub mod stats;
pub mod sweeper;
