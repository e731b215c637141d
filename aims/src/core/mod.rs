//! Deterministic, pure logic for FHI-aims inputs and outputs.
//!
//! Core modules must be free of I/O side effects. They operate on strings and
//! in-memory structures and return deterministic outputs suitable for tests.

pub mod control;
pub mod elements;
pub mod geometry;
pub mod output;
pub mod types;
