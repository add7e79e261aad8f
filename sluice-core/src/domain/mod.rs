//! Core domain types
//!
//! The values that flow between a remote source, the poller and the
//! consumer. None of them carry behaviour tied to a particular transport.

pub mod batch;
pub mod cursor;
pub mod item;
