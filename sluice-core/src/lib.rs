//! Sluice Core
//!
//! Transport-agnostic building blocks for draining paginated and streamed
//! remote sources.
//!
//! This crate contains:
//! - Domain types: Cursor, Batch and Item
//! - The cursor poller that threads continuation tokens between fetches
//! - An explicitly owned registry of resource identifiers
//!
//! Nothing in here performs I/O or logs. Network calls live behind the
//! [`BatchSource`] supplied by the caller.
//!
//! # Example
//!
//! ```
//! use sluice_core::{Batch, ContinueSignal, Cursor, TerminationReason, poll};
//!
//! let pages = vec![
//!     Batch::continuing(vec!["a", "b"], Cursor::new("page-2")),
//!     Batch::exhausted(vec!["c"]),
//! ];
//! let mut pages = pages.into_iter();
//!
//! let mut seen = Vec::new();
//! let outcome = poll(
//!     |_cursor: Option<&Cursor>, _limit: usize| Ok::<_, std::convert::Infallible>(pages.next().unwrap()),
//!     |item| {
//!         seen.push(item);
//!         ContinueSignal::Continue
//!     },
//!     2,
//!     None,
//! )
//! .unwrap();
//!
//! assert_eq!(seen, ["a", "b", "c"]);
//! assert!(matches!(outcome, TerminationReason::SourceExhausted));
//! ```

pub mod domain;
pub mod poller;
pub mod registry;

pub use domain::batch::Batch;
pub use domain::cursor::Cursor;
pub use domain::item::Item;
pub use poller::{
    BatchSource, ContinueSignal, CursorPoller, PollError, PollerPhase, PollerState,
    TerminationReason, poll,
};
pub use registry::{RegistryError, ResourceKind, ResourceRegistry};
