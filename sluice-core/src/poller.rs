//! Cursor poller
//!
//! Repeatedly asks a [`BatchSource`] for the next batch, hands every item to
//! a consumer in arrival order, and threads the continuation cursor from one
//! fetch into the next. Polling ends when the source stops returning a
//! cursor, the consumer asks to stop, or a fetch fails.
//!
//! The poller is synchronous: each fetch blocks the calling thread. It never
//! retries, never logs and never invents a cursor. Callers that want retry
//! build a fresh poller from [`TerminationReason::resume_cursor`].

use thiserror::Error;

use crate::domain::batch::Batch;
use crate::domain::cursor::Cursor;

/// A remote sequence that can be read one bounded batch at a time
///
/// Implemented for any `FnMut(Option<&Cursor>, usize) -> Result<Batch<T>, E>`,
/// so a closure over a client is usually all a caller needs.
pub trait BatchSource {
    type Item;
    type Error;

    /// Fetches up to `limit` items starting at `cursor`
    ///
    /// `None` asks for the start of the sequence as the source defines it.
    fn fetch(
        &mut self,
        cursor: Option<&Cursor>,
        limit: usize,
    ) -> Result<Batch<Self::Item>, Self::Error>;
}

impl<T, E, F> BatchSource for F
where
    F: FnMut(Option<&Cursor>, usize) -> Result<Batch<T>, E>,
{
    type Item = T;
    type Error = E;

    fn fetch(&mut self, cursor: Option<&Cursor>, limit: usize) -> Result<Batch<T>, E> {
        self(cursor, limit)
    }
}

/// Consumer verdict after each delivered item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinueSignal {
    Continue,
    Stop,
}

impl ContinueSignal {
    pub fn is_stop(self) -> bool {
        matches!(self, ContinueSignal::Stop)
    }
}

impl From<bool> for ContinueSignal {
    /// `true` keeps polling
    fn from(keep_going: bool) -> Self {
        if keep_going {
            ContinueSignal::Continue
        } else {
            ContinueSignal::Stop
        }
    }
}

/// Why a poll ended
#[derive(Debug)]
pub enum TerminationReason<E> {
    /// The source returned a batch without a continuation cursor
    SourceExhausted,

    /// The consumer returned [`ContinueSignal::Stop`]
    ConsumerStopped,

    /// A fetch failed; nothing was retried
    SourceError {
        /// The failure reported by the source
        error: E,
        /// Last cursor the poller adopted (the initial cursor if none was)
        cursor: Option<Cursor>,
    },
}

impl<E> TerminationReason<E> {
    pub fn is_error(&self) -> bool {
        matches!(self, TerminationReason::SourceError { .. })
    }

    /// Cursor to seed a fresh poller with after a source error
    pub fn resume_cursor(&self) -> Option<&Cursor> {
        match self {
            TerminationReason::SourceError { cursor, .. } => cursor.as_ref(),
            _ => None,
        }
    }

    /// Converts a source error into `Err`, keeping normal endings as `Ok`
    pub fn into_result(self) -> Result<TerminationReason<E>, E> {
        match self {
            TerminationReason::SourceError { error, .. } => Err(error),
            other => Ok(other),
        }
    }
}

/// Misuse of the poller, reported before any fetch happens
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PollError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Poller already stopped; build a new poller from the last cursor to resume")]
    AlreadyStopped,
}

/// Lifecycle of a poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerPhase {
    Idle,
    Fetching,
    Delivering,
    Stopped,
}

/// Process-local poller state: the current cursor and the phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerState {
    pub cursor: Option<Cursor>,
    pub phase: PollerPhase,
}

/// Single-use cursor poller
///
/// # Example
///
/// ```
/// use sluice_core::{Batch, ContinueSignal, Cursor, CursorPoller, TerminationReason};
///
/// let mut source = |cursor: Option<&Cursor>, _limit: usize| -> Result<Batch<u32>, String> {
///     match cursor.map(Cursor::as_str) {
///         None => Ok(Batch::continuing(vec![1, 2], Cursor::new("second"))),
///         Some("second") => Ok(Batch::exhausted(vec![3])),
///         Some(other) => Err(format!("unknown cursor {other}")),
///     }
/// };
///
/// let mut total = 0;
/// let mut poller = CursorPoller::new(2).unwrap();
/// let outcome = poller
///     .poll(&mut source, |n| {
///         total += n;
///         ContinueSignal::Continue
///     })
///     .unwrap();
///
/// assert_eq!(total, 6);
/// assert!(matches!(outcome, TerminationReason::SourceExhausted));
/// ```
#[derive(Debug)]
pub struct CursorPoller {
    limit: usize,
    state: PollerState,
}

impl CursorPoller {
    /// Creates an idle poller asking for at most `limit` items per fetch
    ///
    /// # Errors
    /// `PollError::InvalidArgument` if `limit` is zero
    pub fn new(limit: usize) -> Result<Self, PollError> {
        if limit == 0 {
            return Err(PollError::InvalidArgument(
                "limit must be a positive integer".to_string(),
            ));
        }

        Ok(Self {
            limit,
            state: PollerState {
                cursor: None,
                phase: PollerPhase::Idle,
            },
        })
    }

    /// Starts from a cursor issued by an earlier run
    pub fn with_initial_cursor(mut self, cursor: Option<Cursor>) -> Self {
        self.state.cursor = cursor;
        self
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Last adopted cursor
    pub fn cursor(&self) -> Option<&Cursor> {
        self.state.cursor.as_ref()
    }

    pub fn phase(&self) -> PollerPhase {
        self.state.phase
    }

    pub fn state(&self) -> &PollerState {
        &self.state
    }

    /// Runs the fetch/deliver loop to completion
    ///
    /// The next cursor of a batch is adopted only once every item of that
    /// batch has been delivered, so a stopped or failed run can always be
    /// resumed from [`CursorPoller::cursor`] without skipping items.
    ///
    /// # Errors
    /// `PollError::AlreadyStopped` if this poller already ran to completion
    pub fn poll<S, C>(
        &mut self,
        source: &mut S,
        mut on_item: C,
    ) -> Result<TerminationReason<S::Error>, PollError>
    where
        S: BatchSource + ?Sized,
        C: FnMut(S::Item) -> ContinueSignal,
    {
        if self.state.phase != PollerPhase::Idle {
            return Err(PollError::AlreadyStopped);
        }

        loop {
            self.state.phase = PollerPhase::Fetching;

            let batch = match source.fetch(self.state.cursor.as_ref(), self.limit) {
                Ok(batch) => batch,
                Err(error) => {
                    return Ok(self.stop(TerminationReason::SourceError {
                        error,
                        cursor: self.state.cursor.clone(),
                    }));
                }
            };

            self.state.phase = PollerPhase::Delivering;

            let (items, next) = batch.into_parts();
            let mut items = items.into_iter();

            while let Some(item) = items.next() {
                if on_item(item).is_stop() {
                    // Everything in this batch reached the consumer, so the
                    // continuation is safe to keep.
                    if items.len() == 0 && next.is_some() {
                        self.state.cursor = next;
                    }
                    return Ok(self.stop(TerminationReason::ConsumerStopped));
                }
            }

            match next {
                Some(cursor) => self.state.cursor = Some(cursor),
                None => return Ok(self.stop(TerminationReason::SourceExhausted)),
            }
        }
    }

    fn stop<E>(&mut self, reason: TerminationReason<E>) -> TerminationReason<E> {
        self.state.phase = PollerPhase::Stopped;
        reason
    }
}

/// Polls `fetch` until it is exhausted, the consumer stops, or a fetch fails
///
/// Convenience wrapper around a single-use [`CursorPoller`].
///
/// # Errors
/// `PollError::InvalidArgument` if `limit` is zero; no fetch is made
pub fn poll<T, E, F, C>(
    mut fetch: F,
    on_item: C,
    limit: usize,
    initial_cursor: Option<Cursor>,
) -> Result<TerminationReason<E>, PollError>
where
    F: FnMut(Option<&Cursor>, usize) -> Result<Batch<T>, E>,
    C: FnMut(T) -> ContinueSignal,
{
    CursorPoller::new(limit)?
        .with_initial_cursor(initial_cursor)
        .poll(&mut fetch, on_item)
}
