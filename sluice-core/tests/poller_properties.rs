//! Property tests for the cursor poller against a deterministic in-memory source

use proptest::prelude::*;
use sluice_core::{Batch, ContinueSignal, Cursor, CursorPoller, TerminationReason, poll};

/// Deterministic source: page `i` lives behind cursor `page-i`, page 0 behind `None`
struct PagedSource {
    pages: Vec<Vec<u32>>,
    fetches: usize,
    fail_on_fetch: Option<usize>,
}

impl PagedSource {
    fn new(pages: Vec<Vec<u32>>) -> Self {
        Self {
            pages,
            fetches: 0,
            fail_on_fetch: None,
        }
    }

    fn failing_on(mut self, fetch: usize) -> Self {
        self.fail_on_fetch = Some(fetch);
        self
    }

    fn fetch(&mut self, cursor: Option<&Cursor>) -> Result<Batch<u32>, String> {
        let call = self.fetches;
        self.fetches += 1;

        if self.fail_on_fetch == Some(call) {
            return Err(format!("injected failure on fetch {}", call));
        }

        let index = match cursor {
            None => 0,
            Some(cursor) => cursor
                .as_str()
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| format!("foreign cursor {}", cursor))?,
        };

        let items = self.pages[index].clone();
        if index + 1 < self.pages.len() {
            Ok(Batch::continuing(items, Cursor::new(format!("page-{}", index + 1))))
        } else {
            Ok(Batch::exhausted(items))
        }
    }
}

fn pages_strategy() -> impl Strategy<Value = Vec<Vec<u32>>> {
    prop::collection::vec(prop::collection::vec(any::<u32>(), 0..6), 1..8)
}

proptest! {
    #[test]
    fn delivers_every_item_once_in_source_order(pages in pages_strategy(), limit in 1usize..16) {
        let expected: Vec<u32> = pages.iter().flatten().copied().collect();
        let page_count = pages.len();
        let mut source = PagedSource::new(pages);

        let mut seen = Vec::new();
        let outcome = poll(
            |cursor: Option<&Cursor>, _limit: usize| source.fetch(cursor),
            |item| {
                seen.push(item);
                ContinueSignal::Continue
            },
            limit,
            None,
        )
        .unwrap();

        prop_assert!(matches!(outcome, TerminationReason::SourceExhausted));
        prop_assert_eq!(seen, expected);
        prop_assert_eq!(source.fetches, page_count);
    }

    #[test]
    fn stops_after_exactly_k_items(pages in pages_strategy(), pick in any::<prop::sample::Index>()) {
        let total: usize = pages.iter().map(Vec::len).sum();
        prop_assume!(total > 0);
        let k = pick.index(total) + 1;

        // Fetches needed to reach the k-th item
        let mut running = 0;
        let mut needed = 0;
        for page in &pages {
            needed += 1;
            running += page.len();
            if running >= k {
                break;
            }
        }

        let mut source = PagedSource::new(pages);
        let mut calls = 0;
        let outcome = poll(
            |cursor: Option<&Cursor>, _limit: usize| source.fetch(cursor),
            |_| {
                calls += 1;
                (calls < k).into()
            },
            4,
            None,
        )
        .unwrap();

        prop_assert!(matches!(outcome, TerminationReason::ConsumerStopped));
        prop_assert_eq!(calls, k);
        prop_assert_eq!(source.fetches, needed);
    }

    #[test]
    fn resuming_after_an_error_reproduces_the_rest(pages in pages_strategy(), fail_pick in any::<prop::sample::Index>()) {
        let expected: Vec<u32> = pages.iter().flatten().copied().collect();
        let fail_on = fail_pick.index(pages.len());

        let mut seen = Vec::new();

        let mut first = PagedSource::new(pages.clone()).failing_on(fail_on);
        let mut poller = CursorPoller::new(3).unwrap();
        let outcome = poller
            .poll(&mut |cursor: Option<&Cursor>, _limit: usize| first.fetch(cursor), |item| {
                seen.push(item);
                ContinueSignal::Continue
            })
            .unwrap();

        prop_assert!(outcome.is_error());
        let resume_from = outcome.resume_cursor().cloned();

        let mut second = PagedSource::new(pages);
        let outcome = CursorPoller::new(3)
            .unwrap()
            .with_initial_cursor(resume_from)
            .poll(&mut |cursor: Option<&Cursor>, _limit: usize| second.fetch(cursor), |item| {
                seen.push(item);
                ContinueSignal::Continue
            })
            .unwrap();

        prop_assert!(matches!(outcome, TerminationReason::SourceExhausted));
        prop_assert_eq!(seen, expected);
    }
}

#[test]
fn first_fetch_error_never_reaches_the_consumer() {
    let mut source = PagedSource::new(vec![vec![1, 2]]).failing_on(0);
    let mut delivered = 0;

    let outcome = poll(
        |cursor: Option<&Cursor>, _limit: usize| source.fetch(cursor),
        |_| {
            delivered += 1;
            ContinueSignal::Continue
        },
        2,
        Some(Cursor::new("page-0")),
    )
    .unwrap();

    assert_eq!(delivered, 0);
    assert_eq!(outcome.resume_cursor(), Some(&Cursor::new("page-0")));
}

#[test]
fn two_page_scenario() {
    let mut pages = vec![
        Batch::continuing(vec!["a", "b"], Cursor::new("C1")),
        Batch::exhausted(vec!["c"]),
    ]
    .into_iter();
    let mut cursors = Vec::new();
    let mut seen = Vec::new();

    let outcome = poll(
        |cursor: Option<&Cursor>, limit: usize| {
            assert_eq!(limit, 2);
            cursors.push(cursor.cloned());
            pages.next().ok_or("no more pages")
        },
        |item| {
            seen.push(item);
            ContinueSignal::Continue
        },
        2,
        None,
    )
    .unwrap();

    assert!(matches!(outcome, TerminationReason::SourceExhausted));
    assert_eq!(seen, vec!["a", "b", "c"]);
    assert_eq!(cursors, vec![None, Some(Cursor::new("C1"))]);
}
