//! Async iteration over a Composite Store's keys.
//!
//! A small three-state machine — unstarted, draining, exhausted —
//! replacing the prototype's asynchronous generator that lazily populated
//! a snapshot on its first `__anext__`. The snapshot is owned by the
//! iterator, not by the store, so multiple iterators over the same
//! collection can coexist (each still serializes its own I/O through the
//! store's internal lock).

use std::collections::VecDeque;

use crate::error::Result;
use crate::store::CompositeStore;

enum State {
    Unstarted,
    Draining(VecDeque<String>),
    Exhausted,
}

/// Asynchronous iterator over the union of RI-resident and BS-persisted
/// keys of a [`CompositeStore`], decoded back to text.
pub struct CollectionIter<'a> {
    store: &'a CompositeStore,
    state: State,
}

impl<'a> CollectionIter<'a> {
    pub(super) fn new(store: &'a CompositeStore) -> Self {
        Self {
            store,
            state: State::Unstarted,
        }
    }

    /// Advances the iterator, fetching the snapshot on the first call.
    /// Returns `None` once the snapshot is exhausted; a subsequent call to
    /// a *new* [`CollectionIter`] (via [`CompositeStore::iter`]) rebuilds a
    /// fresh snapshot.
    pub async fn next(&mut self) -> Option<Result<String>> {
        loop {
            match &mut self.state {
                State::Unstarted => match self.store.snapshot_union_keys().await {
                    Ok(keys) => self.state = State::Draining(keys.into()),
                    Err(e) => {
                        self.state = State::Exhausted;
                        return Some(Err(e));
                    }
                },
                State::Draining(queue) => {
                    if let Some(key) = queue.pop_front() {
                        return Some(Ok(key));
                    }
                    self.state = State::Exhausted;
                }
                State::Exhausted => return None,
            }
        }
    }
}
