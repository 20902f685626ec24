//! Subscriber registry with deferred mutation.
//!
//! While a notification pass is in progress the active list is frozen: adds,
//! removes and clears issued from a nested pass are appended to a pending log
//! and replayed, in order, when the outermost pass ends.

pub(crate) type SubscriberId = u64;

#[derive(Debug)]
enum Change<O> {
    Added(SubscriberId, O),
    Removed(SubscriberId),
}

#[derive(Debug)]
pub(crate) struct Registry<O> {
    active: Vec<(SubscriberId, O)>,
    pending: Vec<Change<O>>,
    depth: usize,
    closed: bool,
}

impl<O: Clone> Registry<O> {
    pub(crate) fn new() -> Self {
        Self {
            active: Vec::new(),
            pending: Vec::new(),
            depth: 0,
            closed: false,
        }
    }

    pub(crate) fn add(&mut self, id: SubscriberId, observer: O) {
        if self.closed {
            return;
        }
        if self.depth > 0 {
            self.pending.push(Change::Added(id, observer));
        } else {
            self.insert(id, observer);
        }
    }

    pub(crate) fn remove(&mut self, id: SubscriberId) {
        if self.closed {
            return;
        }
        if self.depth > 0 {
            self.pending.push(Change::Removed(id));
        } else {
            self.active.retain(|(active, _)| *active != id);
        }
    }

    /// Start a notification pass.
    pub(crate) fn enter(&mut self) {
        self.depth += 1;
    }

    /// End a notification pass; the outermost one replays the pending log.
    pub(crate) fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 && self.closed {
            self.active.clear();
        } else if self.depth == 0 {
            for change in std::mem::take(&mut self.pending) {
                match change {
                    Change::Added(id, observer) => self.insert(id, observer),
                    Change::Removed(id) => self.active.retain(|(active, _)| *active != id),
                }
            }
        }
    }

    /// Entry at `index` of the active list, cloned so no borrow outlives the call.
    pub(crate) fn get(&self, index: usize) -> Option<(SubscriberId, O)> {
        self.active.get(index).cloned()
    }

    /// Drop every active subscriber. Pending adds still apply at pass end.
    ///
    /// Called by the pass that ends with the clear, before its `exit`. Inside an
    /// enclosing pass the removals are logged so that pass keeps its list.
    pub(crate) fn clear_active(&mut self) {
        if self.closed {
            return;
        }
        if self.depth > 1 {
            let removed: Vec<SubscriberId> = self.active.iter().map(|(id, _)| *id).collect();
            self.pending.extend(removed.into_iter().map(Change::Removed));
        } else {
            self.active.clear();
        }
    }

    /// Drop everything and ignore later mutations.
    ///
    /// The active list of a running pass is kept until the outermost `exit`.
    pub(crate) fn close(&mut self) {
        self.closed = true;
        self.pending.clear();
        if self.depth == 0 {
            self.active.clear();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.active.len()
    }

    #[cfg(test)]
    pub(crate) fn is_iterating(&self) -> bool {
        self.depth > 0
    }

    #[cfg(test)]
    pub(crate) fn ids(&self) -> Vec<SubscriberId> {
        self.active.iter().map(|(id, _)| *id).collect()
    }

    fn insert(&mut self, id: SubscriberId, observer: O) {
        if !self.active.iter().any(|(active, _)| *active == id) {
            self.active.push((id, observer));
        }
    }
}
