//! Internal disposal bag for managing cleanup hooks.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use crate::provider::ScopeNode;
use crate::traits::Dispose;

const PRUNE_FLOOR: usize = 64;

/// Something a scope node releases when it is disposed.
pub(crate) enum Disposal {
    Instance(Arc<dyn Dispose>),
    /// Child scopes are held weakly; the child keeps its parent alive, not the reverse.
    ChildScope(Weak<ScopeNode>),
}

/// Disposal hooks executed in LIFO order.
#[derive(Default)]
pub(crate) struct DisposeBag {
    entries: Vec<Disposal>,
    prune_at: usize,
}

impl DisposeBag {
    pub(crate) fn push_instance(&mut self, instance: Arc<dyn Dispose>) {
        self.entries.push(Disposal::Instance(instance));
    }

    pub(crate) fn push_scope(&mut self, child: Weak<ScopeNode>) {
        // Drop entries of children that are already gone so long-lived parents stay small.
        if self.entries.len() >= self.prune_at.max(PRUNE_FLOOR) {
            self.entries
                .retain(|entry| !matches!(entry, Disposal::ChildScope(w) if w.strong_count() == 0));
            self.prune_at = self.entries.len() * 2;
        }
        self.entries.push(Disposal::ChildScope(child));
    }

    /// Execute all hooks in reverse order (LIFO).
    ///
    /// A panicking `dispose` is logged and does not stop the remaining hooks.
    pub(crate) fn run_all_reverse(&mut self) {
        while let Some(entry) = self.entries.pop() {
            match entry {
                Disposal::Instance(instance) => {
                    if panic::catch_unwind(AssertUnwindSafe(|| instance.dispose())).is_err() {
                        tracing::error!("dispose panicked; continuing with remaining disposables");
                    }
                }
                Disposal::ChildScope(child) => {
                    if let Some(child) = child.upgrade() {
                        child.dispose();
                    }
                }
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
