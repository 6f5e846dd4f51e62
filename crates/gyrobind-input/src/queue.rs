use crate::Action;
use std::collections::VecDeque;

/// An action waiting to be fired, with the trigger that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedAction {
    pub source: String,
    pub action: Action,
}

/// FIFO of stockpiled actions, released one per stockpile button press.
#[derive(Debug, Default)]
pub struct ActionQueue {
    items: VecDeque<QueuedAction>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: impl Into<String>, action: Action) {
        let source = source.into();
        tracing::info!(%source, %action, pending = self.items.len() + 1, "Action stockpiled");
        self.items.push_back(QueuedAction { source, action });
    }

    pub fn pop(&mut self) -> Option<QueuedAction> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
