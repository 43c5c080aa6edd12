//! Linear command stack with a cursor.

use crate::config::DEFAULT_HISTORY_LIMIT;

/// A linear undo/redo stack.
///
/// Entries below the cursor are applied; entries at or above it have been
/// undone. Pushing discards everything above the cursor.
#[derive(Debug, Clone)]
pub struct CommandStack<E> {
    entries: Vec<E>,
    cursor: usize,
    limit: usize,
}

impl<E> Default for CommandStack<E> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl<E> CommandStack<E> {
    /// Create a stack keeping at most `limit` entries.
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            limit: limit.max(1),
        }
    }

    /// Push an entry, dropping the redo tail and, past the limit, the oldest entry.
    ///
    /// Returns the dropped entries.
    pub fn push(&mut self, entry: E) -> Vec<E> {
        let mut dropped: Vec<E> = self.entries.drain(self.cursor..).collect();
        self.entries.push(entry);
        if self.entries.len() > self.limit {
            dropped.push(self.entries.remove(0));
        }
        self.cursor = self.entries.len();
        dropped
    }

    /// The most recent entry, if nothing has been undone since it was pushed.
    pub fn top_mut(&mut self) -> Option<&mut E> {
        if self.cursor == self.entries.len() {
            self.entries.last_mut()
        } else {
            None
        }
    }

    /// Step back; returns the entry to undo.
    pub fn undo(&mut self) -> Option<&E> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor)
    }

    /// Step forward; returns the entry to redo.
    pub fn redo(&mut self) -> Option<&E> {
        let entry = self.entries.get(self.cursor)?;
        self.cursor += 1;
        Some(entry)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }

    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = &mut E> {
        self.entries.iter_mut()
    }
}
