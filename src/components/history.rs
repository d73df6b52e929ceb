use std::collections::VecDeque;

use crate::canvas::{CanvasState, PixelBuffer};

// ============================================================================
// CANVAS SNAPSHOT - Immutable full copy of the committed buffer
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct CanvasSnapshot {
    pixels: PixelBuffer,
    description: String,
}

impl CanvasSnapshot {
    pub fn capture(state: &CanvasState, description: impl Into<String>) -> Self {
        Self::from_buffer(&state.committed, description)
    }

    pub fn from_buffer(buffer: &PixelBuffer, description: impl Into<String>) -> Self {
        Self {
            pixels: buffer.clone(),
            description: description.into(),
        }
    }

    /// Overwrite the committed buffer with this snapshot and drop any draft.
    /// Returns false without touching `state` if the dimensions differ.
    pub fn restore_into(&self, state: &mut CanvasState) -> bool {
        let (w, h) = self.pixels.dimensions();
        if !state.matches_layout(w, h) || !state.committed.copy_from(&self.pixels) {
            return false;
        }
        state.draft = None;
        state.mark_dirty();
        true
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn memory_size(&self) -> usize {
        self.pixels.memory_bytes() + self.description.len()
    }
}

/// Undo/redo availability, published after every history mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct HistoryStatus {
    pub can_undo: bool,
    pub can_redo: bool,
}

// ============================================================================
// HISTORY MANAGER - Bounded snapshot stacks
// ============================================================================

/// Snapshot-based undo/redo.
///
/// `past` ends with the snapshot matching the current buffer and, once
/// initialized, is never empty: its bottom entry is the floor that cannot be
/// undone. `future` holds undone snapshots, most recent at the back.
/// Restoring never goes through [`HistoryManager::push`], so an undo or redo
/// can't record itself as a new edit.
pub struct HistoryManager {
    past: VecDeque<CanvasSnapshot>,
    future: VecDeque<CanvasSnapshot>,
    max_depth: usize,
    /// Running memory total across both stacks.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(20)
    }
}

impl HistoryManager {
    /// `max_depth` bounds `past`, floor included. Clamped to at least 1.
    pub fn new(max_depth: usize) -> Self {
        Self {
            past: VecDeque::new(),
            future: VecDeque::new(),
            max_depth: max_depth.max(1),
            total_memory: 0,
        }
    }

    /// Discard everything and start over with `floor` as the only entry.
    pub fn initialize(&mut self, floor: CanvasSnapshot) {
        self.past.clear();
        self.future.clear();
        self.total_memory = floor.memory_size();
        self.past.push_back(floor);
    }

    /// Record a completed edit. Clears the redo stack. Returns true when the
    /// oldest snapshot had to be dropped to stay within the depth limit.
    pub fn push(&mut self, snapshot: CanvasSnapshot) -> bool {
        for s in self.future.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(s.memory_size());
        }
        let mut dropped = false;
        while self.past.len() >= self.max_depth {
            if let Some(old) = self.past.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(old.memory_size());
                dropped = true;
            }
        }
        self.total_memory += snapshot.memory_size();
        self.past.push_back(snapshot);
        dropped
    }

    /// Step back one edit. Returns the snapshot the buffer must be restored
    /// to (the new top of `past`), or `None` when only the floor remains.
    pub fn undo(&mut self) -> Option<&CanvasSnapshot> {
        if self.past.len() <= 1 {
            return None;
        }
        let top = self.past.pop_back()?;
        self.future.push_back(top);
        self.past.back()
    }

    /// Re-apply the most recently undone edit and return it.
    pub fn redo(&mut self) -> Option<&CanvasSnapshot> {
        let next = self.future.pop_back()?;
        self.past.push_back(next);
        self.past.back()
    }

    pub fn can_undo(&self) -> bool {
        self.past.len() > 1
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn status(&self) -> HistoryStatus {
        HistoryStatus {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
        }
    }

    /// Snapshots in `past`, floor included.
    pub fn len(&self) -> usize {
        self.past.len()
    }

    pub fn is_empty(&self) -> bool {
        self.past.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.past.len().saturating_sub(1)
    }

    pub fn redo_count(&self) -> usize {
        self.future.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// The snapshot matching the current buffer.
    pub fn current(&self) -> Option<&CanvasSnapshot> {
        self.past.back()
    }

    pub fn undo_description(&self) -> Option<&str> {
        if self.can_undo() {
            self.past.back().map(|s| s.description())
        } else {
            None
        }
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.future.back().map(|s| s.description())
    }

    /// Descriptions of undoable edits, most recent first.
    pub fn undo_history(&self) -> Vec<&str> {
        self.past.iter().skip(1).rev().map(|s| s.description()).collect()
    }

    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }
}
