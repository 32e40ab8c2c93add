//! Interpreter-owned storage for frames and lists.
//!
//! Frames and lists are the two mutable, aliasable value kinds: assigning
//! one to another variable or passing it to a function shares the referent.
//! Instead of reference-counted cells, both live in this central store and
//! values carry plain ids — scope (and therefore lifetime) is the run
//! itself, so the store is a grow-only arena.
//!
//! The store doubles as the frame-change listener: every mutating frame
//! operation records its frame id in `last_touched`, and the stepping
//! driver drains that slot per statement to deliver the
//! most-recently-mutated frame snapshot.

use crate::{frame::Frame, value::Value};

/// Identifier of a [`Frame`] in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(u32);

/// Identifier of a list in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListId(u32);

#[derive(Debug, Default)]
pub(crate) struct Heap {
    frames: Vec<Frame>,
    lists: Vec<Vec<Value>>,
    last_touched: Option<FrameId>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_frame(&mut self, frame: Frame) -> FrameId {
        let id = FrameId(u32::try_from(self.frames.len()).expect("frame store overflow"));
        self.frames.push(frame);
        id
    }

    pub fn frame(&self, id: FrameId) -> &Frame {
        &self.frames[id.0 as usize]
    }

    pub fn frame_mut(&mut self, id: FrameId) -> &mut Frame {
        &mut self.frames[id.0 as usize]
    }

    /// Records `id` as the most recently mutated frame.
    pub fn touch(&mut self, id: FrameId) {
        self.last_touched = Some(id);
    }

    /// Drains the most-recently-mutated slot.
    pub fn take_touched(&mut self) -> Option<FrameId> {
        self.last_touched.take()
    }

    pub fn alloc_list(&mut self, items: Vec<Value>) -> ListId {
        let id = ListId(u32::try_from(self.lists.len()).expect("list store overflow"));
        self.lists.push(items);
        id
    }

    pub fn list(&self, id: ListId) -> &[Value] {
        &self.lists[id.0 as usize]
    }

    pub fn list_mut(&mut self, id: ListId) -> &mut Vec<Value> {
        &mut self.lists[id.0 as usize]
    }
}
