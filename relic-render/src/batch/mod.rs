//! Draw batch coalescing
//!
//! Consecutive primitives sharing render state fold into one indexed draw
//! range. The queue keeps at most one batch open; any key change closes
//! it (appending to the submission queue only when its index range is
//! non-empty) and opens a new one at the ring's current index cursor.

use bytemuck::{Pod, Zeroable};

#[cfg(test)]
mod tests;

/// Batch-data flag: vertices are in screen space (pixel coordinates)
pub const BATCH_FLAG_SCREEN_SPACE: u32 = 1 << 0;
/// Batch-data flag: modulate by the lightmap layer
pub const BATCH_FLAG_LIGHTMAP: u32 = 1 << 1;
/// Batch-data flag: modulate by the macro layer
pub const BATCH_FLAG_MACRO: u32 = 1 << 2;
/// Batch-data flag: modulate by the detail layer
pub const BATCH_FLAG_DETAIL: u32 = 1 << 3;

/// Everything that forces a new GPU draw when it changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchKey {
    /// Render-state table index (see [`crate::state`])
    pub state_index: u8,
    /// Line-list topology instead of triangles
    pub lines: bool,
    /// Screen-space projection path
    pub screen_space: bool,
    /// Cache keys of the bound textures (primary, lightmap, macro,
    /// detail); 0 marks an unbound slot
    pub textures: [u64; 4],
    /// Combined per-slot sampler mode bits, two per slot
    pub sampler_bits: u8,
    /// Packed blend-constant tint for the highlighted state
    pub tint: [u8; 4],
}

/// Per-batch GPU record, indexed by the draw's instance index.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct BatchData {
    /// Bindless table slots per texture layer (0 = placeholder);
    /// ignored under cached descriptor sets
    pub slots: [u32; 4],
    /// Per-slot sampler mode bits, two per slot
    pub sampler_bits: u32,
    /// `BATCH_FLAG_*` bits
    pub flags: u32,
    pub _pad: [u32; 2],
}

/// One coalesced draw range, ready for replay.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    pub key: BatchKey,
    pub data: BatchData,
    /// Cached-set bind index allocated by the texture binder
    pub bind: u32,
    /// Ring segment the index range lives in
    pub segment: u32,
    pub index_start: u32,
    pub index_end: u32,
}

struct OpenBatch {
    key: BatchKey,
    data: BatchData,
    bind: u32,
    segment: u32,
    index_start: u32,
}

/// The frame's batch queue.
#[derive(Default)]
pub struct BatchQueue {
    open: Option<OpenBatch>,
    entries: Vec<BatchEntry>,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a batch with this state is open at `cursor` (the ring's
    /// current index position). A differing key closes the previous batch
    /// first; an identical one keeps accumulating.
    pub fn set_state(
        &mut self,
        key: BatchKey,
        data: BatchData,
        bind: u32,
        segment: u32,
        cursor: u32,
    ) {
        if let Some(open) = &self.open {
            if open.key == key && open.segment == segment {
                return;
            }
        }
        self.close(cursor);
        self.open = Some(OpenBatch {
            key,
            data,
            bind,
            segment,
            index_start: cursor,
        });
    }

    /// Close the open batch at `cursor`, queueing it if non-empty.
    pub fn close(&mut self, cursor: u32) {
        if let Some(open) = self.open.take() {
            if cursor > open.index_start {
                self.entries.push(BatchEntry {
                    key: open.key,
                    data: open.data,
                    bind: open.bind,
                    segment: open.segment,
                    index_start: open.index_start,
                    index_end: cursor,
                });
            }
        }
    }

    /// Queued entries so far (the open batch is not included)
    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    /// Drain the queue for replay.
    pub fn take(&mut self) -> Vec<BatchEntry> {
        debug_assert!(self.open.is_none(), "take() with a batch still open");
        std::mem::take(&mut self.entries)
    }

    /// Discard everything, open batch included.
    pub fn reset(&mut self) {
        self.open = None;
        self.entries.clear();
    }
}
