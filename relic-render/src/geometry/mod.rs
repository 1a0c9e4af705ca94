//! Geometry ring buffer
//!
//! Fixed-capacity vertex and index arenas shared by every immediate-mode
//! draw in a frame. The CPU stages into one segment while the GPU may
//! still be consuming the previous ones; cursors only reset when the next
//! physical segment is selected, never mid-segment.
//!
//! [`GeometryRing`] is the CPU side (staging arrays and cursor
//! arithmetic); [`RingBuffers`] owns the GPU buffers and the per-segment
//! submission fences that gate reuse.

use crate::vertex::{FrameVertex, VERTEX_STRIDE};

#[cfg(test)]
mod tests;

/// Why a reservation could not be satisfied at the current cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveError {
    /// The request fits a segment but not the space left in this one;
    /// flush pending batches, advance the segment, and retry.
    NeedsAdvance,
    /// The request exceeds a whole segment and can never succeed;
    /// the primitive is dropped.
    TooLarge,
}

/// Writable slices handed to a draw call.
///
/// Index values are absolute within the segment; the replay binds the
/// vertex buffer at the segment offset so no per-draw base vertex is
/// needed.
pub struct Reservation<'a> {
    pub vertices: &'a mut [FrameVertex],
    pub indices: &'a mut [u32],
    pub base_vertex: u32,
    pub base_index: u32,
}

/// CPU-side staging arenas with segment-cycling write cursors.
#[derive(Debug)]
pub struct GeometryRing {
    vertices: Vec<FrameVertex>,
    indices: Vec<u32>,
    vertex_capacity: u32,
    index_capacity: u32,
    segment_count: u32,
    segment: u32,
    vertex_pos: u32,
    index_pos: u32,
}

impl GeometryRing {
    pub fn new(vertex_capacity: u32, index_capacity: u32, segment_count: u32) -> Self {
        Self {
            vertices: vec![FrameVertex::blank(); vertex_capacity as usize],
            indices: vec![0; index_capacity as usize],
            vertex_capacity,
            index_capacity,
            segment_count: segment_count.max(1),
            segment: 0,
            vertex_pos: 0,
            index_pos: 0,
        }
    }

    /// Reserve space for a primitive. On success the caller writes the
    /// slices and then commits the counts actually used.
    pub fn reserve(
        &mut self,
        vertex_count: u32,
        index_count: u32,
    ) -> Result<Reservation<'_>, ReserveError> {
        if vertex_count > self.vertex_capacity || index_count > self.index_capacity {
            return Err(ReserveError::TooLarge);
        }
        if self.vertex_pos + vertex_count > self.vertex_capacity
            || self.index_pos + index_count > self.index_capacity
        {
            return Err(ReserveError::NeedsAdvance);
        }
        let base_vertex = self.vertex_pos;
        let base_index = self.index_pos;
        Ok(Reservation {
            vertices: &mut self.vertices
                [base_vertex as usize..(base_vertex + vertex_count) as usize],
            indices: &mut self.indices[base_index as usize..(base_index + index_count) as usize],
            base_vertex,
            base_index,
        })
    }

    /// Advance the cursors past a written reservation.
    pub fn commit(&mut self, vertex_count: u32, index_count: u32) {
        debug_assert!(self.vertex_pos + vertex_count <= self.vertex_capacity);
        debug_assert!(self.index_pos + index_count <= self.index_capacity);
        self.vertex_pos += vertex_count;
        self.index_pos += index_count;
    }

    /// Select the next physical segment and reset the cursors. The caller
    /// must have uploaded the staged spans and synchronized segment reuse
    /// first.
    pub fn advance(&mut self) {
        self.segment = (self.segment + 1) % self.segment_count;
        self.vertex_pos = 0;
        self.index_pos = 0;
    }

    /// Segment that `advance` would select next
    pub fn next_segment(&self) -> u32 {
        (self.segment + 1) % self.segment_count
    }

    pub fn segment(&self) -> u32 {
        self.segment
    }

    pub fn segment_count(&self) -> u32 {
        self.segment_count
    }

    pub fn vertex_pos(&self) -> u32 {
        self.vertex_pos
    }

    pub fn index_pos(&self) -> u32 {
        self.index_pos
    }

    pub fn vertex_capacity(&self) -> u32 {
        self.vertex_capacity
    }

    pub fn index_capacity(&self) -> u32 {
        self.index_capacity
    }

    /// Staged spans of the active segment, for upload before a flush
    pub fn staged(&self) -> (&[FrameVertex], &[u32]) {
        (
            &self.vertices[..self.vertex_pos as usize],
            &self.indices[..self.index_pos as usize],
        )
    }
}

/// GPU buffers backing the ring, segmented for frames-in-flight reuse.
pub struct RingBuffers {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    vertex_segment_bytes: u64,
    index_segment_bytes: u64,
    /// Submission that last consumed each segment
    fences: Vec<Option<wgpu::SubmissionIndex>>,
}

impl RingBuffers {
    pub fn new(
        device: &wgpu::Device,
        vertex_capacity: u32,
        index_capacity: u32,
        segment_count: u32,
    ) -> Self {
        let vertex_segment_bytes = vertex_capacity as u64 * VERTEX_STRIDE;
        let index_segment_bytes = index_capacity as u64 * 4;
        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Geometry Ring Vertices"),
            size: vertex_segment_bytes * segment_count as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let index_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Geometry Ring Indices"),
            size: index_segment_bytes * segment_count as u64,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            vertex_buffer,
            index_buffer,
            vertex_segment_bytes,
            index_segment_bytes,
            fences: vec![None; segment_count as usize],
        }
    }

    pub fn vertex_offset(&self, segment: u32) -> u64 {
        segment as u64 * self.vertex_segment_bytes
    }

    pub fn index_offset(&self, segment: u32) -> u64 {
        segment as u64 * self.index_segment_bytes
    }

    /// Upload the ring's staged spans into the active segment.
    pub fn upload_segment(&self, queue: &wgpu::Queue, ring: &GeometryRing) {
        let (vertices, indices) = ring.staged();
        if !vertices.is_empty() {
            queue.write_buffer(
                &self.vertex_buffer,
                self.vertex_offset(ring.segment()),
                bytemuck::cast_slice(vertices),
            );
        }
        if !indices.is_empty() {
            queue.write_buffer(
                &self.index_buffer,
                self.index_offset(ring.segment()),
                bytemuck::cast_slice(indices),
            );
        }
    }

    /// Block until the GPU has released a segment for CPU reuse.
    pub fn wait_for_segment(&mut self, device: &wgpu::Device, segment: u32) {
        if let Some(fence) = self.fences[segment as usize].take() {
            let _ = device.poll(wgpu::PollType::Wait {
                submission_index: Some(fence),
                timeout: None,
            });
        }
    }

    /// Record which submission consumed the segments a frame touched.
    pub fn record_submission(&mut self, segments: &[u32], submission: wgpu::SubmissionIndex) {
        for &segment in segments {
            self.fences[segment as usize] = Some(submission.clone());
        }
    }
}
