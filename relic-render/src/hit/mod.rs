//! Hit testing (object picking)
//!
//! While the simulation builds a frame it brackets groups of primitives
//! with `push_hit`/`pop_hit`. Everything drawn under a non-empty stack is
//! tagged with the top query's index + 1 in a dedicated integer render
//! target; after submission the probed screen rectangle is read back and
//! the maximum ID wins. ID 0 is reserved for "no hit".
//!
//! Resolution happens after the queries have been popped, so each push
//! also lands in an append-only recording that survives until the next
//! frame lock.

#[cfg(test)]
mod tests;

/// One recorded hit query: a span of the frame's recording buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HitQuery {
    offset: u32,
    len: u32,
}

/// Per-frame hit query bookkeeping, cleared in full at every frame lock.
#[derive(Debug, Default)]
pub struct HitStack {
    /// Live stack bytes: push appends, pop truncates
    data: Vec<u8>,
    /// Append-only copy of every pushed span, for post-frame resolution
    recording: Vec<u8>,
    /// Every query recorded this frame, in push order
    queries: Vec<HitQuery>,
    /// Indices into `queries` for the currently open pushes
    stack: Vec<u32>,
    /// Query remembered by a forced pop, used when the scan finds nothing
    forced: Option<u32>,
}

impl HitStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all frame state (called at lock).
    pub fn clear(&mut self) {
        self.data.clear();
        self.recording.clear();
        self.queries.clear();
        self.stack.clear();
        self.forced = None;
    }

    /// Open a hit query covering subsequently drawn primitives.
    pub fn push(&mut self, bytes: &[u8]) {
        let offset = self.recording.len() as u32;
        self.recording.extend_from_slice(bytes);
        self.data.extend_from_slice(bytes);
        let index = self.queries.len() as u32;
        self.queries.push(HitQuery {
            offset,
            len: bytes.len() as u32,
        });
        self.stack.push(index);
    }

    /// Close the innermost open query, truncating `count` bytes off the
    /// live stack. With `force`, the closed query wins resolution when
    /// the readback scan finds no ID.
    pub fn pop(&mut self, count: u32, force: bool) {
        let Some(top) = self.stack.pop() else {
            return;
        };
        let len = self.data.len().saturating_sub(count as usize);
        self.data.truncate(len);
        if force {
            self.forced = Some(top);
        }
    }

    /// ID to tag vertices with right now; 0 while the stack is empty.
    pub fn current_id(&self) -> u32 {
        match self.stack.last() {
            Some(&index) => index + 1,
            None => 0,
        }
    }

    /// Depth of the live stack in bytes
    pub fn stack_bytes(&self) -> usize {
        self.data.len()
    }

    /// Bytes recorded for a non-zero ID, if it is in range.
    fn query_bytes(&self, id: u32) -> Option<&[u8]> {
        let query = self.queries.get(id.checked_sub(1)? as usize)?;
        let start = query.offset as usize;
        self.recording.get(start..start + query.len as usize)
    }

    /// Resolve a readback of the ID target: the maximum ID present wins;
    /// a forced override applies when no ID was found; anything out of
    /// range yields an empty result.
    pub fn resolve(&self, ids: &[u32]) -> &[u8] {
        let best = ids.iter().copied().max().unwrap_or(0);
        if best == 0 {
            if let Some(forced) = self.forced {
                return self.query_bytes(forced + 1).unwrap_or(&[]);
            }
            return &[];
        }
        self.query_bytes(best).unwrap_or(&[])
    }
}

/// Read back a rectangle of the integer hit-ID target.
///
/// The rectangle is clamped to the target; an empty intersection returns
/// no IDs. Blocks until the copy completes.
pub fn read_id_region(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    target: &wgpu::Texture,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
) -> Vec<u32> {
    let x = x.min(target.width());
    let y = y.min(target.height());
    let w = w.min(target.width() - x);
    let h = h.min(target.height() - y);
    if w == 0 || h == 0 {
        return Vec::new();
    }

    let unpadded_bytes_per_row = w * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Hit Readback Staging"),
        size: (padded_bytes_per_row * h) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Hit Readback Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: target,
            mip_level: 0,
            origin: wgpu::Origin3d { x, y, z: 0 },
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(h),
            },
        },
        wgpu::Extent3d {
            width: w,
            height: h,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = device.poll(wgpu::PollType::wait_indefinitely());
    if rx.recv().map(|result| result.is_err()).unwrap_or(true) {
        tracing::warn!("hit readback mapping failed");
        return Vec::new();
    }

    let mapped = slice.get_mapped_range();
    let mut ids = Vec::with_capacity((w * h) as usize);
    for row in 0..h {
        let start = (row * padded_bytes_per_row) as usize;
        let row_bytes = &mapped[start..start + unpadded_bytes_per_row as usize];
        ids.extend_from_slice(bytemuck::cast_slice::<u8, u32>(row_bytes));
    }
    drop(mapped);
    staging.unmap();
    ids
}
