//! Diagnostics
//!
//! Degraded paths (placeholder textures, dropped primitives, lost
//! surfaces) report through a bounded, de-duplicated warning sink instead
//! of flooding the log: each distinct message is emitted once per session
//! and counted thereafter.

use hashbrown::HashMap;

/// Maximum distinct messages retained per session
pub const DIAG_DISTINCT_CAP: usize = 16;

/// Bounded, de-duplicated warning sink.
#[derive(Debug, Default)]
pub struct DiagLog {
    entries: HashMap<&'static str, u64>,
    /// Reports dropped after the distinct cap was reached
    overflow: u64,
}

impl DiagLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a degraded-path event. `key` identifies the message class;
    /// `detail` is only emitted on the first occurrence.
    pub fn report(&mut self, key: &'static str, detail: &str) {
        if let Some(count) = self.entries.get_mut(key) {
            *count += 1;
            return;
        }
        if self.entries.len() >= DIAG_DISTINCT_CAP {
            self.overflow += 1;
            return;
        }
        tracing::warn!("{key}: {detail}");
        self.entries.insert(key, 1);
    }

    /// How many times a message class was reported
    pub fn count(&self, key: &str) -> u64 {
        self.entries.get(key).copied().unwrap_or(0)
    }

    /// Number of distinct message classes seen
    pub fn distinct(&self) -> usize {
        self.entries.len()
    }
}

/// Per-frame counters, reset at every `lock`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: u32,
    pub batches: u32,
    pub segment_advances: u32,
    pub dropped_primitives: u32,
    pub texture_uploads: u32,
    pub upload_bytes: u64,
}

/// Log cadence for the frame stats line
const STATS_LOG_INTERVAL: u64 = 120;

impl FrameStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Emit the stats line every `STATS_LOG_INTERVAL` frames.
    pub fn maybe_log(&self, frame_index: u64) {
        if frame_index % STATS_LOG_INTERVAL != 0 {
            return;
        }
        tracing::debug!(
            "frame {}: {} draws in {} batches, {} segment advances, {} dropped, {} uploads ({} bytes)",
            frame_index,
            self.draw_calls,
            self.batches,
            self.segment_advances,
            self.dropped_primitives,
            self.texture_uploads,
            self.upload_bytes,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_deduplicates() {
        let mut diag = DiagLog::new();
        diag.report("oversized surface", "first");
        diag.report("oversized surface", "second");
        diag.report("oversized surface", "third");
        assert_eq!(diag.count("oversized surface"), 3);
        assert_eq!(diag.distinct(), 1);
    }

    #[test]
    fn test_distinct_cap() {
        // The sink holds a fixed set of distinct messages; later classes
        // are dropped but already-known classes keep counting.
        const KEYS: [&str; DIAG_DISTINCT_CAP] = [
            "k0", "k1", "k2", "k3", "k4", "k5", "k6", "k7", "k8", "k9", "k10", "k11", "k12",
            "k13", "k14", "k15",
        ];
        let mut diag = DiagLog::new();
        for key in KEYS {
            diag.report(key, "");
        }
        assert_eq!(diag.distinct(), DIAG_DISTINCT_CAP);

        diag.report("one too many", "");
        assert_eq!(diag.distinct(), DIAG_DISTINCT_CAP);
        assert_eq!(diag.count("one too many"), 0);

        diag.report("k3", "");
        assert_eq!(diag.count("k3"), 2);
    }

    #[test]
    fn test_unknown_key_counts_zero() {
        let diag = DiagLog::new();
        assert_eq!(diag.count("never reported"), 0);
    }

    #[test]
    fn test_stats_reset() {
        let mut stats = FrameStats {
            draw_calls: 10,
            dropped_primitives: 2,
            ..Default::default()
        };
        stats.reset();
        assert_eq!(stats, FrameStats::default());
    }
}
