//! Tests for draw batch coalescing

use super::*;

fn key(state_index: u8, texture: u64) -> BatchKey {
    BatchKey {
        state_index,
        lines: false,
        screen_space: false,
        textures: [texture, 0, 0, 0],
        sampler_bits: 0b01,
        tint: [0; 4],
    }
}

fn data() -> BatchData {
    BatchData {
        slots: [0; 4],
        sampler_bits: 0b01,
        flags: 0,
        _pad: [0; 2],
    }
}

#[test]
fn test_identical_state_coalesces_to_one_range() {
    let mut queue = BatchQueue::new();
    let k = key(3, 7);
    // Ten draws, six indices each, all with identical state
    for draw in 0..10u32 {
        queue.set_state(k, data(), 0, 0, draw * 6);
    }
    queue.close(60);

    let entries = queue.take();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].index_start, 0);
    assert_eq!(entries[0].index_end, 60);
}

#[test]
fn test_range_count_equals_state_runs() {
    let mut queue = BatchQueue::new();
    // Runs: A A B A C C → 4 maximal runs
    let states = [1u64, 1, 2, 1, 3, 3];
    for (draw, &texture) in states.iter().enumerate() {
        queue.set_state(key(0, texture), data(), 0, 0, draw as u32 * 3);
    }
    queue.close(states.len() as u32 * 3);

    let entries = queue.take();
    assert_eq!(entries.len(), 4);
    let spans: Vec<(u32, u32)> = entries.iter().map(|e| (e.index_start, e.index_end)).collect();
    assert_eq!(spans, [(0, 6), (6, 9), (9, 12), (12, 18)]);
}

#[test]
fn test_every_key_field_splits_batches() {
    let base = key(0, 1);
    let variants = [
        BatchKey { state_index: 1, ..base },
        BatchKey { lines: true, ..base },
        BatchKey { screen_space: true, ..base },
        BatchKey { textures: [1, 9, 0, 0], ..base },
        BatchKey { sampler_bits: 0b11, ..base },
        BatchKey { tint: [255, 0, 0, 128], ..base },
    ];
    for variant in variants {
        let mut queue = BatchQueue::new();
        queue.set_state(base, data(), 0, 0, 0);
        queue.set_state(variant, data(), 0, 0, 6);
        queue.close(12);
        assert_eq!(queue.take().len(), 2, "{variant:?} should split");
    }
}

#[test]
fn test_empty_range_is_not_queued() {
    let mut queue = BatchQueue::new();
    // State change before any index was written
    queue.set_state(key(0, 1), data(), 0, 0, 0);
    queue.set_state(key(0, 2), data(), 0, 0, 0);
    queue.close(0);
    assert!(queue.take().is_empty());
}

#[test]
fn test_segment_change_splits_batches() {
    let mut queue = BatchQueue::new();
    let k = key(0, 1);
    queue.set_state(k, data(), 0, 0, 0);
    // Segment advance: device closes at the old cursor, then the same
    // state reopens in the new segment at cursor zero
    queue.close(9);
    queue.set_state(k, data(), 0, 1, 0);
    queue.close(6);

    let entries = queue.take();
    assert_eq!(entries.len(), 2);
    assert_eq!((entries[0].segment, entries[0].index_end), (0, 9));
    assert_eq!((entries[1].segment, entries[1].index_start, entries[1].index_end), (1, 0, 6));
}

#[test]
fn test_same_key_after_close_opens_new_entry() {
    let mut queue = BatchQueue::new();
    let k = key(0, 1);
    queue.set_state(k, data(), 0, 0, 0);
    queue.close(6);
    queue.set_state(k, data(), 0, 0, 6);
    queue.close(12);
    assert_eq!(queue.take().len(), 2);
}

#[test]
fn test_reset_discards_open_and_queued() {
    let mut queue = BatchQueue::new();
    queue.set_state(key(0, 1), data(), 0, 0, 0);
    queue.close(6);
    queue.set_state(key(0, 2), data(), 0, 0, 6);
    queue.reset();
    assert!(queue.entries().is_empty());
    assert!(queue.take().is_empty());
}
