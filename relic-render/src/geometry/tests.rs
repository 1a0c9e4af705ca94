//! Tests for geometry ring reservation semantics

use super::*;

fn ring() -> GeometryRing {
    GeometryRing::new(16, 32, 2)
}

#[test]
fn test_reserve_within_capacity() {
    let mut ring = ring();
    {
        let r = ring.reserve(4, 6).unwrap();
        assert_eq!(r.base_vertex, 0);
        assert_eq!(r.base_index, 0);
        assert_eq!(r.vertices.len(), 4);
        assert_eq!(r.indices.len(), 6);
    }
    ring.commit(4, 6);
    let r = ring.reserve(2, 3).unwrap();
    assert_eq!(r.base_vertex, 4);
    assert_eq!(r.base_index, 6);
}

#[test]
fn test_exact_remaining_space_succeeds_without_advance() {
    let mut ring = ring();
    ring.reserve(10, 10).unwrap();
    ring.commit(10, 10);
    // Exactly the remaining vertex space
    assert!(ring.reserve(6, 10).is_ok());
}

#[test]
fn test_one_past_remaining_space_needs_exactly_one_advance() {
    let mut ring = ring();
    ring.reserve(10, 10).unwrap();
    ring.commit(10, 10);
    assert_eq!(ring.reserve(7, 10).unwrap_err(), ReserveError::NeedsAdvance);
    ring.advance();
    // After one advance the same request must succeed
    let r = ring.reserve(7, 10).unwrap();
    assert_eq!(r.base_vertex, 0);
}

#[test]
fn test_over_capacity_fails_closed() {
    let mut ring = ring();
    assert_eq!(ring.reserve(17, 0).unwrap_err(), ReserveError::TooLarge);
    assert_eq!(ring.reserve(1, 33).unwrap_err(), ReserveError::TooLarge);
    // Cursors untouched by failed reservations
    assert_eq!(ring.vertex_pos(), 0);
    assert_eq!(ring.index_pos(), 0);
}

#[test]
fn test_index_overflow_also_forces_advance() {
    let mut ring = ring();
    ring.reserve(1, 30).unwrap();
    ring.commit(1, 30);
    assert_eq!(ring.reserve(1, 3).unwrap_err(), ReserveError::NeedsAdvance);
}

#[test]
fn test_advance_cycles_segments_and_resets_cursors() {
    let mut ring = ring();
    ring.reserve(5, 5).unwrap();
    ring.commit(5, 5);
    assert_eq!(ring.segment(), 0);
    assert_eq!(ring.next_segment(), 1);

    ring.advance();
    assert_eq!(ring.segment(), 1);
    assert_eq!(ring.vertex_pos(), 0);
    assert_eq!(ring.index_pos(), 0);

    ring.advance();
    assert_eq!(ring.segment(), 0);
}

#[test]
fn test_cursors_never_reset_mid_segment() {
    let mut ring = ring();
    for _ in 0..4 {
        ring.reserve(4, 8).unwrap();
        ring.commit(4, 8);
    }
    assert_eq!(ring.vertex_pos(), 16);
    assert_eq!(ring.index_pos(), 32);
    // Segment full; only an advance may reset
    assert_eq!(ring.reserve(1, 1).unwrap_err(), ReserveError::NeedsAdvance);
    assert_eq!(ring.vertex_pos(), 16);
}

#[test]
fn test_staged_spans_cover_committed_data() {
    let mut ring = ring();
    {
        let r = ring.reserve(3, 3).unwrap();
        r.vertices[0].position = [1.0, 2.0, 3.0];
        r.indices.copy_from_slice(&[0, 1, 2]);
    }
    ring.commit(3, 3);
    let (vertices, indices) = ring.staged();
    assert_eq!(vertices.len(), 3);
    assert_eq!(indices, &[0, 1, 2]);
    assert_eq!(vertices[0].position, [1.0, 2.0, 3.0]);
}

#[test]
fn test_reservation_indices_are_segment_absolute() {
    let mut ring = ring();
    ring.reserve(4, 6).unwrap();
    ring.commit(4, 6);
    let r = ring.reserve(3, 3).unwrap();
    // The writer offsets indices by base_vertex itself
    for (slot, offset) in r.indices.iter_mut().zip(0u32..) {
        *slot = r.base_vertex + offset;
    }
    assert_eq!(r.indices, &[4, 5, 6]);
}
