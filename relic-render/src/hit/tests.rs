//! Tests for hit query bookkeeping and resolution

use super::*;

#[test]
fn test_id_zero_while_stack_empty() {
    let hits = HitStack::new();
    assert_eq!(hits.current_id(), 0);
}

#[test]
fn test_ids_follow_push_order() {
    let mut hits = HitStack::new();
    hits.push(b"A");
    assert_eq!(hits.current_id(), 1);
    hits.pop(1, false);
    assert_eq!(hits.current_id(), 0);
    hits.push(b"B");
    // Second query of the frame, even though the stack depth is one again
    assert_eq!(hits.current_id(), 2);
}

#[test]
fn test_nested_pushes_tag_with_innermost() {
    let mut hits = HitStack::new();
    hits.push(b"outer");
    hits.push(b"inner");
    assert_eq!(hits.current_id(), 2);
    hits.pop(5, false);
    assert_eq!(hits.current_id(), 1);
    assert_eq!(hits.stack_bytes(), 5);
}

#[test]
fn test_two_tile_scenario() {
    // Push "A", draw tile 1, pop; push "B", draw tile 2.
    // Resolving over tile 1's pixels returns "A"; over tile 2's, "B".
    let mut hits = HitStack::new();
    hits.push(b"A");
    let tile1_id = hits.current_id();
    hits.pop(1, false);
    hits.push(b"B");
    let tile2_id = hits.current_id();
    hits.pop(1, false);

    assert_eq!(hits.resolve(&[0, tile1_id, 0, tile1_id]), b"A");
    assert_eq!(hits.resolve(&[tile2_id, 0, 0]), b"B");
}

#[test]
fn test_resolution_is_idempotent() {
    let mut hits = HitStack::new();
    hits.push(b"thing");
    let id = hits.current_id();
    hits.pop(5, false);

    let ids = vec![0, id, 0];
    let first = hits.resolve(&ids).to_vec();
    let second = hits.resolve(&ids).to_vec();
    assert_eq!(first, second);
    assert_eq!(first, b"thing");
}

#[test]
fn test_maximum_id_wins_overlap() {
    let mut hits = HitStack::new();
    hits.push(b"back");
    let back = hits.current_id();
    hits.push(b"front");
    let front = hits.current_id();
    hits.pop(5, false);
    hits.pop(4, false);
    assert_eq!(hits.resolve(&[back, front, back]), b"front");
}

#[test]
fn test_forced_pop_wins_when_nothing_scanned() {
    let mut hits = HitStack::new();
    hits.push(b"menu item");
    hits.pop(9, true);
    assert_eq!(hits.resolve(&[0, 0, 0]), b"menu item");
    // ...but a real scan hit still beats the override
    hits.push(b"world");
    let id = hits.current_id();
    hits.pop(5, false);
    assert_eq!(hits.resolve(&[id]), b"world");
}

#[test]
fn test_out_of_range_id_yields_empty() {
    let mut hits = HitStack::new();
    hits.push(b"only");
    hits.pop(4, false);
    assert_eq!(hits.resolve(&[99]), b"");
}

#[test]
fn test_empty_stack_yields_empty() {
    let hits = HitStack::new();
    assert_eq!(hits.resolve(&[0, 0]), b"");
    assert_eq!(hits.resolve(&[]), b"");
}

#[test]
fn test_pop_on_empty_stack_is_a_no_op() {
    let mut hits = HitStack::new();
    hits.pop(4, true);
    assert_eq!(hits.current_id(), 0);
    assert_eq!(hits.resolve(&[0]), b"");
}

#[test]
fn test_clear_resets_everything() {
    let mut hits = HitStack::new();
    hits.push(b"stale");
    hits.pop(5, true);
    hits.clear();
    assert_eq!(hits.current_id(), 0);
    assert_eq!(hits.resolve(&[1]), b"");
    assert_eq!(hits.resolve(&[0]), b"");
    // IDs restart from 1 after a clear
    hits.push(b"fresh");
    assert_eq!(hits.current_id(), 1);
}
