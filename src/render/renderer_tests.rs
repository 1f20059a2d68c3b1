use super::*;
use crate::dom::{Selection, TextAnchor};
use crate::markdown::compile;

const MS: Duration = Duration::from_millis(1);

fn setup() -> (LiveTree, StreamRenderer, Instant) {
    let tree = LiveTree::new();
    let renderer = StreamRenderer::for_tree(&tree, RenderOptions::default());
    (tree, renderer, Instant::now())
}

/// Feed chunks at `gap` intervals, ticking after each one, then flush
fn stream(chunks: &[&str], gap: Duration) -> (LiveTree, usize) {
    let (mut tree, mut renderer, mut now) = setup();
    let mut content = String::new();
    let mut cycles = 0;
    for chunk in chunks {
        content.push_str(chunk);
        renderer.update(&content, now);
        now += gap;
        cycles += renderer.tick(now, &mut tree).is_some() as usize;
    }
    cycles += renderer.flush(&mut tree).is_some() as usize;
    (tree, cycles)
}

#[test]
fn test_final_text_is_independent_of_timing() {
    let chunks = ["Hello", ", wor", "ld. ", "This is ", "a stream", "ed reply."];
    let expected: String = chunks.concat();

    for gap in [0, 10, 149, 150, 400, 1000] {
        let (tree, _) = stream(&chunks, gap * MS);
        assert_eq!(tree.text_content(), expected, "gap {}ms", gap);
        assert_eq!(tree.to_fragment(), compile(&expected));
    }
}

#[test]
fn test_markdown_stream_matches_full_compile() {
    let chunks = ["# Ti", "tle\n\n- one\n", "- two\n\n```ru", "st\nfn main() {}\n", "```\n\nDone"];
    let full: String = chunks.concat();
    for gap in [0, 50, 200] {
        let (tree, _) = stream(&chunks, gap * MS);
        assert_eq!(tree.to_fragment(), compile(&full), "gap {}ms", gap);
    }
}

#[test]
fn test_rapid_updates_coalesce_into_one_cycle() {
    let chunks = ["a", "b", "c", "d", "e"];
    let (tree, cycles) = stream(&chunks, 10 * MS);
    assert_eq!(cycles, 1);
    assert_eq!(tree.text_content(), "abcde");
}

#[test]
fn test_unchanged_length_is_not_rescheduled() {
    let (mut tree, mut renderer, now) = setup();
    assert!(renderer.update("Hi", now));
    renderer.flush(&mut tree);
    assert!(!renderer.update("Hi", now));
    assert!(!renderer.is_pending());
}

#[test]
fn test_empty_content_renders_nothing() {
    let (mut tree, mut renderer, now) = setup();
    assert!(!renderer.update("", now));
    assert!(renderer.flush(&mut tree).is_none());
    assert!(tree.is_empty());
}

#[test]
fn test_cleared_container_is_not_cleared_again() {
    let (mut tree, mut renderer, now) = setup();
    renderer.update("Hi", now);
    renderer.flush(&mut tree);

    assert!(renderer.update("", now));
    renderer.flush(&mut tree);
    assert!(tree.is_empty());

    assert!(!renderer.update("", now));
    assert!(!renderer.is_pending());
}

#[test]
fn test_growth_patches_in_place() {
    let (mut tree, mut renderer, now) = setup();
    renderer.update("Hello", now);
    renderer.flush(&mut tree);

    renderer.update("Hello there", now);
    let report = renderer.flush(&mut tree).unwrap();
    assert_eq!(report.stats.structural(), 0);
    assert_eq!(report.stats.updated, 1);
    assert_eq!(renderer.last_rendered_len(), "Hello there".len());
}

#[test]
fn test_selection_preserved_across_cycles() {
    let (mut tree, mut renderer, now) = setup();
    renderer.update("Select me please", now);
    renderer.flush(&mut tree);

    let node = tree.find_text("Select").unwrap();
    let selection = Selection::new(TextAnchor::new(node, 0), TextAnchor::new(node, 6));
    tree.set_selection(Some(selection));

    renderer.update("Select me please, more text", now);
    let report = renderer.flush(&mut tree).unwrap();
    assert!(report.selection_restored);
    assert_eq!(tree.selection(), Some(selection));
}

#[test]
fn test_reset_cancels_and_clears() {
    let (mut tree, mut renderer, now) = setup();
    renderer.update("first", now);
    renderer.flush(&mut tree);
    renderer.update("first second", now);

    renderer.reset(Some(&mut tree));
    assert!(!renderer.is_pending());
    assert!(renderer.snapshot().is_none());
    assert!(tree.is_empty());
    assert!(renderer.tick(now + 10_000 * MS, &mut tree).is_none());
}

#[test]
fn test_cycle_for_detached_container_is_dropped() {
    let (mut tree, mut renderer, now) = setup();
    renderer.update("late", now);
    tree.detach();
    assert!(renderer.flush(&mut tree).is_none());
    assert!(tree.is_empty());
}

#[test]
fn test_cycle_for_other_container_is_dropped() {
    let (_, mut renderer, now) = setup();
    let mut other = LiveTree::new();
    renderer.update("wrong target", now);
    assert!(renderer.flush(&mut other).is_none());
    assert!(other.is_empty());
}
