use super::*;
use crate::dom::diff::diff;

fn p(text: &str) -> Node {
    Node::element("p", vec![Node::text(text)])
}

fn populated(nodes: &[Node]) -> LiveTree {
    let mut tree = LiveTree::new();
    tree.apply(&diff(&[], nodes)).unwrap();
    tree
}

#[test]
fn test_apply_diff_reaches_target_tree() {
    let old = vec![p("Hello"), p("stale")];
    let new = vec![
        p("Hello, world"),
        Node::element("ul", vec![Node::element("li", vec![Node::text("one")])]),
        p("tail"),
    ];

    let mut tree = populated(&old);
    let stats = tree.apply(&diff(&old, &new)).unwrap();

    assert_eq!(tree.to_fragment(), Fragment::new(new));
    assert_eq!(stats.updated, 1);
    assert_eq!(stats.replaced, 1);
    assert_eq!(stats.inserted, 1);
}

#[test]
fn test_in_place_update_keeps_node_identity() {
    let old = vec![p("Hi")];
    let mut tree = populated(&old);
    let text_node = tree.node_at(&[0, 0]).unwrap();

    tree.apply(&diff(&old, &[p("Hi there")])).unwrap();

    assert_eq!(tree.node_at(&[0, 0]), Some(text_node));
    assert_eq!(tree.text_of(text_node), Some("Hi there"));
}

#[test]
fn test_removed_subtree_leaves_no_nodes_behind() {
    let old = vec![p("a"), p("b")];
    let mut tree = populated(&old);
    assert_eq!(tree.node_count(), 4);

    tree.apply(&diff(&old, &[p("a")])).unwrap();
    assert_eq!(tree.node_count(), 2);
}

#[test]
fn test_selection_survives_text_growth() {
    let old = vec![p("Hello wor")];
    let mut tree = populated(&old);
    let node = tree.find_text("Hello").unwrap();
    tree.set_selection(Some(Selection::new(
        TextAnchor::new(node, 0),
        TextAnchor::new(node, 5),
    )));

    let saved = tree.capture_selection();
    tree.apply(&diff(&old, &[p("Hello world")])).unwrap();

    assert!(tree.restore_selection(saved));
    assert_eq!(tree.selection(), saved);
}

#[test]
fn test_selection_dropped_when_anchor_replaced() {
    let old = vec![p("* item")];
    let mut tree = populated(&old);
    let node = tree.find_text("item").unwrap();
    tree.set_selection(Some(Selection::caret(TextAnchor::new(node, 2))));

    let saved = tree.capture_selection();
    let new = vec![Node::element(
        "ul",
        vec![Node::element("li", vec![Node::text("item")])],
    )];
    tree.apply(&diff(&old, &new)).unwrap();

    assert!(!tree.restore_selection(saved));
    assert_eq!(tree.selection(), None);
}

#[test]
fn test_selection_offset_clamped_to_shorter_text() {
    let old = vec![p("abcdef")];
    let mut tree = populated(&old);
    let node = tree.find_text("abc").unwrap();
    let saved = Some(Selection::caret(TextAnchor::new(node, 6)));

    tree.apply(&diff(&old, &[p("ab")])).unwrap();

    assert!(tree.restore_selection(saved));
    assert_eq!(tree.selection().unwrap().focus.offset, 2);
}

#[test]
fn test_invalid_patch_reports_error() {
    let mut tree = populated(&[p("a")]);
    let err = tree
        .apply(&[Patch::Remove {
            parent: vec![],
            index: 3,
        }])
        .unwrap_err();
    assert!(matches!(err, PatchError::IndexOutOfBounds { index: 3, len: 1, .. }));

    let err = tree
        .apply(&[Patch::SetText {
            path: vec![0],
            text: "x".into(),
        }])
        .unwrap_err();
    assert_eq!(err, PatchError::KindMismatch(vec![0]));
}

#[test]
fn test_detach_clears_and_marks_unattached() {
    let mut tree = populated(&[p("a")]);
    let id = tree.id();
    tree.detach();
    assert!(!tree.is_attached());
    assert!(tree.is_empty());
    assert_eq!(tree.id(), id);
}
