use tempfile::tempdir;

use super::*;
use crate::file::FIELD_WIDTH;

fn element(key: u64) -> Element<u64, u64> {
    Element {
        key,
        value: key * 10,
    }
}

fn keys(node: &Node<u64, u64>) -> Vec<u64> {
    node.elements.iter().map(|e| e.key).collect()
}

#[test]
fn split_partitions_around_the_median() {
    let dir = tempdir().unwrap();
    let mut file: RecordFile<NodeRecord<u64, u64>> =
        RecordFile::open(dir.path().join("nodes.db"), false).unwrap();

    let mut child = Node::new(2, false);
    child.elements = vec![element(1), element(2), element(3)];
    assert_eq!(true, child.is_full());

    let mut parent = Node::new(2, true);
    parent.children.push(ChildEdge::Loaded(Box::new(child)));
    parent.split_child(0, &mut file).unwrap();

    assert_eq!(vec![2], keys(&parent));
    assert_eq!(2, parent.children.len());

    let left = parent.children[0].load(&mut file).unwrap();
    assert_eq!(vec![1], keys(left));
    assert_eq!(false, left.is_full());

    let right = parent.children[1].load(&mut file).unwrap();
    assert_eq!(vec![3], keys(right));
    assert_eq!(false, right.is_full());
}

#[test]
fn split_moves_upper_children_to_the_sibling() {
    let dir = tempdir().unwrap();
    let mut file: RecordFile<NodeRecord<u64, u64>> =
        RecordFile::open(dir.path().join("nodes.db"), false).unwrap();

    // Full internal child with four (dangling) child references.
    let mut child = Node::new(2, false);
    child.elements = vec![element(10), element(20), element(30)];
    child.children = vec![
        ChildEdge::Unloaded(100),
        ChildEdge::Unloaded(200),
        ChildEdge::Unloaded(300),
        ChildEdge::Unloaded(400),
    ];

    let mut parent = Node::new(2, true);
    parent.children.push(ChildEdge::Loaded(Box::new(child)));
    parent.split_child(0, &mut file).unwrap();

    assert_eq!(vec![20], keys(&parent));

    let left = parent.children[0].load(&mut file).unwrap();
    assert_eq!(vec![10], keys(left));
    assert_eq!(vec![Some(100), Some(200)], edge_offsets(left));

    let right = parent.children[1].load(&mut file).unwrap();
    assert_eq!(vec![30], keys(right));
    assert_eq!(vec![Some(300), Some(400)], edge_offsets(right));
}

fn edge_offsets(node: &Node<u64, u64>) -> Vec<Option<u64>> {
    node.children.iter().map(|c| c.offset()).collect()
}

#[test]
fn children_are_encoded_as_fixed_width_offsets() {
    let mut node: Node<u64, u64> = Node::new(2, false);
    node.elements = vec![element(5)];
    node.children = vec![ChildEdge::Unloaded(20), ChildEdge::Unloaded(123_456)];

    let record = node.to_record().unwrap();
    assert_eq!(false, record.is_leaf);
    assert_eq!(2, record.children.len());
    for child in &record.children {
        assert_eq!(FIELD_WIDTH, child.len());
    }
    assert_eq!("0000000000000000020", record.children[0]);

    let decoded = Node::from_record(record, 77).unwrap();
    assert_eq!(Some(77), decoded.offset);
    assert_eq!(vec![5], keys(&decoded));
    assert!(matches!(decoded.children[1], ChildEdge::Unloaded(123_456)));
}

#[test]
fn unsaved_children_cannot_be_encoded() {
    let mut node: Node<u64, u64> = Node::new(2, false);
    node.elements = vec![element(1)];
    node.children = vec![ChildEdge::Loaded(Box::new(Node::new(2, false)))];

    assert!(matches!(node.to_record(), Err(Error::NodeNotPersisted)));
}
