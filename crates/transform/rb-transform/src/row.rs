//! RowView - the mutable per-row tree handed to the script bridge.

use crate::path::FieldPath;
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};

/// Top-level names starting with this prefix are scratch space and never
/// written back to the batch.
pub const SENTINEL_PREFIX: &str = "__";

/// A node of the row tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A scalar value.
    Leaf(Value),
    /// A list value; lists are not flattened further.
    Sequence(Sequence),
    /// A record; its children are addressed by the next path segment.
    Tree(Tree),
}

impl Node {
    /// Converts the node back into a plain value.
    pub fn to_value(&self) -> Value {
        match self {
            Node::Leaf(value) => value.clone(),
            Node::Sequence(sequence) => Value::List(sequence.items.clone()),
            Node::Tree(tree) => Value::Record(
                tree.children
                    .iter()
                    .map(|(key, node)| (key.clone(), node.to_value()))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        match value {
            Value::List(items) => Node::Sequence(Sequence::new(items)),
            Value::Record(fields) => Node::Tree(Tree {
                children: fields
                    .into_iter()
                    .map(|(key, value)| (key, Node::from(value)))
                    .collect(),
            }),
            value => Node::Leaf(value),
        }
    }
}

/// A list leaf that remembers in-place mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    items: Vec<Value>,
    modified: bool,
}

impl Sequence {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items,
            modified: false,
        }
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the list was mutated in place.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn push(&mut self, value: Value) {
        self.modified = true;
        self.items.push(value);
    }

    /// Replaces the item at `idx`; returns `false` when out of bounds.
    pub fn set(&mut self, idx: usize, value: Value) -> bool {
        match self.items.get_mut(idx) {
            Some(slot) => {
                self.modified = true;
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, idx: usize) -> Option<Value> {
        if idx >= self.items.len() {
            return None;
        }
        self.modified = true;
        Some(self.items.remove(idx))
    }
}

/// An ordered record of nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tree {
    children: IndexMap<String, Node>,
}

impl Tree {
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.children.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.children.iter().map(|(key, node)| (key.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// One emitted field of a finished row.
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    pub key: FieldPath,
    pub value: Value,
    pub touched: bool,
}

/// What merging a record does to a single key.
enum MergeAction {
    Recurse(IndexMap<String, Value>),
    Keep,
    Assign(Value),
}

/// The mutable view of one row.
///
/// Besides the tree itself the view records the value originally placed at
/// every path and every path that was reassigned since. Both feed the
/// change detection in [`RowView::emit`].
#[derive(Debug)]
pub struct RowView {
    row: usize,
    root: Tree,
    origin: HashMap<FieldPath, Value>,
    reassigned: HashSet<FieldPath>,
}

impl RowView {
    /// Creates an empty view for row `row`.
    pub fn new(row: usize) -> Self {
        Self {
            row,
            root: Tree::default(),
            origin: HashMap::new(),
            reassigned: HashSet::new(),
        }
    }

    /// Places an input value at `path` without marking anything as changed.
    ///
    /// Records only reach here for empty structs, which stay a single leaf.
    pub(crate) fn load(&mut self, path: &FieldPath, value: Value) {
        let node = match &value {
            Value::List(items) => Node::Sequence(Sequence::new(items.clone())),
            value => Node::Leaf(value.clone()),
        };
        if let Some(slot) = self.slot(path) {
            *slot = node;
            self.origin.insert(path.clone(), value);
        }
    }

    /// Row index within the batch.
    pub fn row(&self) -> usize {
        self.row
    }

    pub fn root(&self) -> &Tree {
        &self.root
    }

    /// Looks up the node at `path`.
    pub fn get(&self, path: impl Into<FieldPath>) -> Option<&Node> {
        let path = path.into();
        let (first, rest) = path.segments().split_first()?;
        let mut node = self.root.children.get(first)?;
        for segment in rest {
            match node {
                Node::Tree(tree) => node = tree.children.get(segment)?,
                _ => return None,
            }
        }
        Some(node)
    }

    /// Mutable access to a list leaf.
    pub fn sequence_mut(&mut self, path: impl Into<FieldPath>) -> Option<&mut Sequence> {
        match self.node_mut(&path.into())? {
            Node::Sequence(sequence) => Some(sequence),
            _ => None,
        }
    }

    /// Assigns a value at `path`, creating records along the way.
    ///
    /// Records become sub-trees and lists become sequences, so a new record
    /// shows up as one field per leaf.
    pub fn set(&mut self, path: impl Into<FieldPath>, value: impl Into<Value>) {
        let path = path.into();
        if let Some(slot) = self.slot(&path) {
            *slot = Node::from(value.into());
            self.reassigned.insert(path);
        }
    }

    /// Removes the node at `path`.
    pub fn remove(&mut self, path: impl Into<FieldPath>) -> Option<Node> {
        let path = path.into();
        let (parent, key) = path.split_last()?;
        let tree = if parent.is_empty() {
            &mut self.root
        } else {
            match self.node_mut(&parent)? {
                Node::Tree(tree) => tree,
                _ => return None,
            }
        };
        tree.children.shift_remove(key)
    }

    /// True when the view holds nothing but scratch names.
    pub fn is_empty(&self) -> bool {
        self.root.keys().all(|key| key.starts_with(SENTINEL_PREFIX))
    }

    /// Merges a complete record into the view.
    ///
    /// Keys whose value is unchanged stay untouched, differing keys are
    /// assigned and keys missing from `record` are removed. Records merge
    /// recursively into existing sub-trees.
    pub fn merge(&mut self, record: IndexMap<String, Value>) {
        self.merge_at(&FieldPath::row(), record, &HashSet::new());
    }

    /// Like [`RowView::merge`], but paths in `retained` keep their current
    /// node even though `record` lacks them.
    pub fn merge_retaining(
        &mut self,
        record: IndexMap<String, Value>,
        retained: &HashSet<FieldPath>,
    ) {
        self.merge_at(&FieldPath::row(), record, retained);
    }

    fn merge_at(
        &mut self,
        prefix: &FieldPath,
        record: IndexMap<String, Value>,
        retained: &HashSet<FieldPath>,
    ) {
        let existing: Vec<String> = if prefix.is_empty() {
            self.root.children.keys().cloned().collect()
        } else {
            match self.get(prefix) {
                Some(Node::Tree(tree)) => tree.children.keys().cloned().collect(),
                _ => Vec::new(),
            }
        };
        for key in existing.iter().filter(|key| !record.contains_key(*key)) {
            let path = prefix.child(key.as_str());
            if !retained.contains(&path) {
                self.remove(&path);
            }
        }

        for (key, value) in record {
            let path = prefix.child(key);
            let action = match (self.get(&path), value) {
                (Some(Node::Tree(_)), Value::Record(fields)) => MergeAction::Recurse(fields),
                (Some(node), value) if node.to_value().equivalent(&value) => MergeAction::Keep,
                (_, value) => MergeAction::Assign(value),
            };
            match action {
                MergeAction::Recurse(fields) => self.merge_at(&path, fields, retained),
                MergeAction::Keep => {}
                MergeAction::Assign(value) => self.set(path, value),
            }
        }
    }

    /// Emits every leaf of the row with its touched flag.
    ///
    /// A leaf is touched when it (or one of its parents) was reassigned, or
    /// for lists mutated in place, and its value differs from the one
    /// originally loaded. New paths are always touched.
    pub fn emit(&self) -> Vec<Emission> {
        let mut out = Vec::new();
        for (key, node) in &self.root.children {
            if key.starts_with(SENTINEL_PREFIX) {
                continue;
            }
            self.emit_node(FieldPath::new(key.as_str()), node, false, &mut out);
        }
        out
    }

    fn emit_node(
        &self,
        path: FieldPath,
        node: &Node,
        parent_reassigned: bool,
        out: &mut Vec<Emission>,
    ) {
        let reassigned = parent_reassigned || self.reassigned.contains(&path);
        match node {
            Node::Tree(tree) => {
                for (key, child) in &tree.children {
                    self.emit_node(path.child(key.as_str()), child, reassigned, out);
                }
            }
            Node::Sequence(sequence) => {
                let differs = !matches!(
                    self.origin.get(&path),
                    Some(Value::List(items)) if items.len() == sequence.items.len()
                        && items.iter().zip(&sequence.items).all(|(a, b)| a.equivalent(b))
                );
                out.push(Emission {
                    key: path,
                    value: Value::List(sequence.items.clone()),
                    touched: (reassigned || sequence.modified) && differs,
                });
            }
            Node::Leaf(value) => {
                let differs = !self
                    .origin
                    .get(&path)
                    .is_some_and(|origin| origin.equivalent(value));
                out.push(Emission {
                    key: path,
                    value: value.clone(),
                    touched: reassigned && differs,
                });
            }
        }
    }

    /// Returns the node slot at `path`, creating intermediate records and
    /// replacing non-record nodes in the way. The empty path has no slot.
    fn slot(&mut self, path: &FieldPath) -> Option<&mut Node> {
        let (last, parents) = path.segments().split_last()?;
        let mut tree = &mut self.root;
        for segment in parents {
            let node = tree
                .children
                .entry(segment.clone())
                .or_insert_with(|| Node::Tree(Tree::default()));
            if !matches!(node, Node::Tree(_)) {
                *node = Node::Tree(Tree::default());
            }
            tree = match node {
                Node::Tree(tree) => tree,
                _ => unreachable!("node was just replaced by a tree"),
            };
        }
        Some(
            tree.children
                .entry(last.clone())
                .or_insert(Node::Leaf(Value::Null)),
        )
    }

    fn node_mut(&mut self, path: &FieldPath) -> Option<&mut Node> {
        let (first, rest) = path.segments().split_first()?;
        let mut node = self.root.children.get_mut(first)?;
        for segment in rest {
            match node {
                Node::Tree(tree) => node = tree.children.get_mut(segment)?,
                _ => return None,
            }
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded() -> RowView {
        let mut view = RowView::new(0);
        view.load(&FieldPath::new("x"), Value::Int(1));
        view.load(&FieldPath::from(["p", "a"]), Value::Int(2));
        view.load(&FieldPath::from(["p", "b"]), Value::from("b"));
        view.load(&FieldPath::new("tags"), Value::List(vec![Value::Int(1)]));
        view
    }

    fn touched(view: &RowView) -> Vec<String> {
        view.emit()
            .into_iter()
            .filter(|e| e.touched)
            .map(|e| e.key.to_string())
            .collect()
    }

    #[test]
    fn test_loaded_view_is_untouched() {
        let view = loaded();
        let keys: Vec<String> = view.emit().into_iter().map(|e| e.key.to_string()).collect();

        assert_eq!(keys, vec!["x", "p.a", "p.b", "tags"]);
        assert!(touched(&view).is_empty());
    }

    #[test]
    fn test_set_same_value_is_not_touched() {
        let mut view = loaded();
        view.set("x", 1_i64);
        assert!(touched(&view).is_empty());

        view.set("x", 5_i64);
        assert_eq!(touched(&view), vec!["x"]);
    }

    #[test]
    fn test_set_nested_and_new_keys() {
        let mut view = loaded();
        view.set(["p", "a"], 10_i64);
        view.set(["q", "r"], "new");

        assert_eq!(touched(&view), vec!["p.a", "q.r"]);
        assert!(matches!(view.get("q"), Some(Node::Tree(_))));
    }

    #[test]
    fn test_sequence_mutation_is_tracked() {
        let mut view = loaded();
        let tags = view.sequence_mut("tags").unwrap();
        tags.push(Value::Int(2));
        assert!(tags.is_modified());
        assert_eq!(touched(&view), vec!["tags"]);

        let tags = view.sequence_mut("tags").unwrap();
        assert!(tags.remove(1).is_some());
        assert!(touched(&view).is_empty());
    }

    #[test]
    fn test_reassigning_a_record_touches_changed_children_only() {
        let mut view = loaded();
        let record = IndexMap::from([
            ("a".to_string(), Value::Int(2)),
            ("b".to_string(), Value::from("changed")),
        ]);
        view.set("p", Value::Record(record));

        assert_eq!(touched(&view), vec!["p.b"]);
    }

    #[test]
    fn test_remove() {
        let mut view = loaded();
        assert!(view.remove(["p", "a"]).is_some());
        assert!(view.remove("missing").is_none());

        let keys: Vec<String> = view.emit().into_iter().map(|e| e.key.to_string()).collect();
        assert_eq!(keys, vec!["x", "p.b", "tags"]);
    }

    #[test]
    fn test_sentinel_names_are_not_emitted() {
        let mut view = RowView::new(0);
        view.set("__scratch", 1_i64);
        assert!(view.is_empty());
        assert!(view.emit().is_empty());

        view.set("y", 2_i64);
        assert!(!view.is_empty());
        assert_eq!(view.emit().len(), 1);
    }

    #[test]
    fn test_merge_diffs_against_current_tree() {
        let mut view = loaded();
        let p = view.root().get("p").unwrap().to_value();
        let record = IndexMap::from([
            ("p".to_string(), p),
            ("x".to_string(), Value::Int(2)),
            ("tags".to_string(), Value::List(vec![Value::Int(1)])),
            ("new".to_string(), Value::Bool(true)),
        ]);
        view.merge(record);

        assert_eq!(touched(&view), vec!["x", "new"]);
    }

    #[test]
    fn test_merge_removes_missing_keys() {
        let mut view = loaded();
        let record = IndexMap::from([(
            "p".to_string(),
            Value::Record(IndexMap::from([("a".to_string(), Value::Int(2))])),
        )]);
        view.merge(record);

        let keys: Vec<String> = view.emit().into_iter().map(|e| e.key.to_string()).collect();
        assert_eq!(keys, vec!["p.a"]);
        assert!(touched(&view).is_empty());
    }

    #[test]
    fn test_dotted_name_is_a_single_field() {
        let mut view = RowView::new(0);
        view.load(&FieldPath::new("id.orig_h"), Value::Int(1));

        assert!(matches!(view.get("id.orig_h"), Some(Node::Leaf(Value::Int(1)))));
        assert!(view.get(["id", "orig_h"]).is_none());
        let keys: Vec<FieldPath> = view.emit().into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![FieldPath::new("id.orig_h")]);
    }

    #[test]
    fn test_nan_is_unchanged_by_identical_assignment() {
        let mut view = RowView::new(0);
        view.load(&FieldPath::new("f"), Value::Float(f64::NAN));
        view.set("f", f64::NAN);
        assert!(touched(&view).is_empty());

        view.merge(IndexMap::from([("f".to_string(), Value::Float(f64::NAN))]));
        assert!(touched(&view).is_empty());
    }

    #[test]
    fn test_retained_keys_survive_merge() {
        let mut view = loaded();
        let record = IndexMap::from([
            ("x".to_string(), Value::Int(1)),
            (
                "p".to_string(),
                Value::Record(IndexMap::from([("b".to_string(), Value::from("b"))])),
            ),
        ]);
        let retained = HashSet::from([FieldPath::from(["p", "a"]), FieldPath::new("tags")]);
        view.merge_retaining(record, &retained);

        let keys: Vec<String> = view.emit().into_iter().map(|e| e.key.to_string()).collect();
        assert_eq!(keys, vec!["x", "p.a", "p.b", "tags"]);
        assert!(touched(&view).is_empty());
    }
}
