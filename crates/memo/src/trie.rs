//! Trie keyed by [`KeySegment`] paths; one level per argument position.

use fxhash::FxHashMap;

use crate::key::KeySegment;

#[derive(Debug)]
struct Node<V> {
    value: Option<V>,
    children: FxHashMap<KeySegment, Node<V>>,
}

impl<V> Default for Node<V> {
    fn default() -> Self {
        Self {
            value: None,
            children: FxHashMap::default(),
        }
    }
}

impl<V> Node<V> {
    fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }

    fn remove(&mut self, path: &[KeySegment]) -> Option<V> {
        let Some((head, rest)) = path.split_first() else {
            return self.value.take();
        };
        let child = self.children.get_mut(head)?;
        let removed = child.remove(rest);
        if child.is_empty() {
            self.children.remove(head);
        }
        removed
    }
}

#[derive(Debug)]
pub(crate) struct KeyTrie<V> {
    root: Node<V>,
    len: usize,
}

impl<V> Default for KeyTrie<V> {
    fn default() -> Self {
        Self {
            root: Node::default(),
            len: 0,
        }
    }
}

impl<V> KeyTrie<V> {
    pub(crate) fn get(&self, path: &[KeySegment]) -> Option<&V> {
        let mut node = &self.root;
        for segment in path {
            node = node.children.get(segment)?;
        }
        node.value.as_ref()
    }

    /// Store `value` at `path`, returning the value it replaced.
    pub(crate) fn insert(&mut self, path: Vec<KeySegment>, value: V) -> Option<V> {
        let mut node = &mut self.root;
        for segment in path {
            node = node.children.entry(segment).or_default();
        }
        let previous = node.value.replace(value);
        if previous.is_none() {
            self.len += 1;
        }
        previous
    }

    /// Remove the value at `path`, pruning branches left empty.
    pub(crate) fn remove(&mut self, path: &[KeySegment]) -> Option<V> {
        let removed = self.root.remove(path);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    pub(crate) fn clear(&mut self) {
        self.root = Node::default();
        self.len = 0;
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}
