//! Insertion-order iterators over `ChainedTable`.
//!
//! Borrowing iterators follow the sentinel-anchored ring; the borrow checker
//! rules out mutation while they are alive. `IntoEntries` owns the detached
//! node storage, so dropping it drops whatever was not consumed.

use crate::chained_table::{Node, Nodes};
use slotmap::{DefaultKey, SecondaryMap};
use std::borrow::Cow;
use std::iter::FusedIterator;

/// Iterator over `(key, &value)` in insertion order.
pub struct Iter<'a, 'k, V> {
    nodes: &'a Nodes<'k, V>,
    sentinel: DefaultKey,
    front: DefaultKey,
    remaining: usize,
}

impl<'a, 'k, V> Iter<'a, 'k, V> {
    pub(crate) fn new(nodes: &'a Nodes<'k, V>, sentinel: DefaultKey) -> Self {
        Self {
            nodes,
            sentinel,
            front: nodes[sentinel].next,
            remaining: nodes.len() - 1,
        }
    }
}

impl<'a, 'k, V> Iterator for Iter<'a, 'k, V> {
    type Item = (&'a [u8], &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.front == self.sentinel {
            return None;
        }
        let node = self.nodes.get(self.front)?;
        let entry = node.entry.as_ref()?;
        self.front = node.next;
        self.remaining -= 1;
        Some((&entry.key[..], &entry.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for Iter<'_, '_, V> {}
impl<V> FusedIterator for Iter<'_, '_, V> {}

impl<V> Clone for Iter<'_, '_, V> {
    fn clone(&self) -> Self {
        Self { ..*self }
    }
}

/// Iterator over `(key, &mut value)` in insertion order.
pub struct IterMut<'a, 'k, V> {
    order: std::vec::IntoIter<DefaultKey>,
    nodes: SecondaryMap<DefaultKey, &'a mut Node<'k, V>>,
}

impl<'a, 'k, V> IterMut<'a, 'k, V> {
    pub(crate) fn new(nodes: &'a mut Nodes<'k, V>, sentinel: DefaultKey) -> Self {
        let mut order = Vec::with_capacity(nodes.len() - 1);
        let mut cur = nodes[sentinel].next;
        while cur != sentinel {
            order.push(cur);
            cur = nodes[cur].next;
        }
        // The ring only decides the order; each node is handed out once.
        let nodes = nodes.iter_mut().filter(|(k, _)| *k != sentinel).collect();
        Self {
            order: order.into_iter(),
            nodes,
        }
    }
}

impl<'a, 'k, V> Iterator for IterMut<'a, 'k, V> {
    type Item = (&'a [u8], &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        let k = self.order.next()?;
        let node = self.nodes.remove(k)?;
        let entry = node.entry.as_mut()?;
        Some((&entry.key[..], &mut entry.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.order.size_hint()
    }
}

impl<V> ExactSizeIterator for IterMut<'_, '_, V> {}

/// Keys in insertion order.
#[derive(Clone)]
pub struct Keys<'a, 'k, V> {
    inner: Iter<'a, 'k, V>,
}

impl<'a, 'k, V> Keys<'a, 'k, V> {
    pub(crate) fn new(inner: Iter<'a, 'k, V>) -> Self {
        Self { inner }
    }
}

impl<'a, V> Iterator for Keys<'a, '_, V> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Values in insertion order.
#[derive(Clone)]
pub struct Values<'a, 'k, V> {
    inner: Iter<'a, 'k, V>,
}

impl<'a, 'k, V> Values<'a, 'k, V> {
    pub(crate) fn new(inner: Iter<'a, 'k, V>) -> Self {
        Self { inner }
    }
}

impl<'a, V> Iterator for Values<'a, '_, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Owning iterator produced by `drain` and `into_iter`.
pub struct IntoEntries<'k, V> {
    nodes: Nodes<'k, V>,
    sentinel: DefaultKey,
}

impl<'k, V> IntoEntries<'k, V> {
    pub(crate) fn new(nodes: Nodes<'k, V>, sentinel: DefaultKey) -> Self {
        Self { nodes, sentinel }
    }
}

impl<'k, V> Iterator for IntoEntries<'k, V> {
    type Item = (Cow<'k, [u8]>, V);

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.nodes.get(self.sentinel)?.next;
        if first == self.sentinel {
            return None;
        }
        let node = self.nodes.remove(first)?;
        if let Some(s) = self.nodes.get_mut(self.sentinel) {
            s.next = node.next;
        }
        node.entry.map(|e| (e.key, e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.nodes.len().saturating_sub(1);
        (n, Some(n))
    }
}

impl<V> ExactSizeIterator for IntoEntries<'_, V> {}
impl<V> FusedIterator for IntoEntries<'_, V> {}
