//! ChainedTable: separate-chaining hash table with insertion-order traversal.
//!
//! Entries live in a `SlotMap` and are threaded through two independent
//! link structures:
//! - a singly linked chain per bucket (`Entry::link`), newest entry first;
//! - a circular doubly linked ring across all entries (`Node::prev/next`),
//!   anchored by a sentinel node that carries no entry.
//!
//! Growing the bucket array only rewrites bucket chains; the ring, and thus
//! iteration order, is never touched. The table performs no locking.

use crate::error::TableError;
use crate::one_at_a_time::OneAtATimeState;
use crate::table_iter::{IntoEntries, Iter, IterMut, Keys, Values};
use core::hash::{BuildHasher, Hasher};
use core::num::NonZeroUsize;
use slotmap::{DefaultKey, SlotMap};
use std::borrow::Cow;
use std::fmt;

/// Key equality used to resolve collisions inside a bucket chain.
pub type KeyEq = fn(&[u8], &[u8]) -> bool;

/// Default key equality: byte-wise comparison.
pub fn bytes_eq(a: &[u8], b: &[u8]) -> bool {
    a == b
}

/// How many bytes of a key participate in hashing and comparison.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum KeyWidth {
    /// NUL-terminated string semantics: a key ends at its first zero byte.
    Str,
    /// Fixed-size binary keys of exactly this many bytes.
    Fixed(NonZeroUsize),
}

impl KeyWidth {
    /// `0` selects string keys, anything else a fixed binary width.
    pub fn from_raw(width: usize) -> Self {
        match NonZeroUsize::new(width) {
            Some(n) => KeyWidth::Fixed(n),
            None => KeyWidth::Str,
        }
    }

    pub fn raw(self) -> usize {
        match self {
            KeyWidth::Str => 0,
            KeyWidth::Fixed(n) => n.get(),
        }
    }

    /// The portion of `key` a lookup compares, or `None` when no stored key
    /// could possibly match.
    pub(crate) fn lookup(self, key: &[u8]) -> Option<&[u8]> {
        match self {
            KeyWidth::Str => Some(until_nul(key)),
            KeyWidth::Fixed(n) => (key.len() == n.get()).then_some(key),
        }
    }

    fn admit<'k>(self, key: Cow<'k, [u8]>) -> Result<Cow<'k, [u8]>, TableError> {
        match self {
            KeyWidth::Str => Ok(match key {
                Cow::Borrowed(b) => Cow::Borrowed(until_nul(b)),
                Cow::Owned(mut v) => {
                    if let Some(end) = v.iter().position(|&b| b == 0) {
                        v.truncate(end);
                    }
                    Cow::Owned(v)
                }
            }),
            KeyWidth::Fixed(n) if key.len() == n.get() => Ok(key),
            KeyWidth::Fixed(n) => Err(TableError::KeyWidth {
                expected: n.get(),
                found: key.len(),
            }),
        }
    }
}

fn until_nul(key: &[u8]) -> &[u8] {
    match key.iter().position(|&b| b == 0) {
        Some(end) => &key[..end],
        None => key,
    }
}

/// Whether the table keeps a private copy of each key or stores the
/// caller's key as supplied.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum KeyOwnership {
    #[default]
    Copied,
    Borrowed,
}

/// Construction options. The defaults are 16 buckets, string keys, copied
/// keys and no release on overwrite.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TableOptions {
    /// Requested bucket count; rounded up to a power of two (minimum 1).
    pub initial_size: usize,
    pub key_width: KeyWidth,
    pub key_ownership: KeyOwnership,
    /// Hand overwritten values to the release callback, if one is set.
    pub release_on_overwrite: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            initial_size: DEFAULT_SIZE,
            key_width: KeyWidth::Str,
            key_ownership: KeyOwnership::Copied,
            release_on_overwrite: false,
        }
    }
}

impl TableOptions {
    pub fn new(initial_size: usize, key_width: KeyWidth) -> Self {
        Self {
            initial_size,
            key_width,
            ..Self::default()
        }
    }

    pub fn with_key_ownership(mut self, ownership: KeyOwnership) -> Self {
        self.key_ownership = ownership;
        self
    }

    pub fn with_release_on_overwrite(mut self, release: bool) -> Self {
        self.release_on_overwrite = release;
        self
    }

    /// Bucket count the table starts with, or `None` if the rounded size
    /// does not fit in `usize`.
    pub fn bucket_count(&self) -> Option<usize> {
        self.initial_size.max(1).checked_next_power_of_two()
    }
}

const DEFAULT_SIZE: usize = 16;

/// What `put` did with the value it was given and the one it displaced.
#[derive(Debug, PartialEq, Eq)]
pub enum PutOutcome<V> {
    /// A new entry was created.
    Inserted,
    /// An existing entry was updated; the previous value is returned.
    Replaced(V),
    /// An existing entry was updated; the previous value went to the
    /// release callback.
    Released,
}

pub(crate) struct Entry<'k, V> {
    pub(crate) key: Cow<'k, [u8]>,
    pub(crate) value: V,
    hash: u32,
    link: Option<DefaultKey>,
}

pub(crate) struct Node<'k, V> {
    pub(crate) entry: Option<Entry<'k, V>>,
    pub(crate) prev: DefaultKey,
    pub(crate) next: DefaultKey,
}

pub(crate) type Nodes<'k, V> = SlotMap<DefaultKey, Node<'k, V>>;

pub(crate) fn new_ring<'k, V>() -> (Nodes<'k, V>, DefaultKey) {
    let mut nodes = SlotMap::with_key();
    let sentinel = nodes.insert_with_key(|k| Node {
        entry: None,
        prev: k,
        next: k,
    });
    (nodes, sentinel)
}

fn alloc_bins(size: usize) -> Result<Vec<Option<DefaultKey>>, TableError> {
    let mut bins = Vec::new();
    bins.try_reserve_exact(size)
        .map_err(|_| TableError::OutOfMemory)?;
    bins.resize(size, None);
    Ok(bins)
}

fn hash_with<S: BuildHasher>(hasher: &S, key: &[u8]) -> u32 {
    let mut h = hasher.build_hasher();
    h.write(key);
    h.finish() as u32
}

/// Detached iteration state for `ChainedTable::next_entry`.
///
/// A default cursor starts at the oldest entry. It resets itself once the
/// walk is exhausted, and it refuses to continue after the table has gained
/// or lost entries since the walk began.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Cursor {
    next: Option<DefaultKey>,
    stamp: u64,
}

impl Cursor {
    pub fn is_started(&self) -> bool {
        self.next.is_some()
    }
}

/// A chained hash table over byte-string keys that iterates in insertion
/// order. Keys are stored as `Cow<'k, [u8]>`, so a `Borrowed` table can
/// hold the caller's slices for `'k` without copying them. A `Copied` table
/// accepts the same arguments but always stores an owned copy.
pub struct ChainedTable<'k, V, S = OneAtATimeState> {
    hasher: S,
    key_eq: KeyEq,
    release: Option<Box<dyn FnMut(V) + Send + 'k>>,
    options: TableOptions,
    bins: Vec<Option<DefaultKey>>,
    nodes: Nodes<'k, V>,
    sentinel: DefaultKey,
    // Bumped on every insertion and removal; cursors compare against it.
    stamp: u64,
}

impl<'k, V> ChainedTable<'k, V> {
    pub fn new() -> Self {
        Self::from_parts(
            TableOptions::default(),
            vec![None; DEFAULT_SIZE],
            OneAtATimeState,
        )
    }

    pub fn with_options(options: TableOptions) -> Result<Self, TableError> {
        Self::with_options_and_hasher(options, OneAtATimeState)
    }
}

impl<'k, V> Default for ChainedTable<'k, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'k, V, S> ChainedTable<'k, V, S>
where
    S: BuildHasher,
{
    pub fn with_options_and_hasher(options: TableOptions, hasher: S) -> Result<Self, TableError> {
        let size = options.bucket_count().ok_or(TableError::OutOfMemory)?;
        let bins = alloc_bins(size)?;
        Ok(Self::from_parts(options, bins, hasher))
    }

    fn from_parts(options: TableOptions, bins: Vec<Option<DefaultKey>>, hasher: S) -> Self {
        let (nodes, sentinel) = new_ring();
        Self {
            hasher,
            key_eq: bytes_eq,
            release: None,
            options,
            bins,
            nodes,
            sentinel,
            stamp: 0,
        }
    }

    /// Number of live entries.
    pub fn count(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn len(&self) -> usize {
        self.count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Number of buckets; always a power of two.
    pub fn size(&self) -> usize {
        self.bins.len()
    }

    pub fn key_width(&self) -> KeyWidth {
        self.options.key_width
    }

    pub fn key_ownership(&self) -> KeyOwnership {
        self.options.key_ownership
    }

    /// Replace the hasher. Every cached hash is recomputed and the bucket
    /// chains are rebuilt in place; iteration order is unaffected.
    pub fn set_hasher(&mut self, hasher: S) {
        self.hasher = hasher;
        let mut cur = self.nodes[self.sentinel].next;
        while cur != self.sentinel {
            let node = &mut self.nodes[cur];
            if let Some(entry) = node.entry.as_mut() {
                entry.hash = hash_with(&self.hasher, &entry.key);
            }
            cur = node.next;
        }
        self.relink();
    }

    /// Replace key equality. Existing entries are not re-examined.
    pub fn set_key_eq(&mut self, key_eq: KeyEq) {
        self.key_eq = key_eq;
    }

    /// Install the callback that receives overwritten values when the
    /// table was created with `release_on_overwrite`.
    pub fn set_release<F>(&mut self, release: F)
    where
        F: FnMut(V) + Send + 'k,
    {
        self.release = Some(Box::new(release));
    }

    pub fn clear_release(&mut self) {
        self.release = None;
    }

    fn bin_index(&self, hash: u32) -> usize {
        (hash as usize) & (self.bins.len() - 1)
    }

    // Key equality alone decides a match: a custom `key_eq` may equate keys
    // whose hashes differ but that share a bucket.
    fn find(&self, key: &[u8], hash: u32) -> Option<DefaultKey> {
        let mut cur = self.bins[self.bin_index(hash)];
        while let Some(k) = cur {
            let entry = self.nodes[k].entry.as_ref()?;
            if (self.key_eq)(&entry.key[..], key) {
                return Some(k);
            }
            cur = entry.link;
        }
        None
    }

    fn locate(&self, key: &[u8]) -> Option<DefaultKey> {
        let key = self.options.key_width.lookup(key)?;
        self.find(key, hash_with(&self.hasher, key))
    }

    /// Insert `value` under `key`, or update the value of an existing entry
    /// in place. New entries go to the head of their bucket chain and the
    /// tail of the insertion order.
    ///
    /// When the table already holds more entries than buckets, a new entry
    /// first doubles the bucket array. That allocation is made before
    /// anything is modified, so `OutOfMemory` leaves the table unchanged.
    pub fn put(
        &mut self,
        key: impl Into<Cow<'k, [u8]>>,
        value: V,
    ) -> Result<PutOutcome<V>, TableError> {
        let key = self.options.key_width.admit(key.into())?;
        let hash = hash_with(&self.hasher, &key);

        if let Some(entry) = self
            .find(&key, hash)
            .and_then(|k| self.nodes[k].entry.as_mut())
        {
            let previous = core::mem::replace(&mut entry.value, value);
            if self.options.release_on_overwrite {
                if let Some(release) = self.release.as_mut() {
                    release(previous);
                    return Ok(PutOutcome::Released);
                }
            }
            return Ok(PutOutcome::Replaced(previous));
        }

        if self.count() > self.bins.len() {
            self.grow()?;
        }

        let key = match self.options.key_ownership {
            KeyOwnership::Copied => Cow::Owned(key.into_owned()),
            KeyOwnership::Borrowed => key,
        };
        let bin = self.bin_index(hash);
        let tail = self.nodes[self.sentinel].prev;
        let k = self.nodes.insert(Node {
            entry: Some(Entry {
                key,
                value,
                hash,
                link: self.bins[bin],
            }),
            prev: tail,
            next: self.sentinel,
        });
        self.bins[bin] = Some(k);
        self.nodes[tail].next = k;
        self.nodes[self.sentinel].prev = k;
        self.stamp = self.stamp.wrapping_add(1);
        Ok(PutOutcome::Inserted)
    }

    fn grow(&mut self) -> Result<(), TableError> {
        let size = self
            .bins
            .len()
            .checked_mul(2)
            .ok_or(TableError::OutOfMemory)?;
        self.bins = alloc_bins(size)?;
        self.relink();
        Ok(())
    }

    // Rebuild every bucket chain from the insertion ring using cached hashes.
    fn relink(&mut self) {
        self.bins.fill(None);
        let mask = self.bins.len() - 1;
        let mut cur = self.nodes[self.sentinel].next;
        while cur != self.sentinel {
            let node = &mut self.nodes[cur];
            if let Some(entry) = node.entry.as_mut() {
                let bin = (entry.hash as usize) & mask;
                entry.link = self.bins[bin];
                self.bins[bin] = Some(cur);
            }
            cur = node.next;
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<&V> {
        let k = self.locate(key)?;
        self.nodes[k].entry.as_ref().map(|e| &e.value)
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut V> {
        let k = self.locate(key)?;
        self.nodes[k].entry.as_mut().map(|e| &mut e.value)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.locate(key).is_some()
    }

    /// Remove `key` and hand its value back to the caller.
    pub fn delete(&mut self, key: &[u8]) -> Option<V> {
        self.delete_entry(key).map(|(_, v)| v)
    }

    /// Remove `key`, returning the stored key alongside its value. Only the
    /// matched node leaves its bucket chain; the rest of the chain stays.
    pub fn delete_entry(&mut self, key: &[u8]) -> Option<(Cow<'k, [u8]>, V)> {
        let key = self.options.key_width.lookup(key)?;
        let hash = hash_with(&self.hasher, key);
        let bin = self.bin_index(hash);

        let mut prev: Option<DefaultKey> = None;
        let mut cur = self.bins[bin];
        while let Some(k) = cur {
            let entry = self.nodes[k].entry.as_ref()?;
            if (self.key_eq)(&entry.key[..], key) {
                let link = entry.link;
                match prev {
                    Some(p) => {
                        if let Some(pe) = self.nodes[p].entry.as_mut() {
                            pe.link = link;
                        }
                    }
                    None => self.bins[bin] = link,
                }
                return self.unlink(k);
            }
            prev = Some(k);
            cur = entry.link;
        }
        None
    }

    // Caller must already have detached `k` from its bucket chain.
    fn unlink(&mut self, k: DefaultKey) -> Option<(Cow<'k, [u8]>, V)> {
        let node = self.nodes.remove(k)?;
        self.nodes[node.prev].next = node.next;
        self.nodes[node.next].prev = node.prev;
        self.stamp = self.stamp.wrapping_add(1);
        node.entry.map(|e| (e.key, e.value))
    }

    /// Step a detached cursor: yields the entry after the one returned last,
    /// in insertion order. On exhaustion the cursor is reset and `Ok(None)`
    /// is returned. If entries were added or removed since the cursor
    /// started, the cursor is reset and `StaleCursor` is reported.
    ///
    /// A cursor must only be used with the table that started it.
    pub fn next_entry(&self, cursor: &mut Cursor) -> Result<Option<(&[u8], &V)>, TableError> {
        let k = match cursor.next {
            None => {
                cursor.stamp = self.stamp;
                self.nodes[self.sentinel].next
            }
            Some(_) if cursor.stamp != self.stamp => {
                *cursor = Cursor::default();
                return Err(TableError::StaleCursor);
            }
            Some(k) => k,
        };
        if k == self.sentinel {
            *cursor = Cursor::default();
            return Ok(None);
        }
        let Some((node, entry)) = self
            .nodes
            .get(k)
            .and_then(|n| n.entry.as_ref().map(|e| (n, e)))
        else {
            *cursor = Cursor::default();
            return Err(TableError::StaleCursor);
        };
        cursor.next = Some(node.next);
        Ok(Some((&entry.key[..], &entry.value)))
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> Iter<'_, 'k, V> {
        Iter::new(&self.nodes, self.sentinel)
    }

    /// Entries in insertion order with mutable values.
    pub fn iter_mut(&mut self) -> IterMut<'_, 'k, V> {
        IterMut::new(&mut self.nodes, self.sentinel)
    }

    pub fn keys(&self) -> Keys<'_, 'k, V> {
        Keys::new(self.iter())
    }

    pub fn values(&self) -> Values<'_, 'k, V> {
        Values::new(self.iter())
    }

    /// Remove every entry, yielding owned pairs in insertion order. The
    /// table is empty as soon as this returns; the bucket count is kept.
    /// Entries not consumed are dropped with the iterator.
    pub fn drain(&mut self) -> IntoEntries<'k, V> {
        let (nodes, sentinel) = new_ring();
        let old_nodes = core::mem::replace(&mut self.nodes, nodes);
        let old_sentinel = core::mem::replace(&mut self.sentinel, sentinel);
        self.bins.fill(None);
        self.stamp = self.stamp.wrapping_add(1);
        IntoEntries::new(old_nodes, old_sentinel)
    }

    pub fn clear(&mut self) {
        drop(self.drain());
    }

    /// Walk both link structures and assert they agree.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        use std::collections::HashSet;

        let mut in_ring = HashSet::new();
        let mut cur = self.nodes[self.sentinel].next;
        let mut prev = self.sentinel;
        while cur != self.sentinel {
            assert_eq!(self.nodes[cur].prev, prev, "ring back-link broken");
            assert!(in_ring.insert(cur), "entry appears twice in ring");
            prev = cur;
            cur = self.nodes[cur].next;
        }
        assert_eq!(self.nodes[self.sentinel].prev, prev);
        assert_eq!(in_ring.len(), self.count());

        let mut in_bins = HashSet::new();
        for (bin, head) in self.bins.iter().enumerate() {
            let mut cur = *head;
            while let Some(k) = cur {
                let entry = self.nodes[k].entry.as_ref().expect("live entry");
                assert_eq!(self.bin_index(entry.hash), bin, "entry in wrong bucket");
                assert!(in_bins.insert(k), "entry appears in two chains");
                cur = entry.link;
            }
        }
        assert_eq!(in_bins, in_ring);
        assert!(self.bins.len().is_power_of_two());
    }
}

impl<'k, V, S> IntoIterator for ChainedTable<'k, V, S>
where
    S: BuildHasher,
{
    type Item = (Cow<'k, [u8]>, V);
    type IntoIter = IntoEntries<'k, V>;

    fn into_iter(mut self) -> Self::IntoIter {
        self.drain()
    }
}

impl<'a, 'k, V, S> IntoIterator for &'a ChainedTable<'k, V, S>
where
    S: BuildHasher,
{
    type Item = (&'a [u8], &'a V);
    type IntoIter = Iter<'a, 'k, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'k, V, S> fmt::Debug for ChainedTable<'k, V, S>
where
    V: fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
