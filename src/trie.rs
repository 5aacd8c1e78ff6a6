//! Byte-level prefix tries mapping string keys to payloads.
//!
//! Two thin specializations share one node structure: [`DictTrie`] maps each
//! key to exactly one payload (vocabulary lookup), [`LookupTrie`] maps each
//! key to a list of payloads (suffix → rule ids, stem → (base, rule) ids).
//! Both are built from all pairs at once and are immutable afterwards.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
struct TrieNode {
    next: HashMap<u8, usize>,
    slot: Option<usize>,
}

#[derive(Debug, Clone)]
struct TrieCore {
    nodes: Vec<TrieNode>,
    slots: usize,
}

impl TrieCore {
    fn new() -> Self {
        TrieCore { nodes: vec![TrieNode::default()], slots: 0 }
    }

    /// Insert a key, returning its slot (allocating one for new keys).
    fn insert(&mut self, key: &str) -> usize {
        let mut cur = 0usize;
        for &b in key.as_bytes() {
            let next = match self.nodes[cur].next.get(&b) {
                Some(&n) => n,
                None => {
                    let idx = self.nodes.len();
                    self.nodes.push(TrieNode::default());
                    self.nodes[cur].next.insert(b, idx);
                    idx
                }
            };
            cur = next;
        }
        match self.nodes[cur].slot {
            Some(slot) => slot,
            None => {
                let slot = self.slots;
                self.nodes[cur].slot = Some(slot);
                self.slots += 1;
                slot
            }
        }
    }

    fn lookup(&self, key: &str) -> Option<usize> {
        let mut cur = 0usize;
        for &b in key.as_bytes() {
            cur = *self.nodes[cur].next.get(&b)?;
        }
        self.nodes[cur].slot
    }

    /// Slots of every stored key that is a prefix of `s`, with the prefix
    /// length in bytes. Includes the empty key when stored.
    fn prefix_slots(&self, s: &str) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        let mut cur = 0usize;
        if let Some(slot) = self.nodes[0].slot {
            out.push((0, slot));
        }
        for (i, &b) in s.as_bytes().iter().enumerate() {
            match self.nodes[cur].next.get(&b) {
                Some(&n) => {
                    cur = n;
                    if let Some(slot) = self.nodes[cur].slot {
                        out.push((i + 1, slot));
                    }
                }
                None => break,
            }
        }
        out
    }
}

/// Trie mapping each key to exactly one payload. Later pairs with the same
/// key overwrite earlier ones.
#[derive(Debug, Clone)]
pub struct DictTrie<V> {
    core: TrieCore,
    values: Vec<V>,
}

impl<V> DictTrie<V> {
    pub fn from_pairs<K, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut core = TrieCore::new();
        let mut values: Vec<Option<V>> = Vec::new();
        for (key, value) in pairs {
            let slot = core.insert(key.as_ref());
            if slot == values.len() {
                values.push(Some(value));
            } else {
                values[slot] = Some(value);
            }
        }
        let values = values.into_iter().flatten().collect();
        DictTrie { core, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.core.lookup(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.core.lookup(key).map(|slot| &self.values[slot])
    }

    /// Every stored key that prefixes `s`, as `(prefix_len_bytes, value)`.
    pub fn prefixes_and_values(&self, s: &str) -> Vec<(usize, &V)> {
        self.core
            .prefix_slots(s)
            .into_iter()
            .map(|(len, slot)| (len, &self.values[slot]))
            .collect()
    }
}

/// Trie mapping each key to the list of payloads inserted under it.
#[derive(Debug, Clone)]
pub struct LookupTrie<V> {
    core: TrieCore,
    values: Vec<Vec<V>>,
}

impl<V> LookupTrie<V> {
    pub fn from_pairs<K, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut core = TrieCore::new();
        let mut values: Vec<Vec<V>> = Vec::new();
        for (key, value) in pairs {
            let slot = core.insert(key.as_ref());
            if slot == values.len() {
                values.push(Vec::new());
            }
            values[slot].push(value);
        }
        LookupTrie { core, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.core.lookup(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&[V]> {
        self.core.lookup(key).map(|slot| self.values[slot].as_slice())
    }

    /// Every stored key that prefixes `s`, as `(prefix_len_bytes, values)`.
    pub fn prefixes_and_values(&self, s: &str) -> Vec<(usize, &[V])> {
        self.core
            .prefix_slots(s)
            .into_iter()
            .map(|(len, slot)| (len, self.values[slot].as_slice()))
            .collect()
    }
}
