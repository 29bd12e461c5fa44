//! Simulation statistics collection.
//!
//! Counters are named by dotted paths (`core0.thread1.commit.insns`) and kept
//! flat; the hierarchy only appears when the tree is serialized:
//! 1. **Counting:** `inc` and `add` create counters on first use.
//! 2. **Periodic sampling:** `take_periodic` reports what accumulated since the
//!    previous sample, for interval dumps.
//! 3. **Export:** `Serialize` nests the paths, so `a.b` and `a.c` become
//!    `{"a": {"b": .., "c": ..}}`.

use std::collections::BTreeMap;

use serde::ser::{Serialize, Serializer};

/// Hierarchical counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatsTree {
    counters: BTreeMap<String, u64>,
    last_sample: BTreeMap<String, u64>,
}

impl StatsTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumps `path` by one.
    #[inline]
    pub fn inc(&mut self, path: &str) {
        self.add(path, 1);
    }

    /// Adds `n` to `path`.
    pub fn add(&mut self, path: &str, n: u64) {
        if let Some(c) = self.counters.get_mut(path) {
            *c += n;
        } else {
            let _ = self.counters.insert(path.to_owned(), n);
        }
    }

    /// Current value of `path`; zero if never counted.
    pub fn get(&self, path: &str) -> u64 {
        self.counters.get(path).copied().unwrap_or(0)
    }

    /// Sum of every counter under `prefix` whose last segment is `leaf`.
    ///
    /// `sum("core0", "commit.insns")` totals the committed instructions of
    /// every thread of core 0.
    pub fn sum(&self, prefix: &str, leaf: &str) -> u64 {
        self.counters
            .iter()
            .filter(|(k, _)| k.starts_with(prefix) && k.ends_with(leaf))
            .map(|(_, v)| *v)
            .sum()
    }

    /// Counters in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.counters.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of counters.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Returns true if nothing was counted.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Returns the counters accumulated since the previous call.
    ///
    /// Counters that did not move are left out.
    pub fn take_periodic(&mut self) -> BTreeMap<String, u64> {
        let delta = self
            .counters
            .iter()
            .filter_map(|(k, v)| {
                let before = self.last_sample.get(k).copied().unwrap_or(0);
                (*v > before).then(|| (k.clone(), v - before))
            })
            .collect();
        self.last_sample.clone_from(&self.counters);
        delta
    }

    /// Resets every counter.
    pub fn clear(&mut self) {
        self.counters.clear();
        self.last_sample.clear();
    }
}

#[derive(serde::Serialize)]
#[serde(untagged)]
enum Node {
    Counter(u64),
    Group(BTreeMap<String, Node>),
}

impl Node {
    fn insert(&mut self, path: &str, value: u64) {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        // A counter that is also a prefix of other counters keeps its value under `value`.
        if let Self::Counter(v) = *self {
            let mut group = BTreeMap::new();
            let _ = group.insert("value".to_owned(), Self::Counter(v));
            *self = Self::Group(group);
        }
        let Self::Group(children) = self else {
            return;
        };
        match rest {
            None => match children.get_mut(head) {
                Some(child @ Self::Group(_)) => child.insert("value", value),
                _ => {
                    let _ = children.insert(head.to_owned(), Self::Counter(value));
                }
            },
            Some(rest) => children
                .entry(head.to_owned())
                .or_insert_with(|| Self::Group(BTreeMap::new()))
                .insert(rest, value),
        }
    }
}

impl Serialize for StatsTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut root = Node::Group(BTreeMap::new());
        for (path, value) in &self.counters {
            root.insert(path, *value);
        }
        root.serialize(serializer)
    }
}
