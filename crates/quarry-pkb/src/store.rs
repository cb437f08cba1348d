//! Generic bidirectional index underlying every relation store.

use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// OneToManyStore
// ============================================================================

/// A pair store indexed in both directions.
///
/// Every `(key, value)` association is kept in a forward map and a reverse
/// map, so `Rel(x, ?)` and `Rel(?, y)` lookups are both one map probe instead
/// of a scan. Ordered maps keep iteration deterministic, which the evaluator
/// relies on for stable result ordering.
#[derive(Debug, Clone)]
pub struct OneToManyStore<K, V> {
    /// key -> the set of values it maps to
    forward: BTreeMap<K, BTreeSet<V>>,
    /// value -> the set of keys mapping to it
    reverse: BTreeMap<V, BTreeSet<K>>,
    /// Number of distinct pairs.
    pairs: usize,
}

impl<K, V> Default for OneToManyStore<K, V> {
    fn default() -> Self {
        Self {
            forward: BTreeMap::new(),
            reverse: BTreeMap::new(),
            pairs: 0,
        }
    }
}

impl<K: Copy + Ord, V: Copy + Ord> OneToManyStore<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an association. Returns `false` if the pair was already present.
    pub fn add(&mut self, key: K, value: V) -> bool {
        let inserted = self.forward.entry(key).or_default().insert(value);
        if inserted {
            self.reverse.entry(value).or_default().insert(key);
            self.pairs += 1;
        }
        inserted
    }

    pub fn contains(&self, key: K, value: V) -> bool {
        self.forward
            .get(&key)
            .is_some_and(|values| values.contains(&value))
    }

    pub fn contains_key(&self, key: K) -> bool {
        self.forward.contains_key(&key)
    }

    pub fn contains_value(&self, value: V) -> bool {
        self.reverse.contains_key(&value)
    }

    /// Values associated with `key`; empty iterator if the key is unknown.
    pub fn values_of(&self, key: K) -> impl Iterator<Item = V> + '_ {
        self.forward.get(&key).into_iter().flatten().copied()
    }

    /// Keys associated with `value`; empty iterator if the value is unknown.
    pub fn keys_of(&self, value: V) -> impl Iterator<Item = K> + '_ {
        self.reverse.get(&value).into_iter().flatten().copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.forward.keys().copied()
    }

    pub fn values(&self) -> impl Iterator<Item = V> + '_ {
        self.reverse.keys().copied()
    }

    pub fn pairs(&self) -> impl Iterator<Item = (K, V)> + '_ {
        self.forward
            .iter()
            .flat_map(|(&k, values)| values.iter().map(move |&v| (k, v)))
    }

    /// Number of distinct pairs.
    pub fn len(&self) -> usize {
        self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs == 0
    }
}

// ============================================================================
// StarredRelation
// ============================================================================

/// A homogeneous relation together with its transitive closure.
///
/// The closure is materialized once during population; afterwards `R*(a, b)`
/// is the same one-probe lookup as `R(a, b)`.
#[derive(Debug, Clone)]
pub struct StarredRelation<T> {
    base: OneToManyStore<T, T>,
    star: OneToManyStore<T, T>,
}

impl<T> Default for StarredRelation<T> {
    fn default() -> Self {
        Self {
            base: OneToManyStore::default(),
            star: OneToManyStore::default(),
        }
    }
}

impl<T: Copy + Ord> StarredRelation<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, from: T, to: T) -> bool {
        self.base.add(from, to)
    }

    /// Insert a closure pair directly, for relations whose closure is
    /// computed externally (cyclic graphs the ordered closure cannot handle).
    pub fn add_star(&mut self, from: T, to: T) -> bool {
        self.star.add(from, to)
    }

    pub fn base(&self) -> &OneToManyStore<T, T> {
        &self.base
    }

    pub fn star(&self) -> &OneToManyStore<T, T> {
        &self.star
    }

    pub fn has(&self, from: T, to: T) -> bool {
        self.base.contains(from, to)
    }

    pub fn has_star(&self, from: T, to: T) -> bool {
        self.star.contains(from, to)
    }

    /// Close the base relation into `star`, visiting keys in `order`.
    ///
    /// `order` must list every key after all of its base successors, so each
    /// successor's closure set is complete when it is folded in. One pass
    /// then suffices: `star(k) = U { {s} U star(s) : s in base(k) }`.
    pub fn close_transitive_in(&mut self, order: impl IntoIterator<Item = T>) {
        for key in order {
            let mut reach = BTreeSet::new();
            for succ in self.base.values_of(key) {
                reach.insert(succ);
                reach.extend(self.star.values_of(succ));
            }
            for target in reach {
                self.star.add(key, target);
            }
        }
    }

    /// Closure order for relations whose pairs always point numerically
    /// forward (Follows, Parent): descending keys visit successors first.
    pub fn close_transitive_desc(&mut self) {
        let mut keys: Vec<T> = self.base.keys().collect();
        keys.sort_unstable_by(|a, b| b.cmp(a));
        self.close_transitive_in(keys);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_directions_are_indexed() {
        let mut store = OneToManyStore::new();
        assert!(store.add(1u32, 10u32));
        assert!(store.add(1, 11));
        assert!(!store.add(1, 10));
        assert!(store.add(2, 10));

        assert_eq!(store.len(), 3);
        assert!(store.contains(1, 10));
        assert!(!store.contains(2, 11));
        assert_eq!(store.values_of(1).collect::<Vec<_>>(), vec![10, 11]);
        assert_eq!(store.keys_of(10).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(store.values_of(99).count(), 0);
        assert_eq!(
            store.pairs().collect::<Vec<_>>(),
            vec![(1, 10), (1, 11), (2, 10)]
        );
    }

    #[test]
    fn descending_closure_handles_chains_and_branches() {
        // 1 -> 2 -> 3 -> 5, 2 -> 4
        let mut rel = StarredRelation::new();
        rel.add(1u32, 2u32);
        rel.add(2, 3);
        rel.add(2, 4);
        rel.add(3, 5);
        rel.close_transitive_desc();

        assert!(rel.has_star(1, 5));
        assert!(rel.has_star(1, 4));
        assert!(rel.has_star(2, 5));
        assert!(!rel.has_star(3, 4));
        assert!(!rel.has_star(5, 1));
        assert_eq!(rel.star().values_of(1).collect::<Vec<_>>(), vec![2, 3, 4, 5]);
    }

    #[test]
    fn explicit_order_closure_matches_call_graph_shape() {
        // main -> helper -> leaf, with callees listed before callers.
        let mut rel = StarredRelation::new();
        rel.add(10u32, 20u32);
        rel.add(20, 30);
        rel.close_transitive_in([30, 20, 10]);

        assert!(rel.has_star(10, 30));
        assert!(rel.has_star(20, 30));
        assert!(!rel.has_star(30, 10));
    }
}
