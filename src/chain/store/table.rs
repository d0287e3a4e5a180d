// Copyright (c) 2024 The Ambercoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::chain::store::{IndexSet, ObjectId, Row, StoreErr};
use std::collections::{BTreeMap, HashMap, HashSet};

/// One typed table: an arena of rows keyed by monotonic id, a bundle of
/// secondary indexes storing ids, and a stack of undo layers that nested
/// sessions push and pop.
pub struct Table<T: Row, I: IndexSet<T>> {
    rows: BTreeMap<ObjectId, T>,
    next_id: ObjectId,
    pub indexes: I,
    undo: Vec<UndoLayer<T>>,
}

/// Per-session change journal. Stores the information needed to restore
/// the table to its state at the time the layer was pushed: the first
/// pre-image of every modified row, removed rows, and the ids created
/// under the layer.
struct UndoLayer<T> {
    created: HashSet<ObjectId>,
    modified: HashMap<ObjectId, T>,
    removed: HashMap<ObjectId, T>,
}

impl<T> UndoLayer<T> {
    fn new() -> Self {
        Self {
            created: HashSet::new(),
            modified: HashMap::new(),
            removed: HashMap::new(),
        }
    }
}

impl<T: Row, I: IndexSet<T>> Default for Table<T, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Row, I: IndexSet<T>> Table<T, I> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 0,
            indexes: I::default(),
            undo: Vec::new(),
        }
    }

    /// Allocate the next id and insert the row built by `f`. The
    /// constructor receives the assigned id and must store it in the row.
    pub fn create(&mut self, f: impl FnOnce(ObjectId) -> T) -> Result<&T, StoreErr> {
        let id = self.next_id;
        let row = f(id);
        debug_assert_eq!(row.id(), id, "constructor must assign the given id");

        self.indexes.insert(&row)?;
        self.rows.insert(id, row);
        self.next_id += 1;

        if let Some(layer) = self.undo.last_mut() {
            layer.created.insert(id);
        }

        Ok(self.rows.get(&id).unwrap())
    }

    /// Copy-mutate-replace. Re-keys every index; a duplicate produced by
    /// the mutation restores the previous row and fails.
    pub fn modify(&mut self, id: ObjectId, f: impl FnOnce(&mut T)) -> Result<(), StoreErr> {
        let old = self
            .rows
            .get(&id)
            .cloned()
            .ok_or(StoreErr::NotFound(T::TABLE))?;

        let mut new = old.clone();
        f(&mut new);
        assert_eq!(new.id(), id, "{}: mutator changed the row id", T::TABLE);

        self.indexes.remove(&old);
        if let Err(err) = self.indexes.insert(&new) {
            // Restoring the old entries cannot fail: they were present a
            // moment ago and nothing else changed.
            self.indexes
                .insert(&old)
                .expect("restoring prior index entries");
            return Err(err);
        }
        self.rows.insert(id, new);

        if let Some(layer) = self.undo.last_mut() {
            if !layer.created.contains(&id) && !layer.modified.contains_key(&id) {
                layer.modified.insert(id, old);
            }
        }

        Ok(())
    }

    pub fn remove(&mut self, id: ObjectId) -> Result<T, StoreErr> {
        let row = self.rows.remove(&id).ok_or(StoreErr::NotFound(T::TABLE))?;
        self.indexes.remove(&row);

        if let Some(layer) = self.undo.last_mut() {
            if layer.created.remove(&id) {
                // Created and removed under the same layer: no trace
            } else {
                let pre_image = layer.modified.remove(&id).unwrap_or_else(|| row.clone());
                layer.removed.insert(id, pre_image);
            }
        }

        Ok(row)
    }

    #[must_use]
    pub fn find(&self, id: ObjectId) -> Option<&T> {
        self.rows.get(&id)
    }

    pub fn get(&self, id: ObjectId) -> Result<&T, StoreErr> {
        self.rows.get(&id).ok_or(StoreErr::NotFound(T::TABLE))
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn next_id(&self) -> ObjectId {
        self.next_id
    }

    // --- undo sessions -------------------------------------------------

    pub fn push_layer(&mut self) {
        self.undo.push(UndoLayer::new());
    }

    #[must_use]
    pub fn layer_depth(&self) -> usize {
        self.undo.len()
    }

    /// Roll back everything performed under the top layer, in reverse:
    /// creations are deleted, modifications restored to their first
    /// pre-image, removals reinserted. `next_id` is deliberately NOT
    /// rewound; ids are never reused within a process lifetime.
    pub fn undo_layer(&mut self) {
        let layer = self
            .undo
            .pop()
            .unwrap_or_else(|| panic!("{}: undo stack imbalance", T::TABLE));

        for id in layer.created {
            let row = self
                .rows
                .remove(&id)
                .unwrap_or_else(|| panic!("{}: created row vanished", T::TABLE));
            self.indexes.remove(&row);
        }

        for (id, old) in layer.modified {
            let current = self
                .rows
                .get(&id)
                .unwrap_or_else(|| panic!("{}: modified row vanished", T::TABLE))
                .clone();
            self.indexes.remove(&current);
            self.indexes
                .insert(&old)
                .expect("restoring pre-image index entries");
            self.rows.insert(id, old);
        }

        for (id, old) in layer.removed {
            self.indexes
                .insert(&old)
                .expect("reinserting removed row index entries");
            self.rows.insert(id, old);
        }
    }

    /// Merge the top layer into its parent, keeping the parent able to
    /// restore the state from before BOTH layers.
    pub fn squash_layer(&mut self) {
        let top = self
            .undo
            .pop()
            .unwrap_or_else(|| panic!("{}: squash with empty undo stack", T::TABLE));
        let parent = self
            .undo
            .last_mut()
            .unwrap_or_else(|| panic!("{}: squash without parent layer", T::TABLE));

        for id in top.created {
            parent.created.insert(id);
        }

        for (id, old) in top.modified {
            if !parent.created.contains(&id) && !parent.modified.contains_key(&id) {
                parent.modified.insert(id, old);
            }
        }

        for (id, old) in top.removed {
            if parent.created.remove(&id) {
                // Created under the parent, removed under the top: net
                // nothing to restore
            } else if let Some(first) = parent.modified.remove(&id) {
                parent.removed.insert(id, first);
            } else {
                parent.removed.insert(id, old);
            }
        }
    }

    /// Make the oldest layer permanent (its changes can no longer be
    /// undone).
    pub fn commit_layer(&mut self) {
        if self.undo.is_empty() {
            panic!("{}: commit with empty undo stack", T::TABLE);
        }
        self.undo.remove(0);
    }

    // --- snapshot ------------------------------------------------------

    /// Serializable table content. Indexes are rebuilt on load rather
    /// than persisted.
    pub fn snapshot(&self) -> (ObjectId, Vec<T>) {
        (self.next_id, self.rows.values().cloned().collect())
    }

    /// Replace contents from a snapshot. Any index violation means the
    /// snapshot is inconsistent with itself, which is corruption.
    pub fn restore(&mut self, next_id: ObjectId, rows: Vec<T>) -> Result<(), StoreErr> {
        assert!(
            self.undo.is_empty(),
            "{}: restore with open undo sessions",
            T::TABLE
        );
        self.rows.clear();
        self.indexes = I::default();
        self.next_id = next_id;

        for row in rows {
            if row.id() >= next_id {
                return Err(StoreErr::Corruption("row id beyond next_id"));
            }
            self.indexes
                .insert(&row)
                .map_err(|_| StoreErr::Corruption("snapshot index conflict"))?;
            if self.rows.insert(row.id(), row).is_some() {
                return Err(StoreErr::Corruption("duplicate row id in snapshot"));
            }
        }

        Ok(())
    }

    /// Feed every row, in id order, into a state digest.
    pub fn digest_into(&self, hasher: &mut blake3::Hasher) -> Result<(), StoreErr> {
        hasher.update(T::TABLE.as_bytes());
        hasher.update(&self.next_id.to_le_bytes());
        for row in self.rows.values() {
            hasher.update(&crate::codec::encode_to_vec(row)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bincode::{Decode, Encode};
    use std::collections::BTreeMap;

    #[derive(Clone, Debug, PartialEq, Encode, Decode)]
    struct Item {
        id: ObjectId,
        name: String,
        score: i64,
    }

    impl Row for Item {
        const TABLE: &'static str = "item";

        fn id(&self) -> ObjectId {
            self.id
        }
    }

    #[derive(Default)]
    struct ItemIndexes {
        by_name: BTreeMap<String, ObjectId>,
        by_score: BTreeMap<(i64, ObjectId), ObjectId>,
    }

    impl IndexSet<Item> for ItemIndexes {
        fn insert(&mut self, row: &Item) -> Result<(), StoreErr> {
            if self.by_name.contains_key(&row.name) {
                return Err(StoreErr::DuplicateKey("item.by_name"));
            }
            self.by_name.insert(row.name.clone(), row.id);
            self.by_score.insert((row.score, row.id), row.id);
            Ok(())
        }

        fn remove(&mut self, row: &Item) {
            self.by_name.remove(&row.name);
            self.by_score.remove(&(row.score, row.id));
        }
    }

    type ItemTable = Table<Item, ItemIndexes>;

    fn item(id: ObjectId, name: &str, score: i64) -> Item {
        Item {
            id,
            name: name.to_string(),
            score,
        }
    }

    #[test]
    fn create_assigns_monotonic_ids() {
        let mut table = ItemTable::new();
        let a = table.create(|id| item(id, "a", 1)).unwrap().id;
        let b = table.create(|id| item(id, "b", 2)).unwrap().id;
        assert_eq!((a, b), (0, 1));
    }

    #[test]
    fn unique_violation_leaves_no_trace() {
        let mut table = ItemTable::new();
        table.create(|id| item(id, "a", 1)).unwrap();
        let before_next = table.next_id();

        let err = table.create(|id| item(id, "a", 9)).unwrap_err();
        assert_eq!(err, StoreErr::DuplicateKey("item.by_name"));
        assert_eq!(table.len(), 1);
        assert_eq!(table.next_id(), before_next);
        assert_eq!(table.indexes.by_score.len(), 1);
    }

    #[test]
    fn modify_rekeys_indexes_atomically() {
        let mut table = ItemTable::new();
        table.create(|id| item(id, "a", 1)).unwrap();
        table.create(|id| item(id, "b", 2)).unwrap();

        // Renaming b to a must fail and leave b intact
        let err = table.modify(1, |row| row.name = "a".to_string()).unwrap_err();
        assert_eq!(err, StoreErr::DuplicateKey("item.by_name"));
        assert_eq!(table.get(1).unwrap().name, "b");
        assert_eq!(table.indexes.by_name.get("b"), Some(&1));

        table.modify(1, |row| row.score = 50).unwrap();
        assert!(table.indexes.by_score.contains_key(&(50, 1)));
        assert!(!table.indexes.by_score.contains_key(&(2, 1)));
    }

    #[test]
    fn undo_restores_all_change_kinds() {
        let mut table = ItemTable::new();
        table.create(|id| item(id, "keep", 1)).unwrap();
        table.create(|id| item(id, "gone", 2)).unwrap();

        table.push_layer();
        table.create(|id| item(id, "new", 3)).unwrap();
        table.modify(0, |row| row.score = 100).unwrap();
        table.remove(1).unwrap();
        table.undo_layer();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0).unwrap().score, 1);
        assert_eq!(table.get(1).unwrap().name, "gone");
        assert!(table.find(2).is_none());
        assert!(table.indexes.by_name.contains_key("gone"));
        assert!(!table.indexes.by_name.contains_key("new"));
        assert!(table.indexes.by_score.contains_key(&(1, 0)));

        // Ids are not reused after undo
        let next = table.create(|id| item(id, "next", 4)).unwrap().id;
        assert_eq!(next, 3);
    }

    #[test]
    fn nested_sessions_squash_and_undo() {
        let mut table = ItemTable::new();
        table.create(|id| item(id, "base", 1)).unwrap();

        table.push_layer(); // outer
        table.modify(0, |row| row.score = 2).unwrap();

        table.push_layer(); // inner
        table.modify(0, |row| row.score = 3).unwrap();
        table.create(|id| item(id, "inner", 9)).unwrap();
        table.squash_layer();

        // Undoing the outer layer restores the pre-outer state
        table.undo_layer();
        assert_eq!(table.get(0).unwrap().score, 1);
        assert!(table.find(1).is_none());
    }

    #[test]
    fn create_then_remove_in_layer_leaves_no_trace() {
        let mut table = ItemTable::new();
        table.push_layer();
        let id = table.create(|id| item(id, "temp", 1)).unwrap().id;
        table.remove(id).unwrap();
        table.undo_layer();
        assert!(table.is_empty());
        assert!(table.indexes.by_name.is_empty());
    }

    #[test]
    fn commit_makes_bottom_layer_permanent() {
        let mut table = ItemTable::new();
        table.push_layer();
        table.create(|id| item(id, "a", 1)).unwrap();
        table.push_layer();
        table.create(|id| item(id, "b", 2)).unwrap();
        table.squash_layer();
        table.commit_layer();
        assert_eq!(table.layer_depth(), 0);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn snapshot_restore_roundtrip() {
        let mut table = ItemTable::new();
        table.create(|id| item(id, "a", 1)).unwrap();
        table.create(|id| item(id, "b", 2)).unwrap();
        table.remove(0).unwrap();

        let (next_id, rows) = table.snapshot();
        let mut restored = ItemTable::new();
        restored.restore(next_id, rows).unwrap();

        assert_eq!(restored.next_id(), 2);
        assert_eq!(restored.len(), 1);
        assert_eq!(restored.indexes.by_name.get("b"), Some(&1));
    }

    #[test]
    #[should_panic(expected = "undo stack imbalance")]
    fn unbalanced_undo_panics() {
        let mut table = ItemTable::new();
        table.undo_layer();
    }
}
