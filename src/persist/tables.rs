//! In-memory tables shared by the persist layer implementations.

use crate::error::{Result, StoreError};
use crate::types::{
    Aggregate, AggregateId, Category, Resource, Settings, SettingsChanges, Timestamp, Word,
};
use std::collections::BTreeMap;

/// One identifier-keyed collection plus its id counter.
#[derive(Clone, Debug)]
pub struct Table<A: Aggregate> {
    items: BTreeMap<A::Id, A>,
    next_id: u64,
}

impl<A: Aggregate> Default for Table<A> {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<A: Aggregate> Table<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next identifier without consuming it.
    pub fn peek_id(&self) -> A::Id {
        A::Id::from_raw(self.next_id)
    }

    /// Assign an id and timestamps to a draft and insert it.
    pub fn insert_draft(&mut self, draft: A::Draft, now: Timestamp) -> A {
        let id = A::Id::from_raw(self.next_id);
        self.next_id += 1;
        let item = A::from_draft(id, draft, now);
        self.items.insert(id, item.clone());
        item
    }

    /// Compute the updated item without storing it.
    pub fn updated(&self, id: A::Id, changes: &A::Changes, now: Timestamp) -> Result<A> {
        let mut item = self
            .items
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(A::KIND, id))?;
        item.apply(changes);
        item.touch(now);
        Ok(item)
    }

    /// Insert or replace a full item. Keeps the id counter ahead of it.
    pub fn put(&mut self, item: A) {
        let raw = item.id().raw();
        if raw >= self.next_id {
            self.next_id = raw + 1;
        }
        self.items.insert(item.id(), item);
    }

    pub fn remove(&mut self, id: A::Id) -> Option<A> {
        self.items.remove(&id)
    }

    pub fn get(&self, id: A::Id) -> Option<&A> {
        self.items.get(&id)
    }

    pub fn contains(&self, id: A::Id) -> bool {
        self.items.contains_key(&id)
    }

    /// All items ordered by id.
    pub fn all(&self) -> Vec<A> {
        self.items.values().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &A> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Every collection of a store.
#[derive(Clone, Debug, Default)]
pub struct Tables {
    pub words: Table<Word>,
    pub categories: Table<Category>,
    pub resources: Table<Resource>,
    pub settings: Option<Settings>,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings with `changes` applied, materializing defaults first if
    /// the singleton does not exist yet.
    pub fn updated_settings(&self, changes: &SettingsChanges, now: Timestamp) -> Settings {
        let mut settings = self
            .settings
            .clone()
            .unwrap_or_else(|| Settings::defaults(now));
        settings.apply(changes);
        settings.touch(now);
        settings
    }
}

/// Typed access to the table holding `A`.
pub trait TableAccess<A: Aggregate> {
    fn table(&self) -> &Table<A>;
    fn table_mut(&mut self) -> &mut Table<A>;
}

macro_rules! table_access {
    ($ty:ty, $field:ident) => {
        impl TableAccess<$ty> for Tables {
            fn table(&self) -> &Table<$ty> {
                &self.$field
            }

            fn table_mut(&mut self) -> &mut Table<$ty> {
                &mut self.$field
            }
        }
    };
}

table_access!(Word, words);
table_access!(Category, categories);
table_access!(Resource, resources);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NewWord, WordChanges, WordId, WordType};

    #[test]
    fn test_ids_are_sequential_and_not_reused() {
        let mut table = Table::<Word>::new();
        let a = table.insert_draft(NewWord::new("go", WordType::Verb), Timestamp(1));
        let b = table.insert_draft(NewWord::new("stop", WordType::Verb), Timestamp(1));
        assert_eq!(a.id, WordId(1));
        assert_eq!(b.id, WordId(2));

        table.remove(b.id);
        let c = table.insert_draft(NewWord::new("more", WordType::Adverb), Timestamp(1));
        assert_eq!(c.id, WordId(3));
    }

    #[test]
    fn test_put_advances_counter() {
        let mut table = Table::<Word>::new();
        let mut word = Word::from_draft(WordId(40), NewWord::new("hi", WordType::Social), Timestamp(1));
        word.order = 2;
        table.put(word);

        assert_eq!(table.peek_id(), WordId(41));
    }

    #[test]
    fn test_updated_missing_is_not_found() {
        let table = Table::<Word>::new();
        let result = table.updated(WordId(9), &WordChanges::text("x"), Timestamp(2));
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn test_updated_settings_materializes_defaults() {
        let tables = Tables::new();
        let settings = tables.updated_settings(&SettingsChanges::default(), Timestamp(3));
        assert_eq!(settings, Settings::defaults(Timestamp(3)));
    }
}
