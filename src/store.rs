// Persistent key-value port for GamblingDen Core
//
// The engine only ever talks to a `KeyValueStore`. Backends: in-memory
// (tests, native hosts), Automerge snapshot (`chronicle`), and the browser's
// localStorage (`web_storage`, wasm32 only).

use std::collections::HashMap;

use crate::types::Result;

/// Pending writes applied together at the end of an engine operation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<(String, Option<String>)>,
}

impl WriteBatch {
    pub fn new() -> WriteBatch {
        WriteBatch::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.writes.push((key.to_string(), Some(value.into())));
    }

    pub fn remove(&mut self, key: &str) {
        self.writes.push((key.to_string(), None));
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Writes in insertion order; `None` deletes the key
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.writes.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }
}

/// String-keyed, string-valued durable storage
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    fn remove(&mut self, key: &str) -> Result<()>;

    /// Apply a batch as one scoped transaction
    ///
    /// The default applies writes one by one and stops at the first failure.
    /// Backends with real transactions override this to commit atomically.
    fn commit(&mut self, batch: &WriteBatch) -> Result<()> {
        for (key, value) in batch.iter() {
            match value {
                Some(v) => self.set(key, v)?,
                None => self.remove(key)?,
            }
        }
        Ok(())
    }
}

/// HashMap-backed store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Pre-populated store, handy for rehydration tests
    pub fn with_entries<I, K, V>(entries: I) -> MemoryStore
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        MemoryStore {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        (**self).remove(key)
    }

    fn commit(&mut self, batch: &WriteBatch) -> Result<()> {
        (**self).commit(batch)
    }
}

/// Prefixes every key with an application namespace (e.g. `gd_balance`)
pub struct ScopedStore<S> {
    inner: S,
    prefix: String,
}

impl<S: KeyValueStore> ScopedStore<S> {
    pub fn new(inner: S, prefix: &str) -> ScopedStore<S> {
        ScopedStore {
            inner,
            prefix: prefix.to_string(),
        }
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: KeyValueStore> KeyValueStore for ScopedStore<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(&self.scoped(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let key = self.scoped(key);
        self.inner.set(&key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let key = self.scoped(key);
        self.inner.remove(&key)
    }

    fn commit(&mut self, batch: &WriteBatch) -> Result<()> {
        let mut scoped = WriteBatch::new();
        for (key, value) in batch.iter() {
            match value {
                Some(v) => scoped.set(&self.scoped(key), v),
                None => scoped.remove(&self.scoped(key)),
            }
        }
        self.inner.commit(&scoped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EconomyError;

    /// Store that fails every write after `budget` successful ones
    struct QuotaStore {
        inner: MemoryStore,
        budget: usize,
    }

    impl KeyValueStore for QuotaStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<()> {
            if self.budget == 0 {
                return Err(EconomyError::Storage("quota exceeded".to_string()));
            }
            self.budget -= 1;
            self.inner.set(key, value)
        }

        fn remove(&mut self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get("balance").unwrap(), None);

        store.set("balance", "90.00").unwrap();
        assert_eq!(store.get("balance").unwrap().as_deref(), Some("90.00"));

        store.remove("balance").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_scoped_store_prefixes_keys() {
        let mut store = ScopedStore::new(MemoryStore::new(), "gd_");
        store.set("xp", "120").unwrap();

        assert_eq!(store.inner().get("gd_xp").unwrap().as_deref(), Some("120"));
        assert_eq!(store.get("xp").unwrap().as_deref(), Some("120"));
        assert_eq!(store.inner().get("xp").unwrap(), None);
    }

    #[test]
    fn test_scoped_commit_applies_batch() {
        let mut store = ScopedStore::new(MemoryStore::with_entries([("gd_level", "3")]), "gd_");

        let mut batch = WriteBatch::new();
        batch.set("balance", "42.00");
        batch.set("xp", "10");
        batch.remove("level");
        assert_eq!(batch.len(), 3);

        store.commit(&batch).unwrap();

        let inner = store.into_inner();
        assert_eq!(inner.get("gd_balance").unwrap().as_deref(), Some("42.00"));
        assert_eq!(inner.get("gd_xp").unwrap().as_deref(), Some("10"));
        assert_eq!(inner.get("gd_level").unwrap(), None);
    }

    #[test]
    fn test_default_commit_stops_at_first_failure() {
        let mut store = QuotaStore {
            inner: MemoryStore::new(),
            budget: 1,
        };

        let mut batch = WriteBatch::new();
        batch.set("a", "1");
        batch.set("b", "2");

        assert!(store.commit(&batch).is_err());
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("b").unwrap(), None);
    }
}
