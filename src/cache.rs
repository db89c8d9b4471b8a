use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

/// Request-scoped memo of resolved values.
///
/// A cache lives exactly as long as the worker of the loader that owns it, so there is no
/// eviction and no expiry: entries leave only through [`Cache::remove`] or [`Cache::flush`].
/// Only successfully fetched values are ever inserted.
pub trait Cache {
    type K;
    type V;

    /// Returns the cached values for `keys`, in key order.
    fn get(&self, keys: &[Self::K]) -> Vec<Option<&Self::V>>;

    fn contains(&self, key: &Self::K) -> bool;

    fn insert(&mut self, key: Self::K, value: Self::V);
    fn insert_many<I: IntoIterator<Item = (Self::K, Self::V)>>(&mut self, key_vals: I);

    fn remove(&mut self, keys: &[Self::K]);
    fn flush(&mut self);
}

impl<K, V, S: BuildHasher> Cache for HashMap<K, V, S>
where
    K: Eq + Hash,
{
    type K = K;
    type V = V;

    fn get(&self, keys: &[K]) -> Vec<Option<&V>> {
        keys.iter().map(|k| HashMap::get(self, k)).collect()
    }

    fn contains(&self, key: &K) -> bool {
        self.contains_key(key)
    }

    fn insert(&mut self, key: K, value: V) {
        HashMap::insert(self, key, value);
    }

    fn insert_many<I: IntoIterator<Item = (K, V)>>(&mut self, key_vals: I) {
        self.extend(key_vals);
    }

    fn remove(&mut self, keys: &[K]) {
        for key in keys {
            HashMap::remove(self, key);
        }
    }

    fn flush(&mut self) {
        self.clear();
    }
}
