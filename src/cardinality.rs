use std::collections::HashMap;
use std::fmt::Debug;

use crate::key::Key;

/// Maps the records returned by a batch function back onto the keys that were requested.
///
/// `demultiplex` receives the distinct keys of one batch function call and every record that
/// call produced. It returns exactly one value per key, in key order, regardless of the order
/// or completeness of `records`.
pub trait Cardinality<K, R> {
    type Value: 'static + Send + Debug + Clone;

    fn demultiplex(keys: &[K], records: Vec<R>, key_of: fn(&R) -> K) -> Vec<(K, Self::Value)>;
}

/// At most one record per key. Keys without a record resolve to `None`.
#[derive(Debug)]
pub struct One;

/// Any number of records per key. Keys without records resolve to an empty `Vec`.
#[derive(Debug)]
pub struct Many;

impl<K, R> Cardinality<K, R> for One
where
    K: Key,
    R: 'static + Send + Debug + Clone,
{
    type Value = Option<R>;

    fn demultiplex(keys: &[K], records: Vec<R>, key_of: fn(&R) -> K) -> Vec<(K, Option<R>)> {
        let by_key = records.into_iter().map(|r| (key_of(&r), r)).collect::<HashMap<_, _>>();
        keys.iter().map(|k| (k.clone(), by_key.get(k).cloned())).collect()
    }
}

impl<K, R> Cardinality<K, R> for Many
where
    K: Key,
    R: 'static + Send + Debug + Clone,
{
    type Value = Vec<R>;

    fn demultiplex(keys: &[K], records: Vec<R>, key_of: fn(&R) -> K) -> Vec<(K, Vec<R>)> {
        // Every requested key owns a group up front so that unmatched keys stay empty.
        let mut groups = keys.iter().map(|k| (k, Vec::new())).collect::<HashMap<&K, Vec<R>>>();
        for record in records {
            let key = key_of(&record);
            match groups.get_mut(&key) {
                Some(group) => group.push(record),
                None => tracing::trace!(?key, "dropping record for unrequested key"),
            }
        }
        keys.iter().map(|k| (k.clone(), groups.remove(k).unwrap_or_default())).collect()
    }
}
