use std::slice;

use tokio::sync::oneshot;

use crate::error::{LoadError, LoadResult};

/// Set of possible requests that can be sent to the [`LoaderWorker`](crate::loader_worker::LoaderWorker)
///
/// The three categories of commands are Load, Prime, and Clear; each of which has a single and
/// many variant for convenience.
#[derive(Debug)]
pub enum LoaderOp<K, V> {
    /// Fetch data from the resource wrapped by this data loader (or the cache).
    Load(LoadRequest<K, V>),
    /// Add values to the cache that were fetched from elsewhere.
    Prime(K, V),
    PrimeMany(Vec<(K, V)>),
    /// Remove values from the cache so that they will be reloaded when they are next requested.
    Clear(K),
    ClearMany(Vec<K>),
    /// Empty the whole cache.
    ClearAll,
}

/// A caller waiting on one or more keys. Answered exactly once, either with one value per key
/// or with the error of the batch it was part of.
#[derive(Debug)]
pub enum LoadRequest<K, V> {
    One(K, oneshot::Sender<LoadResult<V>>),
    Many(Vec<K>, oneshot::Sender<LoadResult<Vec<V>>>),
}

impl<K, V> LoadRequest<K, V>
where
    K: std::fmt::Debug,
    V: Send + Clone + std::fmt::Debug,
{
    pub fn keys(&self) -> &[K] {
        match self {
            LoadRequest::One(ref key, _) => slice::from_ref(key),
            LoadRequest::Many(ref keys, _) => keys,
        }
    }

    /// Answers the request with values given in the order of [`LoadRequest::keys`].
    ///
    /// The worker only answers once every key has a value, so `values` holds exactly one entry
    /// per key.
    pub fn send_response(self, values: Vec<&V>) {
        debug_assert_eq!(values.len(), self.keys().len(), "one value per requested key");
        match self {
            LoadRequest::One(key, response_tx) => match values.first() {
                Some(value) => {
                    if response_tx.send(Ok((*value).clone())).is_err() {
                        tracing::error!("receiver dropped");
                    }
                }
                // Dropping the sender surfaces to the caller as a closed channel.
                None => tracing::error!(?key, "no value to answer load with"),
            },
            LoadRequest::Many(_, response_tx) => {
                let response = values.into_iter().cloned().collect::<Vec<_>>();
                if response_tx.send(Ok(response)).is_err() {
                    tracing::error!("receiver dropped");
                }
            }
        }
    }

    pub fn send_error(self, error: LoadError) {
        let sent = match self {
            LoadRequest::One(_, response_tx) => response_tx.send(Err(error)).is_ok(),
            LoadRequest::Many(_, response_tx) => response_tx.send(Err(error)).is_ok(),
        };
        if !sent {
            tracing::error!("receiver dropped");
        }
    }
}
