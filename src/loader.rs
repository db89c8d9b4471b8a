use std::collections::HashMap;
use std::fmt::Debug;
use std::ops::Drop;

use tokio::sync::{mpsc, oneshot};
use tracing::{span, Level};
use tracing_futures::Instrument;

use crate::{
    batch_function::BatchFunction,
    cardinality::Cardinality,
    config::LoaderConfig,
    error::{LoadError, LoadResult},
    key::Key,
    loader_op::{LoadRequest, LoaderOp},
    loader_worker::LoaderWorker,
};

/// Batch loads values from some expensive resource, primarily intended for mitigating GraphQL's
/// N+1 problem.
///
/// Users can call [`Loader::load`] and [`Loader::load_many`] to fetch values from the underlying resource or
/// cache. The cache can be cleared with calls to [`Loader::clear`], [`Loader::clear_many`] and
/// [`Loader::clear_all`], and values can be
/// added to the cache out-of-band through the use of [`Loader::prime`] and [`Loader::prime_many`].
///
/// The `Loader` struct acts as an intermediary between the async domain in which `load` calls are
/// invoked and the pseudo-single-threaded domain of the `LoaderWorker`. Callers can invoke the
/// `Loader` from multiple parallel tasks, and the loader will enqueue the requested operations on
/// the request queue for processing by its `LoaderWorker`. The worker processes the requests
/// sequentially and provides results via response oneshot channels back to the Loader.
///
/// A loader is meant to live for one request. Each loader owns its own cache, so two loaders
/// never observe each other's values, even when built from the same batch function and context.
pub struct Loader<K, V>
where
    K: Key,
    V: 'static + Send + Debug + Clone,
{
    request_tx: mpsc::UnboundedSender<LoaderOp<K, V>>,
    load_task_handle: tokio::task::JoinHandle<()>,
}

impl<K, V> Drop for Loader<K, V>
where
    K: Key,
    V: 'static + Send + Debug + Clone,
{
    fn drop(&mut self) {
        self.load_task_handle.abort();
    }
}

impl<K, V> Loader<K, V>
where
    K: Key,
    V: 'static + Send + Debug + Clone,
{
    /// Creates a new Loader for the provided BatchFunction and Context type.
    ///
    /// Note: the batch function is passed in as a marker for type inference. Must be called from
    /// within a tokio runtime, which hosts the loader's worker task.
    pub fn new<F, ContextT>(batch_fn: F, context: ContextT) -> Self
    where
        ContextT: Send + Sync + 'static,
        F: 'static + BatchFunction<K, Context = ContextT> + Send,
        F::Cardinality: Cardinality<K, F::Record, Value = V>,
    {
        Self::with_config(batch_fn, context, LoaderConfig::default())
    }

    /// Creates a new Loader whose batches follow `config`.
    pub fn with_config<F, ContextT>(_: F, context: ContextT, config: LoaderConfig) -> Self
    where
        ContextT: Send + Sync + 'static,
        F: 'static + BatchFunction<K, Context = ContextT> + Send,
        F::Cardinality: Cardinality<K, F::Record, Value = V>,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let span = span!(Level::TRACE, "LoaderWorker", batch_fn = std::any::type_name::<F>());
        let worker =
            LoaderWorker::<K, V, F, HashMap<K, V>, ContextT>::new(HashMap::new(), rx, context, config);
        Self { request_tx: tx, load_task_handle: tokio::task::spawn(worker.start().instrument(span)) }
    }

    /// Loads a value from the underlying resource.
    ///
    /// Keys the batch function has no record for resolve to the cardinality's empty value
    /// (`None` or an empty `Vec`), not to an error.
    ///
    /// If the value is already in the loader cache, it is returned as soon as it is processed.
    /// Otherwise, the requested key is enqueued for batch loading in the next loader execution
    /// frame.
    pub async fn load(&self, key: K) -> LoadResult<V> {
        if !key.is_valid() {
            return Err(LoadError::invalid_key(&key));
        }
        let (response_tx, response_rx) = oneshot::channel();
        self.send(LoaderOp::Load(LoadRequest::One(key, response_tx)))?;
        response_rx.await.map_err(|_| LoadError::WorkerClosed)?
    }

    /// Loads many values at once.
    ///
    /// Values are returned in the order of `keys`. An invalid key rejects the whole call before
    /// anything is queued.
    ///
    /// If all the values are already present in the loader cache, they are returned as soon as the
    /// request is processed by the worker. Otherwise, the keys are enqueued for batch loading in the
    /// next loader execution frame.
    pub async fn load_many(&self, keys: Vec<K>) -> LoadResult<Vec<V>> {
        if let Some(key) = keys.iter().find(|k| !k.is_valid()) {
            return Err(LoadError::invalid_key(key));
        }
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let (response_tx, response_rx) = oneshot::channel();
        self.send(LoaderOp::Load(LoadRequest::Many(keys, response_tx)))?;
        response_rx.await.map_err(|_| LoadError::WorkerClosed)?
    }

    /// Adds a value to the cache.
    pub fn prime(&self, key: K, value: V) -> LoadResult<()> {
        self.send(LoaderOp::Prime(key, value))
    }

    /// Adds many values to the cache at once.
    pub fn prime_many(&self, key_vals: Vec<(K, V)>) -> LoadResult<()> {
        self.send(LoaderOp::PrimeMany(key_vals))
    }

    /// Removes a value from the cache.
    ///
    /// This key will be reloaded when it is next requested.
    pub fn clear(&self, key: K) -> LoadResult<()> {
        self.send(LoaderOp::Clear(key))
    }

    /// Removes multiple values from the cache at once.
    ///
    /// These keys will be reloaded when requested.
    pub fn clear_many(&self, keys: Vec<K>) -> LoadResult<()> {
        self.send(LoaderOp::ClearMany(keys))
    }

    /// Empties the cache. Every key will be reloaded when it is next requested.
    pub fn clear_all(&self) -> LoadResult<()> {
        self.send(LoaderOp::ClearAll)
    }

    fn send(&self, op: LoaderOp<K, V>) -> LoadResult<()> {
        self.request_tx.send(op).map_err(|_| LoadError::WorkerClosed)
    }
}
