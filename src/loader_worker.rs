use std::collections::BTreeSet;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::time::Duration;

use futures::future::{self, FutureExt};
use tokio::sync::mpsc;

use crate::{
    batch_function::BatchFunction,
    cache::Cache,
    cardinality::Cardinality,
    config::LoaderConfig,
    error::{LoadError, LoadResult},
    key::Key,
    loader_op::{LoadRequest, LoaderOp},
};

#[cfg(feature = "stats")]
use crate::worker_stats::WorkerStats;

/// A `LoaderWorker` is the "single-thread" worker task that actually does the loading work.
///
/// Once started, it runs in a loop until the parent Loader aborts it's `JoinHandle` or drops the
/// request queue tx channel.
///
/// The worker can be in one of three states during its lifetime:
///
/// 1. Waiting for requests (idle).
/// 2. Flushing the request queue and staging keys for loading (accumulating).
/// 3. Executing its load batch function (fetching).
///
/// One cycle through this loop may be called an "execution frame".
///
/// In state (1), the worker awaits any messages on the request queue channel, idling until work arrives.
///
/// In state (2), the worker optionally sleeps for `batch_delay`, then pulls requests from the
/// queue until it is empty. It keeps yielding and draining until a whole yield round brings in
/// no new op (at most `yield_count` rounds), so loads issued together by callers on other runtime
/// threads still land in this frame. Prime and Clear requests are resolved immediately by
/// synchronously issuing requests to the cache. For Load requests, the worker checks if the
/// request can be resolved immediately from the cache. If so, it immediately sends the value on
/// the load request's response channel, otherwise it stages the keys missing from the cache.
/// Staged keys are kept sorted and distinct.
///
/// In state (3), the worker invokes its `BatchFunction` with the keys collected in (2), split into
/// calls of at most `max_batch_size` keys. Returned records are demultiplexed into one value per
/// key and inserted into the cache, then outstanding Load requests are resolved from the cache.
/// If a call fails, nothing is cached for its keys and every outstanding request that still lacks
/// a value receives the same error; a later load of those keys starts a new fetch.
pub struct LoaderWorker<K, V, F, CacheT, ContextT>
where
    K: Key,
    V: 'static + Send + Debug + Clone,
    F: 'static + BatchFunction<K, Context = ContextT> + Send,
    CacheT: Cache,
    ContextT: Send + Sync + 'static,
{
    cache: CacheT,
    request_rx: mpsc::UnboundedReceiver<LoaderOp<K, V>>,
    keys_to_load: BTreeSet<K>,
    pending_requests: Vec<LoadRequest<K, V>>,
    context: ContextT,
    config: LoaderConfig,
    phantom_batch_function: PhantomData<F>,
    #[cfg(feature = "stats")]
    stats: WorkerStats,
}

impl<K, V, F, CacheT, ContextT> LoaderWorker<K, V, F, CacheT, ContextT>
where
    K: Key,
    V: 'static + Send + Debug + Clone,
    F: 'static + BatchFunction<K, Context = ContextT> + Send,
    F::Cardinality: Cardinality<K, F::Record, Value = V>,
    CacheT: Cache<K = K, V = V>,
    ContextT: Send + Sync + 'static,
{
    pub fn new(
        cache: CacheT,
        request_rx: mpsc::UnboundedReceiver<LoaderOp<K, V>>,
        context: ContextT,
        config: LoaderConfig,
    ) -> Self {
        Self {
            cache,
            request_rx,
            keys_to_load: BTreeSet::new(),
            pending_requests: Vec::new(),
            context,
            config,
            phantom_batch_function: PhantomData,
            #[cfg(feature = "stats")]
            stats: WorkerStats::new(std::any::type_name::<F>()),
        }
    }

    pub async fn start(mut self) {
        loop {
            // Async await until we receive the first op.
            match self.request_rx.recv().await {
                None => {
                    tracing::info!("Tx channel closed. Terminating LoaderWorker.");
                    return;
                }
                Some(op) => self.mux_op(op),
            }
            self.collect_frame().await;
            while !self.keys_to_load.is_empty() {
                self.execute_load().await;
            }
        }
    }

    /// Accepts ops until a whole yield round brings in nothing new, or `yield_count` rounds have
    /// passed. Callers on other threads may still be enqueueing the loads of this frame when the
    /// first op arrives.
    async fn collect_frame(&mut self) {
        if let Some(delay) = self.config.batch_delay {
            tokio::time::sleep(delay).await;
        }
        self.drain();
        for _ in 0..self.config.yield_count {
            tokio::task::yield_now().await;
            if self.drain() == 0 {
                break;
            }
        }
    }

    /// Flushes the op queue without waiting. Returns the number of ops taken.
    fn drain(&mut self) -> usize {
        let mut taken = 0;
        while let Some(Some(op)) = self.request_rx.recv().now_or_never() {
            self.mux_op(op);
            taken += 1;
        }
        taken
    }

    #[tracing::instrument(skip(self))]
    fn mux_op(&mut self, op: LoaderOp<K, V>) {
        match op {
            LoaderOp::Load(request) => {
                let keys_to_load = request
                    .keys()
                    .iter()
                    .filter(|k| !self.cache.contains(*k))
                    .cloned()
                    .collect::<Vec<_>>();
                tracing::debug!(requested_keys = ?request.keys(), ?keys_to_load);
                #[cfg(feature = "stats")]
                {
                    self.stats.record_load_request(request.keys().len());
                    self.stats.record_cache_hits(request.keys().len() - keys_to_load.len());
                }
                if keys_to_load.is_empty() {
                    let values = self.cache.get(request.keys()).into_iter().flatten().collect();
                    request.send_response(values);
                } else {
                    self.keys_to_load.extend(keys_to_load);
                    self.pending_requests.push(request);
                }
            }
            LoaderOp::Prime(key, value) => self.cache.insert(key, value),
            LoaderOp::PrimeMany(key_vals) => self.cache.insert_many(key_vals),
            LoaderOp::Clear(key) => self.clear(vec![key]),
            LoaderOp::ClearMany(keys) => self.clear(keys),
            LoaderOp::ClearAll => self.clear_all(),
        }
    }

    /// Empties the cache. Keys that pending requests had found cached are staged again.
    fn clear_all(&mut self) {
        self.cache.flush();
        for request in &self.pending_requests {
            self.keys_to_load.extend(request.keys().iter().cloned());
        }
    }

    /// Removes keys from the cache, restaging those that a pending request still waits on.
    fn clear(&mut self, keys: Vec<K>) {
        self.cache.remove(&keys);
        for key in keys {
            if self.pending_requests.iter().any(|r| r.keys().contains(&key)) {
                self.keys_to_load.insert(key);
            }
        }
    }

    #[tracing::instrument(skip(self), fields(keys = self.keys_to_load.len()))]
    async fn execute_load(&mut self) {
        let keys = std::mem::take(&mut self.keys_to_load).into_iter().collect::<Vec<_>>();
        let chunk_size = self.config.max_batch_size.unwrap_or(keys.len()).max(1);
        let timeout = self.config.batch_timeout;

        #[cfg(feature = "stats")]
        for batch in keys.chunks(chunk_size) {
            self.stats.record_load_exec(batch.len());
        }

        let context = &self.context;
        let results = future::join_all(
            keys.chunks(chunk_size).map(|batch| Self::fetch(batch, context, timeout)),
        )
        .await;

        let mut failure = None;
        for result in results {
            match result {
                Ok(loaded_keyvals) => {
                    tracing::debug!(?loaded_keyvals);
                    #[cfg(feature = "stats")]
                    self.stats.record_load_exec_completed(loaded_keyvals.len());
                    self.cache.insert_many(loaded_keyvals);
                }
                Err(error) => {
                    tracing::warn!(%error, "batch load failed");
                    #[cfg(feature = "stats")]
                    self.stats.record_load_exec_failed();
                    failure.get_or_insert(error);
                }
            }
        }

        for request in std::mem::take(&mut self.pending_requests) {
            let values = self.cache.get(request.keys()).into_iter().collect::<Option<Vec<_>>>();
            match (values, &failure) {
                (Some(values), _) => request.send_response(values),
                (None, Some(error)) => request.send_error(error.clone()),
                (None, None) => {
                    // Never answer with a partial result; stage the gaps for another fetch.
                    self.keys_to_load.extend(
                        request.keys().iter().filter(|k| !self.cache.contains(*k)).cloned(),
                    );
                    self.pending_requests.push(request);
                }
            }
        }
    }

    async fn fetch(
        keys: &[K],
        context: &ContextT,
        timeout: Option<Duration>,
    ) -> LoadResult<Vec<(K, V)>> {
        let load = F::load(keys, context);
        let records = match timeout {
            Some(limit) => {
                tokio::time::timeout(limit, load).await.map_err(|_| LoadError::Timeout(limit))?
            }
            None => load.await,
        }
        .map_err(LoadError::fetch)?;
        Ok(<F::Cardinality as Cardinality<K, F::Record>>::demultiplex(keys, records, F::key_of))
    }
}
