/// Counters describing how well a worker batched its requests. Reported at `debug` level when the
/// worker stops.
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Human readable name used to identify this worker stats when it is reported.
    tag: &'static str,
    /// Number of `LoaderOp::Load` that were received by the worker.
    load_requests: u32,
    /// The total number of keys that were requested for loading (not necessarily unique).
    items_requested: u32,
    /// The number of keys that were immediately found in the loader cache.
    cache_hits: u32,
    /// Number of batch function calls made by the worker.
    loads: u32,
    /// Number of batch function calls that failed or timed out.
    failed_loads: u32,
    /// The average number of unique keys passed to a batch function call.
    average_batch_size: f32,
    max_batch_size: u32,
    min_batch_size: u32,
    /// The total number of values produced for requested keys.
    items_loaded: u32,
}

impl WorkerStats {
    pub fn new(tag: &'static str) -> Self {
        Self { tag, min_batch_size: u32::MAX, ..Default::default() }
    }

    pub fn record_load_request(&mut self, items_requested: usize) {
        self.load_requests += 1;
        self.items_requested += items_requested as u32;
    }

    pub fn record_cache_hits(&mut self, hits: usize) {
        self.cache_hits += hits as u32;
    }

    pub fn record_load_exec(&mut self, batch_size: usize) {
        let batch_size = batch_size as u32;
        let new_total_load = self.loads + 1;
        self.average_batch_size = (((self.average_batch_size as f64 * self.loads as f64)
            + batch_size as f64)
            / new_total_load as f64) as f32;
        self.loads = new_total_load;
        self.max_batch_size = self.max_batch_size.max(batch_size);
        self.min_batch_size = self.min_batch_size.min(batch_size);
    }

    pub fn record_load_exec_completed(&mut self, loaded_item_count: usize) {
        self.items_loaded += loaded_item_count as u32;
    }

    pub fn record_load_exec_failed(&mut self) {
        self.failed_loads += 1;
    }

    pub fn loads(&self) -> u32 {
        self.loads
    }
}

impl Drop for WorkerStats {
    fn drop(&mut self) {
        tracing::debug!(tag = self.tag, worker_stats = ?self);
    }
}
