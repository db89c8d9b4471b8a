use async_trait::async_trait;

use crate::{cardinality::Cardinality, error::BoxError};

/// A `BatchFunction` defines the method through which some `Loader` may fetch
/// batched data from some resource. The `BatchFunction` receives a slice of distinct keys
/// that have been requested during the `Loader`'s most recent execution frame, and some user
/// defined context struct.
///
/// The records it returns may come back in any order and need not cover every key. Each record
/// names the key it answers through [`BatchFunction::key_of`], and the `Cardinality` decides how
/// records are grouped per key: [`One`](crate::One) yields `None` for keys without a record,
/// [`Many`](crate::Many) yields an empty `Vec`.
///
/// Returning an error fails every request of the batch with the same
/// [`LoadError::Fetch`](crate::LoadError::Fetch).
///
/// Multiple `BatchFunctions` (and therefore loaders) can share the same context (likely through an
/// `Arc`).
#[async_trait]
pub trait BatchFunction<K> {
    type Context;
    type Record;
    type Cardinality: Cardinality<K, Self::Record>;

    /// The key a fetched record belongs to.
    fn key_of(record: &Self::Record) -> K;

    async fn load(keys: &[K], context: &Self::Context) -> Result<Vec<Self::Record>, BoxError>;
}
