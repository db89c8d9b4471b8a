mod batch_function;
mod cache;
mod cardinality;
pub mod config;
pub mod domain;
mod error;
mod key;
mod loader;
mod loader_op;
mod loader_worker;
#[cfg(feature = "stats")]
mod worker_stats;

pub use batch_function::BatchFunction;
pub use cache::Cache;
pub use cardinality::{Cardinality, Many, One};
pub use config::{LoaderConfig, ServiceConfig};
pub use error::{BoxError, LoadError, LoadResult};
pub use key::Key;
pub use loader::Loader;
