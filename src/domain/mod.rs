//! The school records domain built on top of [`Loader`](crate::Loader).

pub mod context;
pub mod models;
pub mod relations;
pub mod resolve;
pub mod service;
pub mod store;

pub use context::{Loaders, RequestContext};
pub use models::{EntityId, Role, School, Status, Student, User};
pub use service::{ServiceError, ServiceResult};
pub use store::{MemoryStore, StoreError};
