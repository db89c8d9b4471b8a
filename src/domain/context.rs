use std::sync::Arc;

use uuid::Uuid;

use super::models::{EntityId, School, Student, User};
use super::relations::{SchoolById, StudentById, StudentsBySchool, UserById};
use super::service::{SchoolService, StudentService, UserService};
use super::store::MemoryStore;
use crate::{config::ServiceConfig, Loader, LoaderConfig};

/// One loader per relation kind, all created for a single request.
pub struct Loaders {
    pub students_by_school: Loader<EntityId, Vec<Student>>,
    pub school_by_id: Loader<EntityId, Option<School>>,
    pub student_by_id: Loader<EntityId, Option<Student>>,
    pub user_by_id: Loader<EntityId, Option<User>>,
}

impl Loaders {
    /// Builds fresh, empty loaders backed by `store`. Must be called within a tokio runtime.
    pub fn new(store: &Arc<MemoryStore>, config: &LoaderConfig) -> Self {
        Self {
            students_by_school: Loader::with_config(StudentsBySchool, store.clone(), config.clone()),
            school_by_id: Loader::with_config(SchoolById::new(), store.clone(), config.clone()),
            student_by_id: Loader::with_config(StudentById::new(), store.clone(), config.clone()),
            user_by_id: Loader::with_config(UserById::new(), store.clone(), config.clone()),
        }
    }
}

/// Everything a single request needs: the shared store and loaders nobody else sees.
///
/// Build one per incoming request and pass it down by reference. Dropping it stops the loaders'
/// workers and discards their caches.
pub struct RequestContext {
    pub request_id: Uuid,
    pub store: Arc<MemoryStore>,
    pub loaders: Loaders,
}

impl RequestContext {
    pub fn new(store: Arc<MemoryStore>, config: &ServiceConfig) -> Self {
        let request_id = Uuid::new_v4();
        tracing::debug!(%request_id, "creating request context");
        let loaders = Loaders::new(&store, &config.loader);
        Self { request_id, store, loaders }
    }

    pub fn users(&self) -> UserService<'_> {
        UserService::new(self)
    }

    pub fn schools(&self) -> SchoolService<'_> {
        SchoolService::new(self)
    }

    pub fn students(&self) -> StudentService<'_> {
        StudentService::new(self)
    }
}
