//! Batch functions for the relations a traversal follows.
//!
//! Each one issues a single bulk read against the [`MemoryStore`] for all keys of a batch.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use super::models::{EntityId, School, Student, User};
use super::store::{Document, MemoryStore};
use crate::{BatchFunction, BoxError, Many, One};

/// Looks documents up by their own id. Ids without an active document resolve to `None`.
pub struct ById<T>(PhantomData<fn() -> T>);

impl<T> ById<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for ById<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub type SchoolById = ById<School>;
pub type StudentById = ById<Student>;
pub type UserById = ById<User>;

#[async_trait]
impl<T> BatchFunction<EntityId> for ById<T>
where
    T: Document + std::fmt::Debug,
{
    type Context = Arc<MemoryStore>;
    type Record = T;
    type Cardinality = One;

    fn key_of(record: &T) -> EntityId {
        record.id().clone()
    }

    async fn load(keys: &[EntityId], store: &Arc<MemoryStore>) -> Result<Vec<T>, BoxError> {
        Ok(store.find_by_ids::<T>(keys).await?)
    }
}

/// Groups the active students of each requested school. Schools without students resolve to an
/// empty `Vec`.
#[derive(Default)]
pub struct StudentsBySchool;

#[async_trait]
impl BatchFunction<EntityId> for StudentsBySchool {
    type Context = Arc<MemoryStore>;
    type Record = Student;
    type Cardinality = Many;

    fn key_of(student: &Student) -> EntityId {
        student.school_id.clone()
    }

    async fn load(keys: &[EntityId], store: &Arc<MemoryStore>) -> Result<Vec<Student>, BoxError> {
        Ok(store.students_by_school_ids(keys).await?)
    }
}
