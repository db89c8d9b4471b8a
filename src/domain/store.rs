//! In-memory document store with soft delete.
//!
//! Documents live in one map per collection. Soft-deleted documents stay in their collection
//! (so their email stays reserved) but are invisible to every read and write below.
//!
//! The bulk reads ([`MemoryStore::find_by_ids`] and [`MemoryStore::students_by_school_ids`]) are
//! what the relation loaders call. They scan the collection and return matches in storage order,
//! which is unrelated to the order of the requested ids.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::instrument;

use super::models::{EntityId, School, Status, Student, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection} not found: {id}")]
    NotFound { collection: &'static str, id: EntityId },

    #[error("{collection} already exists: {id}")]
    DuplicateId { collection: &'static str, id: EntityId },

    #[error("{collection} email already in use: {email}")]
    DuplicateEmail { collection: &'static str, email: String },

    #[error("store unavailable: {message}")]
    Unavailable { message: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

type Collection<T> = RwLock<HashMap<EntityId, T>>;

/// A record kept in one of the store's collections.
pub trait Document: Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn collection(store: &MemoryStore) -> &Collection<Self>;

    fn id(&self) -> &EntityId;

    fn deleted_at(&self) -> Option<DateTime<Utc>>;

    /// Marks the document soft-deleted.
    fn mark_deleted(&mut self, at: DateTime<Utc>);

    fn touch(&mut self, at: DateTime<Utc>);

    /// Email that must be unique within the collection, if any.
    fn unique_email(&self) -> Option<&str> {
        None
    }

    fn is_active(&self) -> bool {
        self.deleted_at().is_none()
    }
}

impl Document for User {
    const COLLECTION: &'static str = "user";

    fn collection(store: &MemoryStore) -> &Collection<Self> {
        &store.users
    }

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.status = Status::Deleted;
        self.deleted_at = Some(at);
        self.updated_at = at;
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    fn unique_email(&self) -> Option<&str> {
        Some(&self.email)
    }
}

impl Document for School {
    const COLLECTION: &'static str = "school";

    fn collection(store: &MemoryStore) -> &Collection<Self> {
        &store.schools
    }

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.deleted_at = Some(at);
        self.updated_at = at;
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

impl Document for Student {
    const COLLECTION: &'static str = "student";

    fn collection(store: &MemoryStore) -> &Collection<Self> {
        &store.students
    }

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn mark_deleted(&mut self, at: DateTime<Utc>) {
        self.status = Status::Deleted;
        self.deleted_at = Some(at);
        self.updated_at = at;
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }

    fn unique_email(&self) -> Option<&str> {
        Some(&self.email)
    }

    fn is_active(&self) -> bool {
        self.status == Status::IsActive && self.deleted_at.is_none()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: Collection<User>,
    schools: Collection<School>,
    students: Collection<Student>,
    /// Number of upcoming bulk reads that fail with `StoreError::Unavailable`.
    failing_reads: AtomicUsize,
    bulk_queries: AtomicUsize,
}

fn email_taken<T: Document>(docs: &HashMap<EntityId, T>, candidate: &T) -> bool {
    match candidate.unique_email() {
        Some(email) => docs.values().any(|doc| {
            doc.id() != candidate.id()
                && doc.unique_email().is_some_and(|other| other.eq_ignore_ascii_case(email))
        }),
        None => false,
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Makes the next `count` bulk reads fail.
    pub fn fail_next_reads(&self, count: usize) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    /// Number of bulk reads served so far, failed ones included.
    pub fn bulk_queries(&self) -> usize {
        self.bulk_queries.load(Ordering::SeqCst)
    }

    fn begin_bulk_read(&self) -> StoreResult<()> {
        self.bulk_queries.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(StoreError::Unavailable { message: "injected read failure".to_owned() });
        }
        Ok(())
    }

    #[instrument(skip_all, fields(collection = T::COLLECTION, id = %doc.id()))]
    pub async fn insert<T: Document>(&self, doc: T) -> StoreResult<T> {
        let mut docs = T::collection(self).write().await;
        if docs.contains_key(doc.id()) {
            return Err(StoreError::DuplicateId { collection: T::COLLECTION, id: doc.id().clone() });
        }
        if email_taken(&docs, &doc) {
            return Err(StoreError::DuplicateEmail {
                collection: T::COLLECTION,
                email: doc.unique_email().unwrap_or_default().to_owned(),
            });
        }
        docs.insert(doc.id().clone(), doc.clone());
        Ok(doc)
    }

    /// Returns the document if it exists and is not soft-deleted.
    pub async fn find<T: Document>(&self, id: &EntityId) -> Option<T> {
        T::collection(self).read().await.get(id).filter(|doc| doc.is_active()).cloned()
    }

    /// Returns every active document, ordered by id.
    pub async fn list<T: Document>(&self) -> Vec<T> {
        let docs = T::collection(self).read().await;
        let mut active = docs.values().filter(|doc| doc.is_active()).cloned().collect::<Vec<_>>();
        active.sort_by(|a, b| a.id().cmp(b.id()));
        active
    }

    /// Applies `change` to an active document and stores the result.
    #[instrument(skip(self, change), fields(collection = T::COLLECTION))]
    pub async fn update<T, F>(&self, id: &EntityId, change: F) -> StoreResult<T>
    where
        T: Document,
        F: FnOnce(&mut T),
    {
        let mut docs = T::collection(self).write().await;
        let mut updated = docs
            .get(id)
            .filter(|doc| doc.is_active())
            .cloned()
            .ok_or_else(|| StoreError::NotFound { collection: T::COLLECTION, id: id.clone() })?;
        change(&mut updated);
        if email_taken(&docs, &updated) {
            return Err(StoreError::DuplicateEmail {
                collection: T::COLLECTION,
                email: updated.unique_email().unwrap_or_default().to_owned(),
            });
        }
        updated.touch(Utc::now());
        docs.insert(id.clone(), updated.clone());
        Ok(updated)
    }

    #[instrument(skip(self), fields(collection = T::COLLECTION))]
    pub async fn soft_delete<T: Document>(&self, id: &EntityId) -> StoreResult<T> {
        let mut docs = T::collection(self).write().await;
        match docs.get_mut(id).filter(|doc| doc.is_active()) {
            Some(doc) => {
                doc.mark_deleted(Utc::now());
                Ok(doc.clone())
            }
            None => Err(StoreError::NotFound { collection: T::COLLECTION, id: id.clone() }),
        }
    }

    /// Bulk read of active documents whose id is in `ids`, in storage order.
    #[instrument(skip(self), fields(collection = T::COLLECTION))]
    pub async fn find_by_ids<T: Document>(&self, ids: &[EntityId]) -> StoreResult<Vec<T>> {
        self.begin_bulk_read()?;
        let wanted = ids.iter().collect::<HashSet<_>>();
        let docs = T::collection(self).read().await;
        Ok(docs
            .values()
            .filter(|doc| doc.is_active() && wanted.contains(doc.id()))
            .cloned()
            .collect())
    }

    /// Bulk read of active students enrolled in any of `school_ids`, in storage order.
    #[instrument(skip(self))]
    pub async fn students_by_school_ids(&self, school_ids: &[EntityId]) -> StoreResult<Vec<Student>> {
        self.begin_bulk_read()?;
        let wanted = school_ids.iter().collect::<HashSet<_>>();
        let students = self.students.read().await;
        Ok(students
            .values()
            .filter(|student| student.is_active() && wanted.contains(&student.school_id))
            .cloned()
            .collect())
    }
}
