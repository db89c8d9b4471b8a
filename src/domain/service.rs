//! Create, read, update and soft-delete operations for users, schools and students.
//!
//! Services borrow the [`RequestContext`] of the request they serve. Point reads go through the
//! request's loaders; mutations write to the store and then prime or clear the loaders so the
//! rest of the request sees its own writes.

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use super::context::RequestContext;
use super::models::{
    CreateSchoolInput, CreateStudentInput, CreateUserInput, EntityId, School, Status, Student,
    UpdateSchoolInput, UpdateStudentInput, UpdateUserInput, User, ValidationError,
};
use super::store::StoreError;
use crate::LoadError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: EntityId },

    #[error("store operation failed: {0}")]
    Store(#[source] StoreError),

    #[error("relation load failed: {0}")]
    Load(#[from] LoadError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, id } => Self::NotFound { entity: collection, id },
            other => Self::Store(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

pub struct UserService<'a> {
    ctx: &'a RequestContext,
}

impl<'a> UserService<'a> {
    pub(crate) fn new(ctx: &'a RequestContext) -> Self {
        Self { ctx }
    }

    pub async fn get_all(&self) -> ServiceResult<Vec<User>> {
        Ok(self.ctx.store.list::<User>().await)
    }

    pub async fn get_one(&self, id: EntityId) -> ServiceResult<Option<User>> {
        Ok(self.ctx.loaders.user_by_id.load(id).await?)
    }

    pub async fn create(&self, input: CreateUserInput) -> ServiceResult<User> {
        input.validate()?;
        let now = Utc::now();
        let user = User {
            id: EntityId::generate(),
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            password: input.password,
            role: input.role,
            status: Status::IsActive,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let user = self.ctx.store.insert(user).await?;
        self.ctx.loaders.user_by_id.prime(user.id.clone(), Some(user.clone()))?;
        info!(request_id = %self.ctx.request_id, id = %user.id, "created user");
        Ok(user)
    }

    pub async fn update(&self, input: UpdateUserInput) -> ServiceResult<User> {
        input.validate()?;
        let id = input.id.clone();
        let user = self.ctx.store.update::<User, _>(&id, |user| input.apply(user)).await?;
        self.ctx.loaders.user_by_id.prime(id, Some(user.clone()))?;
        info!(request_id = %self.ctx.request_id, id = %user.id, "updated user");
        Ok(user)
    }

    pub async fn delete(&self, id: EntityId) -> ServiceResult<User> {
        let user = self.ctx.store.soft_delete::<User>(&id).await?;
        self.ctx.loaders.user_by_id.prime(id, None)?;
        info!(request_id = %self.ctx.request_id, id = %user.id, "deleted user");
        Ok(user)
    }
}

pub struct SchoolService<'a> {
    ctx: &'a RequestContext,
}

impl<'a> SchoolService<'a> {
    pub(crate) fn new(ctx: &'a RequestContext) -> Self {
        Self { ctx }
    }

    pub async fn get_all(&self) -> ServiceResult<Vec<School>> {
        Ok(self.ctx.store.list::<School>().await)
    }

    pub async fn get_one(&self, id: EntityId) -> ServiceResult<Option<School>> {
        Ok(self.ctx.loaders.school_by_id.load(id).await?)
    }

    /// Active students enrolled in `school`.
    pub async fn students(&self, school: &School) -> ServiceResult<Vec<Student>> {
        Ok(self.ctx.loaders.students_by_school.load(school.id.clone()).await?)
    }

    pub async fn create(&self, input: CreateSchoolInput) -> ServiceResult<School> {
        input.validate()?;
        let now = Utc::now();
        let school = School {
            id: EntityId::generate(),
            name: input.name,
            address: input.address,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let school = self.ctx.store.insert(school).await?;
        self.ctx.loaders.school_by_id.prime(school.id.clone(), Some(school.clone()))?;
        info!(request_id = %self.ctx.request_id, id = %school.id, "created school");
        Ok(school)
    }

    pub async fn update(&self, input: UpdateSchoolInput) -> ServiceResult<School> {
        input.validate()?;
        let id = input.id.clone();
        let school = self.ctx.store.update::<School, _>(&id, |school| input.apply(school)).await?;
        self.ctx.loaders.school_by_id.prime(id, Some(school.clone()))?;
        info!(request_id = %self.ctx.request_id, id = %school.id, "updated school");
        Ok(school)
    }

    pub async fn delete(&self, id: EntityId) -> ServiceResult<School> {
        let school = self.ctx.store.soft_delete::<School>(&id).await?;
        self.ctx.loaders.school_by_id.prime(id, None)?;
        info!(request_id = %self.ctx.request_id, id = %school.id, "deleted school");
        Ok(school)
    }
}

pub struct StudentService<'a> {
    ctx: &'a RequestContext,
}

impl<'a> StudentService<'a> {
    pub(crate) fn new(ctx: &'a RequestContext) -> Self {
        Self { ctx }
    }

    pub async fn get_all(&self) -> ServiceResult<Vec<Student>> {
        Ok(self.ctx.store.list::<Student>().await)
    }

    pub async fn get_one(&self, id: EntityId) -> ServiceResult<Option<Student>> {
        Ok(self.ctx.loaders.student_by_id.load(id).await?)
    }

    /// The school `student` is enrolled in, unless it has been deleted.
    pub async fn school(&self, student: &Student) -> ServiceResult<Option<School>> {
        Ok(self.ctx.loaders.school_by_id.load(student.school_id.clone()).await?)
    }

    async fn require_school(&self, id: &EntityId) -> ServiceResult<()> {
        match self.ctx.loaders.school_by_id.load(id.clone()).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::NotFound { entity: "school", id: id.clone() }),
        }
    }

    pub async fn create(&self, input: CreateStudentInput) -> ServiceResult<Student> {
        input.validate()?;
        self.require_school(&input.school_id).await?;
        let now = Utc::now();
        let student = Student {
            id: EntityId::generate(),
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
            date_of_birth: input.date_of_birth,
            school_id: input.school_id,
            status: Status::IsActive,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let student = self.ctx.store.insert(student).await?;
        self.ctx.loaders.student_by_id.prime(student.id.clone(), Some(student.clone()))?;
        self.ctx.loaders.students_by_school.clear(student.school_id.clone())?;
        info!(request_id = %self.ctx.request_id, id = %student.id, "created student");
        Ok(student)
    }

    pub async fn update(&self, id: EntityId, input: UpdateStudentInput) -> ServiceResult<Student> {
        input.validate()?;
        if let Some(school_id) = &input.school_id {
            self.require_school(school_id).await?;
        }
        let previous = self
            .ctx
            .store
            .find::<Student>(&id)
            .await
            .ok_or_else(|| ServiceError::NotFound { entity: "student", id: id.clone() })?;
        let student = self.ctx.store.update::<Student, _>(&id, |student| input.apply(student)).await?;
        self.ctx.loaders.student_by_id.prime(id, Some(student.clone()))?;
        self.ctx
            .loaders
            .students_by_school
            .clear_many(vec![previous.school_id, student.school_id.clone()])?;
        info!(request_id = %self.ctx.request_id, id = %student.id, "updated student");
        Ok(student)
    }

    pub async fn delete(&self, id: EntityId) -> ServiceResult<Student> {
        let student = self.ctx.store.soft_delete::<Student>(&id).await?;
        self.ctx.loaders.student_by_id.prime(id, None)?;
        self.ctx.loaders.students_by_school.clear(student.school_id.clone())?;
        info!(request_id = %self.ctx.request_id, id = %student.id, "deleted student");
        Ok(student)
    }
}
