//! School records: users, schools and students, plus their create/update inputs.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::key::Key;

/// Identifier of a stored document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Key for EntityId {
    fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Operator,
    Acadir,
    Student,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    IsActive,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub role: Role,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct School {
    pub id: EntityId,
    pub name: String,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: EntityId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub date_of_birth: Option<NaiveDate>,
    pub school_id: EntityId,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid email address: {0}")]
    InvalidEmail(String),
}

pub type ValidationResult = Result<(), ValidationError>;

fn require(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

fn require_email(value: &str) -> ValidationResult {
    require("email", value)?;
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(ValidationError::InvalidEmail(value.to_owned())),
    }
}

fn check_optional(
    value: Option<&str>,
    check: impl FnOnce(&str) -> ValidationResult,
) -> ValidationResult {
    value.map_or(Ok(()), check)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUserInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

impl CreateUserInput {
    pub fn validate(&self) -> ValidationResult {
        require("first_name", &self.first_name)?;
        require("last_name", &self.last_name)?;
        require_email(&self.email)?;
        require("password", &self.password)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserInput {
    pub id: EntityId,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl UpdateUserInput {
    pub fn validate(&self) -> ValidationResult {
        check_optional(self.first_name.as_deref(), |v| require("first_name", v))?;
        check_optional(self.last_name.as_deref(), |v| require("last_name", v))?;
        check_optional(self.email.as_deref(), require_email)
    }

    pub(crate) fn apply(self, user: &mut User) {
        if let Some(first_name) = self.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            user.last_name = last_name;
        }
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(role) = self.role {
            user.role = role;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateSchoolInput {
    pub name: String,
    pub address: Option<String>,
}

impl CreateSchoolInput {
    pub fn validate(&self) -> ValidationResult {
        require("name", &self.name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSchoolInput {
    pub id: EntityId,
    pub name: Option<String>,
    pub address: Option<String>,
}

impl UpdateSchoolInput {
    pub fn validate(&self) -> ValidationResult {
        check_optional(self.name.as_deref(), |v| require("name", v))
    }

    pub(crate) fn apply(self, school: &mut School) {
        if let Some(name) = self.name {
            school.name = name;
        }
        if let Some(address) = self.address {
            school.address = Some(address);
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateStudentInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub date_of_birth: Option<NaiveDate>,
    pub school_id: EntityId,
}

impl CreateStudentInput {
    pub fn validate(&self) -> ValidationResult {
        require("first_name", &self.first_name)?;
        require("last_name", &self.last_name)?;
        require_email(&self.email)?;
        require("school_id", self.school_id.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateStudentInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub school_id: Option<EntityId>,
}

impl UpdateStudentInput {
    pub fn validate(&self) -> ValidationResult {
        check_optional(self.first_name.as_deref(), |v| require("first_name", v))?;
        check_optional(self.last_name.as_deref(), |v| require("last_name", v))?;
        check_optional(self.email.as_deref(), require_email)?;
        check_optional(self.school_id.as_ref().map(EntityId::as_str), |v| require("school_id", v))
    }

    pub(crate) fn apply(self, student: &mut Student) {
        if let Some(first_name) = self.first_name {
            student.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            student.last_name = last_name;
        }
        if let Some(email) = self.email {
            student.email = email;
        }
        if let Some(date_of_birth) = self.date_of_birth {
            student.date_of_birth = Some(date_of_birth);
        }
        if let Some(school_id) = self.school_id {
            student.school_id = school_id;
        }
    }
}
