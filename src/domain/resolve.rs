//! Relationship traversal.
//!
//! Parents are read first, then every relation load for the whole level is issued at once so
//! the loader answers the level with a single bulk read.

use futures::future;
use serde::Serialize;

use super::context::RequestContext;
use super::models::{EntityId, School, Student};
use super::service::ServiceResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchoolNode {
    #[serde(flatten)]
    pub school: School,
    pub students: Vec<Student>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentNode {
    #[serde(flatten)]
    pub student: Student,
    pub school: Option<School>,
}

/// Every active school with its active students.
#[tracing::instrument(skip(ctx), fields(request_id = %ctx.request_id))]
pub async fn schools_with_students(ctx: &RequestContext) -> ServiceResult<Vec<SchoolNode>> {
    let schools = ctx.schools().get_all().await?;
    attach_students(ctx, schools).await
}

/// One school with its students, or `None` if it does not exist or was deleted.
#[tracing::instrument(skip(ctx), fields(request_id = %ctx.request_id))]
pub async fn school(ctx: &RequestContext, id: EntityId) -> ServiceResult<Option<SchoolNode>> {
    match ctx.schools().get_one(id).await? {
        Some(school) => Ok(attach_students(ctx, vec![school]).await?.pop()),
        None => Ok(None),
    }
}

/// Every active student with the school they are enrolled in.
#[tracing::instrument(skip(ctx), fields(request_id = %ctx.request_id))]
pub async fn students_with_school(ctx: &RequestContext) -> ServiceResult<Vec<StudentNode>> {
    let students = ctx.students().get_all().await?;
    let service = ctx.students();
    let schools =
        future::try_join_all(students.iter().map(|student| service.school(student))).await?;
    Ok(students
        .into_iter()
        .zip(schools)
        .map(|(student, school)| StudentNode { student, school })
        .collect())
}

async fn attach_students(
    ctx: &RequestContext,
    schools: Vec<School>,
) -> ServiceResult<Vec<SchoolNode>> {
    let service = ctx.schools();
    let students =
        future::try_join_all(schools.iter().map(|school| service.students(school))).await?;
    Ok(schools
        .into_iter()
        .zip(students)
        .map(|(school, students)| SchoolNode { school, students })
        .collect())
}
