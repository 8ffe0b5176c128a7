use chrono::Utc;
use rocket::Route;
use rocket::State;
use rocket::serde::json::Json;
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::auth::{AuthUser, Permission, Role};
use crate::db::{
    Notification, TaskListing, TraineeProgress, TraineeTaskView, list_for_trainee,
    start_assignment, submit_completion, trainee_notifications, trainee_progress,
};
use crate::models::{TaskAssignment, User};
use crate::response::{ApiResponse, ApiResult};

use super::profile::{ProfileRequest, own_profile, update_own_profile};

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct CompleteTaskRequest {
    pub notes: Option<String>,
}

#[get("/trainee/profile")]
pub async fn get_profile(user: AuthUser, db: &State<Pool<Sqlite>>) -> ApiResult<User> {
    user.require_role(&[Role::Trainee])?;
    let profile = own_profile(db, &user).await?;
    Ok(ApiResponse::ok(profile, "Profile retrieved successfully"))
}

#[put("/trainee/profile", data = "<request>")]
pub async fn update_profile(
    request: Json<ProfileRequest>,
    user: AuthUser,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<User> {
    user.require_role(&[Role::Trainee])?;
    let profile = update_own_profile(db, &user, request.into_inner()).await?;
    Ok(ApiResponse::ok(profile, "Profile updated successfully"))
}

#[get("/trainee/tasks")]
pub async fn get_tasks(
    user: AuthUser,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<TaskListing<TraineeTaskView>> {
    user.require_permission(Permission::ViewOwnAssignments)?;
    let listing = list_for_trainee(db, user.id, Utc::now()).await?;
    Ok(ApiResponse::ok(listing, "Tasks retrieved successfully"))
}

/// The body is optional; an empty request completes without notes.
#[post("/trainee/tasks/<task_id>/complete", data = "<request>")]
pub async fn post_complete(
    task_id: i64,
    request: Option<Json<CompleteTaskRequest>>,
    user: AuthUser,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<TaskAssignment> {
    user.require_permission(Permission::CompleteOwnAssignments)?;

    let notes = request.and_then(|body| body.into_inner().notes);
    let assignment = submit_completion(db, user.id, task_id, notes).await?;

    info!(trainee_id = %user.id, task_id = %task_id, "Task completed");
    Ok(ApiResponse::ok(assignment, "Task completed successfully"))
}

#[post("/trainee/tasks/<task_id>/start")]
pub async fn post_start(
    task_id: i64,
    user: AuthUser,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<TaskAssignment> {
    user.require_permission(Permission::CompleteOwnAssignments)?;
    let assignment = start_assignment(db, user.id, task_id).await?;
    Ok(ApiResponse::ok(assignment, "Task started"))
}

#[get("/trainee/progress")]
pub async fn get_progress(
    user: AuthUser,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<TraineeProgress> {
    user.require_permission(Permission::ViewOwnAssignments)?;
    let progress = trainee_progress(db, user.id, Utc::now()).await?;
    Ok(ApiResponse::ok(progress, "Progress retrieved successfully"))
}

#[get("/trainee/notifications")]
pub async fn get_notifications(
    user: AuthUser,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Vec<Notification>> {
    user.require_permission(Permission::ViewOwnAssignments)?;
    let notifications = trainee_notifications(db, user.id, Utc::now()).await?;
    Ok(ApiResponse::ok(
        notifications,
        "Notifications retrieved successfully",
    ))
}

pub fn routes() -> Vec<Route> {
    routes![
        get_profile,
        update_profile,
        get_tasks,
        post_complete,
        post_start,
        get_progress,
        get_notifications,
    ]
}
