use chrono::Utc;
use rocket::Route;
use rocket::State;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::info;
use validator::Validate;

use crate::auth::{AuthUser, Permission, Role};
use crate::db::{
    CoachAssignmentView, CreatedAssignment, NewAssignment, NewTask, TaskListing, TaskSource,
    TaskSummary, TaskUpdate, add_trainee, create_and_assign, delete_task, get_user,
    is_trainee_linked, list_available_trainees, list_for_coach, list_tasks, list_trainees,
    remove_trainee, update_task,
};
use crate::error::AppError;
use crate::models::{
    AssignmentStatus, Difficulty, Exercise, Priority, StatusSummary, Task, User, parse_due_date,
};
use crate::response::{ApiResponse, ApiResult};
use crate::validation::JsonValidateExt;

use super::profile::{ProfileRequest, own_profile, update_own_profile};

#[derive(Debug, Deserialize)]
pub struct AddTraineeRequest {
    pub trainee_id: i64,
}

/// Body of `POST /coach/<coachId>/tasks`: either `task_id` of an existing task
/// or the fields of a new one, plus the assignment details.
#[derive(Debug, Deserialize, Validate, Default)]
#[serde(default)]
pub struct AssignTaskRequest {
    pub trainee_id: Option<i64>,
    pub task_id: Option<i64>,

    #[validate(length(min = 1, max = 200, message = "Task title must be 1-200 characters"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub workout_type: Option<String>,
    pub difficulty_level: Option<String>,
    #[validate(range(
        min = 1,
        max = 1440,
        message = "Duration must be between 1 and 1440 minutes"
    ))]
    pub duration_minutes: Option<i64>,
    #[validate(range(
        min = 0,
        max = 100000,
        message = "Calories target must be between 0 and 100000"
    ))]
    pub calories_target: Option<i64>,
    pub exercises: Option<Vec<Exercise>>,

    pub due_date: Option<String>,
    pub priority: Option<String>,
    pub notes: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, Validate, Default)]
#[serde(default)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Task title must be 1-200 characters"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub workout_type: Option<String>,
    pub difficulty_level: Option<String>,
    #[validate(range(
        min = 1,
        max = 1440,
        message = "Duration must be between 1 and 1440 minutes"
    ))]
    pub duration_minutes: Option<i64>,
    #[validate(range(
        min = 0,
        max = 100000,
        message = "Calories target must be between 0 and 100000"
    ))]
    pub calories_target: Option<i64>,
    pub exercises: Option<Vec<Exercise>>,
}

#[derive(Debug, Serialize)]
pub struct TraineeDetail {
    pub trainee: User,
    pub assignments: Vec<CoachAssignmentView>,
    pub stats: StatusSummary,
}

fn parse_difficulty(value: Option<&str>) -> Result<Option<Difficulty>, AppError> {
    value
        .map(|level| {
            Difficulty::parse(level).ok_or_else(|| {
                AppError::Validation(format!("Invalid difficulty level '{}'", level))
            })
        })
        .transpose()
}

fn parse_priority(value: Option<&str>) -> Result<Priority, AppError> {
    match value {
        None => Ok(Priority::default()),
        Some(priority) => Priority::parse(priority)
            .ok_or_else(|| AppError::Validation(format!("Invalid priority '{}'", priority))),
    }
}

fn parse_initial_status(value: Option<&str>) -> Result<AssignmentStatus, AppError> {
    match value.map(AssignmentStatus::parse) {
        None => Ok(AssignmentStatus::Pending),
        Some(Some(status @ (AssignmentStatus::Pending | AssignmentStatus::InProgress))) => {
            Ok(status)
        }
        Some(_) => Err(AppError::Validation(
            "Initial status must be pending or in_progress".to_string(),
        )),
    }
}

impl AssignTaskRequest {
    fn into_parts(self) -> Result<(i64, TaskSource, NewAssignment), AppError> {
        let trainee_id = self
            .trainee_id
            .ok_or_else(|| AppError::Validation("Trainee ID is required".to_string()))?;

        let source = match self.task_id {
            Some(task_id) => TaskSource::Existing(task_id),
            None => {
                let title = self
                    .title
                    .map(|title| title.trim().to_string())
                    .filter(|title| !title.is_empty())
                    .ok_or_else(|| AppError::Validation("Task title is required".to_string()))?;

                TaskSource::New(NewTask {
                    title,
                    description: self.description.unwrap_or_default(),
                    workout_type: self
                        .workout_type
                        .unwrap_or_else(|| "general".to_string()),
                    difficulty_level: parse_difficulty(self.difficulty_level.as_deref())?
                        .unwrap_or_default(),
                    duration_minutes: self.duration_minutes,
                    calories_target: self.calories_target,
                    exercises: self.exercises.unwrap_or_default(),
                })
            }
        };

        let assignment = NewAssignment {
            status: parse_initial_status(self.status.as_deref())?,
            due_date: self
                .due_date
                .as_deref()
                .filter(|due| !due.trim().is_empty())
                .map(parse_due_date)
                .transpose()?,
            priority: parse_priority(self.priority.as_deref())?,
            notes: self.notes.unwrap_or_default(),
        };

        Ok((trainee_id, source, assignment))
    }
}

impl UpdateTaskRequest {
    fn into_update(self) -> Result<TaskUpdate, AppError> {
        Ok(TaskUpdate {
            difficulty_level: parse_difficulty(self.difficulty_level.as_deref())?,
            title: self.title.map(|title| title.trim().to_string()),
            description: self.description,
            workout_type: self.workout_type,
            duration_minutes: self.duration_minutes,
            calories_target: self.calories_target,
            exercises: self.exercises,
        })
    }
}

#[get("/coach/profile")]
pub async fn get_profile(user: AuthUser, db: &State<Pool<Sqlite>>) -> ApiResult<User> {
    user.require_role(&[Role::Coach])?;
    let profile = own_profile(db, &user).await?;
    Ok(ApiResponse::ok(profile, "Profile retrieved successfully"))
}

#[put("/coach/profile", data = "<request>")]
pub async fn update_profile(
    request: Json<ProfileRequest>,
    user: AuthUser,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<User> {
    user.require_role(&[Role::Coach])?;
    let profile = update_own_profile(db, &user, request.into_inner()).await?;
    Ok(ApiResponse::ok(profile, "Profile updated successfully"))
}

#[get("/coach/trainees")]
pub async fn get_trainees(user: AuthUser, db: &State<Pool<Sqlite>>) -> ApiResult<Vec<User>> {
    user.require_permission(Permission::ManageTrainees)?;
    let trainees = list_trainees(db, user.id).await?;
    Ok(ApiResponse::ok(trainees, "Trainees retrieved successfully"))
}

#[post("/coach/trainees", data = "<request>")]
pub async fn post_trainee(
    request: Json<AddTraineeRequest>,
    user: AuthUser,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<User> {
    user.require_permission(Permission::ManageTrainees)?;
    let trainee = add_trainee(db, user.id, request.trainee_id).await?;

    info!(coach_id = %user.id, trainee_id = %trainee.id, "Trainee added");
    Ok(ApiResponse::created(trainee, "Trainee added successfully"))
}

#[get("/coach/trainees/<trainee_id>")]
pub async fn get_trainee_detail(
    trainee_id: i64,
    user: AuthUser,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<TraineeDetail> {
    user.require_permission(Permission::ManageTrainees)?;

    if !is_trainee_linked(db, user.id, trainee_id).await? {
        return Err(AppError::Authorization(
            "Trainee is not in your list".to_string(),
        ));
    }

    let trainee = get_user(db, trainee_id).await?;
    let listing = list_for_coach(db, user.id, Some(trainee_id), Utc::now()).await?;

    Ok(ApiResponse::ok(
        TraineeDetail {
            trainee,
            assignments: listing.tasks,
            stats: listing.stats,
        },
        "Trainee details retrieved successfully",
    ))
}

#[delete("/coach/trainees/<trainee_id>")]
pub async fn delete_trainee(
    trainee_id: i64,
    user: AuthUser,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<()> {
    user.require_permission(Permission::ManageTrainees)?;
    remove_trainee(db, user.id, trainee_id).await?;

    info!(coach_id = %user.id, trainee_id = %trainee_id, "Trainee removed");
    Ok(ApiResponse::ok((), "Trainee removed successfully"))
}

#[get("/coach/available-trainees?<search>")]
pub async fn get_available_trainees(
    search: Option<&str>,
    user: AuthUser,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Vec<User>> {
    user.require_permission(Permission::ManageTrainees)?;
    let trainees = list_available_trainees(db, user.id, search).await?;
    Ok(ApiResponse::ok(
        trainees,
        "Available trainees retrieved successfully",
    ))
}

#[get("/coach/search-trainees?<search>")]
pub async fn search_trainees(
    search: Option<&str>,
    user: AuthUser,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Vec<User>> {
    get_available_trainees(search, user, db).await
}

#[post("/coach/<coach_id>/tasks", data = "<request>")]
pub async fn post_assign_task(
    coach_id: i64,
    request: Json<AssignTaskRequest>,
    user: AuthUser,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<CreatedAssignment> {
    user.require_permission(Permission::AssignTasks)?;

    if coach_id != user.id {
        return Err(AppError::Authorization(
            "You can only assign tasks as yourself".to_string(),
        ));
    }

    let (trainee_id, source, assignment) = request.validate_custom()?.into_parts()?;
    let created = create_and_assign(db, user.id, trainee_id, source, assignment).await?;

    info!(
        coach_id = %user.id,
        trainee_id = %trainee_id,
        task_id = %created.task.id,
        "Task assigned"
    );
    Ok(ApiResponse::created(
        created,
        "Task created and assigned successfully",
    ))
}

#[get("/coach/tasks")]
pub async fn get_tasks(user: AuthUser, db: &State<Pool<Sqlite>>) -> ApiResult<Vec<TaskSummary>> {
    user.require_permission(Permission::ManageTasks)?;
    let tasks = list_tasks(db, user.id).await?;
    Ok(ApiResponse::ok(tasks, "Tasks retrieved successfully"))
}

#[put("/coach/tasks/<task_id>", data = "<request>")]
pub async fn put_task(
    task_id: i64,
    request: Json<UpdateTaskRequest>,
    user: AuthUser,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<Task> {
    user.require_permission(Permission::ManageTasks)?;
    let update = request.validate_custom()?.into_update()?;
    let task = update_task(db, user.id, task_id, update).await?;
    Ok(ApiResponse::ok(task, "Task updated successfully"))
}

#[delete("/coach/tasks/<task_id>")]
pub async fn remove_task(
    task_id: i64,
    user: AuthUser,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<()> {
    user.require_permission(Permission::ManageTasks)?;
    delete_task(db, user.id, task_id).await?;
    Ok(ApiResponse::ok((), "Task deleted successfully"))
}

#[get("/coach/assignments?<trainee_id>")]
pub async fn get_assignments(
    trainee_id: Option<i64>,
    user: AuthUser,
    db: &State<Pool<Sqlite>>,
) -> ApiResult<TaskListing<CoachAssignmentView>> {
    user.require_permission(Permission::AssignTasks)?;
    let listing = list_for_coach(db, user.id, trainee_id, Utc::now()).await?;
    Ok(ApiResponse::ok(listing, "Assignments retrieved successfully"))
}

pub fn routes() -> Vec<Route> {
    routes![
        get_profile,
        update_profile,
        get_trainees,
        post_trainee,
        get_trainee_detail,
        delete_trainee,
        get_available_trainees,
        search_trainees,
        post_assign_task,
        get_tasks,
        put_task,
        remove_task,
        get_assignments,
    ]
}
