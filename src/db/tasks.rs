use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{DbTask, Difficulty, Exercise, Task};

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub workout_type: String,
    pub difficulty_level: Difficulty,
    pub duration_minutes: Option<i64>,
    pub calories_target: Option<i64>,
    pub exercises: Vec<Exercise>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub workout_type: Option<String>,
    pub difficulty_level: Option<Difficulty>,
    pub duration_minutes: Option<i64>,
    pub calories_target: Option<i64>,
    pub exercises: Option<Vec<Exercise>>,
}

#[derive(Debug, Serialize)]
pub struct TaskSummary {
    #[serde(flatten)]
    pub task: Task,
    pub assignment_count: i64,
}

#[derive(sqlx::FromRow)]
struct DbTaskSummary {
    #[sqlx(flatten)]
    task: DbTask,
    assignment_count: Option<i64>,
}

/// Inserts on whatever connection the caller holds, so it can run inside a
/// transaction.
pub async fn insert_task(
    conn: &mut SqliteConnection,
    coach_id: i64,
    task: &NewTask,
    now: DateTime<Utc>,
) -> Result<i64, AppError> {
    let exercises = serde_json::to_string(&task.exercises)?;

    let res = sqlx::query(
        "INSERT INTO tasks
         (title, description, workout_type, difficulty_level, duration_minutes,
          calories_target, exercises, created_by, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(&task.workout_type)
    .bind(task.difficulty_level.as_str())
    .bind(task.duration_minutes)
    .bind(task.calories_target)
    .bind(exercises)
    .bind(coach_id)
    .bind(now)
    .bind(now)
    .execute(conn)
    .await?;

    Ok(res.last_insert_rowid())
}

/// Fetches a task regardless of tombstone state.
pub async fn fetch_task(conn: &mut SqliteConnection, task_id: i64) -> Result<Option<Task>, AppError> {
    let row = sqlx::query_as::<_, DbTask>("SELECT * FROM tasks WHERE id = ?")
        .bind(task_id)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(Task::from))
}

/// Ownership check shared by every coach-side task mutation.
pub fn ensure_owned(task: Option<Task>, coach_id: i64) -> Result<Task, AppError> {
    match task {
        Some(task) if !task.deleted => {
            if task.created_by == coach_id {
                Ok(task)
            } else {
                Err(AppError::Authorization(
                    "You can only manage your own tasks".to_string(),
                ))
            }
        }
        _ => Err(AppError::NotFound("Task not found".to_string())),
    }
}

#[instrument(skip(pool, task), fields(title = %task.title))]
pub async fn create_task(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    task: &NewTask,
) -> Result<Task, AppError> {
    info!("Creating task");
    let mut conn = pool.acquire().await?;
    let task_id = insert_task(&mut conn, coach_id, task, Utc::now()).await?;

    fetch_task(&mut conn, task_id)
        .await?
        .ok_or_else(|| AppError::Internal("Created task could not be read back".to_string()))
}

#[instrument]
pub async fn get_owned_task(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    task_id: i64,
) -> Result<Task, AppError> {
    let mut conn = pool.acquire().await?;
    ensure_owned(fetch_task(&mut conn, task_id).await?, coach_id)
}

#[instrument(skip(pool, update))]
pub async fn update_task(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    task_id: i64,
    update: TaskUpdate,
) -> Result<Task, AppError> {
    info!("Updating task");
    get_owned_task(pool, coach_id, task_id).await?;

    let exercises = update
        .exercises
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    sqlx::query(
        "UPDATE tasks
         SET title = COALESCE(?, title),
             description = COALESCE(?, description),
             workout_type = COALESCE(?, workout_type),
             difficulty_level = COALESCE(?, difficulty_level),
             duration_minutes = COALESCE(?, duration_minutes),
             calories_target = COALESCE(?, calories_target),
             exercises = COALESCE(?, exercises),
             updated_at = ?
         WHERE id = ? AND created_by = ? AND deleted_at IS NULL",
    )
    .bind(update.title)
    .bind(update.description)
    .bind(update.workout_type)
    .bind(update.difficulty_level.map(|d| d.as_str()))
    .bind(update.duration_minutes)
    .bind(update.calories_target)
    .bind(exercises)
    .bind(Utc::now())
    .bind(task_id)
    .bind(coach_id)
    .execute(pool)
    .await?;

    get_owned_task(pool, coach_id, task_id).await
}

/// Soft delete: the task leaves the catalog but assignments keep pointing at it.
#[instrument]
pub async fn delete_task(pool: &Pool<Sqlite>, coach_id: i64, task_id: i64) -> Result<(), AppError> {
    info!("Deleting task");
    get_owned_task(pool, coach_id, task_id).await?;

    sqlx::query("UPDATE tasks SET deleted_at = ? WHERE id = ? AND created_by = ? AND deleted_at IS NULL")
        .bind(Utc::now())
        .bind(task_id)
        .bind(coach_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn list_tasks(pool: &Pool<Sqlite>, coach_id: i64) -> Result<Vec<TaskSummary>, AppError> {
    info!("Listing coach tasks");
    let rows = sqlx::query_as::<_, DbTaskSummary>(
        "SELECT t.*,
                (SELECT COUNT(*) FROM task_assignments a WHERE a.task_id = t.id) AS assignment_count
         FROM tasks t
         WHERE t.created_by = ? AND t.deleted_at IS NULL
         ORDER BY t.created_at DESC, t.id DESC",
    )
    .bind(coach_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| TaskSummary {
            task: Task::from(row.task),
            assignment_count: row.assignment_count.unwrap_or_default(),
        })
        .collect())
}

#[instrument]
pub async fn count_tasks(pool: &Pool<Sqlite>, coach_id: i64) -> Result<i64, AppError> {
    let (count,) = sqlx::query_as::<_, (i64,)>(
        "SELECT COUNT(*) FROM tasks WHERE created_by = ? AND deleted_at IS NULL",
    )
    .bind(coach_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
