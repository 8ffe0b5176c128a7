use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Pool, Sqlite, SqliteConnection};
use tracing::{info, instrument, warn};

use crate::error::AppError;
use crate::models::{
    AssignmentStats, AssignmentStatus, DbTaskAssignment, Difficulty, Exercise, Priority,
    PublicProfile, StatusSummary, Task, TaskAssignment, decode_exercises,
};

use super::{
    NewTask, ensure_owned, fetch_task, insert_task, is_unique_violation, trainee_link_exists,
};

/// Where the task for a new assignment comes from.
#[derive(Debug, Clone)]
pub enum TaskSource {
    Existing(i64),
    New(NewTask),
}

#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub status: AssignmentStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub notes: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedAssignment {
    pub task: Task,
    pub assignment: TaskAssignment,
}

/// One assignment joined with its task and the user on the other side of the
/// relationship: the coach in trainee listings, the trainee in coach listings.
#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbAssignmentDetail {
    pub assignment_id: Option<i64>,
    pub task_id: Option<i64>,
    pub status: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Option<String>,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub workout_type: Option<String>,
    pub difficulty_level: Option<String>,
    pub duration_minutes: Option<i64>,
    pub calories_target: Option<i64>,
    pub exercises: Option<String>,
    pub task_deleted_at: Option<DateTime<Utc>>,
    pub party_id: Option<i64>,
    pub party_username: Option<String>,
    pub party_full_name: Option<String>,
    pub party_email: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
pub struct AssignmentDetail {
    pub assignment_id: i64,
    pub task_id: i64,
    pub title: String,
    pub description: String,
    pub workout_type: String,
    pub difficulty: Difficulty,
    pub duration: Option<i64>,
    pub calories_target: Option<i64>,
    pub exercises: Vec<Exercise>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: AssignmentStatus,
    pub priority: Priority,
    pub notes: String,
    pub assigned_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub task_deleted: bool,
    /// Status as stored, before overdue classification.
    #[serde(skip)]
    pub stored_status: AssignmentStatus,
    #[serde(skip)]
    pub party: PublicProfile,
}

impl AssignmentDetail {
    fn from_row(row: DbAssignmentDetail, now: DateTime<Utc>) -> Self {
        let stored_status = row
            .status
            .as_deref()
            .and_then(AssignmentStatus::parse)
            .unwrap_or_default();

        Self {
            assignment_id: row.assignment_id.unwrap_or_default(),
            task_id: row.task_id.unwrap_or_default(),
            title: row.title.unwrap_or_default(),
            description: row.description.unwrap_or_default(),
            workout_type: row.workout_type.unwrap_or_default(),
            difficulty: row
                .difficulty_level
                .as_deref()
                .and_then(Difficulty::parse)
                .unwrap_or_default(),
            duration: row.duration_minutes,
            calories_target: row.calories_target,
            exercises: decode_exercises(row.exercises.as_deref()),
            due_date: row.due_date,
            status: stored_status.effective(row.due_date, now),
            priority: row
                .priority
                .as_deref()
                .and_then(Priority::parse)
                .unwrap_or_default(),
            notes: row.notes.unwrap_or_default(),
            assigned_at: row.assigned_at.unwrap_or(now),
            completed_at: row.completed_at,
            task_deleted: row.task_deleted_at.is_some(),
            stored_status,
            party: PublicProfile {
                id: row.party_id.unwrap_or_default(),
                username: row.party_username.unwrap_or_default(),
                full_name: row.party_full_name.unwrap_or_default(),
                email: row.party_email.unwrap_or_default(),
            },
        }
    }
}

/// Trainee-side listing entry: the assignment plus the assigning coach.
#[derive(Debug, Serialize, Clone)]
pub struct TraineeTaskView {
    #[serde(flatten)]
    pub detail: AssignmentDetail,
    pub coach: PublicProfile,
}

/// Coach-side listing entry: the assignment plus the trainee it belongs to.
#[derive(Debug, Serialize, Clone)]
pub struct CoachAssignmentView {
    #[serde(flatten)]
    pub detail: AssignmentDetail,
    pub trainee: PublicProfile,
}

#[derive(Debug, Serialize)]
pub struct TaskListing<T> {
    pub tasks: Vec<T>,
    pub stats: StatusSummary,
}

const DETAIL_COLUMNS: &str = "a.id AS assignment_id, a.task_id, a.status, a.due_date, a.priority,
    a.notes, a.completed_at, a.created_at AS assigned_at,
    t.title, t.description, t.workout_type, t.difficulty_level, t.duration_minutes,
    t.calories_target, t.exercises, t.deleted_at AS task_deleted_at,
    u.id AS party_id, u.username AS party_username, u.full_name AS party_full_name,
    u.email AS party_email";

async fn fetch_assignment(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<TaskAssignment>, AppError> {
    let row = sqlx::query_as::<_, DbTaskAssignment>("SELECT * FROM task_assignments WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(TaskAssignment::from))
}

#[instrument]
pub async fn get_assignment(pool: &Pool<Sqlite>, id: i64) -> Result<TaskAssignment, AppError> {
    let mut conn = pool.acquire().await?;
    fetch_assignment(&mut conn, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Task assignment not found".to_string()))
}

#[instrument]
pub async fn find_trainee_assignment(
    pool: &Pool<Sqlite>,
    trainee_id: i64,
    task_id: i64,
) -> Result<TaskAssignment, AppError> {
    let row = sqlx::query_as::<_, DbTaskAssignment>(
        "SELECT * FROM task_assignments WHERE task_id = ? AND trainee_id = ?",
    )
    .bind(task_id)
    .bind(trainee_id)
    .fetch_optional(pool)
    .await?;

    row.map(TaskAssignment::from)
        .ok_or_else(|| AppError::NotFound("Task assignment not found".to_string()))
}

/// Creates the task (or reuses one the coach owns) and the assignment in a
/// single transaction.
#[instrument(skip(pool, source, assignment))]
pub async fn create_and_assign(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    trainee_id: i64,
    source: TaskSource,
    assignment: NewAssignment,
) -> Result<CreatedAssignment, AppError> {
    info!("Creating and assigning task to trainee");

    if !matches!(
        assignment.status,
        AssignmentStatus::Pending | AssignmentStatus::InProgress
    ) {
        return Err(AppError::Validation(
            "New assignments must be pending or in_progress".to_string(),
        ));
    }

    let now = Utc::now();
    let mut tx = pool.begin().await?;

    if !trainee_link_exists(&mut tx, coach_id, trainee_id).await? {
        return Err(AppError::Authorization(
            "Trainee is not in your list".to_string(),
        ));
    }

    let task_id = match source {
        TaskSource::Existing(task_id) => {
            ensure_owned(fetch_task(&mut tx, task_id).await?, coach_id)?.id
        }
        TaskSource::New(task) => insert_task(&mut tx, coach_id, &task, now).await?,
    };

    let res = sqlx::query(
        "INSERT INTO task_assignments
         (task_id, trainee_id, assigned_by, status, due_date, priority, notes, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(task_id)
    .bind(trainee_id)
    .bind(coach_id)
    .bind(assignment.status.as_str())
    .bind(assignment.due_date)
    .bind(assignment.priority.as_str())
    .bind(&assignment.notes)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            AppError::Validation("Task already assigned to this trainee".to_string())
        } else {
            AppError::from(err)
        }
    })?;

    let assignment_id = res.last_insert_rowid();

    let task = fetch_task(&mut tx, task_id)
        .await?
        .ok_or_else(|| AppError::Internal("Assigned task could not be read back".to_string()))?;
    let assignment = fetch_assignment(&mut tx, assignment_id)
        .await?
        .ok_or_else(|| AppError::Internal("Assignment could not be read back".to_string()))?;

    tx.commit().await?;

    Ok(CreatedAssignment { task, assignment })
}

/// Marks the trainee's assignment for `task_id` completed. The update only
/// applies while the assignment is unfinished, so a repeated or concurrent
/// submission leaves the first completion time in place.
#[instrument(skip(pool, notes))]
pub async fn submit_completion(
    pool: &Pool<Sqlite>,
    trainee_id: i64,
    task_id: i64,
    notes: Option<String>,
) -> Result<TaskAssignment, AppError> {
    info!("Submitting task completion");
    let assignment = find_trainee_assignment(pool, trainee_id, task_id).await?;

    let notes = notes.filter(|n| !n.trim().is_empty());
    let now = Utc::now();

    let res = sqlx::query(
        "UPDATE task_assignments
         SET status = 'completed', completed_at = ?, notes = COALESCE(?, notes), updated_at = ?
         WHERE id = ? AND status <> 'completed'",
    )
    .bind(now)
    .bind(notes)
    .bind(now)
    .bind(assignment.id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        warn!(assignment_id = %assignment.id, "Assignment already completed, leaving it unchanged");
    }

    get_assignment(pool, assignment.id).await
}

/// pending → in_progress. Already in progress is a no-op; completed is terminal.
#[instrument]
pub async fn start_assignment(
    pool: &Pool<Sqlite>,
    trainee_id: i64,
    task_id: i64,
) -> Result<TaskAssignment, AppError> {
    info!("Starting task");
    let assignment = find_trainee_assignment(pool, trainee_id, task_id).await?;

    if assignment.status == AssignmentStatus::Completed {
        return Err(AppError::Validation(
            "Completed tasks cannot be restarted".to_string(),
        ));
    }

    sqlx::query(
        "UPDATE task_assignments SET status = 'in_progress', updated_at = ?
         WHERE id = ? AND status = 'pending'",
    )
    .bind(Utc::now())
    .bind(assignment.id)
    .execute(pool)
    .await?;

    get_assignment(pool, assignment.id).await
}

fn summarize<'a>(details: impl IntoIterator<Item = &'a AssignmentDetail>) -> StatusSummary {
    StatusSummary::from(AssignmentStats::tally(
        details.into_iter().map(|detail| detail.status),
    ))
}

#[instrument]
pub async fn list_assignment_details_for_trainee(
    pool: &Pool<Sqlite>,
    trainee_id: i64,
    now: DateTime<Utc>,
) -> Result<Vec<AssignmentDetail>, AppError> {
    let query = format!(
        "SELECT {}
         FROM task_assignments a
         JOIN tasks t ON t.id = a.task_id
         JOIN users u ON u.id = a.assigned_by
         WHERE a.trainee_id = ?
         ORDER BY a.created_at DESC, a.id DESC",
        DETAIL_COLUMNS
    );

    let rows = sqlx::query_as::<_, DbAssignmentDetail>(&query)
        .bind(trainee_id)
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| AssignmentDetail::from_row(row, now))
        .collect())
}

#[instrument]
pub async fn list_for_trainee(
    pool: &Pool<Sqlite>,
    trainee_id: i64,
    now: DateTime<Utc>,
) -> Result<TaskListing<TraineeTaskView>, AppError> {
    info!("Listing trainee assignments");
    let details = list_assignment_details_for_trainee(pool, trainee_id, now).await?;
    let stats = summarize(&details);

    let tasks = details
        .into_iter()
        .map(|detail| TraineeTaskView {
            coach: detail.party.clone(),
            detail,
        })
        .collect();

    Ok(TaskListing { tasks, stats })
}

/// Assignments made by a coach, optionally narrowed to one trainee.
#[instrument]
pub async fn list_for_coach(
    pool: &Pool<Sqlite>,
    coach_id: i64,
    trainee_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<TaskListing<CoachAssignmentView>, AppError> {
    info!("Listing coach assignments");
    let mut query = format!(
        "SELECT {}
         FROM task_assignments a
         JOIN tasks t ON t.id = a.task_id
         JOIN users u ON u.id = a.trainee_id
         WHERE a.assigned_by = ?",
        DETAIL_COLUMNS
    );
    if trainee_id.is_some() {
        query.push_str(" AND a.trainee_id = ?");
    }
    query.push_str(" ORDER BY a.created_at DESC, a.id DESC");

    let mut statement = sqlx::query_as::<_, DbAssignmentDetail>(&query).bind(coach_id);
    if let Some(trainee_id) = trainee_id {
        statement = statement.bind(trainee_id);
    }

    let details: Vec<AssignmentDetail> = statement
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|row| AssignmentDetail::from_row(row, now))
        .collect();
    let stats = summarize(&details);

    let tasks = details
        .into_iter()
        .map(|detail| CoachAssignmentView {
            trainee: detail.party.clone(),
            detail,
        })
        .collect();

    Ok(TaskListing { tasks, stats })
}
